//! Replays a captured payload log as if it were a live sensor.
//!
//! The log is plain text with one payload per line, exactly as the serial
//! bridge forwards them. Each listening window hands out a fixed number of
//! lines and then waits out the rest of the dwell, so a replay runs at roughly
//! the pace of the live session. Once the log is exhausted every window is
//! empty.

use crate::link::{Connection, ConnectionError, DeviceHandle, Link};

use log::info;
use std::{
    collections::VecDeque,
    fs, io,
    path::{Path, PathBuf},
    thread,
    time::Duration,
};

/// A [`Link`] backed by a payload log.
#[derive(Debug, Clone)]
pub struct ReplayLink {
    source: PathBuf,
    payloads: Vec<Vec<u8>>,
    per_window: usize,
}

impl ReplayLink {
    /// Load a payload log. Blank lines are skipped.
    pub fn from_path(path: impl AsRef<Path>, per_window: usize) -> io::Result<Self> {
        let text = fs::read(path.as_ref())?;
        let payloads = text
            .split(|&c| c == b'\n')
            .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
            .filter(|line| !line.is_empty())
            .map(|line| line.to_vec())
            .collect();

        Ok(Self {
            source: path.as_ref().to_path_buf(),
            payloads,
            per_window,
        })
    }

    /// How many payloads the log holds.
    pub fn len(&self) -> usize {
        self.payloads.len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }
}

impl Link for ReplayLink {
    type Conn = ReplayConnection;

    fn scan_for_service(&mut self, _service: &str) -> Result<Option<DeviceHandle>, ConnectionError> {
        Ok(Some(DeviceHandle {
            name: "replay".to_owned(),
            address: self.source.to_string_lossy().into_owned(),
        }))
    }

    fn connect(&mut self, device: &DeviceHandle) -> Result<ReplayConnection, ConnectionError> {
        info!("Replaying {} payloads from {}", self.payloads.len(), device.address);
        Ok(ReplayConnection::new(
            self.payloads.clone(),
            self.per_window,
        ))
    }
}

/// A connection that hands out a fixed list of payloads.
#[derive(Debug)]
pub struct ReplayConnection {
    payloads: VecDeque<Vec<u8>>,
    per_window: usize,
    streaming: bool,
    connected: bool,
}

impl ReplayConnection {
    /// Deliver `payloads` in order, `per_window` of them per listening window.
    pub fn new(payloads: Vec<Vec<u8>>, per_window: usize) -> Self {
        Self {
            payloads: payloads.into(),
            per_window,
            streaming: false,
            connected: true,
        }
    }

    /// Payloads not yet delivered.
    pub fn remaining(&self) -> usize {
        self.payloads.len()
    }

    /// Whether [`Connection::disconnect`] has not been called yet.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Whether notifications are on.
    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    fn closed() -> io::Error {
        io::Error::new(io::ErrorKind::NotConnected, "replay connection closed")
    }
}

impl Connection for ReplayConnection {
    fn subscribe(&mut self, _characteristic: &str) -> Result<(), ConnectionError> {
        if !self.connected {
            return Err(ConnectionError::SubscribeFailed(Self::closed()));
        }
        self.streaming = true;
        Ok(())
    }

    fn listen(
        &mut self,
        dwell: Duration,
        on_payload: &mut dyn FnMut(&[u8]),
    ) -> Result<(), ConnectionError> {
        if !self.connected {
            return Err(ConnectionError::ListenFailed(Self::closed()));
        }

        if self.streaming {
            for _ in 0..self.per_window {
                match self.payloads.pop_front() {
                    Some(payload) => on_payload(&payload),
                    None => break,
                }
            }
        }

        thread::sleep(dwell);
        Ok(())
    }

    fn unsubscribe(&mut self, _characteristic: &str) -> Result<(), ConnectionError> {
        self.streaming = false;
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), ConnectionError> {
        self.streaming = false;
        self.connected = false;
        Ok(())
    }
}
