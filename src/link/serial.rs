//! A [`Link`] over a serial port.
//!
//! This talks to a UART bridge that is paired with the sensor board and
//! forwards each notification as one newline-terminated line. The bridge keeps
//! forwarding whether or not we are listening, so subscribing throws away
//! whatever piled up in the input buffer, and unsubscribing drops any half
//! received line.

use crate::link::{Connection, ConnectionError, DeviceHandle, Link};

use log::{debug, warn};
use serial2::SerialPort;
use std::{
    io,
    path::PathBuf,
    time::{Duration, Instant},
};

/// Default baud rate of the bridge.
pub const DEFAULT_BAUD_RATE: u32 = 115200;

// Anything longer than this without a newline is garbage, not a payload.
const MAX_LINE_LEN: usize = 4096;

/// Finds the bridge among the serial ports and opens it.
#[derive(Debug, Clone)]
pub struct SerialLink {
    port: Option<PathBuf>,
    baud_rate: u32,
}

impl SerialLink {
    /// A link that uses the first available port unless told otherwise.
    pub fn new(baud_rate: u32) -> Self {
        Self {
            port: None,
            baud_rate,
        }
    }

    /// Always use `port` instead of scanning.
    pub fn with_port(mut self, port: impl Into<PathBuf>) -> Self {
        self.port = Some(port.into());
        self
    }

    /// All serial ports on this machine.
    pub fn available_ports() -> io::Result<Vec<PathBuf>> {
        SerialPort::available_ports()
    }
}

fn handle_for(port: &PathBuf) -> DeviceHandle {
    DeviceHandle {
        name: "serial bridge".to_owned(),
        address: port.to_string_lossy().into_owned(),
    }
}

impl Link for SerialLink {
    type Conn = SerialConnection;

    // A serial port cannot advertise a service, so this only finds the port
    // the bridge is most likely on.
    fn scan_for_service(&mut self, service: &str) -> Result<Option<DeviceHandle>, ConnectionError> {
        if let Some(port) = &self.port {
            return Ok(Some(handle_for(port)));
        }

        let ports = Self::available_ports().map_err(ConnectionError::ScanFailed)?;
        debug!("Ports available while looking for {}: {:?}", service, ports);
        Ok(ports.first().map(handle_for))
    }

    fn connect(&mut self, device: &DeviceHandle) -> Result<SerialConnection, ConnectionError> {
        let port = SerialPort::open(&device.address, self.baud_rate).map_err(|source| {
            ConnectionError::ConnectFailed {
                device: device.clone(),
                source,
            }
        })?;

        Ok(SerialConnection {
            port: Some(port),
            lines: LineSplitter::default(),
        })
    }
}

/// Reassembles newline-terminated payloads from arbitrary read chunks.
#[derive(Debug, Default)]
struct LineSplitter {
    partial: Vec<u8>,
}

impl LineSplitter {
    fn feed(&mut self, bytes: &[u8], on_line: &mut dyn FnMut(&[u8])) {
        for &c in bytes {
            if c == b'\n' {
                let line = self.partial.strip_suffix(b"\r").unwrap_or(&self.partial[..]);
                if !line.is_empty() {
                    on_line(line);
                }
                self.partial.clear();
            } else if self.partial.len() >= MAX_LINE_LEN {
                warn!("Dropping {} bytes without a line ending", self.partial.len());
                self.partial.clear();
            } else {
                self.partial.push(c);
            }
        }
    }

    fn clear(&mut self) {
        self.partial.clear();
    }
}

/// An open serial port to the bridge.
pub struct SerialConnection {
    port: Option<SerialPort>,
    lines: LineSplitter,
}

fn not_connected() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "serial port is closed")
}

impl Connection for SerialConnection {
    fn subscribe(&mut self, _characteristic: &str) -> Result<(), ConnectionError> {
        let port = self
            .port
            .as_ref()
            .ok_or_else(|| ConnectionError::SubscribeFailed(not_connected()))?;
        port.discard_input_buffer()
            .map_err(ConnectionError::SubscribeFailed)?;
        self.lines.clear();
        Ok(())
    }

    fn listen(
        &mut self,
        dwell: Duration,
        on_payload: &mut dyn FnMut(&[u8]),
    ) -> Result<(), ConnectionError> {
        let port = self
            .port
            .as_mut()
            .ok_or_else(|| ConnectionError::ListenFailed(not_connected()))?;
        let deadline = Instant::now() + dwell;
        let mut buffer = [0; 256];

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(());
            }

            port.set_read_timeout(remaining)
                .map_err(ConnectionError::ListenFailed)?;

            match port.read(&mut buffer) {
                Ok(read_len) => self.lines.feed(&buffer[..read_len], on_payload),
                Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {
                    return Ok(());
                }
                Err(e) => return Err(ConnectionError::ListenFailed(e)),
            }
        }
    }

    fn unsubscribe(&mut self, _characteristic: &str) -> Result<(), ConnectionError> {
        self.lines.clear();
        match &self.port {
            Some(port) => port
                .discard_input_buffer()
                .map_err(ConnectionError::UnsubscribeFailed),
            None => Err(ConnectionError::UnsubscribeFailed(not_connected())),
        }
    }

    fn disconnect(&mut self) -> Result<(), ConnectionError> {
        // Dropping the port closes it.
        self.port.take();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(chunks: &[&[u8]]) -> Vec<String> {
        let mut splitter = LineSplitter::default();
        let mut lines = Vec::new();
        for chunk in chunks {
            splitter.feed(chunk, &mut |line: &[u8]| {
                lines.push(String::from_utf8_lossy(line).into_owned())
            });
        }
        lines
    }

    #[test]
    fn lines_are_reassembled_across_reads() {
        let lines = split(&[&b"1,2,"[..], &b"3,\n4,5"[..], &b",6,\r\n"[..]]);
        assert_eq!(lines, vec!["1,2,3,", "4,5,6,"]);
    }

    #[test]
    fn blank_lines_are_skipped() {
        let lines = split(&[&b"\n\r\n1,\n"[..]]);
        assert_eq!(lines, vec!["1,"]);
    }

    #[test]
    fn runaway_lines_are_dropped() {
        let garbage = vec![b'7'; MAX_LINE_LEN + 10];
        let lines = split(&[&garbage[..], &b"\n1,\n"[..]]);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], "1,");
        assert!(lines[0].len() < MAX_LINE_LEN);
    }

    #[test]
    fn configured_port_wins_over_scanning() {
        let mut link = SerialLink::new(DEFAULT_BAUD_RATE).with_port("/dev/ttyUSB3");
        let device = link.scan_for_service("anything").unwrap().unwrap();
        assert_eq!(device.address, "/dev/ttyUSB3");
    }
}
