//! The acquisition window that runs once per render tick.
//!
//! Every tick the loop turns notifications on, listens for a fixed dwell time,
//! and turns them off again. Each payload that arrives is parsed on the spot;
//! good frames land in the [`FrameHandoff`] (and seed the baseline), bad ones
//! are counted and forgotten.

use crate::baseline::BaselineTracker;
use crate::frame_handoff::FrameHandoff;
use crate::frame_parser;
use crate::link::{Connection, ConnectionError, NOTIFY_CHARACTERISTIC_UUID};

use log::{debug, info, warn};
use std::time::Duration;

/// Where the connection is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// The connection has been closed.
    Disconnected,
    /// Connected, notifications off.
    Connected,
    /// Connected, notifications on.
    Streaming,
}

/// Running totals for the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AcquisitionStats {
    /// Windows run so far.
    pub windows: u64,
    /// Payloads that parsed into a frame.
    pub frames: u64,
    /// Payloads that were rejected.
    pub parse_errors: u64,
}

/// Owns the connection and runs the subscribe/listen/unsubscribe cycle.
pub struct AcquisitionLoop<C: Connection> {
    connection: C,
    state: ConnectionState,
    dwell: Duration,
    stats: AcquisitionStats,
}

impl<C: Connection> AcquisitionLoop<C> {
    /// Take ownership of an open connection.
    pub fn new(connection: C, dwell: Duration) -> Self {
        Self {
            connection,
            state: ConnectionState::Connected,
            dwell,
            stats: AcquisitionStats::default(),
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Totals so far.
    pub fn stats(&self) -> &AcquisitionStats {
        &self.stats
    }

    /// How long each window listens for.
    pub fn dwell(&self) -> Duration {
        self.dwell
    }

    /// Run one window. Returns how many valid frames arrived.
    ///
    /// Malformed payloads never fail the window; link failures always do.
    pub fn run_window(
        &mut self,
        handoff: &mut FrameHandoff,
        baseline: &mut BaselineTracker,
    ) -> Result<usize, ConnectionError> {
        if self.state == ConnectionState::Disconnected {
            return Err(ConnectionError::SubscribeFailed(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "connection already closed",
            )));
        }

        self.connection.subscribe(NOTIFY_CHARACTERISTIC_UUID)?;
        self.state = ConnectionState::Streaming;

        let stats = &mut self.stats;
        let mut received = 0;
        self.connection.listen(self.dwell, &mut |payload: &[u8]| {
            debug!("Data received: {:?}", String::from_utf8_lossy(payload));
            match frame_parser::parse(payload) {
                Ok(frame) => {
                    baseline.observe(&frame);
                    handoff.publish(frame);
                    stats.frames += 1;
                    received += 1;
                }
                Err(e) => {
                    debug!("Discarding payload: {}", e);
                    stats.parse_errors += 1;
                }
            }
        })?;

        self.connection.unsubscribe(NOTIFY_CHARACTERISTIC_UUID)?;
        self.state = ConnectionState::Connected;
        self.stats.windows += 1;

        if received > 1 {
            debug!("{} frames this window, only the latest is kept", received);
        }
        Ok(received)
    }

    /// Stop streaming if needed and close the connection. Safe to call more
    /// than once.
    pub fn shutdown(&mut self) -> Result<(), ConnectionError> {
        if self.state == ConnectionState::Streaming {
            if let Err(e) = self.connection.unsubscribe(NOTIFY_CHARACTERISTIC_UUID) {
                warn!("Could not stop notifications during shutdown: {}", e);
            }
            self.state = ConnectionState::Connected;
        }

        if self.state == ConnectionState::Connected {
            self.state = ConnectionState::Disconnected;
            self.connection.disconnect()?;
            info!("Disconnected from sensor");
        }

        Ok(())
    }

    /// Borrow the connection.
    pub fn connection(&self) -> &C {
        &self.connection
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::replay::ReplayConnection;
    use std::io;

    const GOOD: &str = "0,0,1, 0,0,0, 0,0,0, 0,0,0, 0,0,0, 0,0,0,0,0,0,0,0,0,0,0,0,0,0,0";

    fn good(first: f64) -> String {
        let mut s = format!("{},", first);
        s.push_str(&"0,".repeat(29));
        s
    }

    fn replay(payloads: &[&str], per_window: usize) -> AcquisitionLoop<ReplayConnection> {
        let payloads = payloads.iter().map(|p| p.as_bytes().to_vec()).collect();
        AcquisitionLoop::new(
            ReplayConnection::new(payloads, per_window),
            Duration::ZERO,
        )
    }

    #[test]
    fn good_frames_reach_the_handoff_and_baseline() {
        let mut acquisition = replay(&[GOOD], 1);
        let mut handoff = FrameHandoff::new();
        let mut baseline = BaselineTracker::new();

        assert_eq!(acquisition.run_window(&mut handoff, &mut baseline).unwrap(), 1);

        let frame = handoff.take_latest().unwrap();
        assert_eq!(frame.primary()[0], [0.0, 0.0, 1.0]);
        assert_eq!(baseline.baseline(), Some(&frame));
        assert_eq!(acquisition.state(), ConnectionState::Connected);
        assert_eq!(acquisition.stats().windows, 1);
    }

    #[test]
    fn malformed_payloads_are_counted_not_fatal() {
        let mut acquisition = replay(&["1,2,abc"], 1);
        let mut handoff = FrameHandoff::new();
        let mut baseline = BaselineTracker::new();

        assert_eq!(acquisition.run_window(&mut handoff, &mut baseline).unwrap(), 0);
        assert!(handoff.is_empty());
        assert!(baseline.baseline().is_none());
        assert_eq!(acquisition.stats().parse_errors, 1);
        assert_eq!(acquisition.stats().frames, 0);
    }

    #[test]
    fn latest_frame_of_a_window_wins() {
        let (a, b, c) = (good(1.0), good(2.0), good(3.0));
        let mut acquisition = replay(&[a.as_str(), "oops", b.as_str(), c.as_str()], 4);
        let mut handoff = FrameHandoff::new();
        let mut baseline = BaselineTracker::new();

        assert_eq!(acquisition.run_window(&mut handoff, &mut baseline).unwrap(), 3);
        assert_eq!(handoff.take_latest().unwrap().primary()[0][0], 3.0);
        assert_eq!(baseline.baseline().unwrap().primary()[0][0], 1.0);
        assert_eq!(handoff.dropped(), 2);
    }

    #[test]
    fn empty_windows_leave_the_handoff_empty() {
        let mut acquisition = replay(&[], 1);
        let mut handoff = FrameHandoff::new();
        let mut baseline = BaselineTracker::new();

        assert_eq!(acquisition.run_window(&mut handoff, &mut baseline).unwrap(), 0);
        assert!(handoff.take_latest().is_none());
    }

    struct BrokenConnection {
        disconnects: usize,
    }

    impl Connection for BrokenConnection {
        fn subscribe(&mut self, _: &str) -> Result<(), ConnectionError> {
            Err(ConnectionError::SubscribeFailed(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "link lost",
            )))
        }
        fn listen(&mut self, _: Duration, _: &mut dyn FnMut(&[u8])) -> Result<(), ConnectionError> {
            unreachable!("never subscribed")
        }
        fn unsubscribe(&mut self, _: &str) -> Result<(), ConnectionError> {
            Ok(())
        }
        fn disconnect(&mut self) -> Result<(), ConnectionError> {
            self.disconnects += 1;
            Ok(())
        }
    }

    #[test]
    fn subscribe_failures_propagate() {
        let mut acquisition =
            AcquisitionLoop::new(BrokenConnection { disconnects: 0 }, Duration::ZERO);
        let mut handoff = FrameHandoff::new();
        let mut baseline = BaselineTracker::new();

        assert!(matches!(
            acquisition.run_window(&mut handoff, &mut baseline),
            Err(ConnectionError::SubscribeFailed(_))
        ));
        assert_eq!(acquisition.state(), ConnectionState::Connected);
    }

    #[test]
    fn shutdown_disconnects_once() {
        let mut acquisition =
            AcquisitionLoop::new(BrokenConnection { disconnects: 0 }, Duration::ZERO);

        acquisition.shutdown().unwrap();
        acquisition.shutdown().unwrap();

        assert_eq!(acquisition.state(), ConnectionState::Disconnected);
        assert_eq!(acquisition.connection().disconnects, 1);

        let mut handoff = FrameHandoff::new();
        let mut baseline = BaselineTracker::new();
        assert!(acquisition.run_window(&mut handoff, &mut baseline).is_err());
    }
}
