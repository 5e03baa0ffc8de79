//! The single-slot buffer between the notification callback and the render
//! tick.
//!
//! Unlike a queue, the slot only ever holds the freshest frame: publishing
//! over an unread frame drops the older one. The renderer only wants the
//! current state of the board, so a backlog would only add latency.
//!
//! Both sides run on the same thread (notifications are delivered from inside
//! the acquisition window, never concurrently with a render tick), so this is
//! a plain owned value with no locking.

use log::trace;

use crate::sensor_frame::SensorFrame;

/// Latest-wins mailbox holding at most one pending [`SensorFrame`].
#[derive(Debug, Default)]
pub struct FrameHandoff {
    pending: Option<SensorFrame>,
    dropped: u64,
}

impl FrameHandoff {
    /// An empty mailbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `frame`, overwriting any frame that has not been taken yet.
    pub fn publish(&mut self, frame: SensorFrame) {
        if self.pending.replace(frame).is_some() {
            trace!("Overwrote an unread frame");
            self.dropped += 1;
        }
    }

    /// Take the pending frame, leaving the slot empty.
    pub fn take_latest(&mut self) -> Option<SensorFrame> {
        self.pending.take()
    }

    /// Whether a frame is waiting.
    pub fn is_empty(&self) -> bool {
        self.pending.is_none()
    }

    /// How many frames were overwritten before anyone took them.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}
