//! Baseline calibration.
//!
//! The first frame that arrives after startup becomes the reference that every
//! later frame is measured against. The operator can drop that reference at any
//! time, which puts the tracker back on an all-zero baseline.

use log::info;

use crate::sensor_frame::{CalibratedFrame, SensorFrame};

/// Holds the reference reading subtracted from every frame.
#[derive(Debug, Default, Clone)]
pub struct BaselineTracker {
    baseline: Option<SensorFrame>,
}

impl BaselineTracker {
    /// A tracker that has not seen any frame yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adopt `frame` as the baseline if there isn't one yet. First frame wins.
    pub fn observe(&mut self, frame: &SensorFrame) {
        if self.baseline.is_none() {
            info!("Baseline captured from first frame");
            self.baseline = Some(*frame);
        }
    }

    /// Replace the baseline with the all-zero frame.
    pub fn reset(&mut self) {
        self.baseline = Some(SensorFrame::zero());
    }

    /// The current baseline, if one has been observed or reset.
    pub fn baseline(&self) -> Option<&SensorFrame> {
        self.baseline.as_ref()
    }

    /// Subtract the baseline from `frame`. Without a baseline the frame passes
    /// through unchanged.
    pub fn calibrate(&self, frame: &SensorFrame) -> CalibratedFrame {
        match self.baseline {
            Some(baseline) => CalibratedFrame::new(*frame - baseline),
            None => CalibratedFrame::new(*frame),
        }
    }
}
