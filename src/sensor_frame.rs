//! The fixed-shape readings that flow through the acquisition pipeline.
//!
//! The sensor board reports two groups of five chips, and every chip reports
//! a three-axis field vector. A [`SensorFrame`] is one such report, and a
//! [`CalibratedFrame`] is a report with the baseline already taken out.

use std::ops::Sub;

/// Number of reading groups carried by every packet.
pub const GROUPS: usize = 2;

/// Number of sensing chips on the board.
pub const CHIPS: usize = 5;

/// Number of axes reported by each chip.
pub const AXES: usize = 3;

/// Total number of scalar values in one [`SensorFrame`].
pub const FRAME_LEN: usize = GROUPS * CHIPS * AXES;

/// A single chip reading, `[x, y, z]`.
pub type Reading = [f64; AXES];

/// One full report from the sensor board: 2 groups × 5 chips × 3 axes.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SensorFrame {
    groups: [[Reading; CHIPS]; GROUPS],
}

impl SensorFrame {
    /// The all-zero frame.
    pub fn zero() -> Self {
        Self::default()
    }

    /// Reshape exactly [`FRAME_LEN`] values, given in row-major order, into a
    /// frame. Returns `None` for any other length.
    pub fn from_row_major(values: &[f64]) -> Option<Self> {
        if values.len() != FRAME_LEN {
            return None;
        }

        let mut frame = Self::zero();
        for (slot, &value) in frame.values_mut().zip(values) {
            *slot = value;
        }
        Some(frame)
    }

    /// The five chip readings of one group.
    pub fn group(&self, group: usize) -> &[Reading; CHIPS] {
        &self.groups[group]
    }

    /// Group 0, the only group the visualization consumes.
    pub fn primary(&self) -> &[Reading; CHIPS] {
        self.group(0)
    }

    /// Iterate over all values in row-major (group, chip, axis) order.
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.groups.iter().flatten().flatten().copied()
    }

    fn values_mut(&mut self) -> impl Iterator<Item = &mut f64> {
        self.groups.iter_mut().flatten().flatten()
    }
}

impl Sub for SensorFrame {
    type Output = SensorFrame;

    fn sub(mut self, rhs: SensorFrame) -> SensorFrame {
        for (l, r) in self.values_mut().zip(rhs.values()) {
            *l -= r;
        }
        self
    }
}

/// A [`SensorFrame`] with the baseline subtracted. Only lives for the tick
/// that produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibratedFrame(SensorFrame);

impl CalibratedFrame {
    /// Wrap a frame that has already been calibrated.
    pub fn new(frame: SensorFrame) -> Self {
        CalibratedFrame(frame)
    }

    /// The underlying readings.
    pub fn frame(&self) -> &SensorFrame {
        &self.0
    }

    /// Group 0 of the calibrated readings.
    pub fn primary(&self) -> &[Reading; CHIPS] {
        self.0.primary()
    }
}

/// Euclidean norm of a chip reading.
pub fn magnitude(reading: &Reading) -> f64 {
    reading.iter().map(|v| v * v).sum::<f64>().sqrt()
}
