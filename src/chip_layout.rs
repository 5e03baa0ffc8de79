//! Where the five chips sit on the background image, and how each one is
//! mounted.

use crate::sensor_frame::CHIPS;
use crate::Point;

use std::f64::consts::PI;

/// One sensing chip on the board.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Chip {
    /// Which arm of the cross the chip sits on, used in log lines.
    pub name: &'static str,
    /// Where the chip is drawn, in background coordinates (y pointing down).
    pub position: Point,
    /// Mounting rotation of the chip's xy axes relative to the screen, in
    /// radians.
    pub rotation: f64,
}

/// The fixed arrangement of the five chips, indexed by chip id.
#[derive(Debug, Clone, PartialEq)]
pub struct ChipLayout {
    chips: [Chip; CHIPS],
}

const fn chip(name: &'static str, x: f64, y: f64, rotation: f64) -> Chip {
    Chip {
        name,
        position: Point { x, y },
        rotation,
    }
}

impl ChipLayout {
    /// The board's cross arrangement: center, left, right, up, down.
    pub fn five_chip() -> Self {
        Self {
            chips: [
                chip("center", 204.0, 222.0, -PI / 2.0),
                chip("left", 130.0, 222.0, -PI / 2.0),
                chip("right", 279.0, 222.0, PI),
                chip("up", 204.0, 157.0, PI / 2.0),
                chip("down", 204.0, 290.0, 0.0),
            ],
        }
    }

    /// All chips, indexed by id.
    pub fn chips(&self) -> &[Chip; CHIPS] {
        &self.chips
    }

    /// A single chip.
    pub fn chip(&self, id: usize) -> &Chip {
        &self.chips[id]
    }
}

impl Default for ChipLayout {
    fn default() -> Self {
        Self::five_chip()
    }
}
