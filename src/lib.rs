//! magview shows live readings from a five-chip magnetic sensor board.
//!
//! The board streams one comma separated frame of 30 field values per
//! notification: two groups of five chips, three axes each. The host opens a
//! short notification window once per render tick, keeps only the newest
//! frame that arrived, subtracts a baseline captured from the very first
//! frame, and draws the result over a picture of the board. Each chip gets a
//! circle for its field strength (or its z component) and, in the three-axis
//! view, an arrow for its in-plane component.
//!
//! The pipeline, front to back:
//!
//! - [link] talks to the sensor (a serial bridge, a simulated board, or a
//!   replayed capture),
//! - [acquisition] runs the per-tick notification window and feeds
//!   [frame_parser], [frame_handoff] and [baseline],
//! - [projector] turns a calibrated frame into draw commands for a
//!   [surface::Surface],
//! - [render_loop] ties it all together at a fixed frame rate.

#![warn(missing_docs)]
pub mod acquisition;
pub mod args;
pub mod baseline;
pub mod chip_layout;
pub mod config;
pub mod frame_handoff;
pub mod frame_parser;
pub mod gui;
pub mod link;
pub mod projector;
pub mod recorder;
pub mod render_loop;
pub mod sensor_frame;
pub mod surface;

use std::fmt;

/// A position on the background, in screen units with y pointing down.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    /// Horizontal position.
    pub x: f64,
    /// Vertical position, growing downwards.
    pub y: f64,
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({:.1}, {:.1})", self.x, self.y)
    }
}
