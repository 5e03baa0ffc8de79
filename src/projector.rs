//! Projects calibrated chip readings onto the background as draw commands.
//!
//! Two views are supported. [`VizMode::Magnitude`] draws a filled circle per
//! chip whose radius is the field strength. [`VizMode::ThreeAxis`] splits the
//! vector: the circle shows the out-of-plane (z) component, filled when it
//! points up and outlined when it points down, and a line shows the in-plane
//! (x, y) component. Each chip is mounted at its own angle, so the xy part is
//! rotated into the screen frame first; that way every arrow means the same
//! direction no matter how its chip sits on the board.
//!
//! Projection is a pure function of its inputs.

use crate::chip_layout::ChipLayout;
use crate::sensor_frame::{magnitude, CalibratedFrame};
use crate::Point;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Default divisor from field units to screen units.
pub const DEFAULT_SCALING: f64 = 7.0;

const MAGNITUDE_COLOR: Rgb = Rgb(255, 83, 72);
const Z_COLOR: Rgb = Rgb(255, 0, 0);
const XY_COLOR: Rgb = Rgb(0, 255, 0);
const STROKE_WIDTH: f64 = 2.0;

/// Which view to draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, ValueEnum)]
pub enum VizMode {
    /// One filled circle per chip, radius proportional to field strength.
    Magnitude,
    /// A z circle plus an xy arrow per chip.
    #[default]
    #[value(name = "3axis")]
    ThreeAxis,
}

/// An RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

/// How a circle is drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Stroke {
    /// Solid disc.
    Filled,
    /// Ring of the given width.
    Outline(f64),
}

/// A primitive the drawing surface knows how to render.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    /// A circle around `center`.
    Circle {
        /// Center in background coordinates.
        center: Point,
        /// Radius in background units.
        radius: f64,
        /// Filled or outlined.
        stroke: Stroke,
        /// Color.
        color: Rgb,
    },
    /// A straight line.
    Line {
        /// Start in background coordinates.
        start: Point,
        /// End in background coordinates.
        end: Point,
        /// Line width in background units.
        width: f64,
        /// Color.
        color: Rgb,
    },
}

/// Rotate `(x, y)` counter-clockwise by `theta` radians.
pub fn rotate(theta: f64, x: f64, y: f64) -> (f64, f64) {
    let (sin, cos) = theta.sin_cos();
    (cos * x - sin * y, sin * x + cos * y)
}

/// Turns calibrated frames into [`DrawCommand`]s.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projector {
    mode: VizMode,
    scaling: f64,
}

impl Projector {
    /// A projector for `mode`. `scaling` must be positive and finite.
    pub fn new(mode: VizMode, scaling: f64) -> Self {
        debug_assert!(scaling.is_finite() && scaling > 0.0);
        Self { mode, scaling }
    }

    /// The view being drawn.
    pub fn mode(&self) -> VizMode {
        self.mode
    }

    /// The field-to-screen divisor.
    pub fn scaling(&self) -> f64 {
        self.scaling
    }

    /// Recover the field value a drawn radius or arrow length stands for.
    pub fn magnitude_of(&self, screen_length: f64) -> f64 {
        screen_length * self.scaling
    }

    /// Project group 0 of `frame` onto `layout`.
    pub fn project(&self, frame: &CalibratedFrame, layout: &ChipLayout) -> Vec<DrawCommand> {
        let readings = frame.primary();
        let mut commands = Vec::with_capacity(2 * readings.len());

        for (reading, chip) in readings.iter().zip(layout.chips()) {
            match self.mode {
                VizMode::Magnitude => commands.push(DrawCommand::Circle {
                    center: chip.position,
                    radius: magnitude(reading) / self.scaling,
                    stroke: Stroke::Filled,
                    color: MAGNITUDE_COLOR,
                }),
                VizMode::ThreeAxis => {
                    let [x, y, z] = *reading;
                    let stroke = if z < 0.0 {
                        Stroke::Outline(STROKE_WIDTH)
                    } else {
                        Stroke::Filled
                    };
                    commands.push(DrawCommand::Circle {
                        center: chip.position,
                        radius: z.abs() / self.scaling,
                        stroke,
                        color: Z_COLOR,
                    });

                    let (dx, dy) = rotate(chip.rotation, x, y);
                    commands.push(DrawCommand::Line {
                        start: chip.position,
                        end: Point {
                            x: chip.position.x + dx / self.scaling,
                            y: chip.position.y + dy / self.scaling,
                        },
                        width: STROKE_WIDTH,
                        color: XY_COLOR,
                    });
                }
            }
        }

        commands
    }
}

impl Default for Projector {
    fn default() -> Self {
        Self::new(VizMode::default(), DEFAULT_SCALING)
    }
}
