//! The drawing surface the render loop paints on.
//!
//! A surface keeps a static background, accepts circles and lines on top of
//! it, and shows everything at once on [`Surface::present`]. It also owns the
//! user's input queue.

use crate::gui::RenderError;
use crate::projector::{DrawCommand, Rgb, Stroke};
use crate::Point;

/// Something the user did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    /// Close the visualization.
    Quit,
    /// A key was pressed.
    KeyPress(char),
    /// A mouse button went down at this background position.
    MouseDown(Point),
}

/// A place to draw the overlay.
pub trait Surface {
    /// Start a new frame from the bare background, erasing the previous
    /// overlay.
    fn blit_background(&mut self) -> Result<(), RenderError>;

    /// Draw a circle on the current frame.
    fn draw_circle(&mut self, center: Point, radius: f64, stroke: Stroke, color: Rgb);

    /// Draw a line on the current frame.
    fn draw_line(&mut self, start: Point, end: Point, width: f64, color: Rgb);

    /// Set the one-line status text shown with the frame.
    fn set_status(&mut self, _status: &str) {}

    /// Show the current frame.
    fn present(&mut self) -> Result<(), RenderError>;

    /// Everything the user did since the last call. Never blocks.
    fn poll_events(&mut self) -> Result<Vec<InputEvent>, RenderError>;

    /// Draw a batch of commands.
    fn submit(&mut self, commands: &[DrawCommand]) {
        for command in commands {
            match *command {
                DrawCommand::Circle {
                    center,
                    radius,
                    stroke,
                    color,
                } => self.draw_circle(center, radius, stroke, color),
                DrawCommand::Line {
                    start,
                    end,
                    width,
                    color,
                } => self.draw_line(start, end, width, color),
            }
        }
    }
}
