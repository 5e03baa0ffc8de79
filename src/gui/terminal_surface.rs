//! A [`Surface`] that draws into the terminal with ratatui.
//!
//! The background and overlay are painted on a half-block [`Canvas`] whose
//! bounds are the background's screen units, so chip positions and radii
//! carry over unchanged. Terminal cells are much coarser than screen units,
//! so stroke widths below one cell are drawn as a single trace.

use crate::gui::{framed, Background, RenderError};
use crate::projector::{Rgb, Stroke};
use crate::surface::{InputEvent, Surface};
use crate::Point;

use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind,
        KeyModifiers, MouseEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::warn;
use ratatui::{
    prelude::*,
    widgets::{
        canvas::{Canvas, Circle, Line as CanvasLine, Points},
        *,
    },
    Terminal,
};
use std::{
    collections::HashMap,
    io::{self, Stdout},
    time::Duration,
};

enum Shape {
    Disc { center: Point, radius: f64, color: Rgb },
    Ring { center: Point, radius: f64, color: Rgb },
    Segment { start: Point, end: Point, color: Rgb },
}

fn is_finite(p: Point) -> bool {
    p.x.is_finite() && p.y.is_finite()
}

// Nothing sensible can be drawn for non-finite geometry, so such shapes are
// dropped along with empty circles.
fn circle_shape(center: Point, radius: f64, stroke: Stroke, color: Rgb) -> Option<Shape> {
    if !(radius.is_finite() && radius > 0.0 && is_finite(center)) {
        return None;
    }
    Some(match stroke {
        Stroke::Filled => Shape::Disc {
            center,
            radius,
            color,
        },
        Stroke::Outline(_) => Shape::Ring {
            center,
            radius,
            color,
        },
    })
}

fn segment_shape(start: Point, end: Point, color: Rgb) -> Option<Shape> {
    if !(is_finite(start) && is_finite(end)) {
        return None;
    }
    Some(Shape::Segment { start, end, color })
}

/// Pixel centers covered by a disc, plus the center itself so that discs
/// smaller than a pixel still show. Only pixels of the `canvas` (width,
/// height) are visited, so the cost is bounded by the canvas size no matter
/// how large the radius is.
fn disc_samples(center: Point, radius: f64, pixel: (f64, f64), canvas: (f64, f64)) -> Vec<Point> {
    let (dx, dy) = pixel;
    let (width, height) = canvas;
    let mut points = vec![center];
    if !(dx > 0.0 && dy > 0.0) {
        return points;
    }

    // Float to int casts saturate, so ranges off either edge come out empty.
    let first_col = ((center.x - radius).max(0.0) / dx).floor() as u64;
    let last_col = ((center.x + radius).min(width) / dx).ceil() as u64;
    let first_row = ((center.y - radius).max(0.0) / dy).floor() as u64;
    let last_row = ((center.y + radius).min(height) / dy).ceil() as u64;

    for row in first_row..last_row {
        let y = (row as f64 + 0.5) * dy;
        for col in first_col..last_col {
            let x = (col as f64 + 0.5) * dx;
            let (ox, oy) = (x - center.x, y - center.y);
            if ox * ox + oy * oy <= radius * radius {
                points.push(Point { x, y });
            }
        }
    }
    points
}

// Background rasterized for one canvas size, grouped by (quantized) color.
struct Raster {
    size: (u16, u16),
    layers: Vec<(Color, Vec<(f64, f64)>)>,
}

fn color(Rgb(r, g, b): Rgb) -> Color {
    Color::Rgb(r, g, b)
}

/// Draws the visualization in the terminal's alternate screen.
pub struct TerminalSurface {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    background: Background,
    caption: String,
    status: String,
    shapes: Vec<Shape>,
    raster: Option<Raster>,
    canvas_area: Rect,
    restored: bool,
}

impl TerminalSurface {
    /// Take over the terminal. It is given back when the surface is dropped.
    pub fn open(background: Background, caption: &str) -> Result<Self, RenderError> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;
        terminal.clear()?;

        Ok(Self {
            terminal,
            background,
            caption: caption.to_owned(),
            status: String::new(),
            shapes: Vec::new(),
            raster: None,
            canvas_area: Rect::default(),
            restored: false,
        })
    }

    fn restore(&mut self) -> io::Result<()> {
        if self.restored {
            return Ok(());
        }
        self.restored = true;
        disable_raw_mode()?;
        execute!(
            self.terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        self.terminal.show_cursor()
    }

    // Screen units (y down) to canvas units (y up).
    fn flip(&self, p: Point) -> (f64, f64) {
        (p.x, self.background.height() as f64 - p.y)
    }

    // Size of one half-block pixel, in screen units.
    fn pixel_size(&self, area: Rect) -> (f64, f64) {
        (
            self.background.width() as f64 / area.width.max(1) as f64,
            self.background.height() as f64 / (2 * area.height.max(1)) as f64,
        )
    }

    fn rasterize(&self, area: Rect) -> Raster {
        let (dx, dy) = self.pixel_size(area);
        let mut by_color: HashMap<(u8, u8, u8), Vec<(f64, f64)>> = HashMap::new();

        for row in 0..(2 * area.height) {
            for col in 0..area.width {
                let x = (col as f64 + 0.5) * dx;
                let y = (row as f64 + 0.5) * dy;
                let Rgb(r, g, b) = self.background.color_at(x, y);
                // Quantize so similar colors share a layer.
                let key = (r & 0xF8, g & 0xF8, b & 0xF8);
                by_color
                    .entry(key)
                    .or_default()
                    .push(self.flip(Point { x, y }));
            }
        }

        Raster {
            size: (area.width, area.height),
            layers: by_color
                .into_iter()
                .map(|((r, g, b), points)| (Color::Rgb(r, g, b), points))
                .collect(),
        }
    }

    fn disc_points(&self, center: Point, radius: f64, area: Rect) -> Vec<(f64, f64)> {
        let canvas = (self.background.width() as f64, self.background.height() as f64);
        disc_samples(center, radius, self.pixel_size(area), canvas)
            .into_iter()
            .map(|p| self.flip(p))
            .collect()
    }

    fn canvas_area(frame_area: Rect) -> Rect {
        framed("", "").inner(frame_area)
    }
}

impl Surface for TerminalSurface {
    fn blit_background(&mut self) -> Result<(), RenderError> {
        self.shapes.clear();
        Ok(())
    }

    fn draw_circle(&mut self, center: Point, radius: f64, stroke: Stroke, color: Rgb) {
        self.shapes
            .extend(circle_shape(center, radius, stroke, color));
    }

    fn draw_line(&mut self, start: Point, end: Point, _width: f64, color: Rgb) {
        self.shapes.extend(segment_shape(start, end, color));
    }

    fn set_status(&mut self, status: &str) {
        self.status = status.to_owned();
    }

    fn present(&mut self) -> Result<(), RenderError> {
        let area = Self::canvas_area(self.terminal.size()?);
        self.canvas_area = area;

        let stale = match &self.raster {
            Some(raster) => raster.size != (area.width, area.height),
            None => true,
        };
        if stale {
            self.raster = Some(self.rasterize(area));
        }

        // Discs are sampled on the pixel grid ahead of time; the canvas
        // closure only gets shared borrows.
        let discs: Vec<(Color, Vec<(f64, f64)>)> = self
            .shapes
            .iter()
            .filter_map(|shape| match *shape {
                Shape::Disc {
                    center,
                    radius,
                    color: c,
                } => Some((color(c), self.disc_points(center, radius, area))),
                _ => None,
            })
            .collect();
        let mut rings = Vec::new();
        let mut segments = Vec::new();
        for shape in &self.shapes {
            match *shape {
                Shape::Ring {
                    center,
                    radius,
                    color: c,
                } => {
                    let (x, y) = self.flip(center);
                    rings.push(Circle {
                        x,
                        y,
                        radius,
                        color: color(c),
                    });
                }
                Shape::Segment { start, end, color: c } => {
                    let (x1, y1) = self.flip(start);
                    let (x2, y2) = self.flip(end);
                    segments.push(CanvasLine {
                        x1,
                        y1,
                        x2,
                        y2,
                        color: color(c),
                    });
                }
                Shape::Disc { .. } => {}
            }
        }

        let layers = self.raster.as_ref().map(|r| &r.layers[..]).unwrap_or(&[]);
        let width = self.background.width() as f64;
        let height = self.background.height() as f64;
        let block = framed(&self.caption, format!(" {} ", self.status));

        self.terminal.draw(|frame| {
            let canvas = Canvas::default()
                .block(block)
                .marker(symbols::Marker::HalfBlock)
                .background_color(color(crate::gui::BACKGROUND_FILL))
                .x_bounds([0.0, width])
                .y_bounds([0.0, height])
                .paint(|ctx| {
                    for (c, coords) in layers {
                        ctx.draw(&Points { coords, color: *c });
                    }
                    ctx.layer();
                    for (c, coords) in &discs {
                        ctx.draw(&Points { coords, color: *c });
                    }
                    for ring in &rings {
                        ctx.draw(ring);
                    }
                    for segment in &segments {
                        ctx.draw(segment);
                    }
                });
            frame.render_widget(canvas, frame.size());
        })?;

        Ok(())
    }

    fn poll_events(&mut self) -> Result<Vec<InputEvent>, RenderError> {
        let mut events = Vec::new();

        while event::poll(Duration::ZERO)? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => match key.code {
                    KeyCode::Esc | KeyCode::Char('q') => events.push(InputEvent::Quit),
                    KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        events.push(InputEvent::Quit)
                    }
                    KeyCode::Char(c) => events.push(InputEvent::KeyPress(c)),
                    _ => {}
                },
                Event::Mouse(mouse) if matches!(mouse.kind, MouseEventKind::Down(_)) => {
                    let area = self.canvas_area;
                    if area.width == 0 || area.height == 0 {
                        continue;
                    }
                    let (dx, dy) = self.pixel_size(area);
                    let col = mouse.column.saturating_sub(area.x) as f64;
                    let row = mouse.row.saturating_sub(area.y) as f64;
                    events.push(InputEvent::MouseDown(Point {
                        x: (col + 0.5) * dx,
                        // Each cell is two half-block pixels tall.
                        y: (row + 0.5) * 2.0 * dy,
                    }));
                }
                _ => {}
            }
        }

        Ok(events)
    }
}

impl Drop for TerminalSurface {
    fn drop(&mut self) {
        if let Err(e) = self.restore() {
            warn!("Failed to restore the terminal: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PIXEL: (f64, f64) = (5.0, 9.375);
    const CANVAS: (f64, f64) = (400.0, 450.0);

    fn max_samples() -> usize {
        1 + (CANVAS.0 / PIXEL.0) as usize * (CANVAS.1 / PIXEL.1) as usize
    }

    #[test]
    fn discs_cover_the_pixels_inside_them() {
        let center = Point { x: 204.0, y: 222.0 };
        let samples = disc_samples(center, 20.0, PIXEL, CANVAS);
        assert!(samples.len() > 10);
        assert!(samples.iter().all(|p| {
            let (ox, oy) = (p.x - center.x, p.y - center.y);
            ox * ox + oy * oy <= 400.0
        }));
    }

    #[test]
    fn huge_discs_stop_at_the_canvas_edge() {
        let center = Point { x: 204.0, y: 222.0 };
        for radius in [1.0e4, 1.0e20, f64::INFINITY] {
            let samples = disc_samples(center, radius, PIXEL, CANVAS);
            assert_eq!(samples.len(), max_samples(), "radius {}", radius);
        }
    }

    #[test]
    fn tiny_and_offscreen_discs_keep_only_their_center() {
        let samples = disc_samples(Point { x: 1.0, y: 1.0 }, 0.01, PIXEL, CANVAS);
        assert_eq!(samples.len(), 1);

        let far = Point { x: 1.0e9, y: -1.0e9 };
        assert_eq!(disc_samples(far, 10.0, PIXEL, CANVAS), vec![far]);
    }

    #[test]
    fn non_finite_shapes_are_dropped() {
        let center = Point { x: 204.0, y: 222.0 };
        let red = Rgb(255, 0, 0);

        assert!(circle_shape(center, 3.0, Stroke::Filled, red).is_some());
        assert!(circle_shape(center, 0.0, Stroke::Filled, red).is_none());
        assert!(circle_shape(center, f64::INFINITY, Stroke::Filled, red).is_none());
        assert!(circle_shape(center, f64::NAN, Stroke::Outline(2.0), red).is_none());
        let nowhere = Point {
            x: f64::NAN,
            y: 0.0,
        };
        assert!(circle_shape(nowhere, 3.0, Stroke::Filled, red).is_none());

        assert!(segment_shape(center, Point { x: 1.0e6, y: 0.0 }, red).is_some());
        assert!(segment_shape(center, nowhere, red).is_none());
    }
}
