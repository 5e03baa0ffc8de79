//! The static picture of the sensor board the overlay is drawn on.

use crate::gui::RenderError;
use crate::projector::Rgb;

use image::{imageops::FilterType, GenericImageView, RgbImage, Rgba};
use log::info;
use std::path::Path;

/// Color behind (and in place of) the background image.
pub const BACKGROUND_FILL: Rgb = Rgb(234, 237, 232);

/// Default background width in screen units. The chip layout is laid out
/// for this width.
pub const DEFAULT_WIDTH: u32 = 400;

/// Height used when there is no image to take an aspect ratio from.
pub const DEFAULT_HEIGHT: u32 = 450;

/// A background image, already scaled to screen units.
#[derive(Debug, Clone)]
pub struct Background {
    pixels: RgbImage,
}

fn blend(pixel: &Rgba<u8>) -> image::Rgb<u8> {
    let Rgb(fr, fg, fb) = BACKGROUND_FILL;
    let [r, g, b, a] = pixel.0;
    let mix = |src: u8, fill: u8| -> u8 {
        ((src as u16 * a as u16 + fill as u16 * (255 - a as u16)) / 255) as u8
    };
    image::Rgb([mix(r, fr), mix(g, fg), mix(b, fb)])
}

impl Background {
    /// Load the image at `path`, scale it to `width` keeping its aspect ratio,
    /// and flatten it onto the fill color.
    pub fn load(path: impl AsRef<Path>, width: u32) -> Result<Self, RenderError> {
        let image = image::open(path.as_ref())?;
        let (orig_width, orig_height) = image.dimensions();
        let aspect_ratio = orig_height as f64 / orig_width.max(1) as f64;
        let height = ((width as f64 * aspect_ratio) as u32).max(1);

        let scaled = image
            .resize_exact(width, height, FilterType::Triangle)
            .to_rgba8();
        let pixels = RgbImage::from_fn(width, height, |x, y| blend(scaled.get_pixel(x, y)));

        info!(
            "Loaded background {} ({}x{} scaled to {}x{})",
            path.as_ref().display(),
            orig_width,
            orig_height,
            width,
            height
        );
        Ok(Self { pixels })
    }

    /// A background of just the fill color.
    pub fn plain(width: u32, height: u32) -> Self {
        let Rgb(r, g, b) = BACKGROUND_FILL;
        Self {
            pixels: RgbImage::from_pixel(width.max(1), height.max(1), image::Rgb([r, g, b])),
        }
    }

    /// Width in screen units.
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    /// Height in screen units.
    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Color at a screen position, clamped to the image.
    pub fn color_at(&self, x: f64, y: f64) -> Rgb {
        let px = (x.max(0.0) as u32).min(self.width() - 1);
        let py = (y.max(0.0) as u32).min(self.height() - 1);
        let [r, g, b] = self.pixels.get_pixel(px, py).0;
        Rgb(r, g, b)
    }
}

impl Default for Background {
    fn default() -> Self {
        Self::plain(DEFAULT_WIDTH, DEFAULT_HEIGHT)
    }
}
