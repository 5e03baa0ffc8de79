use std::{error::Error, fmt::Display};

/// Failures of the drawing surface or its background image.
#[derive(Debug)]
pub enum RenderError {
    /// Terminal or file io failed.
    IOError(std::io::Error),
    /// The background image could not be loaded.
    ImageError(image::ImageError),
}

impl Display for RenderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenderError::IOError(e) => write!(f, "terminal error: {}", e),
            RenderError::ImageError(e) => write!(f, "background image error: {}", e),
        }
    }
}

impl Error for RenderError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RenderError::IOError(e) => Some(e),
            RenderError::ImageError(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for RenderError {
    fn from(value: std::io::Error) -> Self {
        Self::IOError(value)
    }
}

impl From<image::ImageError> for RenderError {
    fn from(value: image::ImageError) -> Self {
        Self::ImageError(value)
    }
}
