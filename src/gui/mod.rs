//! Everything that draws to the terminal: the visualization surface, the
//! background it is drawn on, and the device picker shown before connecting.

mod background;
mod device_selector;
mod error;
mod terminal_surface;

pub use background::{Background, BACKGROUND_FILL, DEFAULT_HEIGHT, DEFAULT_WIDTH};
pub use device_selector::device_selector;
pub use error::RenderError;
pub use terminal_surface::TerminalSurface;

use ratatui::{
    prelude::*,
    widgets::{
        block::{Position, Title},
        Block, Borders,
    },
};

/// A bordered block with `caption` in bold magenta along the top edge and
/// `footer` along the bottom, both centered.
fn framed<'a>(caption: &str, footer: impl Into<Line<'a>>) -> Block<'a> {
    let mut block = Block::default().borders(Borders::ALL);
    if !caption.is_empty() {
        let caption = Title::from(format!(" {} ", caption).magenta().bold());
        block = block.title(caption.alignment(Alignment::Center));
    }
    block.title(
        Title::from(footer.into())
            .alignment(Alignment::Center)
            .position(Position::Bottom),
    )
}
