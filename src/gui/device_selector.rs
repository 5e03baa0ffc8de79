use std::{io::stdout, time::Duration};

use crate::gui::{error::RenderError, framed};
use crate::link::DeviceHandle;

use crossterm::{
    event::{self, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{prelude::*, widgets::*, Terminal};

/// What a key press does to the picker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pick {
    /// Highlight another entry.
    Move(usize),
    /// Connect to this entry.
    Chosen(usize),
    /// Leave without choosing.
    Cancel,
    /// Nothing.
    Ignore,
}

// The cursor wraps at both ends of a list of `len` entries.
fn on_key(code: KeyCode, cursor: usize, len: usize) -> Pick {
    let step = |by: isize| (cursor as isize + by).rem_euclid(len.max(1) as isize) as usize;
    match code {
        KeyCode::Down | KeyCode::Char('j') => Pick::Move(step(1)),
        KeyCode::Up | KeyCode::Char('k') => Pick::Move(step(-1)),
        KeyCode::Enter if len > 0 => Pick::Chosen(cursor),
        KeyCode::Char('q') | KeyCode::Esc => Pick::Cancel,
        _ => Pick::Ignore,
    }
}

fn hints() -> Line<'static> {
    Line::from(vec![
        " Move ".into(),
        "<Up>/<Down>".magenta().bold(),
        " Connect ".into(),
        "<Enter>".magenta().bold(),
        " Back ".into(),
        "<Q> ".magenta().bold(),
    ])
}

/// Lets the user pick which device to connect to.
///
/// Returns `None` when the user backs out, or when there is nothing to pick.
pub fn device_selector(
    mut devices: Vec<DeviceHandle>,
) -> Result<Option<DeviceHandle>, RenderError> {
    if devices.is_empty() {
        return Ok(None);
    }

    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    terminal.clear()?;

    let names: Vec<String> = devices.iter().map(ToString::to_string).collect();
    let mut list_state = ListState::default().with_selected(Some(0));
    let chosen = loop {
        terminal.draw(|frame| {
            let list = List::new(names.iter().map(String::as_str))
                .highlight_symbol("> ")
                .highlight_style(Style::default().fg(Color::Magenta).bold())
                .block(framed("Sensor Links", hints()));
            frame.render_stateful_widget(list, frame.size(), &mut list_state);
        })?;

        if !event::poll(Duration::from_millis(16))? {
            continue;
        }
        let event::Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        let cursor = list_state.selected().unwrap_or(0);
        match on_key(key.code, cursor, devices.len()) {
            Pick::Move(next) => list_state.select(Some(next)),
            Pick::Chosen(index) => break Some(index),
            Pick::Cancel => break None,
            Pick::Ignore => {}
        }
    };

    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    Ok(chosen.map(|i| devices.swap_remove(i)))
}
