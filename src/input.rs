//! Keyboard input handling.
//!
//! Maps terminal key events to [`App`] changes.  Keys that need the store
//! (open, create) produce an [`Action`] for the caller to run off the UI
//! thread.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind};

use crate::app::{Action, App};

/// Process a single key event.
///
/// Only reacts to key-press events (ignoring release / repeat) so that each
/// physical keypress triggers exactly one action.
pub fn handle_key_event(app: &mut App, key: KeyEvent) -> Option<Action> {
    if key.kind != KeyEventKind::Press {
        return None;
    }

    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => app.quit = true,
        KeyCode::Tab | KeyCode::BackTab => app.toggle_focus(),
        KeyCode::Down | KeyCode::Char('j') => app.select_next(),
        KeyCode::Up | KeyCode::Char('k') => app.select_previous(),
        KeyCode::Home | KeyCode::Char('g') => app.select_first(),
        KeyCode::End | KeyCode::Char('G') => app.select_last(),
        KeyCode::Enter => return app.open_selected(),
        KeyCode::Char('n') => return Some(app.create_in_focus()),
        _ => {}
    }
    None
}
