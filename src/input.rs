use anyhow::Result;
use ratatui::crossterm::event::{self, KeyCode, KeyModifiers};

use crate::app::{App, AppMode, ViewState};

// --- Helpers ---

/// Convert a char index to a byte offset within the string.
pub fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
  s.char_indices().nth(char_idx).map_or(s.len(), |(i, _)| i)
}

// --- Event Handling ---

pub fn handle_key_event(app: &mut App, key: event::KeyEvent) -> Result<()> {
  if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
    app.should_quit = true;
    return Ok(());
  }

  if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('t') {
    app.next_theme();
    return Ok(());
  }

  match app.mode {
    AppMode::Input => handle_input_key(app, key),
    AppMode::Results => handle_results_key(app, key),
    AppMode::Filter => handle_filter_key(app, key),
    AppMode::Detail => handle_detail_key(app, key),
  }
  Ok(())
}

fn handle_input_key(app: &mut App, key: event::KeyEvent) {
  // The search input is disabled while a lookup is outstanding; this is the
  // guard that keeps a second submission from racing the first.
  if app.in_flight() {
    return;
  }

  match key.code {
    KeyCode::Enter => {
      app.trigger_search();
    }
    KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
      app.input.clear();
      app.cursor_position = 0;
      app.input_scroll = 0;
    }
    KeyCode::Char(c) => {
      let byte_idx = char_to_byte_index(&app.input, app.cursor_position);
      app.input.insert(byte_idx, c);
      app.cursor_position += 1;
    }
    KeyCode::Backspace => {
      if app.cursor_position > 0 {
        app.cursor_position -= 1;
        let byte_idx = char_to_byte_index(&app.input, app.cursor_position);
        app.input.remove(byte_idx);
      }
    }
    KeyCode::Delete => {
      if app.cursor_position < app.input.chars().count() {
        let byte_idx = char_to_byte_index(&app.input, app.cursor_position);
        app.input.remove(byte_idx);
      }
    }
    KeyCode::Left => {
      app.cursor_position = app.cursor_position.saturating_sub(1);
    }
    KeyCode::Right => {
      if app.cursor_position < app.input.chars().count() {
        app.cursor_position += 1;
      }
    }
    KeyCode::Home => {
      app.cursor_position = 0;
    }
    KeyCode::End => {
      app.cursor_position = app.input.chars().count();
    }
    KeyCode::Esc => {
      if !app.input.is_empty() {
        app.input.clear();
        app.cursor_position = 0;
        app.input_scroll = 0;
      } else if matches!(app.view, ViewState::Error(_)) {
        // Retry: dismiss the error back to Idle, ready for a fresh query.
        app.go_back();
      } else {
        app.should_quit = true;
      }
    }
    _ => {}
  }
}

fn handle_results_key(app: &mut App, key: event::KeyEvent) {
  match key.code {
    KeyCode::Enter => {
      if app.selected_movie().is_some() {
        app.mode = AppMode::Detail;
      }
    }
    KeyCode::Char('g') | KeyCode::Char('/') => {
      app.filter_cursor = app.current_filter_index();
      app.mode = AppMode::Filter;
    }
    KeyCode::Left | KeyCode::Char('h') => {
      app.move_selection(-1, 0);
    }
    KeyCode::Right | KeyCode::Char('l') => {
      app.move_selection(1, 0);
    }
    KeyCode::Up | KeyCode::Char('k') => {
      app.move_selection(0, -1);
    }
    KeyCode::Down | KeyCode::Char('j') => {
      app.move_selection(0, 1);
    }
    KeyCode::Esc => {
      // New search: drop the result and return to the input.
      app.go_back();
    }
    _ => {}
  }
}

fn handle_filter_key(app: &mut App, key: event::KeyEvent) {
  let option_count = app.filter_options().len();
  match key.code {
    KeyCode::Left | KeyCode::Char('h') => {
      app.filter_cursor = app.filter_cursor.saturating_sub(1);
    }
    KeyCode::Right | KeyCode::Char('l') => {
      if app.filter_cursor + 1 < option_count {
        app.filter_cursor += 1;
      }
    }
    KeyCode::Enter => {
      let selection = app.filter_options().get(app.filter_cursor).copied().flatten();
      app.apply_filter(selection);
      app.ensure_selected_poster();
      app.mode = AppMode::Results;
    }
    KeyCode::Esc => {
      app.mode = AppMode::Results;
    }
    _ => {}
  }
}

fn handle_detail_key(app: &mut App, key: event::KeyEvent) {
  match key.code {
    KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q') | KeyCode::Backspace => {
      app.mode = AppMode::Results;
    }
    _ => {}
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::graphics::DisplayMode;
  use ratatui::crossterm::event::{KeyEvent, KeyEventKind, KeyEventState};

  fn press(code: KeyCode) -> KeyEvent {
    KeyEvent { code, modifiers: KeyModifiers::NONE, kind: KeyEventKind::Press, state: KeyEventState::NONE }
  }

  fn make_app() -> App {
    App::new(DisplayMode::Ascii, "http://127.0.0.1:8000".to_string())
  }

  // --- char_to_byte_index ---

  #[test]
  fn char_to_byte_ascii() {
    assert_eq!(char_to_byte_index("matrix", 0), 0);
    assert_eq!(char_to_byte_index("matrix", 4), 4);
    assert_eq!(char_to_byte_index("matrix", 9), 6); // past end clamps to len
  }

  #[test]
  fn char_to_byte_multibyte() {
    let s = "Amélie"; // é is 2 bytes
    assert_eq!(char_to_byte_index(s, 2), 2);
    assert_eq!(char_to_byte_index(s, 3), 4);
    assert_eq!(char_to_byte_index(s, 6), 7);
  }

  // --- editing ---

  #[test]
  fn typing_inserts_at_cursor() {
    let mut app = make_app();
    handle_key_event(&mut app, press(KeyCode::Char('u'))).unwrap();
    handle_key_event(&mut app, press(KeyCode::Char('p'))).unwrap();
    handle_key_event(&mut app, press(KeyCode::Home)).unwrap();
    handle_key_event(&mut app, press(KeyCode::Char('U'))).unwrap();
    assert_eq!(app.input, "Uup");
    assert_eq!(app.cursor_position, 1);
  }

  #[test]
  fn backspace_removes_before_cursor() {
    let mut app = make_app();
    app.input = "Heat".to_string();
    app.cursor_position = 4;
    handle_key_event(&mut app, press(KeyCode::Backspace)).unwrap();
    assert_eq!(app.input, "Hea");
    assert_eq!(app.cursor_position, 3);
  }

  #[test]
  fn esc_clears_nonempty_input_before_quitting() {
    let mut app = make_app();
    app.input = "Alien".to_string();
    handle_key_event(&mut app, press(KeyCode::Esc)).unwrap();
    assert_eq!(app.input, "");
    assert!(!app.should_quit);
    handle_key_event(&mut app, press(KeyCode::Esc)).unwrap();
    assert!(app.should_quit);
  }

  #[test]
  fn detail_mode_closes_on_esc() {
    let mut app = make_app();
    app.mode = AppMode::Detail;
    handle_key_event(&mut app, press(KeyCode::Esc)).unwrap();
    assert_eq!(app.mode, AppMode::Results);
  }

  #[test]
  fn filter_cursor_stays_in_range() {
    let mut app = make_app();
    app.mode = AppMode::Filter;
    // No result loaded: the only option is "all".
    handle_key_event(&mut app, press(KeyCode::Right)).unwrap();
    assert_eq!(app.filter_cursor, 0);
    handle_key_event(&mut app, press(KeyCode::Left)).unwrap();
    assert_eq!(app.filter_cursor, 0);
  }
}
