use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;

use crate::app::{App, InputMode};
use crate::tui::AppEvent;

/// Lines moved per mouse wheel notch.
const WHEEL_LINES: u16 = 3;

pub fn handle_event(app: &mut App, event: AppEvent) {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Paste(text) => app.insert_str(&text),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick(),
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        match key.code {
            KeyCode::Char('c') => {
                app.should_quit = true;
                return;
            }
            KeyCode::Char('n') => {
                app.session.new_session();
                return;
            }
            KeyCode::Char('l') => {
                app.session.clear();
                return;
            }
            KeyCode::Char('s') => {
                if app.settings_form.is_some() {
                    app.save_settings();
                } else {
                    app.open_settings();
                }
                return;
            }
            KeyCode::Char('r') => {
                app.session.listen();
                return;
            }
            KeyCode::Char('b') => {
                app.toggle_sidebar();
                return;
            }
            _ => {}
        }
    }

    if app.settings_form.is_some() {
        handle_settings_popup(app, key);
        return;
    }

    match app.input_mode() {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
    }
}

fn handle_settings_popup(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.close_settings();
            return;
        }
        KeyCode::Enter => {
            app.save_settings();
            return;
        }
        _ => {}
    }

    let Some(form) = app.settings_form.as_mut() else {
        return;
    };
    match key.code {
        KeyCode::Tab | KeyCode::Down => form.next_field(),
        KeyCode::BackTab | KeyCode::Up => form.prev_field(),
        KeyCode::Left => form.adjust(false),
        KeyCode::Right => form.adjust(true),
        KeyCode::Backspace => form.pop_char(),
        KeyCode::Char(c) => form.push_char(c),
        _ => {}
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,

        // Back to the compose box
        KeyCode::Char('i') | KeyCode::Enter => app.focus_compose(),

        // Transcript scrolling
        KeyCode::Char('j') | KeyCode::Down => app.scroll_down(1),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_up(1),
        KeyCode::PageDown => app.scroll_down(page(app)),
        KeyCode::PageUp => app.scroll_up(page(app)),
        KeyCode::Char('G') | KeyCode::End => app.session.transcript_mut().scroll_to_bottom(),

        // Welcome card suggestions
        KeyCode::Char(c @ '1'..='3') => {
            let index = c as usize - '1' as usize;
            app.use_suggestion(index);
        }

        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.blur_compose(),
        KeyCode::Enter if key.modifiers.contains(KeyModifiers::ALT) => app.insert_newline(),
        KeyCode::Char('j') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.insert_newline()
        }
        KeyCode::Enter => {
            app.submit();
        }
        KeyCode::Backspace => app.backspace(),
        KeyCode::Delete => app.delete(),
        KeyCode::Left => app.cursor_left(),
        KeyCode::Right => app.cursor_right(),
        KeyCode::Home => app.cursor_home(),
        KeyCode::End => app.cursor_end(),
        KeyCode::PageDown => app.scroll_down(page(app)),
        KeyCode::PageUp => app.scroll_up(page(app)),
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => app.insert_char(c),
        _ => {}
    }
}

/// Half the visible transcript, at least one line.
fn page(app: &App) -> u16 {
    app.transcript_area
        .map(|r| r.height.saturating_sub(2) / 2)
        .unwrap_or(1)
        .max(1)
}

fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let in_transcript = app
        .transcript_area
        .map(|r| point_in_rect(mouse.column, mouse.row, r))
        .unwrap_or(false);
    if !in_transcript {
        return;
    }

    match mouse.kind {
        MouseEventKind::ScrollDown => app.scroll_down(WHEEL_LINES),
        MouseEventKind::ScrollUp => app.scroll_up(WHEEL_LINES),
        _ => {}
    }
}
