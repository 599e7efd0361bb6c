use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};

use crate::app::{App, FocusPane, Submission};
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => {
            app.on_tick();
            app.poll_request().await;
        }
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any focus
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    match key.code {
        // Tab cycles focus: prompt input -> endpoint field -> chat
        KeyCode::Tab => {
            app.focus = match app.focus {
                FocusPane::Input => FocusPane::Endpoint,
                FocusPane::Endpoint => FocusPane::Chat,
                FocusPane::Chat => FocusPane::Input,
            };
            return;
        }
        KeyCode::PageUp => {
            app.scroll_chat_half_page_up();
            return;
        }
        KeyCode::PageDown => {
            app.scroll_chat_half_page_down();
            return;
        }
        _ => {}
    }

    match app.focus {
        FocusPane::Input => handle_input_key(app, key),
        FocusPane::Endpoint => handle_endpoint_key(app, key),
        FocusPane::Chat => handle_chat_key(app, key),
    }
}

fn handle_input_key(app: &mut App, key: KeyEvent) {
    match key.code {
        // Enter sends; Shift+Enter inserts a newline instead
        KeyCode::Enter => {
            if key.modifiers.contains(KeyModifiers::SHIFT) {
                insert_char(&mut app.input, &mut app.input_cursor, '\n');
            } else {
                submit(app);
            }
        }
        KeyCode::Esc => {
            app.focus = FocusPane::Chat;
        }
        KeyCode::Backspace => {
            backspace(&mut app.input, &mut app.input_cursor);
        }
        KeyCode::Delete => {
            delete(&mut app.input, &mut app.input_cursor);
        }
        KeyCode::Left => {
            app.input_cursor = app.input_cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.input.chars().count();
            app.input_cursor = (app.input_cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            app.input_cursor = 0;
        }
        KeyCode::End => {
            app.input_cursor = app.input.chars().count();
        }
        KeyCode::Char(c) => {
            insert_char(&mut app.input, &mut app.input_cursor, c);
        }
        _ => {}
    }
}

fn handle_endpoint_key(app: &mut App, key: KeyEvent) {
    match key.code {
        // The field is live; Enter and Esc just hand focus back
        KeyCode::Enter | KeyCode::Esc => {
            app.focus = FocusPane::Input;
        }
        KeyCode::Backspace => {
            backspace(&mut app.endpoint_input, &mut app.endpoint_cursor);
        }
        KeyCode::Delete => {
            delete(&mut app.endpoint_input, &mut app.endpoint_cursor);
        }
        KeyCode::Left => {
            app.endpoint_cursor = app.endpoint_cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.endpoint_input.chars().count();
            app.endpoint_cursor = (app.endpoint_cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            app.endpoint_cursor = 0;
        }
        KeyCode::End => {
            app.endpoint_cursor = app.endpoint_input.chars().count();
        }
        KeyCode::Char(c) => {
            insert_char(&mut app.endpoint_input, &mut app.endpoint_cursor, c);
        }
        _ => {}
    }
}

fn handle_chat_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,

        KeyCode::Char('j') | KeyCode::Down => app.scroll_chat_down(),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_chat_up(),
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_chat_half_page_down();
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_chat_half_page_up();
        }
        KeyCode::Char('g') => app.scroll_chat_to_top(),
        KeyCode::Char('G') => app.scroll_chat_to_bottom(),

        KeyCode::Char('i') | KeyCode::Enter => app.focus = FocusPane::Input,
        KeyCode::Char('e') => app.focus = FocusPane::Endpoint,

        _ => {}
    }
}

/// Spawn the network task for one submission. The URL travels inside the
/// submission snapshot; the placeholder is resolved by id when the task lands.
fn submit(app: &mut App) {
    let Some(submission) = app.begin_submission() else {
        return;
    };

    let client = app.client.clone();
    let Submission { url, prompt, .. } = submission;
    app.request_task = Some(tokio::spawn(async move {
        client.send_prompt(&url, &prompt).await
    }));
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    match mouse.kind {
        MouseEventKind::ScrollDown => {
            app.scroll_chat_down();
            app.scroll_chat_down();
            app.scroll_chat_down();
        }
        MouseEventKind::ScrollUp => {
            app.scroll_chat_up();
            app.scroll_chat_up();
            app.scroll_chat_up();
        }
        _ => {}
    }
}

fn insert_char(text: &mut String, cursor: &mut usize, c: char) {
    let byte_pos = char_to_byte_index(text, *cursor);
    text.insert(byte_pos, c);
    *cursor += 1;
}

fn backspace(text: &mut String, cursor: &mut usize) {
    if *cursor > 0 {
        *cursor -= 1;
        let byte_pos = char_to_byte_index(text, *cursor);
        text.remove(byte_pos);
    }
}

fn delete(text: &mut String, cursor: &mut usize) {
    let char_count = text.chars().count();
    if *cursor < char_count {
        let byte_pos = char_to_byte_index(text, *cursor);
        text.remove(byte_pos);
    }
}
