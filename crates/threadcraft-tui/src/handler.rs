use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crate::app::{App, FocusPane, InputMode, Screen, TextField};
use crate::tui::AppEvent;

pub fn handle_event(app: &mut App, event: AppEvent) {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => {
            app.tick_animation();
        }
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    app.status = None;

    // Popups take every key while open
    if app.api_key_input.is_some() {
        handle_api_key_input(app, key);
        return;
    }
    if app.editor.is_some() {
        handle_editor(app, key);
        return;
    }
    if app.rename_input.is_some() {
        handle_rename(app, key);
        return;
    }

    match (app.screen, app.input_mode) {
        (Screen::Compose, InputMode::Normal) => handle_compose_normal(app, key),
        (Screen::Compose, InputMode::Editing) => handle_compose_editing(app, key),
        (Screen::Chat, InputMode::Normal) => handle_chat_normal(app, key),
        (Screen::Chat, InputMode::Editing) => handle_chat_editing(app, key),
    }
}

/// Shared cursor/editing keys. Returns false if the key wasn't an editing key.
fn edit_field(field: &mut TextField, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Backspace => field.backspace(),
        KeyCode::Delete => field.delete(),
        KeyCode::Left => field.left(),
        KeyCode::Right => field.right(),
        KeyCode::Home => field.home(),
        KeyCode::End => field.end(),
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => field.insert(c),
        _ => return false,
    }
    true
}

fn handle_compose_normal(app: &mut App, key: KeyEvent) {
    if app.focus == FocusPane::Saved {
        if handle_saved_keys(app, key) {
            return;
        }
    }

    match key.code {
        KeyCode::Char('q') => app.should_quit = true,

        // Style navigation
        KeyCode::Char('j') | KeyCode::Down => app.style_nav_down(),
        KeyCode::Char('k') | KeyCode::Up => app.style_nav_up(),

        // Style actions
        KeyCode::Char('e') => app.open_editor(),
        KeyCode::Char('r') => app.start_rename(),
        KeyCode::Char('n') => app.add_style(),

        // Start typing
        KeyCode::Char('i') | KeyCode::Enter => {
            app.input_mode = InputMode::Editing;
        }
        KeyCode::Char('g') => {
            if !app.is_processing() {
                app.submit_generate();
            }
        }

        // Back to the current thread
        KeyCode::Tab => {
            if app.show_saved_panel {
                app.focus = match app.focus {
                    FocusPane::Saved => FocusPane::Styles,
                    _ => FocusPane::Saved,
                };
            } else if !app.session.transcript().is_empty() {
                app.screen = Screen::Chat;
                app.focus = FocusPane::Transcript;
            }
        }

        KeyCode::Char('S') => toggle_saved_panel(app, FocusPane::Styles),
        KeyCode::Char('K') => app.api_key_input = Some(TextField::default()),

        _ => {}
    }
}

fn handle_compose_editing(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.input_mode = InputMode::Normal,
        // Alt+Enter inserts a newline, plain Enter generates
        KeyCode::Enter if key.modifiers.contains(KeyModifiers::ALT) => app.compose_input.insert('\n'),
        KeyCode::Enter => {
            if !app.is_processing() {
                app.submit_generate();
            }
        }
        _ => {
            edit_field(&mut app.compose_input, key);
        }
    }
}

fn handle_chat_normal(app: &mut App, key: KeyEvent) {
    if app.focus == FocusPane::Saved {
        if handle_saved_keys(app, key) {
            return;
        }
    }

    match key.code {
        KeyCode::Char('q') => app.should_quit = true,

        // Model message selection
        KeyCode::Char('j') | KeyCode::Down => app.message_nav_down(),
        KeyCode::Char('k') | KeyCode::Up => app.message_nav_up(),

        // Half-page scroll
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_half_page_down();
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_half_page_up();
        }

        // Message actions
        KeyCode::Char('c') => app.copy_selected_message(),
        KeyCode::Char('s') => app.save_selected_message(),

        // Refine
        KeyCode::Char('i') | KeyCode::Enter => {
            if !app.is_processing() {
                app.input_mode = InputMode::Editing;
            }
        }

        // Start over with a new top-level generation
        KeyCode::Char('n') | KeyCode::Esc => app.new_thread(),

        KeyCode::Tab => {
            if app.show_saved_panel {
                app.focus = match app.focus {
                    FocusPane::Saved => FocusPane::Transcript,
                    _ => FocusPane::Saved,
                };
            }
        }

        KeyCode::Char('S') => toggle_saved_panel(app, FocusPane::Transcript),
        KeyCode::Char('K') => app.api_key_input = Some(TextField::default()),

        _ => {}
    }
}

fn handle_chat_editing(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.input_mode = InputMode::Normal,
        KeyCode::Enter => {
            if !app.is_processing() {
                app.submit_refine();
            }
        }
        _ => {
            edit_field(&mut app.refine_input, key);
        }
    }
}

/// Keys for the saved panel when it has focus. Returns true if handled.
fn handle_saved_keys(app: &mut App, key: KeyEvent) -> bool {
    // Ctrl chords belong to the screen underneath (Ctrl+D scrolls the chat)
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return false;
    }
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => app.saved_nav_down(),
        KeyCode::Char('k') | KeyCode::Up => app.saved_nav_up(),
        KeyCode::Char('d') | KeyCode::Char('x') => app.remove_selected_saved(),
        KeyCode::Char('c') => app.copy_selected_saved(),
        _ => return false,
    }
    true
}

fn toggle_saved_panel(app: &mut App, fallback: FocusPane) {
    app.show_saved_panel = !app.show_saved_panel;
    if app.show_saved_panel {
        if app.saved_state.selected().is_none() && !app.saved.is_empty() {
            app.saved_state.select(Some(0));
        }
    } else if app.focus == FocusPane::Saved {
        app.focus = fallback;
    }
}

fn handle_editor(app: &mut App, key: KeyEvent) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Esc => app.editor = None,
        KeyCode::Char('s') if ctrl => app.save_editor(),
        KeyCode::Char('r') if ctrl => app.reset_editor(),
        KeyCode::Tab => {
            if let Some(editor) = app.editor.as_mut() {
                editor.toggle_field();
            }
        }
        KeyCode::Enter => {
            if let Some(editor) = app.editor.as_mut() {
                editor.active_field().insert('\n');
            }
        }
        _ => {
            if let Some(editor) = app.editor.as_mut() {
                edit_field(editor.active_field(), key);
            }
        }
    }
}

fn handle_rename(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.rename_input = None,
        KeyCode::Enter => app.submit_rename(),
        _ => {
            if let Some(input) = app.rename_input.as_mut() {
                edit_field(input, key);
            }
        }
    }
}

fn handle_api_key_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.api_key_input = None,
        KeyCode::Enter => app.submit_api_key(),
        _ => {
            if let Some(input) = app.api_key_input.as_mut() {
                edit_field(input, key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventKind;
    use threadcraft_core::{
        ClientSettings, Config, GenerationClient, SessionController, SessionOptions,
    };

    fn app() -> App {
        let client = GenerationClient::new(ClientSettings::default());
        let session = SessionController::new(client, SessionOptions::default());
        let mut app = App::with_session(Config::new(), session);
        app.api_key_input = None;
        app
    }

    fn press(app: &mut App, code: KeyCode) {
        press_with(app, code, KeyModifiers::NONE);
    }

    fn press_with(app: &mut App, code: KeyCode, modifiers: KeyModifiers) {
        let mut key = KeyEvent::new(code, modifiers);
        key.kind = KeyEventKind::Press;
        handle_event(app, AppEvent::Key(key));
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    #[test]
    fn test_style_navigation() {
        let mut app = app();
        press(&mut app, KeyCode::Char('j'));
        assert_eq!(app.selected_style.as_str(), "PROFESSIONAL");
        press(&mut app, KeyCode::Char('j'));
        press(&mut app, KeyCode::Char('j'));
        assert_eq!(app.selected_style.as_str(), "EDUCATIONAL");
        press(&mut app, KeyCode::Char('k'));
        assert_eq!(app.selected_style.as_str(), "PROFESSIONAL");
    }

    #[test]
    fn test_rename_flow() {
        let mut app = app();
        press(&mut app, KeyCode::Char('r'));
        assert!(app.rename_input.is_some());
        for _ in 0.."Natural Flow".len() {
            press(&mut app, KeyCode::Backspace);
        }
        type_text(&mut app, "Chill");
        press(&mut app, KeyCode::Enter);

        assert!(app.rename_input.is_none());
        assert_eq!(app.selected_template().unwrap().name, "Chill");
    }

    #[test]
    fn test_editor_keys() {
        let mut app = app();
        press(&mut app, KeyCode::Char('e'));
        assert!(app.editor.is_some());

        press(&mut app, KeyCode::Tab);
        type_text(&mut app, "!");
        press_with(&mut app, KeyCode::Char('s'), KeyModifiers::CONTROL);

        assert!(app.editor.is_none());
        assert!(app.selected_template().unwrap().examples.ends_with('!'));
    }

    #[test]
    fn test_editor_escape_discards() {
        let mut app = app();
        let before = app.selected_template().unwrap().clone();
        press(&mut app, KeyCode::Char('e'));
        type_text(&mut app, "junk");
        press(&mut app, KeyCode::Esc);
        assert_eq!(app.selected_template().unwrap(), &before);
    }

    #[test]
    fn test_typing_in_compose() {
        let mut app = app();
        press(&mut app, KeyCode::Char('i'));
        type_text(&mut app, "hello");
        press_with(&mut app, KeyCode::Enter, KeyModifiers::ALT);
        type_text(&mut app, "world");
        assert_eq!(app.compose_input.text, "hello\nworld");

        press(&mut app, KeyCode::Esc);
        assert_eq!(app.input_mode, InputMode::Normal);
    }

    #[test]
    fn test_saved_panel_toggle() {
        let mut app = app();
        let style = app.selected_style.clone();
        app.saved.save("kept", style);

        press(&mut app, KeyCode::Char('S'));
        assert!(app.show_saved_panel);
        assert_eq!(app.saved_state.selected(), Some(0));

        press(&mut app, KeyCode::Tab);
        assert_eq!(app.focus, FocusPane::Saved);
        press(&mut app, KeyCode::Char('d'));
        assert!(app.saved.is_empty());

        press(&mut app, KeyCode::Char('S'));
        assert_eq!(app.focus, FocusPane::Styles);
    }

    #[test]
    fn test_ctrl_d_scrolls_chat_with_saved_focused() {
        let mut app = app();
        let style = app.selected_style.clone();
        app.saved.save("kept", style);
        app.screen = Screen::Chat;
        app.chat_height = 10;
        press(&mut app, KeyCode::Char('S'));
        press(&mut app, KeyCode::Tab);
        assert_eq!(app.focus, FocusPane::Saved);

        press_with(&mut app, KeyCode::Char('d'), KeyModifiers::CONTROL);
        assert_eq!(app.saved.len(), 1);
        assert_eq!(app.chat_scroll, 5);

        press(&mut app, KeyCode::Char('d'));
        assert!(app.saved.is_empty());
    }

    #[test]
    fn test_ctrl_c_quits() {
        let mut app = app();
        press_with(&mut app, KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert!(app.should_quit);
    }
}
