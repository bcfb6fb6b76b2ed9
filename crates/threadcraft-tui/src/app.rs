use ratatui::widgets::ListState;
use tokio::task::{JoinError, JoinHandle};
use threadcraft_core::{
    Config, GenerationClient, RenameOutcome, SavedStore, SessionController, SessionError,
    StyleKey, Submission, TemplateConfig, TemplateStore, TurnOutcome, TurnResult,
};

use crate::clipboard;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Compose,
    Chat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Styles,
    Transcript,
    Saved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditorField {
    #[default]
    SystemPrompt,
    Examples,
}

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// Single text buffer with a character-based cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextField {
    pub text: String,
    pub cursor: usize,
}

impl TextField {
    pub fn with_text(text: &str) -> Self {
        Self {
            text: text.to_string(),
            cursor: text.chars().count(),
        }
    }

    pub fn insert(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.text, self.cursor);
        self.text.insert(byte_pos, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let byte_pos = char_to_byte_index(&self.text, self.cursor);
            self.text.remove(byte_pos);
        }
    }

    pub fn delete(&mut self) {
        if self.cursor < self.text.chars().count() {
            let byte_pos = char_to_byte_index(&self.text, self.cursor);
            self.text.remove(byte_pos);
        }
    }

    pub fn left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.text.chars().count());
    }

    pub fn home(&mut self) {
        self.cursor = 0;
    }

    pub fn end(&mut self) {
        self.cursor = self.text.chars().count();
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.cursor = 0;
    }

    /// Line and column of the cursor, for placing the terminal cursor.
    pub fn cursor_line_col(&self) -> (usize, usize) {
        let before: String = self.text.chars().take(self.cursor).collect();
        let line = before.matches('\n').count();
        let col = before.rsplit('\n').next().map(|l| l.chars().count()).unwrap_or(0);
        (line, col)
    }
}

/// Template editor popup state for one style.
#[derive(Debug, Clone)]
pub struct TemplateEditor {
    pub key: StyleKey,
    pub system_prompt: TextField,
    pub examples: TextField,
    pub field: EditorField,
}

impl TemplateEditor {
    fn open(key: StyleKey, config: &TemplateConfig) -> Self {
        Self {
            key,
            system_prompt: TextField::with_text(&config.system_prompt),
            examples: TextField::with_text(&config.examples),
            field: EditorField::default(),
        }
    }

    pub fn active_field(&mut self) -> &mut TextField {
        match self.field {
            EditorField::SystemPrompt => &mut self.system_prompt,
            EditorField::Examples => &mut self.examples,
        }
    }

    pub fn toggle_field(&mut self) {
        self.field = match self.field {
            EditorField::SystemPrompt => EditorField::Examples,
            EditorField::Examples => EditorField::SystemPrompt,
        };
    }
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub screen: Screen,
    pub input_mode: InputMode,
    pub focus: FocusPane,

    // Styles
    pub templates: TemplateStore,
    pub selected_style: StyleKey,
    pub style_state: ListState,

    // Compose state
    pub compose_input: TextField,

    // Chat state
    pub session: SessionController,
    pub refine_input: TextField,
    pub selected_message: Option<usize>,
    pub chat_scroll: u16,
    pub chat_height: u16, // Height of chat area for scroll calculations
    pub chat_width: u16,  // Width of chat area for wrap calculations
    pub pending: Option<JoinHandle<TurnResult>>,

    // Saved threads
    pub saved: SavedStore,
    pub saved_state: ListState,
    pub show_saved_panel: bool,

    // Popups
    pub editor: Option<TemplateEditor>,
    pub rename_input: Option<TextField>,
    pub api_key_input: Option<TextField>,

    // Status line message, cleared on the next key press
    pub status: Option<String>,

    // Animation state for loading indicator
    pub animation_frame: u8,

    pub config: Config,
}

impl App {
    pub fn new(config: Config) -> Self {
        let client = GenerationClient::new(config.client_settings());
        let session = SessionController::new(client, config.session_options());
        Self::with_session(config, session)
    }

    pub fn with_session(config: Config, session: SessionController) -> Self {
        let templates = TemplateStore::default();
        let selected_style = templates
            .keys()
            .first()
            .cloned()
            .unwrap_or_else(|| StyleKey::new(threadcraft_core::presets::NATURAL));

        let mut style_state = ListState::default();
        style_state.select(Some(0));

        // Ask for a key up front when none is configured
        let api_key_input = if session.client().is_available() {
            None
        } else {
            Some(TextField::default())
        };

        Self {
            should_quit: false,
            screen: Screen::Compose,
            input_mode: InputMode::Normal,
            focus: FocusPane::Styles,

            templates,
            selected_style,
            style_state,

            compose_input: TextField::default(),

            session,
            refine_input: TextField::default(),
            selected_message: None,
            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            pending: None,

            saved: SavedStore::new(),
            saved_state: ListState::default(),
            show_saved_panel: false,

            editor: None,
            rename_input: None,
            api_key_input,

            status: None,
            animation_frame: 0,
            config,
        }
    }

    pub fn is_processing(&self) -> bool {
        self.session.is_in_flight()
    }

    pub fn selected_template(&self) -> Option<&TemplateConfig> {
        self.templates.get(&self.selected_style).ok()
    }

    // Style navigation
    pub fn style_nav_down(&mut self) {
        let len = self.templates.len();
        if len > 0 {
            let i = self.style_state.selected().unwrap_or(0);
            self.select_style_index((i + 1).min(len - 1));
        }
    }

    pub fn style_nav_up(&mut self) {
        let i = self.style_state.selected().unwrap_or(0);
        self.select_style_index(i.saturating_sub(1));
    }

    fn select_style_index(&mut self, index: usize) {
        if let Some(key) = self.templates.keys().get(index).cloned() {
            self.style_state.select(Some(index));
            self.selected_style = key;
        }
    }

    /// Adds a placeholder style, selects it and opens the editor on it.
    pub fn add_style(&mut self) {
        let key = self.templates.add_style();
        if let Some(index) = self.templates.position(&key) {
            self.select_style_index(index);
        }
        self.open_editor();
    }

    // Template editor
    pub fn open_editor(&mut self) {
        if let Ok(config) = self.templates.get(&self.selected_style) {
            self.editor = Some(TemplateEditor::open(self.selected_style.clone(), config));
        }
    }

    pub fn save_editor(&mut self) {
        if let Some(editor) = self.editor.take() {
            if let Ok(current) = self.templates.get(&editor.key) {
                let updated = TemplateConfig {
                    system_prompt: editor.system_prompt.text,
                    examples: editor.examples.text,
                    ..current.clone()
                };
                self.templates.upsert(editor.key, updated);
                self.status = Some("Template saved".to_string());
            }
        }
    }

    /// Restores the editor fields to the shipped template, or to the stored one for custom styles.
    pub fn reset_editor(&mut self) {
        if let Some(editor) = self.editor.as_mut() {
            let original = TemplateStore::default_template(&editor.key)
                .or_else(|| self.templates.get(&editor.key).ok().cloned());
            if let Some(config) = original {
                editor.system_prompt = TextField::with_text(&config.system_prompt);
                editor.examples = TextField::with_text(&config.examples);
            }
        }
    }

    // Rename
    pub fn start_rename(&mut self) {
        if let Some(config) = self.selected_template() {
            self.rename_input = Some(TextField::with_text(&config.name));
        }
    }

    pub fn submit_rename(&mut self) {
        if let Some(input) = self.rename_input.take() {
            match self.templates.rename(&self.selected_style, &input.text) {
                Ok(RenameOutcome::Renamed) => {}
                Ok(RenameOutcome::Reverted) => {
                    self.status = Some("Name can't be empty; kept the old one".to_string());
                }
                Err(e) => self.status = Some(e.to_string()),
            }
        }
    }

    // Generation
    pub fn submit_generate(&mut self) {
        let input = self.compose_input.text.clone();
        let submission = self
            .session
            .begin_generate(&self.templates, &self.selected_style, &input);
        if self.spawn_turn(submission) {
            self.screen = Screen::Chat;
            self.focus = FocusPane::Transcript;
            self.input_mode = InputMode::Normal;
            self.chat_scroll = 0;
            self.selected_message = None;
        }
    }

    pub fn submit_refine(&mut self) {
        let text = self.refine_input.text.clone();
        let submission = self.session.begin_refine(&text);
        if self.spawn_turn(submission) {
            self.refine_input.clear();
            self.input_mode = InputMode::Normal;
            self.scroll_chat_to_bottom();
        }
    }

    fn spawn_turn(&mut self, submission: Result<Submission, SessionError>) -> bool {
        match submission {
            Ok(Submission::Started(turn)) => {
                tracing::debug!(turn = %turn.id(), kind = ?turn.kind(), "spawning generation task");
                // Spawn background task so the UI keeps drawing while Gemini works
                self.pending = Some(tokio::spawn(turn.run()));
                true
            }
            Ok(Submission::Ignored) => false,
            Err(e) => {
                self.status = Some(e.to_string());
                false
            }
        }
    }

    /// Resolves once the spawned generation task finishes. Never resolves when idle.
    pub async fn generation_done(&mut self) -> Result<TurnResult, JoinError> {
        match self.pending.as_mut() {
            Some(handle) => handle.await,
            None => std::future::pending().await,
        }
    }

    pub fn finish_generation(&mut self, result: Result<TurnResult, JoinError>) {
        self.pending = None;
        let outcome = match result {
            Ok(result) => self.session.complete(result).ok(),
            Err(e) => {
                tracing::error!(error = %e, "generation task failed");
                self.session.abandon()
            }
        };

        if let Some(outcome) = outcome {
            if outcome.input_consumed() {
                self.compose_input.clear();
            }
            if let TurnOutcome::Failed { error, .. } = &outcome {
                self.status = Some(error.to_string());
            }
        }
        self.selected_message = self.last_model_index();
        self.scroll_chat_to_bottom();
    }

    pub fn new_thread(&mut self) {
        self.screen = Screen::Compose;
        self.focus = FocusPane::Styles;
        self.input_mode = InputMode::Normal;
    }

    // Transcript selection (model messages only)
    fn model_indices(&self) -> Vec<usize> {
        self.session
            .transcript()
            .iter()
            .enumerate()
            .filter(|(_, m)| m.is_model())
            .map(|(i, _)| i)
            .collect()
    }

    fn last_model_index(&self) -> Option<usize> {
        self.model_indices().last().copied()
    }

    pub fn message_nav_down(&mut self) {
        let indices = self.model_indices();
        self.selected_message = match self.selected_message {
            Some(current) => indices.iter().find(|&&i| i > current).copied().or(Some(current)),
            None => indices.first().copied(),
        };
    }

    pub fn message_nav_up(&mut self) {
        let indices = self.model_indices();
        self.selected_message = match self.selected_message {
            Some(current) => indices.iter().rev().find(|&&i| i < current).copied().or(Some(current)),
            None => indices.last().copied(),
        };
    }

    fn selected_message_content(&self) -> Option<String> {
        self.selected_message
            .and_then(|i| self.session.transcript().get(i))
            .filter(|m| m.is_model())
            .map(|m| m.content.clone())
    }

    pub fn copy_selected_message(&mut self) {
        if let Some(content) = self.selected_message_content() {
            self.status = Some(match clipboard::copy(&content) {
                Ok(()) => "Copied to clipboard".to_string(),
                Err(e) => format!("Copy failed: {}", e),
            });
        }
    }

    pub fn save_selected_message(&mut self) {
        if let Some(content) = self.selected_message_content() {
            self.saved.save(content, self.selected_style.clone());
            if self.saved_state.selected().is_none() {
                self.saved_state.select(Some(0));
            }
            self.status = Some(format!("Saved ({} total)", self.saved.len()));
        }
    }

    // Saved panel navigation
    pub fn saved_nav_down(&mut self) {
        let len = self.saved.len();
        if len > 0 {
            let i = self.saved_state.selected().unwrap_or(0);
            self.saved_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn saved_nav_up(&mut self) {
        let i = self.saved_state.selected().unwrap_or(0);
        self.saved_state.select(Some(i.saturating_sub(1)));
    }

    pub fn remove_selected_saved(&mut self) {
        if let Some(i) = self.saved_state.selected() {
            if let Some(id) = self.saved.get(i).map(|t| t.id) {
                self.saved.remove(id);
                // Adjust selection
                if self.saved.is_empty() {
                    self.saved_state.select(None);
                } else if i >= self.saved.len() {
                    self.saved_state.select(Some(self.saved.len() - 1));
                }
            }
        }
    }

    pub fn copy_selected_saved(&mut self) {
        let content = self
            .saved_state
            .selected()
            .and_then(|i| self.saved.get(i))
            .map(|t| t.content.clone());
        if let Some(content) = content {
            self.status = Some(match clipboard::copy(&content) {
                Ok(()) => "Copied to clipboard".to_string(),
                Err(e) => format!("Copy failed: {}", e),
            });
        }
    }

    // API key
    pub fn submit_api_key(&mut self) {
        let Some(input) = self.api_key_input.take() else {
            return;
        };
        let key = input.text.trim().to_string();
        if key.is_empty() {
            return;
        }
        // Keep the stored key and the live client in step
        if self.is_processing() {
            self.status = Some(SessionError::Busy.to_string());
            self.api_key_input = Some(input);
            return;
        }

        self.config.api_key = Some(key.clone());
        if let Err(e) = Config::save_api_key(&key) {
            tracing::warn!(error = %e, "could not persist API key");
        }

        let client = GenerationClient::new(self.config.client_settings());
        match self.session.replace_client(client) {
            Ok(()) => {
                self.selected_message = None;
                self.status = Some("API key saved".to_string());
            }
            Err(e) => self.status = Some(e.to_string()),
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.is_processing() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn scroll_half_page_down(&mut self) {
        let half = (self.chat_height / 2).max(1);
        self.chat_scroll = self.chat_scroll.saturating_add(half);
    }

    pub fn scroll_half_page_up(&mut self) {
        let half = (self.chat_height / 2).max(1);
        self.chat_scroll = self.chat_scroll.saturating_sub(half);
    }

    /// Scroll chat to bottom so the latest reply (or "Writing...") is visible
    pub fn scroll_chat_to_bottom(&mut self) {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: u16 = 0;

        for msg in self.session.transcript() {
            total_lines += 1; // Role line ("You:" or "Thread:")
            for line in msg.content.lines() {
                // Use character count, not byte length, for proper UTF-8 handling
                let char_count = line.chars().count();
                if char_count == 0 {
                    total_lines += 1;
                } else {
                    total_lines += ((char_count / wrap_width) + 1) as u16;
                }
            }
            total_lines += 1; // Blank line after message
        }

        if self.is_processing() {
            total_lines += 2;
        }

        let visible_height = if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        };

        self.chat_scroll = total_lines.saturating_sub(visible_height);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use threadcraft_core::{ClientSettings, SessionOptions};

    fn offline_app() -> App {
        let client = GenerationClient::new(ClientSettings::default());
        let session = SessionController::new(client, SessionOptions::default());
        App::with_session(Config::new(), session)
    }

    #[test]
    fn test_char_to_byte_index() {
        assert_eq!(char_to_byte_index("héllo", 2), 3);
        assert_eq!(char_to_byte_index("abc", 10), 3);
    }

    #[test]
    fn test_text_field_editing() {
        let mut field = TextField::default();
        for c in "mondays💪".chars() {
            field.insert(c);
        }
        field.left();
        field.backspace();
        assert_eq!(field.text, "monday💪");
        field.home();
        field.delete();
        assert_eq!(field.text, "onday💪");
        field.end();
        assert_eq!(field.cursor, 6);
    }

    #[test]
    fn test_cursor_line_col() {
        let field = TextField::with_text("ab\ncde");
        assert_eq!(field.cursor_line_col(), (1, 3));
    }

    #[test]
    fn test_offline_app_prompts_for_key() {
        let app = offline_app();
        assert!(app.api_key_input.is_some());
        assert_eq!(app.selected_style.as_str(), "NATURAL");
    }

    #[test]
    fn test_add_style_selects_and_opens_editor() {
        let mut app = offline_app();
        app.add_style();
        assert_eq!(app.templates.len(), 4);
        assert_eq!(app.style_state.selected(), Some(3));
        assert_eq!(app.editor.as_ref().map(|e| &e.key), Some(&app.selected_style));
    }

    #[test]
    fn test_editor_save_replaces_prompt_and_examples() {
        let mut app = offline_app();
        app.open_editor();
        if let Some(editor) = app.editor.as_mut() {
            editor.system_prompt = TextField::with_text("Be brief.");
            editor.toggle_field();
            editor.active_field().clear();
        }
        app.save_editor();

        let config = app.selected_template().unwrap();
        assert_eq!(config.system_prompt, "Be brief.");
        assert_eq!(config.examples, "");
        assert_eq!(config.name, "Natural Flow");
    }

    #[test]
    fn test_editor_reset_restores_built_in() {
        let mut app = offline_app();
        app.open_editor();
        if let Some(editor) = app.editor.as_mut() {
            editor.system_prompt = TextField::with_text("changed");
        }
        app.reset_editor();
        let default = TemplateStore::default_template(&app.selected_style).unwrap();
        assert_eq!(app.editor.unwrap().system_prompt.text, default.system_prompt);
    }

    #[test]
    fn test_blank_rename_reverts() {
        let mut app = offline_app();
        app.start_rename();
        app.rename_input = Some(TextField::with_text("   "));
        app.submit_rename();
        assert_eq!(app.selected_template().unwrap().name, "Natural Flow");
        assert!(app.status.is_some());
    }

    #[test]
    fn test_saved_removal_adjusts_selection() {
        let mut app = offline_app();
        app.saved.save("A", app.selected_style.clone());
        app.saved.save("B", app.selected_style.clone());
        app.saved_state.select(Some(1));

        app.remove_selected_saved();
        assert_eq!(app.saved_state.selected(), Some(0));
        app.remove_selected_saved();
        assert_eq!(app.saved_state.selected(), None);
        assert!(app.saved.is_empty());
    }

    #[tokio::test]
    async fn test_generate_without_key_shows_fallback() {
        let mut app = offline_app();
        app.compose_input = TextField::with_text("i love mondays");
        app.submit_generate();
        assert_eq!(app.screen, Screen::Chat);
        assert!(app.is_processing());

        let result = app.generation_done().await;
        app.finish_generation(result);

        assert!(!app.is_processing());
        assert!(app.pending.is_none());
        assert_eq!(app.session.transcript().len(), 2);
        assert_eq!(app.selected_message, Some(1));
        // Failed generations keep the input so the user can retry
        assert_eq!(app.compose_input.text, "i love mondays");
    }

    #[tokio::test]
    async fn test_api_key_rejected_while_generating() {
        let mut app = offline_app();
        app.compose_input = TextField::with_text("i love mondays");
        app.submit_generate();
        assert!(app.is_processing());

        app.api_key_input = Some(TextField::with_text("new-key"));
        app.submit_api_key();

        assert_eq!(app.config.api_key, None);
        assert!(!app.session.client().is_available());
        assert_eq!(app.api_key_input.as_ref().map(|f| f.text.as_str()), Some("new-key"));
        assert_eq!(app.status.as_deref(), Some("A generation is already in progress"));

        let result = app.generation_done().await;
        app.finish_generation(result);
        assert!(!app.is_processing());
    }

    #[test]
    fn test_blank_generate_stays_on_compose() {
        let mut app = offline_app();
        app.compose_input = TextField::with_text("   ");
        app.submit_generate();
        assert_eq!(app.screen, Screen::Compose);
        assert!(app.pending.is_none());
    }
}
