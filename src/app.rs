use acechat_core::settings::{DEFAULT_TEMPERATURE, KNOWN_MODELS};
use acechat_core::transcript::SUGGESTIONS;
use acechat_core::{HttpBackend, Session, SessionEvent, Settings};
use ratatui::layout::Rect;
use tracing::debug;

/// Compose box grows with its content up to this many lines.
pub const MAX_COMPOSE_LINES: u16 = 6;

const TEMPERATURE_MIN: f64 = 0.0;
const TEMPERATURE_MAX: f64 = 2.0;
const TEMPERATURE_STEP: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsField {
    Model,
    Temperature,
    MaxTokens,
}

impl SettingsField {
    fn next(self) -> Self {
        match self {
            SettingsField::Model => SettingsField::Temperature,
            SettingsField::Temperature => SettingsField::MaxTokens,
            SettingsField::MaxTokens => SettingsField::Model,
        }
    }

    fn prev(self) -> Self {
        match self {
            SettingsField::Model => SettingsField::MaxTokens,
            SettingsField::Temperature => SettingsField::Model,
            SettingsField::MaxTokens => SettingsField::Temperature,
        }
    }
}

/// Editable copy of the settings shown in the popup.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsForm {
    pub models: Vec<String>,
    pub model_idx: usize,
    pub temperature: f64,
    pub max_tokens: String,
    pub field: SettingsField,
}

impl SettingsForm {
    pub fn from_settings(settings: &Settings) -> Self {
        let mut models: Vec<String> = KNOWN_MODELS.iter().map(|m| m.to_string()).collect();
        if !models.contains(&settings.model) {
            models.insert(0, settings.model.clone());
        }
        let model_idx = models.iter().position(|m| m == &settings.model).unwrap_or(0);

        Self {
            models,
            model_idx,
            temperature: settings.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            max_tokens: settings.max_tokens.map(|n| n.to_string()).unwrap_or_default(),
            field: SettingsField::Model,
        }
    }

    pub fn model(&self) -> &str {
        self.models.get(self.model_idx).map(String::as_str).unwrap_or_default()
    }

    pub fn next_field(&mut self) {
        self.field = self.field.next();
    }

    pub fn prev_field(&mut self) {
        self.field = self.field.prev();
    }

    /// Left/Right on the focused field: cycle the model or move the slider.
    pub fn adjust(&mut self, forward: bool) {
        match self.field {
            SettingsField::Model => {
                let len = self.models.len().max(1);
                self.model_idx = if forward {
                    (self.model_idx + 1) % len
                } else {
                    (self.model_idx + len - 1) % len
                };
            }
            SettingsField::Temperature => {
                let step = if forward { TEMPERATURE_STEP } else { -TEMPERATURE_STEP };
                let value = (self.temperature + step).clamp(TEMPERATURE_MIN, TEMPERATURE_MAX);
                // Snap to the slider grid so repeated steps don't drift
                self.temperature = (value * 10.0).round() / 10.0;
            }
            SettingsField::MaxTokens => {}
        }
    }

    pub fn push_char(&mut self, c: char) {
        if self.field == SettingsField::MaxTokens {
            self.max_tokens.push(c);
        }
    }

    pub fn pop_char(&mut self) {
        if self.field == SettingsField::MaxTokens {
            self.max_tokens.pop();
        }
    }

    /// The settings as the form would submit them.
    pub fn to_settings(&self) -> Settings {
        Settings::from_form(
            self.model(),
            &format!("{:.1}", self.temperature),
            &self.max_tokens,
        )
    }
}

pub struct App {
    pub should_quit: bool,
    pub session: Session<HttpBackend>,
    pub server_url: String,

    // Compose box
    pub compose: String,
    pub compose_cursor: usize, // char index into compose

    pub settings_form: Option<SettingsForm>,
    pub show_sidebar: bool,

    // Transcript area for mouse hit-testing (updated during render)
    pub transcript_area: Option<Rect>,
}

impl App {
    pub fn new(session: Session<HttpBackend>, server_url: impl Into<String>) -> Self {
        Self {
            should_quit: false,
            session,
            server_url: server_url.into(),
            compose: String::new(),
            compose_cursor: 0,
            settings_form: None,
            show_sidebar: false,
            transcript_area: None,
        }
    }

    pub fn input_mode(&self) -> InputMode {
        if self.session.gate().compose_focused() {
            InputMode::Editing
        } else {
            InputMode::Normal
        }
    }

    /// Whether keystrokes reach the compose box right now.
    pub fn can_type(&self) -> bool {
        self.settings_form.is_none() && self.session.gate().accepts_input()
    }

    pub fn insert_char(&mut self, c: char) {
        if !self.can_type() {
            return;
        }
        let byte_pos = char_to_byte_index(&self.compose, self.compose_cursor);
        self.compose.insert(byte_pos, c);
        self.compose_cursor += 1;
    }

    pub fn insert_newline(&mut self) {
        self.insert_char('\n');
    }

    /// Insert pasted text at the cursor.
    pub fn insert_str(&mut self, text: &str) {
        if self.can_type() {
            self.splice(text);
        }
    }

    fn splice(&mut self, text: &str) {
        let text = text.replace("\r\n", "\n").replace('\r', "\n");
        let byte_pos = char_to_byte_index(&self.compose, self.compose_cursor);
        self.compose.insert_str(byte_pos, &text);
        self.compose_cursor += text.chars().count();
    }

    pub fn backspace(&mut self) {
        if !self.can_type() || self.compose_cursor == 0 {
            return;
        }
        self.compose_cursor -= 1;
        let byte_pos = char_to_byte_index(&self.compose, self.compose_cursor);
        self.compose.remove(byte_pos);
    }

    pub fn delete(&mut self) {
        if !self.can_type() {
            return;
        }
        let char_count = self.compose.chars().count();
        if self.compose_cursor < char_count {
            let byte_pos = char_to_byte_index(&self.compose, self.compose_cursor);
            self.compose.remove(byte_pos);
        }
    }

    pub fn cursor_left(&mut self) {
        self.compose_cursor = self.compose_cursor.saturating_sub(1);
    }

    pub fn cursor_right(&mut self) {
        let char_count = self.compose.chars().count();
        self.compose_cursor = (self.compose_cursor + 1).min(char_count);
    }

    /// Start of the current line.
    pub fn cursor_home(&mut self) {
        let (row, _) = self.cursor_row_col();
        self.compose_cursor = self.line_start(row);
    }

    /// End of the current line.
    pub fn cursor_end(&mut self) {
        let (row, _) = self.cursor_row_col();
        let len = self.compose.split('\n').nth(row).map(|l| l.chars().count()).unwrap_or(0);
        self.compose_cursor = self.line_start(row) + len;
    }

    fn line_start(&self, row: usize) -> usize {
        self.compose
            .split('\n')
            .take(row)
            .map(|l| l.chars().count() + 1)
            .sum()
    }

    /// Cursor position as (line, column), both in chars.
    pub fn cursor_row_col(&self) -> (usize, usize) {
        let before: String = self.compose.chars().take(self.compose_cursor).collect();
        let row = before.matches('\n').count();
        let col = before.rsplit('\n').next().map(|l| l.chars().count()).unwrap_or(0);
        (row, col)
    }

    /// Inner height of the compose box, 1 to MAX_COMPOSE_LINES.
    pub fn compose_height(&self) -> u16 {
        let lines = self.compose.split('\n').count() as u16;
        lines.clamp(1, MAX_COMPOSE_LINES)
    }

    /// Send the compose buffer. It is cleared only if the session took it.
    pub fn submit(&mut self) -> bool {
        if self.settings_form.is_some() {
            return false;
        }
        if !self.session.send(&self.compose) {
            return false;
        }
        self.compose.clear();
        self.compose_cursor = 0;
        true
    }

    /// Copy a welcome-card suggestion into the compose box.
    pub fn use_suggestion(&mut self, index: usize) -> bool {
        let Some(text) = SUGGESTIONS.get(index) else {
            return false;
        };
        if !self.session.transcript().has_welcome() || self.session.gate().is_busy() {
            return false;
        }
        self.session.gate_mut().focus_compose();
        self.compose = text.to_string();
        self.compose_cursor = self.compose.chars().count();
        true
    }

    pub fn open_settings(&mut self) {
        self.settings_form = Some(SettingsForm::from_settings(self.session.settings()));
    }

    pub fn close_settings(&mut self) {
        self.settings_form = None;
    }

    pub fn save_settings(&mut self) {
        if let Some(form) = self.settings_form.take() {
            let settings = form.to_settings();
            debug!(?settings, "submitting settings");
            self.session.apply_settings(settings);
        }
    }

    pub fn toggle_sidebar(&mut self) {
        self.show_sidebar = !self.show_sidebar;
    }

    pub fn focus_compose(&mut self) {
        self.session.gate_mut().focus_compose();
    }

    pub fn blur_compose(&mut self) {
        self.session.gate_mut().blur_compose();
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.session.transcript_mut().scroll_up(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.session.transcript_mut().scroll_down(lines);
    }

    pub fn tick(&mut self) {
        self.session.tick();
    }

    /// Apply a background result, then move any dictated text into the
    /// compose box.
    pub fn on_session_event(&mut self, event: SessionEvent) {
        self.session.handle(event);
        if let Some(text) = self.session.take_dictation() {
            self.splice(&text);
            self.focus_compose();
        }
    }
}
