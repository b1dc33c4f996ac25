//! Text-entry modal.
//!
//! A [`TextEntry`] is started with a title and seed text, receives raw
//! terminal keys while it is running, and is polled once per frame until
//! it resolves.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use unicode_width::UnicodeWidthChar;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryStatus {
    /// Not started, or already resolved and polled
    Idle,
    Running,
    Finished(String),
    Cancelled,
}

/// What a renderer needs to draw the entry box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryView {
    pub title: String,
    /// Buffer as displayed (masked for secrets)
    pub text: String,
    /// Cursor position in terminal columns
    pub cursor_col: usize,
}

pub trait TextEntry {
    fn start(&mut self, title: &str, initial: &str, secret: bool);

    fn handle_key(&mut self, key: KeyEvent);

    /// Poll once per frame. A resolved entry reports its result once and
    /// then goes back to `Idle`.
    fn poll(&mut self) -> EntryStatus;

    fn is_active(&self) -> bool;

    fn view(&self) -> Option<EntryView>;
}

/// Single-line editor for terminal keys.
///
/// Note: `cursor` is a CHARACTER index, not a byte index.
#[derive(Debug, Clone, Default)]
pub struct LineEditor {
    buffer: String,
    cursor: usize,
    title: String,
    secret: bool,
    status: Option<EntryStatus>,
}

impl LineEditor {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    fn buffer(&self) -> &str {
        &self.buffer
    }

    fn char_count(&self) -> usize {
        self.buffer.chars().count()
    }

    fn char_to_byte_index(&self, char_idx: usize) -> usize {
        self.buffer
            .char_indices()
            .nth(char_idx)
            .map(|(byte_idx, _)| byte_idx)
            .unwrap_or(self.buffer.len())
    }

    fn insert_char(&mut self, c: char) {
        let byte_idx = self.char_to_byte_index(self.cursor);
        self.buffer.insert(byte_idx, c);
        self.cursor += 1;
    }

    fn remove_char_before_cursor(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            self.remove_char_at_cursor();
        }
    }

    fn remove_char_at_cursor(&mut self) {
        let byte_idx = self.char_to_byte_index(self.cursor);
        if let Some(ch) = self.buffer[byte_idx..].chars().next() {
            self.buffer.replace_range(byte_idx..byte_idx + ch.len_utf8(), "");
        }
    }

    fn delete_word(&mut self) {
        let chars: Vec<char> = self.buffer.chars().collect();
        let mut start = self.cursor;
        while start > 0 && chars[start - 1] == ' ' {
            start -= 1;
        }
        while start > 0 && chars[start - 1] != ' ' {
            start -= 1;
        }
        let from = self.char_to_byte_index(start);
        let to = self.char_to_byte_index(self.cursor);
        self.buffer.replace_range(from..to, "");
        self.cursor = start;
    }

    fn resolve(&mut self, status: EntryStatus) {
        self.status = Some(status);
    }

    fn running(&self) -> bool {
        self.status == Some(EntryStatus::Running)
    }
}

impl TextEntry for LineEditor {
    fn start(&mut self, title: &str, initial: &str, secret: bool) {
        self.title = title.to_string();
        self.buffer = initial.to_string();
        self.cursor = self.char_count();
        self.secret = secret;
        self.status = Some(EntryStatus::Running);
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if !self.running() {
            return;
        }
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Enter => {
                let text = std::mem::take(&mut self.buffer);
                self.cursor = 0;
                self.resolve(EntryStatus::Finished(text));
            }
            KeyCode::Esc => {
                self.buffer.clear();
                self.cursor = 0;
                self.resolve(EntryStatus::Cancelled);
            }
            KeyCode::Char('c') if ctrl => {
                self.buffer.clear();
                self.cursor = 0;
                self.resolve(EntryStatus::Cancelled);
            }
            KeyCode::Char('u') if ctrl => {
                self.buffer.clear();
                self.cursor = 0;
            }
            KeyCode::Char('w') if ctrl => self.delete_word(),
            KeyCode::Char('a') if ctrl => self.cursor = 0,
            KeyCode::Char('e') if ctrl => self.cursor = self.char_count(),
            KeyCode::Backspace => self.remove_char_before_cursor(),
            KeyCode::Delete => self.remove_char_at_cursor(),
            KeyCode::Left => self.cursor = self.cursor.saturating_sub(1),
            KeyCode::Right => self.cursor = (self.cursor + 1).min(self.char_count()),
            KeyCode::Home => self.cursor = 0,
            KeyCode::End => self.cursor = self.char_count(),
            KeyCode::Char(c) if !ctrl => self.insert_char(c),
            _ => {}
        }
    }

    fn poll(&mut self) -> EntryStatus {
        match self.status.take() {
            Some(EntryStatus::Running) => {
                self.status = Some(EntryStatus::Running);
                EntryStatus::Running
            }
            Some(resolved) => resolved,
            None => EntryStatus::Idle,
        }
    }

    fn is_active(&self) -> bool {
        self.running()
    }

    fn view(&self) -> Option<EntryView> {
        if !self.running() {
            return None;
        }
        let text: String = if self.secret {
            "*".repeat(self.char_count())
        } else {
            self.buffer.clone()
        };
        let cursor_col = text
            .chars()
            .take(self.cursor)
            .map(|c| c.width().unwrap_or(0))
            .sum();
        Some(EntryView {
            title: self.title.clone(),
            text,
            cursor_col,
        })
    }
}
