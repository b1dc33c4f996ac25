//! Greedy word wrapping against a width budget.

use unicode_width::UnicodeWidthStr;

/// Measures the rendered width of a string.
pub trait TextMeasure {
    fn width(&self, text: &str) -> usize;
}

/// Terminal cell width (wide CJK glyphs count as two).
#[derive(Debug, Clone, Copy, Default)]
pub struct CellWidth;

impl TextMeasure for CellWidth {
    fn width(&self, text: &str) -> usize {
        UnicodeWidthStr::width(text)
    }
}

impl<F: Fn(&str) -> usize> TextMeasure for F {
    fn width(&self, text: &str) -> usize {
        self(text)
    }
}

/// Wrap budgets for message bodies and reasoning blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WrapWidths {
    pub text: usize,
    pub reasoning: usize,
}

impl WrapWidths {
    /// Budgets for a chat area `columns` wide.
    pub fn for_columns(columns: u16) -> Self {
        let bubble = (columns as usize * 2 / 3).max(12);
        Self {
            text: bubble.saturating_sub(4),
            reasoning: bubble.saturating_sub(6),
        }
    }
}

impl Default for WrapWidths {
    fn default() -> Self {
        Self::for_columns(80)
    }
}

/// Wrap `text` into lines no wider than `max_width` where possible.
///
/// Words are split on spaces and newlines. A newline always ends the
/// current line (so blank lines survive). A word wider than the budget is
/// emitted alone on its own line rather than broken.
pub fn wrap_text(text: &str, max_width: usize, measure: &impl TextMeasure) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut word = String::new();

    for c in text.chars() {
        if c == ' ' || c == '\n' {
            if !word.is_empty() {
                push_word(&mut lines, &mut current, &word, max_width, measure);
                word.clear();
            }
            if c == '\n' {
                lines.push(std::mem::take(&mut current));
            }
        } else {
            word.push(c);
        }
    }

    if !word.is_empty() {
        push_word(&mut lines, &mut current, &word, max_width, measure);
    }
    if !current.is_empty() {
        lines.push(current);
    }

    lines
}

fn push_word(
    lines: &mut Vec<String>,
    current: &mut String,
    word: &str,
    max_width: usize,
    measure: &impl TextMeasure,
) {
    let candidate = if current.is_empty() {
        word.to_string()
    } else {
        format!("{current} {word}")
    };

    if measure.width(&candidate) > max_width && !current.is_empty() {
        lines.push(std::mem::replace(current, word.to_string()));
    } else {
        *current = candidate;
    }
}
