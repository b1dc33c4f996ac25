//! Vertical layout of the message history.
//!
//! Heights are in abstract units: terminal rows for the shipped renderer,
//! pixels for a framebuffer target. The chat view and the renderer share
//! these functions so hit-testing agrees with what is drawn.

use crate::store::{Message, Sender};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Metrics {
    pub line_height: i32,
    /// Vertical padding inside a bubble
    pub bubble_padding: i32,
    pub image_height: i32,
    pub image_margin_user: i32,
    pub image_margin_assistant: i32,
    /// Extra height of an expanded reasoning block besides its lines
    pub reasoning_padding: i32,
    pub message_gap: i32,
    /// Screen height not available to the history (header, input bar)
    pub chrome_height: i32,
}

impl Metrics {
    /// Rows on a character terminal.
    pub const TERMINAL: Metrics = Metrics {
        line_height: 1,
        bubble_padding: 2,
        image_height: 6,
        image_margin_user: 1,
        image_margin_assistant: 1,
        reasoning_padding: 2,
        message_gap: 1,
        chrome_height: 7,
    };

    /// Pixels on a 960x544 handheld framebuffer.
    pub const HANDHELD: Metrics = Metrics {
        line_height: 20,
        bubble_padding: 20,
        image_height: 150,
        image_margin_user: 20,
        image_margin_assistant: 10,
        reasoning_padding: 30,
        message_gap: 10,
        chrome_height: 150,
    };

    pub fn viewport_height(&self, screen_height: i32) -> i32 {
        (screen_height - self.chrome_height).max(0)
    }

    pub fn message_height(&self, msg: &Message) -> i32 {
        let mut height = msg.wrapped_text.len() as i32 * self.line_height + self.bubble_padding;
        if msg.image.is_some() {
            height += self.image_height
                + match msg.sender {
                    Sender::User => self.image_margin_user,
                    Sender::Assistant => self.image_margin_assistant,
                };
        }
        if msg.sender == Sender::Assistant
            && msg.show_reasoning
            && !msg.wrapped_reasoning.is_empty()
        {
            height += msg.wrapped_reasoning.len() as i32 * self.line_height + self.reasoning_padding;
        }
        height
    }

    /// Total scrollable height of a message list.
    pub fn content_height(&self, messages: &[Message]) -> i32 {
        messages
            .iter()
            .map(|m| self.message_height(m) + self.message_gap)
            .sum()
    }

    /// Top offset of message `index` within the content.
    pub fn message_top(&self, messages: &[Message], index: usize) -> i32 {
        messages
            .iter()
            .take(index)
            .map(|m| self.message_height(m) + self.message_gap)
            .sum()
    }

    /// Index of the message whose box contains content position `y`.
    /// Positions that fall in a gap between messages hit nothing.
    pub fn message_at(&self, messages: &[Message], y: i32) -> Option<usize> {
        let mut top = 0;
        for (i, msg) in messages.iter().enumerate() {
            let height = self.message_height(msg);
            if y >= top && y < top + height {
                return Some(i);
            }
            top += height + self.message_gap;
        }
        None
    }
}

/// Largest valid scroll offset.
pub fn max_scroll(content_height: i32, viewport_height: i32) -> i32 {
    (content_height - viewport_height).max(0)
}

/// Clamp a scroll offset into `[0, max_scroll]`.
pub fn clamp_scroll(offset: i32, content_height: i32, viewport_height: i32) -> i32 {
    offset.clamp(0, max_scroll(content_height, viewport_height))
}
