//! Chat completion request bodies.

use crate::store::{Message, Sender};
use serde::Serialize;

/// Model used when the directory has nothing selected.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: MessageContent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

impl ChatRequest {
    /// Replay a whole session as text turns.
    pub fn from_history(model: &str, history: &[Message]) -> Self {
        let messages = history
            .iter()
            .map(|msg| ChatMessage {
                role: match msg.sender {
                    Sender::User => Role::User,
                    Sender::Assistant => Role::Assistant,
                },
                content: MessageContent::Text(msg.text.clone()),
            })
            .collect();
        Self {
            model: model.to_string(),
            messages,
        }
    }

    /// A single multimodal user turn: text plus an inline image.
    pub fn with_image(model: &str, text: &str, image_data_url: String) -> Self {
        Self {
            model: model.to_string(),
            messages: vec![ChatMessage {
                role: Role::User,
                content: MessageContent::Parts(vec![
                    ContentPart::Text {
                        text: text.to_string(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: image_data_url,
                        },
                    },
                ]),
            }],
        }
    }
}
