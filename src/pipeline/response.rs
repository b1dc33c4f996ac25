//! Chat completion reply parsing.

use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedReply {
    pub content: String,
    pub reasoning: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

fn think_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // First <think> paired with the first </think> after it
    RE.get_or_init(|| Regex::new(r"(?s)^(.*?)<think>(.*?)</think>(.*)$").expect("valid regex"))
}

/// Split `<think>…</think>` out of a content string.
///
/// The first `</think>` must come after the first `<think>`; otherwise the
/// content is left whole.
pub fn split_reasoning(content: &str) -> ParsedReply {
    let close_first = match (content.find("<think>"), content.find("</think>")) {
        (Some(open), Some(close)) => close < open,
        _ => true,
    };
    let caps = if close_first {
        None
    } else {
        think_regex().captures(content)
    };
    match caps {
        Some(caps) => {
            let part = |i| caps.get(i).map_or("", |m| m.as_str());
            ParsedReply {
                content: format!("{}{}", part(1), part(3)),
                reasoning: part(2).to_string(),
            }
        }
        None => ParsedReply {
            content: content.to_string(),
            reasoning: String::new(),
        },
    }
}

/// Turn a raw response body into displayable content.
///
/// Anything that is not a well-formed chat completion is shown verbatim,
/// which is also how transport error strings reach the user.
pub fn parse_reply(body: &str) -> ParsedReply {
    match serde_json::from_str::<ChatResponse>(body) {
        Ok(response) => match response.choices.into_iter().next() {
            Some(choice) => split_reasoning(&choice.message.content),
            None => raw(body),
        },
        Err(_) => raw(body),
    }
}

fn raw(body: &str) -> ParsedReply {
    ParsedReply {
        content: body.to_string(),
        reasoning: String::new(),
    }
}
