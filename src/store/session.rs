//! Conversation sessions and their on-disk document.
//!
//! All sessions live in one JSON array (one inner array of messages per
//! session). The document is rewritten after every mutating event; a
//! missing or unreadable document yields a single empty session.

use super::images::{load_image, ImageArena, ImageHandle};
use crate::wrap::{wrap_text, CellWidth, TextMeasure, WrapWidths};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

const PREVIEW_MAX_CHARS: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    User,
    Assistant,
}

/// A message in a session.
#[derive(Debug)]
pub struct Message {
    pub sender: Sender,
    pub text: String,
    /// Reasoning segment; only meaningful for assistant messages
    pub reasoning: String,
    pub show_reasoning: bool,
    /// Attached photo, owned by this message
    pub image: Option<ImageHandle>,
    /// Where the attached photo is stored on disk
    pub image_path: Option<PathBuf>,
    /// Fade-in opacity, 0..=255
    pub alpha: u8,
    pub wrapped_text: Vec<String>,
    pub wrapped_reasoning: Vec<String>,
}

impl Message {
    /// A fresh user message, starting transparent.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            text: text.into(),
            reasoning: String::new(),
            show_reasoning: false,
            image: None,
            image_path: None,
            alpha: 0,
            wrapped_text: Vec::new(),
            wrapped_reasoning: Vec::new(),
        }
    }

    /// A fresh assistant message, starting transparent.
    pub fn assistant(text: impl Into<String>, reasoning: impl Into<String>) -> Self {
        Self {
            sender: Sender::Assistant,
            reasoning: reasoning.into(),
            ..Self::user(text)
        }
    }

    pub fn has_reasoning(&self) -> bool {
        self.sender == Sender::Assistant && !self.reasoning.is_empty()
    }

    /// Recompute wrapped lines for the given widths.
    pub fn rewrap(&mut self, text_width: usize, reasoning_width: usize, measure: &impl TextMeasure) {
        self.wrapped_text = wrap_text(&self.text, text_width, measure);
        self.wrapped_reasoning = if self.has_reasoning() {
            wrap_text(&self.reasoning, reasoning_width, measure)
        } else {
            Vec::new()
        };
    }

    /// Recompute wrapped lines in terminal cells.
    pub fn rewrap_cells(&mut self, widths: WrapWidths) {
        self.rewrap(widths.text, widths.reasoning, &CellWidth);
    }

    /// Step the fade-in. Returns true while still animating.
    pub fn fade_in(&mut self, speed: u8) -> bool {
        if self.alpha < u8::MAX {
            self.alpha = self.alpha.saturating_add(speed);
        }
        self.alpha < u8::MAX
    }
}

pub type Session = Vec<Message>;

// ─── Persisted document ─────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
struct StoredMessage {
    #[serde(default)]
    sender: String,
    #[serde(default)]
    text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    image_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    show_reasoning: Option<bool>,
}

impl From<&Message> for StoredMessage {
    fn from(msg: &Message) -> Self {
        let assistant = msg.sender == Sender::Assistant;
        Self {
            sender: if assistant { "llm" } else { "user" }.to_string(),
            text: msg.text.clone(),
            image_path: msg
                .image_path
                .as_ref()
                .map(|p| p.to_string_lossy().to_string()),
            reasoning: assistant.then(|| msg.reasoning.clone()),
            show_reasoning: assistant.then_some(msg.show_reasoning),
        }
    }
}

impl StoredMessage {
    fn into_message(self, images: &mut ImageArena) -> Message {
        let assistant = self.sender != "user";
        let mut msg = if assistant {
            Message::assistant(self.text, self.reasoning.unwrap_or_default())
        } else {
            Message::user(self.text)
        };
        msg.show_reasoning = assistant && self.show_reasoning.unwrap_or(false);
        msg.alpha = u8::MAX;

        if let Some(path) = self.image_path.filter(|p| !p.is_empty()) {
            let path = PathBuf::from(path);
            match load_image(&path) {
                Ok(image) => msg.image = Some(images.insert(image)),
                Err(e) => warn!("Could not load attached image {:?}: {}", path, e),
            }
            msg.image_path = Some(path);
        }
        msg
    }
}

// ─── Store ──────────────────────────────────────────────────────────

/// Ordered sessions plus the index of the one being viewed.
#[derive(Debug)]
pub struct SessionStore {
    sessions: Vec<Session>,
    current: usize,
    path: PathBuf,
}

impl SessionStore {
    /// An in-memory store with one empty session.
    pub fn new(path: PathBuf) -> Self {
        Self {
            sessions: vec![Vec::new()],
            current: 0,
            path,
        }
    }

    /// Load the document at `path`. Never fails: unreadable or missing
    /// documents give a single empty session.
    pub async fn load(path: PathBuf, images: &mut ImageArena) -> Self {
        let mut store = Self::new(path);
        let content = match fs::read_to_string(&store.path).await {
            Ok(content) => content,
            Err(e) => {
                debug!("No sessions loaded from {:?}: {}", store.path, e);
                return store;
            }
        };

        match serde_json::from_str::<Vec<Vec<StoredMessage>>>(&content) {
            Ok(doc) => {
                store.sessions = doc
                    .into_iter()
                    .map(|session| {
                        session
                            .into_iter()
                            .map(|m| m.into_message(images))
                            .collect()
                    })
                    .collect();
                if store.sessions.is_empty() {
                    store.sessions.push(Vec::new());
                }
                info!("Loaded {} session(s) from {:?}", store.sessions.len(), store.path);
            }
            Err(e) => warn!("Failed to parse sessions file {:?}: {}", store.path, e),
        }
        store
    }

    /// Select a blank session for a new launch, reusing a trailing empty one.
    pub fn start_fresh(&mut self) {
        if self.sessions.last().is_some_and(|s| !s.is_empty()) {
            self.sessions.push(Vec::new());
        }
        self.current = self.sessions.len() - 1;
    }

    /// Rewrite the whole document.
    pub async fn save(&self) -> Result<()> {
        let doc: Vec<Vec<StoredMessage>> = self
            .sessions
            .iter()
            .map(|session| session.iter().map(StoredMessage::from).collect())
            .collect();
        let content = serde_json::to_string_pretty(&doc)?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.path)
            .await?;
        file.write_all(content.as_bytes()).await?;
        file.flush().await?;

        debug!("Saved {} session(s)", self.sessions.len());
        Ok(())
    }

    /// Save, logging instead of failing; the app keeps running in memory.
    pub async fn persist(&self) {
        if let Err(e) = self.save().await {
            warn!("Failed to persist sessions to {:?}: {}", self.path, e);
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn session(&self, index: usize) -> Option<&Session> {
        self.sessions.get(index)
    }

    pub fn session_mut(&mut self, index: usize) -> Option<&mut Session> {
        self.sessions.get_mut(index)
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current(&self) -> &Session {
        &self.sessions[self.current]
    }

    pub fn current_mut(&mut self) -> &mut Session {
        &mut self.sessions[self.current]
    }

    /// Append a new empty session and select it.
    pub fn create_session(&mut self) -> usize {
        self.sessions.push(Vec::new());
        self.current = self.sessions.len() - 1;
        self.current
    }

    /// Select an existing session. Out-of-range indices are ignored.
    pub fn switch_to(&mut self, index: usize) -> bool {
        if index < self.sessions.len() {
            self.current = index;
            true
        } else {
            false
        }
    }

    /// Delete session `index`, releasing its photos, and re-derive the
    /// current index. Deleting the last session leaves one empty session.
    pub fn delete_session(&mut self, index: usize, images: &mut ImageArena) -> bool {
        if index >= self.sessions.len() {
            return false;
        }

        for msg in self.sessions.remove(index) {
            if let Some(handle) = msg.image {
                images.release(handle);
            }
        }

        if self.sessions.is_empty() {
            self.sessions.push(Vec::new());
            self.current = 0;
        } else if self.current == index {
            self.current = index.saturating_sub(1);
        } else if index < self.current {
            self.current -= 1;
        }
        info!("Deleted session {}, current is now {}", index, self.current);
        true
    }

    /// One-line preview of a session for the sessions list.
    pub fn preview(&self, index: usize) -> String {
        let first = self
            .sessions
            .get(index)
            .and_then(|s| s.first())
            .map(|m| m.text.as_str())
            .unwrap_or("");
        if first.is_empty() {
            return "New session...".to_string();
        }
        if first.chars().count() > PREVIEW_MAX_CHARS {
            let cut: String = first.chars().take(PREVIEW_MAX_CHARS - 3).collect();
            format!("{cut}...")
        } else {
            first.to_string()
        }
    }

    /// Step every message's fade-in. Returns true if anything is still fading.
    pub fn fade_in_all(&mut self, speed: u8) -> bool {
        let mut animating = false;
        for msg in self.sessions.iter_mut().flatten() {
            animating |= msg.fade_in(speed);
        }
        animating
    }

    pub fn rewrap_all(&mut self, widths: WrapWidths) {
        for msg in self.sessions.iter_mut().flatten() {
            msg.rewrap_cells(widths);
        }
    }

    /// Release every owned photo (shutdown).
    pub fn release_images(&mut self, images: &mut ImageArena) {
        for msg in self.sessions.iter_mut().flatten() {
            if let Some(handle) = msg.image.take() {
                images.release(handle);
            }
        }
    }
}

/// Where an index into the session list ends up after `deleted` is removed.
pub fn index_after_delete(index: usize, deleted: usize) -> Option<usize> {
    match index.cmp(&deleted) {
        std::cmp::Ordering::Less => Some(index),
        std::cmp::Ordering::Equal => None,
        std::cmp::Ordering::Greater => Some(index - 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn store_with(n: usize) -> SessionStore {
        let mut store = SessionStore::new(PathBuf::from("unused.json"));
        store.sessions.clear();
        for i in 0..n {
            store.sessions.push(vec![Message::user(format!("session {i}"))]);
        }
        store
    }

    #[test]
    fn test_delete_current_falls_back_to_previous() {
        let mut images = ImageArena::new();
        let mut store = store_with(4);
        store.current = 2;
        assert!(store.delete_session(2, &mut images));
        assert_eq!(store.current_index(), 1);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_delete_before_current_shifts_down() {
        let mut images = ImageArena::new();
        let mut store = store_with(4);
        store.current = 3;
        store.delete_session(0, &mut images);
        assert_eq!(store.current_index(), 2);
        assert_eq!(store.current()[0].text, "session 3");
    }

    #[test]
    fn test_delete_after_current_keeps_index() {
        let mut images = ImageArena::new();
        let mut store = store_with(3);
        store.current = 0;
        store.delete_session(2, &mut images);
        assert_eq!(store.current_index(), 0);
    }

    #[test]
    fn test_delete_first_current_stays_at_zero() {
        let mut images = ImageArena::new();
        let mut store = store_with(2);
        store.current = 0;
        store.delete_session(0, &mut images);
        assert_eq!(store.current_index(), 0);
        assert_eq!(store.current()[0].text, "session 1");
    }

    #[test]
    fn test_delete_last_session_leaves_one_empty() {
        let mut images = ImageArena::new();
        let mut store = store_with(1);
        store.delete_session(0, &mut images);
        assert_eq!(store.len(), 1);
        assert_eq!(store.current_index(), 0);
        assert!(store.current().is_empty());
    }

    #[test]
    fn test_delete_releases_images() {
        let mut images = ImageArena::new();
        let mut store = store_with(2);
        let handle = images.insert(image::RgbaImage::new(1, 1));
        let id = handle.id();
        store.sessions[1][0].image = Some(handle);
        store.delete_session(1, &mut images);
        assert!(!images.is_live(id));
        assert_eq!(images.live_count(), 0);
    }

    #[test]
    fn test_fade_in_saturates_monotonically() {
        let mut msg = Message::user("hi");
        let mut last = msg.alpha;
        for _ in 0..40 {
            msg.fade_in(15);
            assert!(msg.alpha >= last);
            last = msg.alpha;
        }
        assert_eq!(msg.alpha, 255);
        assert!(!msg.fade_in(15));
    }

    #[test]
    fn test_preview_truncates() {
        let mut store = store_with(1);
        store.sessions[0][0].text = "x".repeat(80);
        let preview = store.preview(0);
        assert_eq!(preview.chars().count(), 60);
        assert!(preview.ends_with("..."));
        store.sessions.push(Vec::new());
        assert_eq!(store.preview(1), "New session...");
    }

    #[test]
    fn test_start_fresh_reuses_trailing_empty() {
        let mut store = store_with(2);
        store.start_fresh();
        assert_eq!(store.len(), 3);
        assert_eq!(store.current_index(), 2);
        store.start_fresh();
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_index_after_delete() {
        assert_eq!(index_after_delete(1, 3), Some(1));
        assert_eq!(index_after_delete(3, 3), None);
        assert_eq!(index_after_delete(4, 3), Some(3));
    }

    #[tokio::test]
    async fn test_save_and_load_document() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sessions.json");
        let mut images = ImageArena::new();

        let mut store = SessionStore::new(path.clone());
        store.current_mut().push(Message::user("hello"));
        let mut reply = Message::assistant("hi there", "greeting");
        reply.show_reasoning = true;
        store.current_mut().push(reply);
        store.save().await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw[0][0]["sender"], "user");
        assert!(raw[0][0].get("reasoning").is_none());
        assert_eq!(raw[0][1]["sender"], "llm");
        assert_eq!(raw[0][1]["reasoning"], "greeting");
        assert_eq!(raw[0][1]["show_reasoning"], true);

        let loaded = SessionStore::load(path, &mut images).await;
        assert_eq!(loaded.len(), 1);
        let msgs = loaded.current();
        assert_eq!(msgs[0].sender, Sender::User);
        assert_eq!(msgs[1].reasoning, "greeting");
        assert!(msgs[1].show_reasoning);
        assert!(msgs.iter().all(|m| m.alpha == 255));
    }

    #[tokio::test]
    async fn test_load_defaults_missing_fields() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sessions.json");
        std::fs::write(&path, r#"[[{"sender":"llm","text":"old"}],[]]"#).unwrap();

        let loaded = SessionStore::load(path, &mut ImageArena::new()).await;
        assert_eq!(loaded.len(), 2);
        let msg = &loaded.sessions()[0][0];
        assert_eq!(msg.sender, Sender::Assistant);
        assert_eq!(msg.reasoning, "");
        assert!(!msg.show_reasoning);
    }

    #[tokio::test]
    async fn test_load_garbage_gives_one_empty_session() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sessions.json");
        std::fs::write(&path, "not json").unwrap();
        let loaded = SessionStore::load(path, &mut ImageArena::new()).await;
        assert_eq!(loaded.len(), 1);
        assert!(loaded.current().is_empty());

        let missing = SessionStore::load(dir.path().join("nope.json"), &mut ImageArena::new()).await;
        assert_eq!(missing.len(), 1);
    }
}
