//! Padchat - gamepad-driven chat client
//!
//! A frame-loop chat client for OpenAI-compatible endpoints:
//! - Multi-session conversation history persisted as JSON
//! - Flick/hold gesture navigation from a single analog stick
//! - Photo capture and multimodal requests
//! - Reasoning (`<think>`) segments shown and hidden per message

pub mod anim;
pub mod app;
pub mod camera;
pub mod input;
pub mod keyboard;
pub mod layout;
pub mod models;
pub mod pipeline;
pub mod store;
pub mod tuning;
pub mod ui;
pub mod wrap;

pub use app::App;
pub use store::{Message, Sender, SessionStore, Settings};
pub use tuning::Tuning;

use std::path::PathBuf;

/// Configuration for Padchat
#[derive(Debug, Clone)]
pub struct PadchatConfig {
    /// Directory holding sessions.json, settings.json, tuning.toml and images/
    pub data_dir: PathBuf,

    /// Directory the still camera reads frames from (test card when None)
    pub camera_dir: Option<PathBuf>,

    /// Endpoint that replaces the persisted one for this run
    pub endpoint_override: Option<String>,

    /// Frame cadence and gesture/animation constants
    pub tuning: Tuning,
}

impl PadchatConfig {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            camera_dir: None,
            endpoint_override: None,
            tuning: Tuning::default(),
        }
    }

    pub fn with_camera_dir(mut self, dir: PathBuf) -> Self {
        self.camera_dir = Some(dir);
        self
    }

    pub fn with_endpoint_override(mut self, endpoint: String) -> Self {
        self.endpoint_override = Some(endpoint);
        self
    }

    pub fn with_tuning(mut self, tuning: Tuning) -> Self {
        self.tuning = tuning;
        self
    }

    pub fn sessions_file(&self) -> PathBuf {
        self.data_dir.join("sessions.json")
    }

    pub fn settings_file(&self) -> PathBuf {
        self.data_dir.join("settings.json")
    }

    pub fn tuning_file(&self) -> PathBuf {
        self.data_dir.join("tuning.toml")
    }

    pub fn images_dir(&self) -> PathBuf {
        self.data_dir.join("images")
    }
}

/// Result type for Padchat operations
pub type Result<T> = std::result::Result<T, PadchatError>;

/// Errors that can occur in Padchat
#[derive(Debug, thiserror::Error)]
pub enum PadchatError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Terminal error: {0}")]
    Terminal(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

impl From<toml::de::Error> for PadchatError {
    fn from(e: toml::de::Error) -> Self {
        PadchatError::Config(e.to_string())
    }
}
