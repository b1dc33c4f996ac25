//! Frame cadence, gesture and animation constants.
//!
//! Every value has a built-in default; `tuning.toml` in the data directory
//! may override any subset of them.

use crate::Result;
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Tuning {
    /// Frames per second of the render loop
    pub fps: u32,
    /// Stick deflection (from centre) ignored as noise
    pub stick_deadzone: u8,
    /// Held frames after which a stick push becomes a continuous scroll
    pub scroll_initiate_frames: u32,
    /// Frames suppressed after a discrete analog step
    pub analog_cooldown_frames: u32,
    /// Scroll units per frame at full deflection
    pub max_scroll_speed: f32,
    /// Seconds Start must be held to quit
    pub hold_to_exit_secs: f32,
    /// Alpha added per frame to freshly appended messages
    pub message_fade_speed: u8,
    /// Alpha added per frame to the main UI once models are loaded
    pub ui_fade_speed: u8,
    /// Alpha step per frame of the camera overlay
    pub camera_fade_speed: u8,
    /// Overlay alpha the camera fades towards
    pub camera_overlay_alpha: u8,
    /// Easing factor of the model dropdown height
    pub dropdown_easing: f32,
    /// Minimum frames the connecting popup stays up
    pub min_popup_frames: u32,
    /// Popup frame at which the connectivity probe runs
    pub probe_frame: u32,
    /// Popup frame at which the model fetch may start
    pub fetch_frame: u32,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            fps: 60,
            stick_deadzone: 50,
            scroll_initiate_frames: 8,
            analog_cooldown_frames: 15,
            max_scroll_speed: 15.0,
            hold_to_exit_secs: 2.0,
            message_fade_speed: 15,
            ui_fade_speed: 8,
            camera_fade_speed: 15,
            camera_overlay_alpha: 180,
            dropdown_easing: 0.25,
            min_popup_frames: 30,
            probe_frame: 5,
            fetch_frame: 10,
        }
    }
}

impl Tuning {
    /// Seconds represented by one frame.
    pub fn frame_quantum(&self) -> f32 {
        1.0 / self.fps.max(1) as f32
    }

    /// Load overrides from `path`, falling back to defaults when absent.
    pub async fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No tuning file at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        let content = tokio::fs::read_to_string(path).await?;
        let tuning: Tuning = toml::from_str(&content)?;
        info!("Loaded tuning overrides from {:?}", path);
        Ok(tuning)
    }
}
