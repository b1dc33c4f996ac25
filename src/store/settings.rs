//! Persistent user settings.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tokio::fs;
use tracing::{debug, warn};

/// Endpoint used until the user configures one.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434/v1/chat/completions";

#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(rename = "apiKey", default)]
    pub api_key: String,

    /// Preferred model per endpoint
    #[serde(default)]
    pub default_models: BTreeMap<String, String>,

    /// Explicit model-list URL per endpoint
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub models_endpoint_overrides: BTreeMap<String, String>,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: String::new(),
            default_models: BTreeMap::new(),
            models_endpoint_overrides: BTreeMap::new(),
        }
    }
}

// The key is a secret: keep it out of logs.
impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("endpoint", &self.endpoint)
            .field("api_key", &if self.api_key.is_empty() { "" } else { "<set>" })
            .field("default_models", &self.default_models)
            .field("models_endpoint_overrides", &self.models_endpoint_overrides)
            .finish()
    }
}

impl Settings {
    /// Load from `path`; missing or invalid documents give defaults.
    pub async fn load(path: &Path) -> Self {
        let content = match fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) => {
                debug!("No settings at {:?}: {}", path, e);
                return Self::default();
            }
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!("Invalid settings file {:?}: {}", path, e);
            Self::default()
        })
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?).await?;
        debug!("Saved settings to {:?}", path);
        Ok(())
    }

    /// Save, logging instead of failing.
    pub async fn persist(&self, path: &Path) {
        if let Err(e) = self.save(path).await {
            warn!("Failed to persist settings to {:?}: {}", path, e);
        }
    }

    /// Stored default model for the current endpoint.
    pub fn default_model(&self) -> Option<&str> {
        self.default_models.get(&self.endpoint).map(String::as_str)
    }

    pub fn set_default_model(&mut self, model: String) {
        self.default_models.insert(self.endpoint.clone(), model);
    }

    /// Explicit model-list URL for `endpoint`, if configured.
    pub fn models_override(&self, endpoint: &str) -> Option<&str> {
        self.models_endpoint_overrides
            .get(endpoint)
            .map(String::as_str)
            .filter(|s| !s.is_empty())
    }
}
