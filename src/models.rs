//! Model directory: which models the configured endpoint offers.

use crate::pipeline::Transport;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

const OPENAI_CHAT_SUFFIX: &str = "/v1/chat/completions";
const WEBUI_CHAT_SUFFIX: &str = "/api/chat/completions";

/// Model-list URL for a chat endpoint.
///
/// An explicit override wins. Otherwise OpenAI-style and Open WebUI-style
/// chat paths map to their model paths; anything else has no model list.
pub fn models_url(endpoint: &str, override_url: Option<&str>) -> Option<String> {
    if let Some(url) = override_url.filter(|u| !u.is_empty()) {
        return Some(url.to_string());
    }
    for (suffix, models_path) in [
        (OPENAI_CHAT_SUFFIX, "/v1/models"),
        (WEBUI_CHAT_SUFFIX, "/api/models"),
    ] {
        if endpoint.len() > suffix.len() {
            if let Some(base) = endpoint.strip_suffix(suffix) {
                return Some(format!("{base}{models_path}"));
            }
        }
    }
    None
}

#[derive(Deserialize)]
struct ModelList {
    data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: String,
}

/// Parse `{"data":[{"id":…}]}`; anything else yields no models.
pub fn parse_models(body: &str) -> Vec<String> {
    match serde_json::from_str::<ModelList>(body) {
        Ok(list) => list.data.into_iter().map(|m| m.id).collect(),
        Err(e) => {
            debug!("Unrecognised model list: {}", e);
            Vec::new()
        }
    }
}

/// Index to select after a fetch.
pub fn resolve_default(models: &[String], stored: Option<&str>) -> Option<usize> {
    if models.is_empty() {
        return None;
    }
    stored
        .and_then(|name| models.iter().position(|m| m == name))
        .or(Some(0))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectoryState {
    Idle,
    Fetching,
    Ready,
    /// The last fetch produced no models
    Failed,
}

/// Result of polling a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Pending,
    Loaded(usize),
    Empty,
}

#[derive(Debug)]
pub struct ModelDirectory {
    models: Vec<String>,
    selected: Option<usize>,
    state: DirectoryState,
    /// Set once the first fetch has finished, whatever its outcome
    loaded: bool,
    cache: HashMap<String, Vec<String>>,
    pending: Option<PendingFetch>,
}

#[derive(Debug)]
struct PendingFetch {
    endpoint: String,
    stored_default: Option<String>,
    reply: oneshot::Receiver<Vec<String>>,
}

impl Default for ModelDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelDirectory {
    pub fn new() -> Self {
        Self {
            models: Vec::new(),
            selected: None,
            state: DirectoryState::Idle,
            loaded: false,
            cache: HashMap::new(),
            pending: None,
        }
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn state(&self) -> DirectoryState {
        self.state
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn is_fetching(&self) -> bool {
        self.state == DirectoryState::Fetching
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn selected_model(&self) -> Option<&str> {
        self.selected
            .and_then(|i| self.models.get(i))
            .map(String::as_str)
    }

    /// Select by index; out-of-range indices are ignored.
    pub fn select(&mut self, index: usize) {
        if index < self.models.len() {
            self.selected = Some(index);
        }
    }

    /// Models last fetched for `endpoint`.
    pub fn cached(&self, endpoint: &str) -> Option<&[String]> {
        self.cache.get(endpoint).map(Vec::as_slice)
    }

    /// Drop everything known about `endpoint` after it failed to connect.
    pub fn mark_unreachable(&mut self, endpoint: &str) {
        self.cache.remove(endpoint);
        self.models.clear();
        self.selected = None;
        self.pending = None;
        self.state = DirectoryState::Failed;
        self.loaded = true;
    }

    /// Start fetching the model list for `endpoint`.
    ///
    /// The list cached for `endpoint` (or none) is served while the
    /// refresh runs. Endpoints without a model URL finish immediately with
    /// no models and no network call.
    pub fn begin_fetch<T: Transport>(
        &mut self,
        transport: &Arc<T>,
        endpoint: &str,
        api_key: &str,
        override_url: Option<&str>,
        stored_default: Option<&str>,
    ) {
        let (tx, rx) = oneshot::channel();
        self.models = self.cache.get(endpoint).cloned().unwrap_or_default();
        self.selected = resolve_default(&self.models, stored_default);
        self.state = DirectoryState::Fetching;
        self.pending = Some(PendingFetch {
            endpoint: endpoint.to_string(),
            stored_default: stored_default.map(str::to_string),
            reply: rx,
        });

        let Some(url) = models_url(endpoint, override_url) else {
            info!("No model list for endpoint {}", endpoint);
            let _ = tx.send(Vec::new());
            return;
        };

        info!("Fetching models from {}", url);
        let transport = Arc::clone(transport);
        let api_key = api_key.to_string();
        tokio::spawn(async move {
            let body = transport.get(url, api_key).await;
            let _ = tx.send(parse_models(&body));
        });
    }

    /// Collect a finished fetch, if any.
    pub fn poll(&mut self) -> FetchOutcome {
        let Some(pending) = &mut self.pending else {
            return FetchOutcome::Pending;
        };
        let models = match pending.reply.try_recv() {
            Ok(models) => models,
            Err(oneshot::error::TryRecvError::Empty) => return FetchOutcome::Pending,
            Err(oneshot::error::TryRecvError::Closed) => {
                warn!("Model fetch ended without a result");
                Vec::new()
            }
        };
        let Some(pending) = self.pending.take() else {
            return FetchOutcome::Pending;
        };
        self.install(pending.endpoint, models, pending.stored_default.as_deref())
    }

    fn install(&mut self, endpoint: String, models: Vec<String>, stored_default: Option<&str>) -> FetchOutcome {
        self.selected = resolve_default(&models, stored_default);
        self.loaded = true;
        let outcome = if models.is_empty() {
            self.state = DirectoryState::Failed;
            FetchOutcome::Empty
        } else {
            self.state = DirectoryState::Ready;
            FetchOutcome::Loaded(models.len())
        };
        info!("Model directory for {}: {} model(s)", endpoint, models.len());
        self.cache.insert(endpoint, models.clone());
        self.models = models;
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::future::Future;
    use std::sync::Mutex;

    #[test]
    fn test_models_url_derivation() {
        assert_eq!(
            models_url("https://host/v1/chat/completions", None).as_deref(),
            Some("https://host/v1/models")
        );
        assert_eq!(
            models_url("http://box:3000/api/chat/completions", None).as_deref(),
            Some("http://box:3000/api/models")
        );
        assert_eq!(models_url("https://host/chat", None), None);
        assert_eq!(models_url("/v1/chat/completions", None), None);
        assert_eq!(models_url("", None), None);
        assert_eq!(
            models_url("https://host/chat", Some("https://host/list")).as_deref(),
            Some("https://host/list")
        );
    }

    #[test]
    fn test_parse_models() {
        let body = r#"{"object":"list","data":[{"id":"a","owned_by":"x"},{"id":"b"}]}"#;
        assert_eq!(parse_models(body), vec!["a", "b"]);
        assert!(parse_models("Error: Could not connect").is_empty());
        assert!(parse_models(r#"{"models":[]}"#).is_empty());
        assert!(parse_models(r#"{"data":[{"name":"a"}]}"#).is_empty());
    }

    #[test]
    fn test_resolve_default() {
        let models: Vec<String> = vec!["a".into(), "b".into(), "c".into()];
        assert_eq!(resolve_default(&models, Some("c")), Some(2));
        assert_eq!(resolve_default(&models, Some("zzz")), Some(0));
        assert_eq!(resolve_default(&models, None), Some(0));
        assert_eq!(resolve_default(&[], Some("a")), None);
    }

    struct Listing {
        body: String,
        gets: Mutex<Vec<String>>,
    }

    impl Transport for Listing {
        fn post_json(&self, _: String, _: String, _: String) -> impl Future<Output = String> + Send {
            async { String::new() }
        }

        fn get(&self, url: String, _: String) -> impl Future<Output = String> + Send {
            self.gets.lock().unwrap().push(url);
            let body = self.body.clone();
            async move { body }
        }

        fn probe(&self, _: String, _: String) -> impl Future<Output = bool> + Send {
            async { true }
        }
    }

    async fn settle(dir: &mut ModelDirectory) -> FetchOutcome {
        for _ in 0..50 {
            match dir.poll() {
                FetchOutcome::Pending => tokio::task::yield_now().await,
                done => return done,
            }
        }
        FetchOutcome::Pending
    }

    #[tokio::test]
    async fn test_fetch_selects_stored_default() {
        let transport = Arc::new(Listing {
            body: r#"{"data":[{"id":"a"},{"id":"b"}]}"#.into(),
            gets: Mutex::new(Vec::new()),
        });
        let mut dir = ModelDirectory::new();
        dir.begin_fetch(&transport, "http://h/v1/chat/completions", "", None, Some("b"));
        assert!(dir.is_fetching());
        assert_eq!(settle(&mut dir).await, FetchOutcome::Loaded(2));
        assert_eq!(dir.selected_model(), Some("b"));
        assert_eq!(dir.state(), DirectoryState::Ready);
        assert!(dir.is_loaded());
        assert_eq!(dir.cached("http://h/v1/chat/completions").map(|m| m.len()), Some(2));
        assert_eq!(*transport.gets.lock().unwrap(), vec!["http://h/v1/models".to_string()]);
    }

    #[tokio::test]
    async fn test_cached_list_served_while_refreshing() {
        let transport = Arc::new(Listing {
            body: r#"{"data":[{"id":"a"},{"id":"b"}]}"#.into(),
            gets: Mutex::new(Vec::new()),
        });
        let mut dir = ModelDirectory::new();
        dir.begin_fetch(&transport, "http://h/v1/chat/completions", "", None, None);
        settle(&mut dir).await;

        // Another endpoint starts from nothing
        dir.begin_fetch(&transport, "http://other/generate", "", None, None);
        assert!(dir.is_empty());
        assert_eq!(dir.selected(), None);
        assert_eq!(dir.poll(), FetchOutcome::Empty);

        // Going back serves the earlier list until the refresh lands
        dir.begin_fetch(&transport, "http://h/v1/chat/completions", "", None, Some("b"));
        assert!(dir.is_fetching());
        assert_eq!(dir.models(), ["a", "b"]);
        assert_eq!(dir.selected_model(), Some("b"));
        assert_eq!(settle(&mut dir).await, FetchOutcome::Loaded(2));
        assert_eq!(transport.gets.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_forgotten() {
        let transport = Arc::new(Listing {
            body: r#"{"data":[{"id":"a"}]}"#.into(),
            gets: Mutex::new(Vec::new()),
        });
        let mut dir = ModelDirectory::new();
        dir.begin_fetch(&transport, "http://h/v1/chat/completions", "", None, None);
        settle(&mut dir).await;
        assert_eq!(dir.selected_model(), Some("a"));

        dir.mark_unreachable("http://h/v1/chat/completions");
        assert!(dir.is_empty());
        assert_eq!(dir.selected(), None);
        assert_eq!(dir.state(), DirectoryState::Failed);
        assert_eq!(dir.cached("http://h/v1/chat/completions"), None);
    }

    #[tokio::test]
    async fn test_unrecognised_endpoint_makes_no_call() {
        let transport = Arc::new(Listing {
            body: String::new(),
            gets: Mutex::new(Vec::new()),
        });
        let mut dir = ModelDirectory::new();
        dir.begin_fetch(&transport, "http://h/generate", "", None, None);
        assert_eq!(dir.poll(), FetchOutcome::Empty);
        assert_eq!(dir.state(), DirectoryState::Failed);
        assert_eq!(dir.selected(), None);
        assert!(dir.is_loaded());
        assert!(transport.gets.lock().unwrap().is_empty());
    }
}
