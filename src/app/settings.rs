//! Settings screen: field editing and the connect flow.

use super::state::{Screen, SettingsField, SettingsModal};
use super::App;
use crate::input::{Direction, GestureEvent};
use crate::keyboard::EntryStatus;
use crate::models::ModelDirectory;
use crate::pipeline::Transport;
use crate::store::Settings;
use crate::Tuning;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// What the connecting popup shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectStatus {
    Connecting,
    Fetching,
    Failed,
    Done,
}

/// Result of a finished connect flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOutcome {
    pub failed: bool,
    /// Default model to store once the endpoint proved reachable
    pub commit_default: Option<String>,
}

#[derive(Debug)]
enum ConnectPhase {
    Waiting,
    Probing(oneshot::Receiver<bool>),
    Probed,
    Fetching,
    Finished { failed: bool },
}

/// Probe → fetch sequence behind the connecting popup.
///
/// The probe starts at `probe_frame`, the model fetch no earlier than
/// `fetch_frame`, and the popup stays up for at least `min_popup_frames`.
#[derive(Debug)]
pub struct ConnectFlow {
    frame: u32,
    phase: ConnectPhase,
    commit_default: Option<String>,
}

impl ConnectFlow {
    pub fn new(commit_default: Option<String>) -> Self {
        Self {
            frame: 0,
            phase: ConnectPhase::Waiting,
            commit_default,
        }
    }

    pub fn frame(&self) -> u32 {
        self.frame
    }

    pub fn status(&self) -> ConnectStatus {
        match self.phase {
            ConnectPhase::Waiting | ConnectPhase::Probing(_) | ConnectPhase::Probed => ConnectStatus::Connecting,
            ConnectPhase::Fetching => ConnectStatus::Fetching,
            ConnectPhase::Finished { failed: true } => ConnectStatus::Failed,
            ConnectPhase::Finished { failed: false } => ConnectStatus::Done,
        }
    }

    /// Advance one frame. Returns the outcome once the popup may close.
    ///
    /// The directory is expected to be polled by the caller every frame;
    /// the flow only watches its state.
    pub fn tick<T: Transport>(
        &mut self,
        tuning: &Tuning,
        transport: &Arc<T>,
        settings: &Settings,
        directory: &mut ModelDirectory,
    ) -> Option<ConnectOutcome> {
        self.frame += 1;
        match &mut self.phase {
            ConnectPhase::Waiting => {
                if self.frame >= tuning.probe_frame {
                    self.phase = self.start_probe(transport, settings);
                }
            }
            ConnectPhase::Probing(reply) => match reply.try_recv() {
                Ok(true) => {
                    debug!("Endpoint {} is reachable", settings.endpoint);
                    self.phase = ConnectPhase::Probed;
                }
                Ok(false) | Err(oneshot::error::TryRecvError::Closed) => {
                    info!("Endpoint {} is unreachable", settings.endpoint);
                    self.phase = ConnectPhase::Finished { failed: true };
                }
                Err(oneshot::error::TryRecvError::Empty) => {}
            },
            ConnectPhase::Probed => {
                if self.frame >= tuning.fetch_frame {
                    let stored = self.commit_default.as_deref().or(settings.default_model());
                    directory.begin_fetch(
                        transport,
                        &settings.endpoint,
                        &settings.api_key,
                        settings.models_override(&settings.endpoint),
                        stored,
                    );
                    self.phase = ConnectPhase::Fetching;
                }
            }
            ConnectPhase::Fetching => {
                if !directory.is_fetching() {
                    self.phase = ConnectPhase::Finished {
                        failed: directory.is_empty(),
                    };
                }
            }
            ConnectPhase::Finished { failed } => {
                if self.frame >= tuning.min_popup_frames {
                    return Some(ConnectOutcome {
                        failed: *failed,
                        commit_default: self.commit_default.take(),
                    });
                }
            }
        }
        None
    }

    fn start_probe<T: Transport>(&self, transport: &Arc<T>, settings: &Settings) -> ConnectPhase {
        if settings.endpoint.trim().is_empty() {
            info!("No endpoint configured");
            return ConnectPhase::Finished { failed: true };
        }
        let (tx, rx) = oneshot::channel();
        let transport = Arc::clone(transport);
        let url = settings.endpoint.clone();
        let api_key = settings.api_key.clone();
        tokio::spawn(async move {
            let reachable = transport.probe(url, api_key).await;
            let _ = tx.send(reachable);
        });
        ConnectPhase::Probing(rx)
    }
}

impl<T: Transport> App<T> {
    pub(super) async fn settings_event(
        &mut self,
        field: SettingsField,
        modal: SettingsModal,
        event: GestureEvent,
    ) -> Screen {
        let modal = match modal {
            SettingsModal::None => return self.settings_field_event(field, event),
            SettingsModal::ModelDropdown { hovered } => self.settings_dropdown_event(hovered, event),
            // Text entry and the connecting popup own their input
            other => other,
        };
        Screen::Settings { field, modal }
    }

    fn settings_field_event(&mut self, field: SettingsField, event: GestureEvent) -> Screen {
        let modal = SettingsModal::None;
        match event {
            GestureEvent::FocusMove(Direction::Up) => Screen::Settings { field: field.up(), modal },
            GestureEvent::FocusMove(Direction::Down) => Screen::Settings { field: field.down(), modal },
            GestureEvent::Cancel => Screen::default(),
            GestureEvent::Activate => {
                let modal = match field {
                    SettingsField::Endpoint => {
                        self.keyboard.start(field.label(), &self.settings.endpoint, false);
                        SettingsModal::Keyboard(field)
                    }
                    SettingsField::ApiKey => {
                        self.keyboard.start(field.label(), &self.settings.api_key, true);
                        SettingsModal::Keyboard(field)
                    }
                    SettingsField::DefaultModel if self.directory.is_empty() => SettingsModal::None,
                    SettingsField::DefaultModel => {
                        let hovered = self
                            .settings
                            .default_model()
                            .and_then(|name| self.directory.models().iter().position(|m| m == name))
                            .unwrap_or(0);
                        SettingsModal::ModelDropdown { hovered }
                    }
                };
                Screen::Settings { field, modal }
            }
            _ => Screen::Settings { field, modal },
        }
    }

    fn settings_dropdown_event(&mut self, hovered: usize, event: GestureEvent) -> SettingsModal {
        let last = self.directory.models().len().saturating_sub(1);
        match event {
            GestureEvent::FocusMove(Direction::Up) => SettingsModal::ModelDropdown {
                hovered: hovered.saturating_sub(1),
            },
            GestureEvent::FocusMove(Direction::Down) => SettingsModal::ModelDropdown {
                hovered: (hovered + 1).min(last),
            },
            GestureEvent::Activate => match self.directory.models().get(hovered) {
                Some(model) => {
                    info!("Validating endpoint before storing default model {}", model);
                    SettingsModal::Connecting(ConnectFlow::new(Some(model.clone())))
                }
                None => SettingsModal::None,
            },
            GestureEvent::Cancel => SettingsModal::None,
            _ => SettingsModal::ModelDropdown { hovered },
        }
    }

    /// Apply a finished settings text entry.
    pub(super) async fn settings_entry_done(&mut self, field: SettingsField, status: EntryStatus) -> SettingsModal {
        let EntryStatus::Finished(text) = status else {
            return SettingsModal::None;
        };
        let target = match field {
            SettingsField::Endpoint => &mut self.settings.endpoint,
            SettingsField::ApiKey => &mut self.settings.api_key,
            SettingsField::DefaultModel => return SettingsModal::None,
        };
        if *target == text {
            return SettingsModal::None;
        }
        *target = text;
        match field {
            SettingsField::Endpoint => info!("Endpoint changed to {}", self.settings.endpoint),
            _ => info!("API key changed"),
        }
        self.settings.persist(&self.config.settings_file()).await;
        SettingsModal::Connecting(ConnectFlow::new(None))
    }

    /// Drive an open connecting popup by one frame.
    pub(super) async fn tick_connect(&mut self) {
        let Screen::Settings {
            modal: SettingsModal::Connecting(flow),
            ..
        } = &mut self.screen
        else {
            return;
        };
        let Some(outcome) = flow.tick(&self.tuning, &self.transport, &self.settings, &mut self.directory) else {
            return;
        };
        if let Screen::Settings { modal, .. } = &mut self.screen {
            *modal = SettingsModal::None;
        }

        self.connect_failed = outcome.failed;
        if outcome.failed {
            warn!("Connection to {} failed", self.settings.endpoint);
            self.directory.mark_unreachable(&self.settings.endpoint);
            return;
        }
        if let Some(model) = outcome.commit_default {
            if let Some(index) = self.directory.models().iter().position(|m| *m == model) {
                self.directory.select(index);
            }
            info!("Default model for {} set to {}", self.settings.endpoint, model);
            self.settings.set_default_model(model);
            self.settings.persist(&self.config.settings_file()).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::Future;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Endpoint {
        reachable: bool,
        models: &'static str,
        probes: AtomicUsize,
    }

    impl Endpoint {
        fn new(reachable: bool, models: &'static str) -> Arc<Self> {
            Arc::new(Self {
                reachable,
                models,
                probes: AtomicUsize::new(0),
            })
        }
    }

    impl Transport for Endpoint {
        fn post_json(&self, _: String, _: String, _: String) -> impl Future<Output = String> + Send {
            async { String::new() }
        }

        fn get(&self, _: String, _: String) -> impl Future<Output = String> + Send {
            let body = self.models.to_string();
            async move { body }
        }

        fn probe(&self, _: String, _: String) -> impl Future<Output = bool> + Send {
            self.probes.fetch_add(1, Ordering::SeqCst);
            let reachable = self.reachable;
            async move { reachable }
        }
    }

    fn settings(endpoint: &str) -> Settings {
        Settings {
            endpoint: endpoint.to_string(),
            ..Default::default()
        }
    }

    /// Tick like the frame loop does until the flow finishes.
    async fn drive(
        flow: &mut ConnectFlow,
        transport: &Arc<Endpoint>,
        settings: &Settings,
        directory: &mut ModelDirectory,
    ) -> (ConnectOutcome, Vec<ConnectStatus>) {
        let tuning = Tuning::default();
        let mut seen = Vec::new();
        for _ in 0..500 {
            directory.poll();
            if let Some(outcome) = flow.tick(&tuning, transport, settings, directory) {
                return (outcome, seen);
            }
            if seen.last() != Some(&flow.status()) {
                seen.push(flow.status());
            }
            tokio::task::yield_now().await;
        }
        panic!("connect flow never finished");
    }

    #[tokio::test]
    async fn test_probe_then_fetch_then_close() {
        let transport = Endpoint::new(true, r#"{"data":[{"id":"a"},{"id":"b"}]}"#);
        let settings = settings("http://h/v1/chat/completions");
        let mut directory = ModelDirectory::new();
        let mut flow = ConnectFlow::new(Some("b".into()));

        let (outcome, seen) = drive(&mut flow, &transport, &settings, &mut directory).await;
        assert!(!outcome.failed);
        assert_eq!(outcome.commit_default.as_deref(), Some("b"));
        assert_eq!(
            seen,
            vec![ConnectStatus::Connecting, ConnectStatus::Fetching, ConnectStatus::Done]
        );
        assert!(flow.frame() >= Tuning::default().min_popup_frames);
        assert_eq!(directory.selected_model(), Some("b"));
        assert_eq!(transport.probes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_endpoint_fails_without_probe() {
        let transport = Endpoint::new(true, "");
        let settings = settings("  ");
        let mut directory = ModelDirectory::new();
        let mut flow = ConnectFlow::new(None);

        let (outcome, _) = drive(&mut flow, &transport, &settings, &mut directory).await;
        assert!(outcome.failed);
        assert_eq!(transport.probes.load(Ordering::SeqCst), 0);
        assert!(!directory.is_loaded());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_skips_fetch() {
        let transport = Endpoint::new(false, r#"{"data":[{"id":"a"}]}"#);
        let settings = settings("http://h/v1/chat/completions");
        let mut directory = ModelDirectory::new();
        let mut flow = ConnectFlow::new(Some("a".into()));

        let (outcome, seen) = drive(&mut flow, &transport, &settings, &mut directory).await;
        assert!(outcome.failed);
        assert!(!seen.contains(&ConnectStatus::Fetching));
        assert!(directory.is_empty());
    }

    #[tokio::test]
    async fn test_empty_model_list_counts_as_failure() {
        let transport = Endpoint::new(true, r#"{"data":[]}"#);
        let settings = settings("http://h/v1/chat/completions");
        let mut directory = ModelDirectory::new();
        let mut flow = ConnectFlow::new(None);

        let (outcome, _) = drive(&mut flow, &transport, &settings, &mut directory).await;
        assert!(outcome.failed);
    }
}
