//! Application state and the per-frame update.
//!
//! [`App::frame`] runs one step of the loop: reclaim released images,
//! advance animations and the request pipeline, turn the sampled pad into
//! gestures and dispatch them to the active screen. Rendering reads an
//! immutable [`Snapshot`] taken afterwards.

mod chat;
mod sessions;
pub mod settings;
pub mod state;

pub use chat::{toggle_reasoning, ChatView};
pub use settings::{ConnectFlow, ConnectOutcome, ConnectStatus};
pub use state::{CameraPhase, ChatModal, DeleteChoice, Focus, Screen, SessionSelection, SettingsField, SettingsModal};

use crate::anim::{dropdown_target, AnimationClock, FrameInputs};
use crate::camera::Camera;
use crate::input::{GestureClassifier, GestureEvent, KeyLatch, PadSample, StickMode};
use crate::keyboard::{EntryStatus, TextEntry};
use crate::layout::Metrics;
use crate::models::{FetchOutcome, ModelDirectory};
use crate::pipeline::{PipelineEvent, PipelinePhase, RequestPipeline, StepContext, Transport, DEFAULT_MODEL};
use crate::store::{ImageArena, ImageHandle, SessionStore, Settings};
use crate::ui::{Snapshot, UiContext};
use crate::wrap::WrapWidths;
use crate::{PadchatConfig, Result, Tuning};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Rows of a dropdown entry and the dropdown's frame.
const DROPDOWN_ROW: f32 = 1.0;
const DROPDOWN_PADDING: f32 = 2.0;

pub struct App<T: Transport> {
    config: PadchatConfig,
    tuning: Tuning,
    settings: Settings,
    store: SessionStore,
    images: ImageArena,
    directory: ModelDirectory,
    pipeline: RequestPipeline,
    transport: Arc<T>,
    camera: Box<dyn Camera>,
    keyboard: Box<dyn TextEntry>,
    keys: KeyLatch,
    gestures: GestureClassifier,
    clock: AnimationClock,
    screen: Screen,
    view: ChatView,
    staged_photo: Option<ImageHandle>,
    frame: u64,
    prev_pad: PadSample,
    /// The last connect flow found no usable endpoint
    connect_failed: bool,
    metrics: Metrics,
    widths: WrapWidths,
    screen_rows: i32,
    should_exit: bool,
}

impl<T: Transport> App<T> {
    /// Load settings and sessions from the data directory and start on a
    /// fresh chat.
    pub async fn new(
        config: PadchatConfig,
        transport: Arc<T>,
        camera: Box<dyn Camera>,
        keyboard: Box<dyn TextEntry>,
    ) -> Self {
        let mut settings = Settings::load(&config.settings_file()).await;
        if let Some(endpoint) = &config.endpoint_override {
            info!("Using endpoint {} for this run", endpoint);
            settings.endpoint = endpoint.clone();
        }

        let widths = WrapWidths::default();
        let mut images = ImageArena::new();
        let mut store = SessionStore::load(config.sessions_file(), &mut images).await;
        store.start_fresh();
        store.rewrap_all(widths);
        info!(
            "Loaded {} session(s), {} image(s) from {:?}",
            store.len(),
            images.live_count(),
            config.data_dir
        );

        let tuning = config.tuning.clone();
        Self {
            gestures: GestureClassifier::new(&tuning),
            tuning,
            settings,
            store,
            images,
            directory: ModelDirectory::new(),
            pipeline: RequestPipeline::new(),
            transport,
            camera,
            keyboard,
            keys: KeyLatch::new(),
            clock: AnimationClock::new(),
            screen: Screen::default(),
            view: ChatView::default(),
            staged_photo: None,
            frame: 0,
            prev_pad: PadSample::default(),
            connect_failed: false,
            metrics: Metrics::TERMINAL,
            widths,
            screen_rows: 24,
            should_exit: false,
            config,
        }
    }

    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    pub fn view(&self) -> &ChatView {
        &self.view
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn images(&self) -> &ImageArena {
        &self.images
    }

    pub fn directory(&self) -> &ModelDirectory {
        &self.directory
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn pipeline_phase(&self) -> PipelinePhase {
        self.pipeline.phase()
    }

    pub fn has_staged_photo(&self) -> bool {
        self.staged_photo.is_some()
    }

    pub fn connect_failed(&self) -> bool {
        self.connect_failed
    }

    pub fn frame_count(&self) -> u64 {
        self.frame
    }

    pub fn should_exit(&self) -> bool {
        self.should_exit
    }

    fn viewport(&self) -> i32 {
        self.metrics.viewport_height(self.screen_rows)
    }

    /// Route a terminal key: to the text entry while one is open,
    /// otherwise to the virtual pad.
    pub fn feed_key(&mut self, key: KeyEvent) {
        let interrupt = key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL);
        if !interrupt && self.screen.keyboard_open() && self.keyboard.is_active() {
            self.keyboard.handle_key(key);
        } else {
            self.keys.feed(key);
        }
    }

    /// Track the terminal size; wrapped lines follow the column count.
    pub fn resize(&mut self, columns: u16, rows: u16) {
        self.screen_rows = rows as i32;
        let widths = WrapWidths::for_columns(columns);
        if widths != self.widths {
            debug!("Rewrapping for {} columns", columns);
            self.widths = widths;
            self.store.rewrap_all(widths);
        }
        let viewport = self.viewport();
        self.view.clamp(self.store.current(), &self.metrics, viewport);
    }

    /// Advance the application by one frame.
    pub async fn frame(&mut self) {
        self.frame += 1;
        let reclaimed = self.images.begin_frame(self.frame);
        if reclaimed > 0 {
            debug!("Reclaimed {} image(s)", reclaimed);
        }

        if self.frame == 1 {
            self.start_model_fetch();
        }
        match self.directory.poll() {
            FetchOutcome::Pending => {}
            FetchOutcome::Loaded(count) => debug!("{} model(s) available", count),
            FetchOutcome::Empty => debug!("No models available"),
        }

        self.animate();
        self.step_pipeline().await;

        let pad = self.keys.sample();
        if self.keys.take_interrupt() {
            info!("Interrupted");
            self.should_exit = true;
            return;
        }
        let mode = match self.screen {
            Screen::Chat {
                modal: ChatModal::None,
            } => StickMode::MessageScroll,
            _ => StickMode::ListNavigation,
        };
        let events = self.gestures.update(&self.prev_pad, &pad, mode);
        self.prev_pad = pad;
        for event in events {
            match event {
                GestureEvent::HoldComplete => {
                    info!("Exit requested");
                    self.should_exit = true;
                    return;
                }
                GestureEvent::HoldProgress(_) => {}
                other => self.dispatch(other).await,
            }
        }

        self.poll_keyboard().await;
        self.tick_connect().await;
    }

    fn start_model_fetch(&mut self) {
        let endpoint = &self.settings.endpoint;
        self.directory.begin_fetch(
            &self.transport,
            endpoint,
            &self.settings.api_key,
            self.settings.models_override(endpoint),
            self.settings.default_model(),
        );
    }

    fn animate(&mut self) {
        let dropdown_items = match self.screen {
            Screen::Chat {
                modal: ChatModal::ModelDropdown { .. },
            }
            | Screen::Settings {
                modal: SettingsModal::ModelDropdown { .. },
                ..
            } => self.directory.models().len(),
            _ => 0,
        };
        let dropdown = if dropdown_items > 0 {
            dropdown_target(dropdown_items, DROPDOWN_ROW, DROPDOWN_PADDING)
        } else {
            0.0
        };
        let camera_open = matches!(
            self.screen,
            Screen::Chat {
                modal: ChatModal::Camera(_)
            }
        );
        self.clock.tick(
            &self.tuning,
            FrameInputs {
                models_loaded: self.directory.is_loaded(),
                camera_open,
                dropdown_target: dropdown,
            },
        );
        self.store.fade_in_all(self.tuning.message_fade_speed);
    }

    async fn step_pipeline(&mut self) {
        let images_dir = self.config.images_dir();
        let model = self.directory.selected_model().unwrap_or(DEFAULT_MODEL);
        let event = self
            .pipeline
            .step(StepContext {
                store: &mut self.store,
                images: &mut self.images,
                transport: &self.transport,
                images_dir: &images_dir,
                endpoint: &self.settings.endpoint,
                api_key: &self.settings.api_key,
                model,
                widths: self.widths,
            })
            .await;

        let viewport = self.viewport();
        if let Some(PipelineEvent::ReplyAppended { session }) = event {
            if session == self.store.current_index() {
                self.view.follow_latest(self.store.current(), &self.metrics, viewport);
            }
        }
        self.view.clamp(self.store.current(), &self.metrics, viewport);
    }

    async fn dispatch(&mut self, event: GestureEvent) {
        if self.screen.keyboard_open() {
            return;
        }
        let screen = std::mem::take(&mut self.screen);
        self.screen = match screen {
            Screen::Chat { modal } => self.chat_event(modal, event),
            Screen::Settings { field, modal } => self.settings_event(field, modal, event).await,
            Screen::Sessions { selection, confirm } => self.sessions_event(selection, confirm, event).await,
        };
    }

    async fn poll_keyboard(&mut self) {
        if !self.screen.keyboard_open() {
            return;
        }
        let status = self.keyboard.poll();
        if status == EntryStatus::Running {
            return;
        }
        let screen = std::mem::take(&mut self.screen);
        self.screen = match screen {
            Screen::Chat { .. } => {
                self.chat_entry_done(status);
                Screen::default()
            }
            Screen::Settings {
                field,
                modal: SettingsModal::Keyboard(edited),
            } => Screen::Settings {
                field,
                modal: self.settings_entry_done(edited, status).await,
            },
            other => other,
        };
    }

    /// Immutable view of everything the renderer draws.
    pub fn snapshot(&self) -> Snapshot<'_> {
        let entry = if self.screen.keyboard_open() {
            self.keyboard.view()
        } else {
            None
        };
        let camera_frame = match self.screen {
            Screen::Chat {
                modal: ChatModal::Camera(_),
            } => self.camera.frame(),
            _ => None,
        };
        Snapshot {
            frame: self.frame,
            fps: self.tuning.fps,
            screen: &self.screen,
            view: self.view,
            store: &self.store,
            images: &self.images,
            directory: &self.directory,
            settings: &self.settings,
            clock: self.clock,
            overlay_target: self.tuning.camera_overlay_alpha,
            hold: self.gestures.hold_fraction(),
            entry,
            camera_frame,
            camera_device: self.camera.device(),
            staged_photo: self.staged_photo.as_ref().map(ImageHandle::id),
            pipeline: self.pipeline.phase(),
            connect_failed: self.connect_failed,
            metrics: self.metrics,
            widths: self.widths,
        }
    }

    /// Run frames at the configured rate until exit is requested.
    pub async fn run(&mut self, ui: &mut UiContext) -> Result<()> {
        let (columns, rows) = ui.size()?;
        self.resize(columns, rows);

        let mut ticker = tokio::time::interval(Duration::from_secs_f32(self.tuning.frame_quantum()));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!("Frame loop running at {} fps", self.tuning.fps);

        while !self.should_exit {
            ticker.tick().await;
            while event::poll(Duration::ZERO)? {
                match event::read()? {
                    Event::Key(key) => self.feed_key(key),
                    Event::Resize(columns, rows) => self.resize(columns, rows),
                    _ => {}
                }
            }
            self.frame().await;
            ui.draw(&self.snapshot())?;
        }

        self.shutdown().await;
        Ok(())
    }

    /// Stop in-flight work, save sessions and drop every image.
    pub async fn shutdown(&mut self) {
        if !self.pipeline.is_idle() {
            warn!("Exiting with a request in flight");
        }
        self.pipeline.cancel();
        if self.camera.is_open() {
            self.camera.close();
        }
        self.store.persist().await;
        if let Some(photo) = self.staged_photo.take() {
            self.images.release(photo);
        }
        self.store.release_images(&mut self.images);
        self.images.begin_frame(self.frame + 1);
        info!("Shut down after {} frame(s)", self.frame);
    }
}
