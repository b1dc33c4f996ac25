//! Submit → fade in → call → reply, driven one step per frame.
//!
//! The user message is appended and persisted before the network call is
//! issued, and the reply (or error text) is appended and persisted when it
//! arrives. The call runs on a tokio task; the frame loop polls its
//! oneshot channel so input and animation keep running meanwhile.

pub mod request;
pub mod response;
pub mod transport;

pub use request::{ChatRequest, DEFAULT_MODEL};
pub use response::{parse_reply, ParsedReply};
pub use transport::{HttpTransport, Transport};

use crate::store::images::{encode_png, image_path, png_data_url, save_png};
use crate::store::{index_after_delete, ImageArena, ImageHandle, Message, SessionStore};
use crate::wrap::WrapWidths;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub const ENCODE_FAILED_REPLY: &str = "Error: Could not encode image.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelinePhase {
    Idle,
    FadingIn,
    AwaitingReply,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineEvent {
    /// The user message was persisted and the call issued
    RequestSent { session: usize },
    /// An assistant message was appended to `session`
    ReplyAppended { session: usize },
}

#[derive(Debug)]
enum State {
    Idle,
    FadingIn {
        session: usize,
        message: usize,
    },
    AwaitingReply {
        session: usize,
        reply: oneshot::Receiver<String>,
        task: JoinHandle<()>,
    },
}

/// Everything one pipeline step may touch.
pub struct StepContext<'a, T> {
    pub store: &'a mut SessionStore,
    pub images: &'a mut ImageArena,
    pub transport: &'a Arc<T>,
    pub images_dir: &'a Path,
    pub endpoint: &'a str,
    pub api_key: &'a str,
    pub model: &'a str,
    pub widths: WrapWidths,
}

#[derive(Debug)]
pub struct RequestPipeline {
    state: State,
}

impl Default for RequestPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestPipeline {
    pub fn new() -> Self {
        Self { state: State::Idle }
    }

    pub fn phase(&self) -> PipelinePhase {
        match self.state {
            State::Idle => PipelinePhase::Idle,
            State::FadingIn { .. } => PipelinePhase::FadingIn,
            State::AwaitingReply { .. } => PipelinePhase::AwaitingReply,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, State::Idle)
    }

    /// Session the in-flight work belongs to.
    pub fn session(&self) -> Option<usize> {
        match self.state {
            State::Idle => None,
            State::FadingIn { session, .. } | State::AwaitingReply { session, .. } => Some(session),
        }
    }

    /// Append a user message (with the staged photo, if any) to the current
    /// session and start fading it in. Returns the photo back when busy.
    pub fn submit(
        &mut self,
        store: &mut SessionStore,
        text: String,
        photo: Option<ImageHandle>,
        widths: WrapWidths,
    ) -> Result<(), Option<ImageHandle>> {
        if !self.is_idle() {
            return Err(photo);
        }
        let mut msg = Message::user(text);
        msg.image = photo;
        msg.rewrap_cells(widths);

        let session = store.current_index();
        store.current_mut().push(msg);
        let message = store.current().len() - 1;
        debug!("Submitted message {} in session {}", message, session);
        self.state = State::FadingIn { session, message };
        Ok(())
    }

    /// Advance by one frame.
    pub async fn step<T: Transport>(&mut self, ctx: StepContext<'_, T>) -> Option<PipelineEvent> {
        match &mut self.state {
            State::Idle => None,
            State::FadingIn { session, message } => {
                let (session, message) = (*session, *message);
                let faded = ctx
                    .store
                    .session(session)
                    .and_then(|s| s.get(message))
                    .map(|m| m.alpha == u8::MAX);
                match faded {
                    None => {
                        warn!("Submitted message vanished before sending");
                        self.state = State::Idle;
                        None
                    }
                    Some(false) => None,
                    Some(true) => Some(self.send(ctx, session, message).await),
                }
            }
            State::AwaitingReply { session, reply, .. } => {
                let session = *session;
                let body = match reply.try_recv() {
                    Ok(body) => body,
                    Err(oneshot::error::TryRecvError::Empty) => return None,
                    Err(oneshot::error::TryRecvError::Closed) => {
                        "Error: Request was interrupted".to_string()
                    }
                };
                self.state = State::Idle;
                Some(append_reply(ctx.store, session, &body, ctx.widths).await)
            }
        }
    }

    async fn send<T: Transport>(
        &mut self,
        ctx: StepContext<'_, T>,
        session: usize,
        message: usize,
    ) -> PipelineEvent {
        let photo = ctx
            .store
            .session(session)
            .and_then(|s| s.get(message))
            .and_then(|m| m.image.as_ref())
            .map(|h| h.id());

        let mut png = None;
        if let Some(id) = photo {
            let encoded = ctx.images.get(id).map(encode_png);
            match encoded {
                Some(Ok(bytes)) => {
                    let path = image_path(ctx.images_dir, session, message);
                    match save_png(&bytes, &path).await {
                        Ok(()) => {
                            if let Some(msg) = ctx.store.session_mut(session).and_then(|s| s.get_mut(message)) {
                                msg.image_path = Some(path);
                            }
                        }
                        Err(e) => warn!("Failed to save photo to {:?}: {}", path, e),
                    }
                    png = Some(bytes);
                }
                Some(Err(e)) => warn!("Failed to encode photo: {}", e),
                None => warn!("Attached photo is no longer available"),
            }
        }

        ctx.store.persist().await;

        let Some(history) = ctx.store.session(session) else {
            self.state = State::Idle;
            return PipelineEvent::RequestSent { session };
        };

        let request = match (photo, png) {
            (Some(_), None) => {
                self.state = State::Idle;
                return append_reply(ctx.store, session, ENCODE_FAILED_REPLY, ctx.widths).await;
            }
            (Some(_), Some(bytes)) => {
                let text = history.get(message).map_or("", |m| m.text.as_str());
                ChatRequest::with_image(ctx.model, text, png_data_url(&bytes))
            }
            (None, _) => ChatRequest::from_history(ctx.model, history),
        };

        let body = match serde_json::to_string(&request) {
            Ok(body) => body,
            Err(e) => {
                self.state = State::Idle;
                let text = format!("Error: Could not build request: {e}");
                return append_reply(ctx.store, session, &text, ctx.widths).await;
            }
        };

        info!(
            "Sending {} message(s) to {} with model {}",
            request.messages.len(),
            ctx.endpoint,
            ctx.model
        );
        let (tx, rx) = oneshot::channel();
        let transport = Arc::clone(ctx.transport);
        let url = ctx.endpoint.to_string();
        let api_key = ctx.api_key.to_string();
        let task = tokio::spawn(async move {
            let reply = transport.post_json(url, body, api_key).await;
            let _ = tx.send(reply);
        });

        self.state = State::AwaitingReply {
            session,
            reply: rx,
            task,
        };
        PipelineEvent::RequestSent { session }
    }

    /// Follow a session deletion. Work for the deleted session is dropped.
    pub fn on_session_deleted(&mut self, deleted: usize) {
        let remapped = match &mut self.state {
            State::Idle => return,
            State::FadingIn { session, .. } | State::AwaitingReply { session, .. } => {
                match index_after_delete(*session, deleted) {
                    Some(index) => {
                        *session = index;
                        true
                    }
                    None => false,
                }
            }
        };
        if !remapped {
            warn!("Session {} was deleted while its request was in flight; dropping reply", deleted);
            self.cancel();
        }
    }

    /// Abort any in-flight call and return to idle.
    pub fn cancel(&mut self) {
        if let State::AwaitingReply { task, .. } = std::mem::replace(&mut self.state, State::Idle) {
            task.abort();
        }
    }
}

async fn append_reply(store: &mut SessionStore, session: usize, body: &str, widths: WrapWidths) -> PipelineEvent {
    let parsed = parse_reply(body);
    let mut msg = Message::assistant(parsed.content, parsed.reasoning);
    msg.rewrap_cells(widths);
    match store.session_mut(session) {
        Some(messages) => messages.push(msg),
        None => warn!("Reply for missing session {} dropped", session),
    }
    store.persist().await;
    PipelineEvent::ReplyAppended { session }
}
