//! Chat screen: message navigation, focus, camera and model dropdown.

use super::state::{CameraPhase, ChatModal, Focus, Screen};
use super::App;
use crate::input::{Direction, GestureEvent, MessageStep};
use crate::keyboard::EntryStatus;
use crate::layout::{clamp_scroll, max_scroll, Metrics};
use crate::pipeline::Transport;
use crate::store::{Message, Sender};
use tracing::{debug, info, warn};

/// Scroll position, hover and focus of the chat screen.
///
/// Kept outside [`Screen`] so visiting another screen does not lose it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChatView {
    pub focus: Focus,
    pub hovered: Option<usize>,
    pub scroll_offset: i32,
}

impl ChatView {
    /// Forget position and hover, as after switching session.
    pub fn reset(&mut self) {
        self.hovered = None;
        self.scroll_offset = 0;
    }

    /// Move the hover one message and ease the scroll a third of the way
    /// toward centring it.
    pub fn select(&mut self, step: MessageStep, messages: &[Message], metrics: &Metrics, viewport: i32) {
        let Some(last) = messages.len().checked_sub(1) else {
            return;
        };
        let index = match (step, self.hovered) {
            (MessageStep::Previous, None) => last,
            (MessageStep::Previous, Some(i)) => i.saturating_sub(1).min(last),
            (MessageStep::Next, None) => 0,
            (MessageStep::Next, Some(i)) => (i + 1).min(last),
        };
        let Some(message) = messages.get(index) else {
            return;
        };
        self.hovered = Some(index);

        let top = metrics.message_top(messages, index);
        let height = metrics.message_height(message);
        let target = top - viewport / 2 + height / 2;
        self.scroll_offset += (target - self.scroll_offset) / 3;
        self.scroll_offset = clamp_scroll(self.scroll_offset, metrics.content_height(messages), viewport);
    }

    /// Continuous scroll. The hover follows the message under the middle
    /// of the viewport, pinning to the first or last message at the ends.
    pub fn scroll_by(&mut self, delta: i32, messages: &[Message], metrics: &Metrics, viewport: i32) {
        if messages.is_empty() {
            return;
        }
        let content = metrics.content_height(messages);
        let limit = max_scroll(content, viewport);
        self.scroll_offset = clamp_scroll(self.scroll_offset.saturating_add(delta), content, viewport);

        self.hovered = if delta < 0 && self.scroll_offset == 0 {
            Some(0)
        } else if delta > 0 && self.scroll_offset >= limit {
            Some(messages.len() - 1)
        } else {
            metrics.message_at(messages, self.scroll_offset + viewport / 2)
        };
    }

    /// Jump to the end of the history.
    pub fn follow_latest(&mut self, messages: &[Message], metrics: &Metrics, viewport: i32) {
        self.scroll_offset = max_scroll(metrics.content_height(messages), viewport);
    }

    /// Keep the offset valid after the content changed size.
    pub fn clamp(&mut self, messages: &[Message], metrics: &Metrics, viewport: i32) {
        self.scroll_offset = clamp_scroll(self.scroll_offset, metrics.content_height(messages), viewport);
        if self.hovered.is_some_and(|i| i >= messages.len()) {
            self.hovered = None;
        }
    }
}

/// Show or hide reasoning on the hovered message, or on the latest
/// assistant message that has some when nothing is hovered.
pub fn toggle_reasoning(messages: &mut [Message], hovered: Option<usize>) -> bool {
    let target = match hovered {
        Some(i) => messages
            .get_mut(i)
            .filter(|m| m.sender == Sender::Assistant && m.has_reasoning()),
        None => messages
            .iter_mut()
            .rev()
            .find(|m| m.sender == Sender::Assistant && m.has_reasoning()),
    };
    match target {
        Some(msg) => {
            msg.show_reasoning = !msg.show_reasoning;
            true
        }
        None => false,
    }
}

/// Step a wrapping list cursor.
pub(super) fn wrap_step(index: usize, len: usize, direction: Direction) -> usize {
    match direction {
        _ if len == 0 => 0,
        Direction::Up => (index + len - 1) % len,
        Direction::Down => (index + 1) % len,
        _ => index,
    }
}

impl<T: Transport> App<T> {
    pub(super) fn chat_event(&mut self, modal: ChatModal, event: GestureEvent) -> Screen {
        match modal {
            ChatModal::None => self.chat_focus_event(event),
            ChatModal::Camera(phase) => Screen::Chat {
                modal: self.camera_event(phase, event),
            },
            ChatModal::ModelDropdown { hovered } => Screen::Chat {
                modal: self.chat_dropdown_event(hovered, event),
            },
            ChatModal::Keyboard => Screen::Chat { modal },
        }
    }

    fn chat_focus_event(&mut self, event: GestureEvent) -> Screen {
        let viewport = self.viewport();
        let modal = match event {
            GestureEvent::FocusMove(direction) => {
                self.view.focus = self.view.focus.moved(direction, !self.directory.is_empty());
                ChatModal::None
            }
            GestureEvent::SelectMessage(step) => {
                self.view.select(step, self.store.current(), &self.metrics, viewport);
                ChatModal::None
            }
            GestureEvent::ScrollBy(delta) => {
                self.view.scroll_by(delta, self.store.current(), &self.metrics, viewport);
                ChatModal::None
            }
            GestureEvent::Cancel => {
                self.view.hovered = None;
                ChatModal::None
            }
            GestureEvent::ToggleReasoning => {
                let hovered = self.view.hovered;
                if toggle_reasoning(self.store.current_mut(), hovered) {
                    self.view.clamp(self.store.current(), &self.metrics, viewport);
                }
                ChatModal::None
            }
            GestureEvent::Activate => return self.activate_focus(),
            _ => ChatModal::None,
        };
        Screen::Chat { modal }
    }

    fn activate_focus(&mut self) -> Screen {
        let has_models = !self.directory.is_empty();
        let modal = match self.view.focus {
            Focus::InputPill if has_models => {
                self.keyboard.start("Message", "", false);
                ChatModal::Keyboard
            }
            Focus::ModelPill if has_models => ChatModal::ModelDropdown {
                hovered: self.directory.selected().unwrap_or(0),
            },
            Focus::Camera if has_models => self.open_camera(),
            Focus::Settings => return Screen::settings(),
            Focus::Sessions => return Screen::sessions(),
            _ => ChatModal::None,
        };
        Screen::Chat { modal }
    }

    fn open_camera(&mut self) -> ChatModal {
        if let Some(photo) = self.staged_photo.take() {
            self.images.release(photo);
        }
        match self.camera.open() {
            Ok(()) => {
                info!("Camera opened ({:?})", self.camera.device());
                ChatModal::Camera(CameraPhase::LiveView)
            }
            Err(e) => {
                warn!("Camera unavailable: {}", e);
                ChatModal::None
            }
        }
    }

    fn camera_event(&mut self, phase: CameraPhase, event: GestureEvent) -> ChatModal {
        match (phase, event) {
            (_, GestureEvent::ToggleReasoning) => {
                self.camera.toggle_device();
                debug!("Camera switched to {:?}", self.camera.device());
                ChatModal::Camera(phase)
            }
            (CameraPhase::LiveView, GestureEvent::Capture) => match self.camera.capture() {
                Some(frame) => {
                    self.staged_photo = Some(self.images.insert(frame));
                    ChatModal::Camera(CameraPhase::Review)
                }
                None => ChatModal::Camera(phase),
            },
            (CameraPhase::LiveView, GestureEvent::Cancel) => {
                if let Some(photo) = self.staged_photo.take() {
                    self.images.release(photo);
                }
                self.camera.close();
                ChatModal::None
            }
            (CameraPhase::Review, GestureEvent::Retake) => {
                if let Some(photo) = self.staged_photo.take() {
                    self.images.release(photo);
                }
                ChatModal::Camera(CameraPhase::LiveView)
            }
            (CameraPhase::Review, GestureEvent::Cancel) => {
                self.camera.close();
                ChatModal::None
            }
            _ => ChatModal::Camera(phase),
        }
    }

    fn chat_dropdown_event(&mut self, hovered: usize, event: GestureEvent) -> ChatModal {
        let len = self.directory.models().len();
        match event {
            GestureEvent::FocusMove(direction @ (Direction::Up | Direction::Down)) => ChatModal::ModelDropdown {
                hovered: wrap_step(hovered, len, direction),
            },
            GestureEvent::Activate => {
                self.directory.select(hovered);
                if let Some(model) = self.directory.selected_model() {
                    info!("Model selected: {}", model);
                }
                ChatModal::None
            }
            GestureEvent::Cancel => ChatModal::None,
            _ => ChatModal::ModelDropdown { hovered },
        }
    }

    /// Apply a finished chat text entry.
    pub(super) fn chat_entry_done(&mut self, status: EntryStatus) {
        let EntryStatus::Finished(text) = status else {
            return;
        };
        if text.trim().is_empty() && self.staged_photo.is_none() {
            debug!("Ignoring empty message");
            return;
        }
        let photo = self.staged_photo.take();
        match self.pipeline.submit(&mut self.store, text, photo, self.widths) {
            Ok(()) => {
                let viewport = self.viewport();
                self.view.follow_latest(self.store.current(), &self.metrics, viewport);
            }
            Err(photo) => {
                warn!("A request is already in flight; message not sent");
                self.staged_photo = photo;
            }
        }
    }
}
