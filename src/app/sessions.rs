//! Session list: switch, create and delete conversations.

use super::state::{DeleteChoice, Screen, SessionSelection};
use super::App;
use crate::input::{Direction, GestureEvent};
use crate::pipeline::Transport;
use tracing::info;

impl<T: Transport> App<T> {
    pub(super) async fn sessions_event(
        &mut self,
        selection: SessionSelection,
        confirm: Option<DeleteChoice>,
        event: GestureEvent,
    ) -> Screen {
        match confirm {
            Some(choice) => self.confirm_event(selection, choice, event).await,
            None => self.list_event(selection, event).await,
        }
    }

    async fn list_event(&mut self, selection: SessionSelection, event: GestureEvent) -> Screen {
        let count = self.store.len();
        let selection = match event {
            GestureEvent::FocusMove(Direction::Up) => selection.up(count),
            GestureEvent::FocusMove(Direction::Down) => selection.down(count),
            GestureEvent::Cancel => return Screen::default(),
            GestureEvent::Delete => {
                if let SessionSelection::Existing(_) = selection {
                    return Screen::Sessions {
                        selection,
                        confirm: Some(DeleteChoice::No),
                    };
                }
                selection
            }
            GestureEvent::Activate => {
                match selection {
                    SessionSelection::NewChat => {
                        let index = self.store.create_session();
                        info!("Created session {}", index);
                        self.store.persist().await;
                    }
                    SessionSelection::Existing(index) => {
                        if self.store.switch_to(index) {
                            info!("Switched to session {}", index);
                        }
                    }
                }
                self.view.reset();
                return Screen::default();
            }
            _ => selection,
        };
        Screen::Sessions {
            selection,
            confirm: None,
        }
    }

    async fn confirm_event(&mut self, selection: SessionSelection, choice: DeleteChoice, event: GestureEvent) -> Screen {
        let confirm = match event {
            GestureEvent::FocusMove(Direction::Left) => Some(DeleteChoice::Yes),
            GestureEvent::FocusMove(Direction::Right) => Some(DeleteChoice::No),
            GestureEvent::Cancel => None,
            GestureEvent::Activate => {
                if let (DeleteChoice::Yes, SessionSelection::Existing(index)) = (choice, selection) {
                    return self.delete_session(index).await;
                }
                None
            }
            _ => Some(choice),
        };
        Screen::Sessions { selection, confirm }
    }

    async fn delete_session(&mut self, index: usize) -> Screen {
        let was_current = index == self.store.current_index();
        if !self.store.delete_session(index, &mut self.images) {
            return Screen::sessions();
        }
        info!("Deleted session {}; {} remaining", index, self.store.len());
        self.pipeline.on_session_deleted(index);
        self.store.persist().await;
        if was_current {
            self.view.reset();
        }

        let selection = match self.store.len() {
            0 => SessionSelection::NewChat,
            len => SessionSelection::Existing(index.min(len - 1)),
        };
        Screen::Sessions {
            selection,
            confirm: None,
        }
    }
}
