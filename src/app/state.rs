//! Screen and modal states.
//!
//! Each screen carries its own modal as a single enum, so at most one
//! modal can be open at a time.

use super::settings::ConnectFlow;
use crate::input::Direction;

/// Chat screen control that currently has focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Focus {
    ModelPill,
    #[default]
    InputPill,
    Settings,
    Camera,
    Sessions,
}

impl Focus {
    /// Focus after a directional move. The model pill is only reachable
    /// when models are available.
    pub fn moved(self, direction: Direction, has_models: bool) -> Focus {
        use Focus::*;
        match (direction, self) {
            (Direction::Up, current) if current != ModelPill && has_models => ModelPill,
            (Direction::Down, ModelPill) => InputPill,
            (Direction::Left, InputPill) => Settings,
            (Direction::Left, Camera) => InputPill,
            (Direction::Left, Settings) => Sessions,
            (Direction::Right, Settings) => InputPill,
            (Direction::Right, InputPill) => Camera,
            (Direction::Right, Sessions) => Settings,
            (_, current) => current,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraPhase {
    LiveView,
    Review,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChatModal {
    #[default]
    None,
    Keyboard,
    Camera(CameraPhase),
    ModelDropdown {
        hovered: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SettingsField {
    #[default]
    Endpoint,
    ApiKey,
    DefaultModel,
}

impl SettingsField {
    pub fn up(self) -> Self {
        match self {
            SettingsField::DefaultModel => SettingsField::ApiKey,
            _ => SettingsField::Endpoint,
        }
    }

    pub fn down(self) -> Self {
        match self {
            SettingsField::Endpoint => SettingsField::ApiKey,
            _ => SettingsField::DefaultModel,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SettingsField::Endpoint => "Endpoint",
            SettingsField::ApiKey => "API Key",
            SettingsField::DefaultModel => "Default Model",
        }
    }
}

#[derive(Debug, Default)]
pub enum SettingsModal {
    #[default]
    None,
    Keyboard(SettingsField),
    ModelDropdown {
        hovered: usize,
    },
    Connecting(ConnectFlow),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionSelection {
    NewChat,
    Existing(usize),
}

impl SessionSelection {
    /// Step up, wrapping from "new chat" to the last session.
    pub fn up(self, count: usize) -> Self {
        match self {
            SessionSelection::NewChat if count == 0 => SessionSelection::NewChat,
            SessionSelection::NewChat => SessionSelection::Existing(count - 1),
            SessionSelection::Existing(0) => SessionSelection::NewChat,
            SessionSelection::Existing(i) => SessionSelection::Existing(i - 1),
        }
    }

    /// Step down, wrapping from the last session to "new chat".
    pub fn down(self, count: usize) -> Self {
        match self {
            SessionSelection::NewChat if count == 0 => SessionSelection::NewChat,
            SessionSelection::NewChat => SessionSelection::Existing(0),
            SessionSelection::Existing(i) if i + 1 >= count => SessionSelection::NewChat,
            SessionSelection::Existing(i) => SessionSelection::Existing(i + 1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteChoice {
    Yes,
    No,
}

#[derive(Debug)]
pub enum Screen {
    Chat {
        modal: ChatModal,
    },
    Settings {
        field: SettingsField,
        modal: SettingsModal,
    },
    Sessions {
        selection: SessionSelection,
        confirm: Option<DeleteChoice>,
    },
}

impl Default for Screen {
    fn default() -> Self {
        Screen::Chat {
            modal: ChatModal::None,
        }
    }
}

impl Screen {
    pub fn settings() -> Self {
        Screen::Settings {
            field: SettingsField::Endpoint,
            modal: SettingsModal::None,
        }
    }

    pub fn sessions() -> Self {
        Screen::Sessions {
            selection: SessionSelection::NewChat,
            confirm: None,
        }
    }

    /// Whether a text-entry modal owns the keyboard.
    pub fn keyboard_open(&self) -> bool {
        matches!(
            self,
            Screen::Chat {
                modal: ChatModal::Keyboard
            } | Screen::Settings {
                modal: SettingsModal::Keyboard(_),
                ..
            }
        )
    }
}
