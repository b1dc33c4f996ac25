//! Gamepad sample: a button bitmask plus two analog sticks.

use std::ops::BitOr;

pub const STICK_CENTER: u8 = 128;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Buttons(u32);

impl Buttons {
    pub const NONE: Buttons = Buttons(0);
    pub const UP: Buttons = Buttons(1 << 0);
    pub const DOWN: Buttons = Buttons(1 << 1);
    pub const LEFT: Buttons = Buttons(1 << 2);
    pub const RIGHT: Buttons = Buttons(1 << 3);
    pub const CROSS: Buttons = Buttons(1 << 4);
    pub const CIRCLE: Buttons = Buttons(1 << 5);
    pub const TRIANGLE: Buttons = Buttons(1 << 6);
    pub const SQUARE: Buttons = Buttons(1 << 7);
    pub const L_TRIGGER: Buttons = Buttons(1 << 8);
    pub const R_TRIGGER: Buttons = Buttons(1 << 9);
    pub const START: Buttons = Buttons(1 << 10);
    pub const SELECT: Buttons = Buttons(1 << 11);

    pub fn contains(self, other: Buttons) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Buttons) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Buttons) {
        self.0 &= !other.0;
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Buttons {
    type Output = Buttons;

    fn bitor(self, rhs: Buttons) -> Buttons {
        Buttons(self.0 | rhs.0)
    }
}

/// One frame of controller state. Axes run 0..=255 with 128 at rest;
/// smaller values are up/left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PadSample {
    pub buttons: Buttons,
    pub lx: u8,
    pub ly: u8,
    pub rx: u8,
    pub ry: u8,
}

impl Default for PadSample {
    fn default() -> Self {
        Self {
            buttons: Buttons::NONE,
            lx: STICK_CENTER,
            ly: STICK_CENTER,
            rx: STICK_CENTER,
            ry: STICK_CENTER,
        }
    }
}

impl PadSample {
    pub fn with_buttons(buttons: Buttons) -> Self {
        Self {
            buttons,
            ..Self::default()
        }
    }

    pub fn with_left_y(ly: u8) -> Self {
        Self {
            ly,
            ..Self::default()
        }
    }

    /// Whether `button` went from released to pressed between `prev` and `self`.
    pub fn pressed(&self, prev: &PadSample, button: Buttons) -> bool {
        self.buttons.contains(button) && !prev.buttons.contains(button)
    }
}

/// Signed distance of an axis from centre.
pub fn deflection(axis: u8) -> i32 {
    axis as i32 - STICK_CENTER as i32
}

pub fn beyond_deadzone(axis: u8, deadzone: u8) -> bool {
    deflection(axis).abs() > deadzone as i32
}

pub fn stick_negative(axis: u8, deadzone: u8) -> bool {
    deflection(axis) < -(deadzone as i32)
}

pub fn stick_positive(axis: u8, deadzone: u8) -> bool {
    deflection(axis) > deadzone as i32
}
