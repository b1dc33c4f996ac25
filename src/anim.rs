//! Per-frame animation state that is not owned by a message.
//!
//! Message fade-in lives on each [`Message`](crate::Message); everything
//! here belongs to the screen: the main UI fade that starts once models
//! are known, the camera overlay, and the eased model dropdown height.

use crate::Tuning;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AnimationClock {
    /// Main UI opacity; rises once the first model fetch completes
    pub ui_alpha: u8,
    /// Dim overlay behind the camera view
    pub camera_overlay: u8,
    /// Current (eased) height of the model dropdown
    pub dropdown_height: f32,
}

/// Inputs to one animation step.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameInputs {
    pub models_loaded: bool,
    pub camera_open: bool,
    pub dropdown_target: f32,
}

impl AnimationClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick(&mut self, tuning: &Tuning, inputs: FrameInputs) {
        if inputs.models_loaded {
            self.ui_alpha = self.ui_alpha.saturating_add(tuning.ui_fade_speed);
        }

        let target = tuning.camera_overlay_alpha;
        let step = tuning.camera_fade_speed;
        self.camera_overlay = if inputs.camera_open {
            self.camera_overlay.saturating_add(step).min(target)
        } else {
            self.camera_overlay.saturating_sub(step)
        };

        self.dropdown_height += (inputs.dropdown_target - self.dropdown_height) * tuning.dropdown_easing;
        if (inputs.dropdown_target - self.dropdown_height).abs() < 0.01 {
            self.dropdown_height = inputs.dropdown_target;
        }
    }

    /// Whether the dropdown is visible at all.
    pub fn dropdown_visible(&self) -> bool {
        self.dropdown_height >= 1.0
    }
}

/// Fully open height of a dropdown with `items` rows.
pub fn dropdown_target(items: usize, item_height: f32, padding: f32) -> f32 {
    items as f32 * item_height + padding
}

/// Scale a colour channel opacity by a layer opacity.
pub fn compose_alpha(alpha: u8, layer: u8) -> u8 {
    ((alpha as u16 * layer as u16) / 255) as u8
}
