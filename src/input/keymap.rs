//! Terminal keys as a virtual gamepad.
//!
//! Terminals report presses (and auto-repeats) but usually not releases.
//! Face buttons and the D-pad are pulsed: one frame down, then up, so an
//! auto-repeating key yields repeated edges. Start and stick keys are
//! latched for a number of frames and refreshed by each repeat, which
//! turns a held key into a held control. Terminals that do report
//! releases end the latch immediately.

use super::pad::{Buttons, PadSample, STICK_CENTER};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// Frames a latched control stays down without a repeat.
/// Long enough to bridge a typical initial auto-repeat delay.
pub const HOLD_LATCH_FRAMES: u32 = 36;
/// Frames a stick key stays pushed without a repeat.
pub const STICK_LATCH_FRAMES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    Pulse(Buttons),
    Hold(Buttons),
    /// Left stick vertical position
    Stick(u8),
}

fn control_for(key: &KeyEvent) -> Option<Control> {
    let control = match key.code {
        KeyCode::Up => Control::Pulse(Buttons::UP),
        KeyCode::Down => Control::Pulse(Buttons::DOWN),
        KeyCode::Left => Control::Pulse(Buttons::LEFT),
        KeyCode::Right => Control::Pulse(Buttons::RIGHT),
        KeyCode::Enter | KeyCode::Char(' ') => Control::Pulse(Buttons::CROSS),
        KeyCode::Esc | KeyCode::Backspace => Control::Pulse(Buttons::CIRCLE),
        KeyCode::Char('t') => Control::Pulse(Buttons::TRIANGLE),
        KeyCode::Char('x') | KeyCode::Delete => Control::Pulse(Buttons::SQUARE),
        KeyCode::Char('c') => Control::Pulse(Buttons::R_TRIGGER),
        KeyCode::Char('z') => Control::Pulse(Buttons::L_TRIGGER),
        KeyCode::Char('q') => Control::Hold(Buttons::START),
        KeyCode::Char('k') => Control::Stick(32),
        KeyCode::Char('j') => Control::Stick(224),
        KeyCode::PageUp | KeyCode::Char('K') => Control::Stick(0),
        KeyCode::PageDown | KeyCode::Char('J') => Control::Stick(255),
        _ => return None,
    };
    Some(control)
}

#[derive(Debug, Default)]
pub struct KeyLatch {
    pending: Buttons,
    pulsed: Buttons,
    held: Vec<(Buttons, u32)>,
    stick: Option<(u8, u32)>,
    interrupted: bool,
}

impl KeyLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a terminal key event.
    pub fn feed(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.interrupted = true;
            return;
        }
        let Some(control) = control_for(&key) else {
            return;
        };

        if key.kind == KeyEventKind::Release {
            match control {
                Control::Pulse(_) => {}
                Control::Hold(b) => self.held.retain(|(held, _)| *held != b),
                Control::Stick(_) => self.stick = None,
            }
            return;
        }

        match control {
            Control::Pulse(b) => self.pending.insert(b),
            Control::Hold(b) => {
                self.held.retain(|(held, _)| *held != b);
                self.held.push((b, HOLD_LATCH_FRAMES));
            }
            Control::Stick(y) => self.stick = Some((y, STICK_LATCH_FRAMES)),
        }
    }

    /// Ctrl+C was pressed since the last call.
    pub fn take_interrupt(&mut self) -> bool {
        std::mem::take(&mut self.interrupted)
    }

    /// Produce this frame's sample and age the latches.
    pub fn sample(&mut self) -> PadSample {
        let mut buttons = Buttons::NONE;

        for b in [
            Buttons::UP,
            Buttons::DOWN,
            Buttons::LEFT,
            Buttons::RIGHT,
            Buttons::CROSS,
            Buttons::CIRCLE,
            Buttons::TRIANGLE,
            Buttons::SQUARE,
            Buttons::L_TRIGGER,
            Buttons::R_TRIGGER,
        ] {
            // A button down last frame must come up before it can pulse again
            if self.pending.contains(b) && !self.pulsed.contains(b) {
                buttons.insert(b);
                self.pending.remove(b);
            }
        }
        self.pulsed = buttons;

        for (b, frames) in &mut self.held {
            buttons.insert(*b);
            *frames -= 1;
        }
        self.held.retain(|(_, frames)| *frames > 0);

        let ly = match &mut self.stick {
            Some((y, frames)) => {
                let y = *y;
                *frames -= 1;
                if *frames == 0 {
                    self.stick = None;
                }
                y
            }
            None => STICK_CENTER,
        };

        PadSample {
            buttons,
            ly,
            ..PadSample::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_pulse_lasts_one_frame() {
        let mut latch = KeyLatch::new();
        latch.feed(press(KeyCode::Enter));
        assert!(latch.sample().buttons.contains(Buttons::CROSS));
        assert!(!latch.sample().buttons.contains(Buttons::CROSS));
    }

    #[test]
    fn test_repeat_produces_fresh_edges() {
        let mut latch = KeyLatch::new();
        latch.feed(press(KeyCode::Down));
        let first = latch.sample();
        latch.feed(press(KeyCode::Down));
        let second = latch.sample();
        let third = latch.sample();
        assert!(first.buttons.contains(Buttons::DOWN));
        assert!(!second.buttons.contains(Buttons::DOWN));
        assert!(third.pressed(&second, Buttons::DOWN));
    }

    #[test]
    fn test_start_latches_until_timeout() {
        let mut latch = KeyLatch::new();
        latch.feed(press(KeyCode::Char('q')));
        for _ in 0..HOLD_LATCH_FRAMES {
            assert!(latch.sample().buttons.contains(Buttons::START));
        }
        assert!(!latch.sample().buttons.contains(Buttons::START));
    }

    #[test]
    fn test_release_ends_latch() {
        let mut latch = KeyLatch::new();
        latch.feed(press(KeyCode::Char('J')));
        assert_eq!(latch.sample().ly, 255);
        let mut release = press(KeyCode::Char('J'));
        release.kind = KeyEventKind::Release;
        latch.feed(release);
        assert_eq!(latch.sample().ly, STICK_CENTER);
    }

    #[test]
    fn test_stick_tap_is_short_enough_to_flick() {
        let mut latch = KeyLatch::new();
        latch.feed(press(KeyCode::Char('k')));
        let pushed = (0..10).filter(|_| latch.sample().ly != STICK_CENTER).count();
        assert_eq!(pushed as u32, STICK_LATCH_FRAMES);
    }

    #[test]
    fn test_ctrl_c_interrupts() {
        let mut latch = KeyLatch::new();
        latch.feed(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(latch.take_interrupt());
        assert!(!latch.take_interrupt());
        assert!(latch.sample().buttons.is_empty());
    }
}
