//! Turns consecutive pad samples into discrete gestures.
//!
//! Two stick modes exist. In message mode the left stick's vertical axis
//! is a flick/hold control: a short push selects the previous or next
//! message, a long push scrolls continuously. In list mode either stick
//! steps like a D-pad, rate limited by a cooldown.

use super::pad::{beyond_deadzone, deflection, stick_negative, stick_positive, Buttons, PadSample};
use crate::Tuning;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageStep {
    Previous,
    Next,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureEvent {
    FocusMove(Direction),
    Activate,
    Cancel,
    ToggleReasoning,
    Delete,
    Capture,
    Retake,
    SelectMessage(MessageStep),
    ScrollBy(i32),
    /// Fraction (0..=1) of the hold-to-exit duration reached so far
    HoldProgress(f32),
    HoldComplete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StickMode {
    /// Flick to select a message, hold to scroll
    MessageScroll,
    /// Sticks step through a list
    ListNavigation,
}

const EDGE_BUTTONS: [(Buttons, GestureEvent); 10] = [
    (Buttons::UP, GestureEvent::FocusMove(Direction::Up)),
    (Buttons::DOWN, GestureEvent::FocusMove(Direction::Down)),
    (Buttons::LEFT, GestureEvent::FocusMove(Direction::Left)),
    (Buttons::RIGHT, GestureEvent::FocusMove(Direction::Right)),
    (Buttons::CROSS, GestureEvent::Activate),
    (Buttons::CIRCLE, GestureEvent::Cancel),
    (Buttons::TRIANGLE, GestureEvent::ToggleReasoning),
    (Buttons::SQUARE, GestureEvent::Delete),
    (Buttons::R_TRIGGER, GestureEvent::Capture),
    (Buttons::L_TRIGGER, GestureEvent::Retake),
];

#[derive(Debug, Clone)]
pub struct GestureClassifier {
    deadzone: u8,
    scroll_initiate_frames: u32,
    cooldown_frames: u32,
    max_scroll_speed: f32,
    hold_frames_needed: u32,

    stick_held_frames: u32,
    cooldown: u32,
    hold_frames: u32,
    mode: StickMode,
}

impl GestureClassifier {
    pub fn new(tuning: &Tuning) -> Self {
        let needed = (tuning.hold_to_exit_secs / tuning.frame_quantum()).round() as u32;
        Self {
            deadzone: tuning.stick_deadzone,
            scroll_initiate_frames: tuning.scroll_initiate_frames,
            cooldown_frames: tuning.analog_cooldown_frames,
            max_scroll_speed: tuning.max_scroll_speed,
            hold_frames_needed: needed.max(1),
            stick_held_frames: 0,
            cooldown: 0,
            hold_frames: 0,
            mode: StickMode::ListNavigation,
        }
    }

    /// Fraction of the hold-to-exit duration currently reached.
    pub fn hold_fraction(&self) -> f32 {
        (self.hold_frames as f32 / self.hold_frames_needed as f32).min(1.0)
    }

    /// Classify one frame.
    pub fn update(&mut self, prev: &PadSample, cur: &PadSample, mode: StickMode) -> Vec<GestureEvent> {
        let mut events = Vec::new();

        if mode != self.mode {
            self.mode = mode;
            self.stick_held_frames = 0;
        }
        self.cooldown = self.cooldown.saturating_sub(1);

        self.update_hold(cur, &mut events);

        for (button, event) in EDGE_BUTTONS {
            if cur.pressed(prev, button) {
                events.push(event);
            }
        }

        match mode {
            StickMode::MessageScroll => self.update_message_stick(prev, cur, &mut events),
            StickMode::ListNavigation => self.update_list_stick(cur, &mut events),
        }

        events
    }

    fn update_hold(&mut self, cur: &PadSample, events: &mut Vec<GestureEvent>) {
        if !cur.buttons.contains(Buttons::START) {
            self.hold_frames = 0;
            return;
        }
        self.hold_frames = self.hold_frames.saturating_add(1);
        events.push(GestureEvent::HoldProgress(self.hold_fraction()));
        if self.hold_frames == self.hold_frames_needed {
            events.push(GestureEvent::HoldComplete);
        }
    }

    fn update_message_stick(&mut self, prev: &PadSample, cur: &PadSample, events: &mut Vec<GestureEvent>) {
        let active = beyond_deadzone(cur.ly, self.deadzone);
        let was_active = beyond_deadzone(prev.ly, self.deadzone);

        if active {
            self.stick_held_frames += 1;
        }

        if was_active && !active {
            let held = self.stick_held_frames;
            if held > 0 && held < self.scroll_initiate_frames && self.cooldown == 0 {
                let step = if deflection(prev.ly) < 0 {
                    MessageStep::Previous
                } else {
                    MessageStep::Next
                };
                events.push(GestureEvent::SelectMessage(step));
                self.cooldown = self.cooldown_frames;
            }
        }

        if !active {
            self.stick_held_frames = 0;
        }

        if self.stick_held_frames >= self.scroll_initiate_frames {
            let push = deflection(cur.ly) as f32 / 128.0;
            let delta = (push * push.abs() * self.max_scroll_speed) as i32;
            if delta != 0 {
                events.push(GestureEvent::ScrollBy(delta));
            }
        }
    }

    fn update_list_stick(&mut self, cur: &PadSample, events: &mut Vec<GestureEvent>) {
        if self.cooldown > 0 {
            return;
        }
        let dz = self.deadzone;
        let direction = if stick_negative(cur.ly, dz) || stick_negative(cur.ry, dz) {
            Some(Direction::Up)
        } else if stick_positive(cur.ly, dz) || stick_positive(cur.ry, dz) {
            Some(Direction::Down)
        } else if stick_negative(cur.lx, dz) || stick_negative(cur.rx, dz) {
            Some(Direction::Left)
        } else if stick_positive(cur.lx, dz) || stick_positive(cur.rx, dz) {
            Some(Direction::Right)
        } else {
            None
        };
        if let Some(direction) = direction {
            events.push(GestureEvent::FocusMove(direction));
            self.cooldown = self.cooldown_frames;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const UP: u8 = 0;
    const DOWN: u8 = 255;
    const REST: u8 = 128;

    fn classifier() -> GestureClassifier {
        GestureClassifier::new(&Tuning::default())
    }

    /// Feed a sequence of left-stick vertical positions, collecting events.
    fn run(c: &mut GestureClassifier, ys: &[u8], mode: StickMode) -> Vec<GestureEvent> {
        let mut prev = PadSample::default();
        let mut out = Vec::new();
        for &y in ys {
            let cur = PadSample::with_left_y(y);
            out.extend(c.update(&prev, &cur, mode));
            prev = cur;
        }
        out
    }

    fn push(y: u8, frames: usize) -> Vec<u8> {
        let mut ys = vec![y; frames];
        ys.push(REST);
        ys
    }

    #[test]
    fn test_short_push_is_one_flick() {
        for frames in 1..8 {
            let mut c = classifier();
            let events = run(&mut c, &push(UP, frames), StickMode::MessageScroll);
            assert_eq!(
                events,
                vec![GestureEvent::SelectMessage(MessageStep::Previous)],
                "held {frames} frames"
            );
        }
        let mut c = classifier();
        let events = run(&mut c, &push(DOWN, 3), StickMode::MessageScroll);
        assert_eq!(events, vec![GestureEvent::SelectMessage(MessageStep::Next)]);
    }

    #[test]
    fn test_long_push_scrolls_without_flick() {
        let mut c = classifier();
        let events = run(&mut c, &push(DOWN, 12), StickMode::MessageScroll);
        let scrolls: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, GestureEvent::ScrollBy(_)))
            .collect();
        assert_eq!(scrolls.len(), 5);
        assert_eq!(events.len(), 5);
        // p = 127/128, delta = trunc(p*p*15)
        assert_eq!(events[0], GestureEvent::ScrollBy(14));
    }

    #[test]
    fn test_scroll_is_signed_quadratic() {
        let mut c = classifier();
        let events = run(&mut c, &vec![UP; 8], StickMode::MessageScroll);
        assert_eq!(events, vec![GestureEvent::ScrollBy(-15)]);

        let mut c = classifier();
        // p = 64/128, 0.25 * 15 = 3.75
        let events = run(&mut c, &vec![192; 8], StickMode::MessageScroll);
        assert_eq!(events, vec![GestureEvent::ScrollBy(3)]);
    }

    #[test]
    fn test_flick_during_cooldown_is_swallowed() {
        let mut c = classifier();
        let mut ys = push(UP, 2);
        ys.extend(push(UP, 2));
        let events = run(&mut c, &ys, StickMode::MessageScroll);
        assert_eq!(events.len(), 1);

        let mut c = classifier();
        let mut ys = push(UP, 2);
        ys.extend(vec![REST; 15]);
        ys.extend(push(DOWN, 2));
        let events = run(&mut c, &ys, StickMode::MessageScroll);
        assert_eq!(
            events,
            vec![
                GestureEvent::SelectMessage(MessageStep::Previous),
                GestureEvent::SelectMessage(MessageStep::Next),
            ]
        );
    }

    #[test]
    fn test_list_mode_steps_with_cooldown() {
        let mut c = classifier();
        let events = run(&mut c, &vec![DOWN; 31], StickMode::ListNavigation);
        assert_eq!(events, vec![GestureEvent::FocusMove(Direction::Down); 3]);
    }

    #[test]
    fn test_list_mode_reads_right_stick() {
        let mut c = classifier();
        let prev = PadSample::default();
        let cur = PadSample {
            rx: 0,
            ..PadSample::default()
        };
        assert_eq!(
            c.update(&prev, &cur, StickMode::ListNavigation),
            vec![GestureEvent::FocusMove(Direction::Left)]
        );
    }

    #[test]
    fn test_buttons_are_edge_triggered() {
        let mut c = classifier();
        let held = PadSample::with_buttons(Buttons::CROSS | Buttons::R_TRIGGER);
        let first = c.update(&PadSample::default(), &held, StickMode::MessageScroll);
        assert_eq!(first, vec![GestureEvent::Activate, GestureEvent::Capture]);
        assert!(c.update(&held, &held, StickMode::MessageScroll).is_empty());
    }

    #[test]
    fn test_hold_to_exit_after_two_seconds() {
        let mut c = classifier();
        let start = PadSample::with_buttons(Buttons::START);
        let mut prev = PadSample::default();
        let mut completed_at = None;
        for frame in 1..=150 {
            let events = c.update(&prev, &start, StickMode::ListNavigation);
            if events.contains(&GestureEvent::HoldComplete) {
                completed_at.get_or_insert(frame);
            }
            prev = start;
        }
        assert_eq!(completed_at, Some(120));
        assert_eq!(c.hold_fraction(), 1.0);
    }

    #[test]
    fn test_releasing_start_resets_hold() {
        let mut c = classifier();
        let start = PadSample::with_buttons(Buttons::START);
        for _ in 0..100 {
            c.update(&start, &start, StickMode::ListNavigation);
        }
        c.update(&start, &PadSample::default(), StickMode::ListNavigation);
        assert_eq!(c.hold_fraction(), 0.0);
        let events = c.update(&PadSample::default(), &start, StickMode::ListNavigation);
        assert!(!events.contains(&GestureEvent::HoldComplete));
    }
}
