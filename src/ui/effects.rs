//! Frame-driven text effects: shimmer, spinner and progress bar.

use ratatui::style::{Modifier, Style};
use ratatui::text::Span;

const SWEEP_SECONDS: f32 = 2.0;

/// Sweep a highlight band across `text`. `seconds` is animation time.
pub fn shimmer_spans(text: &str, seconds: f32, base: Style) -> Vec<Span<'static>> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }

    let padding = 10usize;
    let period = chars.len() + padding * 2;
    let pos = ((seconds % SWEEP_SECONDS) / SWEEP_SECONDS * period as f32) as isize;
    let band_half_width = 5.0;

    chars
        .iter()
        .enumerate()
        .map(|(i, ch)| {
            let dist = (i as isize + padding as isize - pos).abs() as f32;
            let intensity = if dist <= band_half_width {
                let x = std::f32::consts::PI * (dist / band_half_width);
                0.5 * (1.0 + x.cos())
            } else {
                0.0
            };
            Span::styled(ch.to_string(), style_for_intensity(base, intensity))
        })
        .collect()
}

fn style_for_intensity(base: Style, intensity: f32) -> Style {
    if intensity < 0.2 {
        base.add_modifier(Modifier::DIM)
    } else if intensity < 0.6 {
        base
    } else {
        base.add_modifier(Modifier::BOLD)
    }
}

/// Braille spinner
pub struct Spinner;

impl Spinner {
    const FRAMES: &'static [&'static str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

    pub fn frame(step: usize) -> &'static str {
        Self::FRAMES[step % Self::FRAMES.len()]
    }
}

pub struct ProgressBar;

impl ProgressBar {
    const FULL: char = '█';
    const EMPTY: char = '░';
    const PARTIAL: [char; 8] = ['▏', '▎', '▍', '▌', '▋', '▊', '▉', '█'];

    pub fn render(progress: f32, width: usize) -> String {
        let progress = progress.clamp(0.0, 1.0);
        let filled = (progress * width as f32) as usize;
        let partial_idx = ((progress * width as f32 - filled as f32) * 8.0) as usize;

        (0..width)
            .map(|i| {
                if i < filled {
                    Self::FULL
                } else if i == filled && partial_idx > 0 {
                    Self::PARTIAL[partial_idx.min(7)]
                } else {
                    Self::EMPTY
                }
            })
            .collect()
    }
}
