//! Color theme - ANSI colors for terminal compatibility

use ratatui::style::{Color, Modifier, Style};

pub struct Theme;

impl Theme {
    pub const CYAN: Color = Color::Cyan;
    pub const GREEN: Color = Color::Green;
    pub const YELLOW: Color = Color::Yellow;
    pub const RED: Color = Color::Red;
    pub const MAGENTA: Color = Color::Magenta;
    pub const DARK_GRAY: Color = Color::DarkGray;
    pub const GRAY: Color = Color::Gray;

    pub fn title() -> Style {
        Style::default()
            .fg(Self::CYAN)
            .add_modifier(Modifier::BOLD)
    }

    pub fn text() -> Style {
        Style::default()
    }

    pub fn dim() -> Style {
        Style::default().add_modifier(Modifier::DIM)
    }

    pub fn success() -> Style {
        Style::default().fg(Self::GREEN)
    }

    pub fn warning() -> Style {
        Style::default().fg(Self::YELLOW)
    }

    pub fn error() -> Style {
        Style::default().fg(Self::RED)
    }

    pub fn accent() -> Style {
        Style::default().fg(Self::CYAN)
    }

    pub fn muted() -> Style {
        Style::default().fg(Self::DARK_GRAY)
    }

    /// Reasoning blocks
    pub fn thinking() -> Style {
        Style::default()
            .fg(Self::GRAY)
            .add_modifier(Modifier::ITALIC)
    }

    pub fn border() -> Style {
        Style::default().fg(Self::DARK_GRAY)
    }

    pub fn border_focused() -> Style {
        Style::default().fg(Self::CYAN)
    }

    pub fn user_bubble() -> Style {
        Style::default().fg(Self::CYAN)
    }

    pub fn assistant_bubble() -> Style {
        Style::default().fg(Self::MAGENTA)
    }

    pub fn hovered_bubble() -> Style {
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD)
    }

    /// Pills and buttons
    pub fn pill(focused: bool) -> Style {
        if focused {
            Style::default()
                .bg(Self::GRAY)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().bg(Self::DARK_GRAY).fg(Color::White)
        }
    }

    pub fn selected_row() -> Style {
        Style::default()
            .fg(Self::CYAN)
            .add_modifier(Modifier::BOLD)
    }

    pub fn key() -> Style {
        Style::default()
            .fg(Self::CYAN)
            .add_modifier(Modifier::BOLD)
    }

    pub fn key_desc() -> Style {
        Style::default().fg(Self::DARK_GRAY)
    }
}

/// Glyphs for buttons and markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Icons {
    pub sessions: &'static str,
    pub settings: &'static str,
    pub camera: &'static str,
    pub photo: &'static str,
    pub selected: &'static str,
    pub more_above: &'static str,
    pub more_below: &'static str,
}

impl Icons {
    pub const UNICODE: Icons = Icons {
        sessions: "☰",
        settings: "⚙",
        camera: "◉",
        photo: "▣",
        selected: "●",
        more_above: "▲",
        more_below: "▼",
    };

    pub const ASCII: Icons = Icons {
        sessions: "=",
        settings: "*",
        camera: "o",
        photo: "[img]",
        selected: ">",
        more_above: "^",
        more_below: "v",
    };

    /// Pick a glyph set from the locale.
    pub fn detect() -> Self {
        let utf8 = ["LC_ALL", "LC_CTYPE", "LANG"]
            .iter()
            .filter_map(|key| std::env::var(key).ok())
            .find(|value| !value.is_empty())
            .map(|value| {
                let value = value.to_ascii_lowercase();
                value.contains("utf-8") || value.contains("utf8")
            })
            .unwrap_or(false);
        if utf8 {
            Self::UNICODE
        } else {
            Self::ASCII
        }
    }
}

/// Apply a fade level to a style. Terminals cannot blend, so low alpha
/// hides content and mid alpha dims it.
pub fn faded(style: Style, alpha: u8) -> Style {
    match alpha {
        0..=63 => style.fg(Color::Reset).bg(Color::Reset).add_modifier(Modifier::HIDDEN),
        64..=191 => style.add_modifier(Modifier::DIM),
        _ => style,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fade_levels() {
        let base = Theme::accent();
        assert!(faded(base, 10).add_modifier.contains(Modifier::HIDDEN));
        assert!(faded(base, 120).add_modifier.contains(Modifier::DIM));
        assert_eq!(faded(base, 255), base);
    }
}
