//! Terminal rendering.
//!
//! [`UiContext`] owns the terminal for the lifetime of the program and
//! restores it on drop. Drawing is a pure function of a [`Snapshot`].

mod effects;
mod panels;
mod render;
mod snapshot;
mod theme;

pub use render::draw;
pub use snapshot::Snapshot;
pub use theme::Icons;

use crate::{PadchatError, Result};
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use std::cell::OnceCell;
use std::io::{self, Stdout};
use tracing::debug;

pub struct UiContext {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    /// Chosen on first draw
    icons: OnceCell<Icons>,
}

impl UiContext {
    /// Enter raw mode and the alternate screen.
    pub fn new() -> Result<Self> {
        enable_raw_mode().map_err(|e| PadchatError::Terminal(format!("raw mode: {e}")))?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let terminal = Terminal::new(CrosstermBackend::new(stdout))?;
        debug!("Terminal initialised");
        Ok(Self {
            terminal,
            icons: OnceCell::new(),
        })
    }

    /// Columns and rows of the terminal.
    pub fn size(&self) -> Result<(u16, u16)> {
        let size = self.terminal.size()?;
        Ok((size.width, size.height))
    }

    pub fn draw(&mut self, snapshot: &Snapshot<'_>) -> Result<()> {
        let icons = self.icons.get_or_init(Icons::detect);
        self.terminal.draw(|f| draw(f, snapshot, icons))?;
        Ok(())
    }
}

impl Drop for UiContext {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(self.terminal.backend_mut(), LeaveAlternateScreen);
        let _ = self.terminal.show_cursor();
    }
}
