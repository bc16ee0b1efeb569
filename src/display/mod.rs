// Display surfaces.
// A line-oriented driver contract plus an optional rich surface for the dashboard.

mod dashboard;
mod lcd;
mod terminal;

pub use dashboard::Dashboard;
pub use lcd::{CharacterLcd, DEFAULT_LCD_DEVICE};
pub use terminal::TerminalDisplay;

use std::path::Path;

use crate::config::{Config, DisplayType};
use crate::error::Result;
use crate::metrics::{AggregateSummary, RepoMetrics};

/// Required surface of every display driver.
pub trait Display: Send {
    fn width(&self) -> usize;
    fn height(&self) -> usize;

    fn clear(&mut self) -> Result<()>;

    /// Write `text` at row `line`; rows outside the display are ignored.
    fn write_line(&mut self, line: usize, text: &str) -> Result<()>;

    /// Replace the whole display with `lines`.
    fn update(&mut self, lines: &[String]) -> Result<()>;

    fn close(&mut self) -> Result<()> {
        Ok(())
    }

    /// Whether this display reads keyboard input and handles quitting itself.
    fn is_interactive(&self) -> bool {
        false
    }

    /// Drain pending input; `true` once the user asked to quit.
    fn poll_quit(&mut self) -> Result<bool> {
        Ok(false)
    }

    /// The extended surface, when this driver has one.
    fn as_rich(&mut self) -> Option<&mut dyn RichDisplay> {
        None
    }
}

/// Extended surface for displays that render structured views.
pub trait RichDisplay {
    fn update_summary(&mut self, summary: &AggregateSummary) -> Result<()>;
    fn update_repo(&mut self, repo: &RepoMetrics) -> Result<()>;
    fn show_error(&mut self, title: &str, message: &str) -> Result<()>;
    fn show_empty(&mut self, message: &str) -> Result<()>;
    fn update_rotation_index(&mut self, index: usize, total: usize) -> Result<()>;
}

/// Truncate or right-pad `text` to exactly `width` characters.
pub fn pad_line(text: &str, width: usize) -> String {
    let mut line: String = text.chars().take(width).collect();
    let len = line.chars().count();
    line.extend(std::iter::repeat_n(' ', width - len));
    line
}

/// Open the display selected by `display_type`.
pub fn open(config: &Config) -> Result<Box<dyn Display>> {
    let settings = &config.display_settings;
    match config.display_type {
        DisplayType::Terminal => {
            let width = settings.width.unwrap_or(80);
            let height = settings.height.unwrap_or(4);
            Ok(Box::new(TerminalDisplay::new(std::io::stdout(), width, height)))
        }
        DisplayType::CharacterLcd => {
            let width = settings.width.unwrap_or(20);
            let height = settings.height.unwrap_or(4);
            let device = settings
                .device
                .as_deref()
                .unwrap_or(Path::new(DEFAULT_LCD_DEVICE));
            Ok(Box::new(CharacterLcd::open(device, width, height)?))
        }
        DisplayType::Gui => Ok(Box::new(Dashboard::open(settings)?)),
    }
}
