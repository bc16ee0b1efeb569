// Character LCD display.
// Drives an HD44780-style panel through the Linux charlcd device node.
//
// Wiring (GPIO pins or an I2C expander) is configured in the kernel via a
// device-tree overlay; this driver only speaks the charlcd escape protocol.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use super::{Display, pad_line};
use crate::error::{Result, StatsError};

pub const DEFAULT_LCD_DEVICE: &str = "/dev/lcd";

/// Form feed: clear the panel and home the cursor.
const CLEAR: &[u8] = b"\x0c";
/// Display on, cursor off, blink off.
const INIT: &[u8] = b"\x1b[LD\x1b[Lc\x1b[Lb";

/// Map characters outside the panel's ROM to ASCII stand-ins.
fn lcd_text(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '★' => '*',
            c if c.is_ascii() && !c.is_ascii_control() => c,
            _ => '?',
        })
        .collect()
}

pub struct CharacterLcd<W: Write> {
    out: W,
    width: usize,
    height: usize,
}

impl CharacterLcd<File> {
    /// Open the charlcd device at `path`.
    pub fn open(path: &Path, width: usize, height: usize) -> Result<Self> {
        let file = OpenOptions::new().write(true).open(path).map_err(|e| {
            StatsError::Display(format!("Failed to open LCD device {}: {}", path.display(), e))
        })?;
        Self::new(file, width, height)
    }
}

impl<W: Write> CharacterLcd<W> {
    pub fn new(mut out: W, width: usize, height: usize) -> Result<Self> {
        out.write_all(INIT)?;
        out.write_all(CLEAR)?;
        out.flush()?;
        Ok(Self { out, width, height })
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn put_row(&mut self, row: usize, text: &str) -> Result<()> {
        write!(self.out, "\x1b[Lx0y{};", row)?;
        self.out
            .write_all(pad_line(&lcd_text(text), self.width).as_bytes())?;
        Ok(())
    }
}

impl<W: Write + Send> Display for CharacterLcd<W> {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn clear(&mut self) -> Result<()> {
        self.out.write_all(CLEAR)?;
        self.out.flush()?;
        Ok(())
    }

    fn write_line(&mut self, line: usize, text: &str) -> Result<()> {
        if line >= self.height {
            return Ok(());
        }
        self.put_row(line, text)?;
        self.out.flush()?;
        Ok(())
    }

    fn update(&mut self, lines: &[String]) -> Result<()> {
        self.out.write_all(CLEAR)?;
        for (row, text) in lines.iter().take(self.height).enumerate() {
            self.put_row(row, text)?;
        }
        self.out.flush()?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.clear()
    }
}
