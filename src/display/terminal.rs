// Terminal line display.
// Redraws a fixed block of padded lines at the top of the terminal.

use std::io::Write;

use crossterm::cursor::MoveTo;
use crossterm::style::Print;
use crossterm::terminal::{Clear, ClearType};
use crossterm::queue;

use super::{Display, pad_line};
use crate::error::Result;

pub struct TerminalDisplay<W: Write> {
    out: W,
    width: usize,
    height: usize,
    lines: Vec<String>,
}

impl<W: Write> TerminalDisplay<W> {
    pub fn new(out: W, width: usize, height: usize) -> Self {
        Self {
            out,
            width,
            height,
            lines: vec![String::new(); height],
        }
    }

    /// Currently displayed lines, padded to the display width.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn refresh(&mut self) -> Result<()> {
        queue!(self.out, MoveTo(0, 0))?;
        for line in &self.lines {
            queue!(
                self.out,
                Print(pad_line(line, self.width)),
                Clear(ClearType::UntilNewLine),
                Print("\r\n")
            )?;
        }
        self.out.flush()?;
        Ok(())
    }
}

impl<W: Write + Send> Display for TerminalDisplay<W> {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn clear(&mut self) -> Result<()> {
        queue!(self.out, Clear(ClearType::All), MoveTo(0, 0))?;
        self.out.flush()?;
        self.lines = vec![String::new(); self.height];
        Ok(())
    }

    fn write_line(&mut self, line: usize, text: &str) -> Result<()> {
        if line >= self.height {
            return Ok(());
        }
        self.lines[line] = pad_line(text, self.width);
        self.refresh()
    }

    fn update(&mut self, lines: &[String]) -> Result<()> {
        for (i, slot) in self.lines.iter_mut().enumerate() {
            let text = lines.get(i).map(String::as_str).unwrap_or("");
            *slot = pad_line(text, self.width);
        }
        self.refresh()
    }
}
