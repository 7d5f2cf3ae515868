//! Echo of the edit line to the terminal using crossterm

use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

use crossterm::{
    cursor::{self, MoveTo},
    queue,
    style::Print,
    terminal::{self, ScrollUp},
};
use unicode_width::UnicodeWidthChar;

use crate::echo::{CursorToken, EchoSink, WriteFlags, WriteResult};

/// Cursor model of the terminal
#[derive(Debug, Clone, Copy)]
struct Screen {
    column: u16,
    row: u16,
    width: u16,
    height: u16,
}

impl Screen {
    fn line_feed(&mut self, out: &mut impl Write) -> io::Result<i32> {
        if self.row + 1 >= self.height {
            queue!(out, ScrollUp(1))?;
            Ok(-1)
        } else {
            self.row += 1;
            Ok(0)
        }
    }

    fn move_to(&self, out: &mut impl Write) -> io::Result<()> {
        queue!(out, MoveTo(self.column, self.row))
    }

    fn write(&mut self, out: &mut impl Write, text: &str, flags: WriteFlags) -> io::Result<WriteResult> {
        let mut result = WriteResult::default();
        let mut run = String::new();

        for ch in text.chars() {
            if matches!(ch, '\x08' | '\r' | '\n') && !run.is_empty() {
                queue!(out, Print(run.as_str()))?;
                run.clear();
            }
            match ch {
                '\x08' => {
                    if self.column > 0 {
                        self.column -= 1;
                    } else if self.row > 0 {
                        self.row -= 1;
                        self.column = self.width - 1;
                    }
                    self.move_to(out)?;
                    if flags.contains(WriteFlags::DESTRUCTIVE_BACKSPACE) {
                        queue!(out, Print(' '))?;
                        self.move_to(out)?;
                    }
                }
                '\r' => {
                    self.column = 0;
                    self.move_to(out)?;
                }
                '\n' => {
                    result.scroll_delta += self.line_feed(out)?;
                    self.move_to(out)?;
                }
                c => {
                    let cells = UnicodeWidthChar::width(c).unwrap_or(1).clamp(1, 2) as u16;
                    // Wrap before a character that does not fit
                    if self.column + cells > self.width {
                        if !run.is_empty() {
                            queue!(out, Print(run.as_str()))?;
                            run.clear();
                        }
                        self.column = 0;
                        result.scroll_delta += self.line_feed(out)?;
                        self.move_to(out)?;
                    }
                    run.push(c);
                    self.column += cells;
                    result.cells_written += usize::from(cells);
                }
            }
        }

        if !run.is_empty() {
            queue!(out, Print(run.as_str()))?;
        }
        out.flush()?;
        Ok(result)
    }
}

/// Echo sink writing to stdout in raw mode.
///
/// The cursor is tracked rather than queried. Clones share the model, so a
/// host can print prompts through its own clone while a console session owns
/// another.
#[derive(Debug, Clone)]
pub struct TerminalEcho {
    screen: Arc<Mutex<Screen>>,
}

impl TerminalEcho {
    /// Create an echo starting at the current cursor position
    pub fn new() -> io::Result<Self> {
        let (width, height) = terminal::size()?;
        let (column, row) = cursor::position()?;
        Ok(Self {
            screen: Arc::new(Mutex::new(Screen {
                column,
                row,
                width: width.max(2),
                height: height.max(1),
            })),
        })
    }

    fn with_screen<T>(&self, f: impl FnOnce(&mut Screen) -> T) -> T {
        let mut screen = self.screen.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut screen)
    }

    /// Handle terminal resize
    pub fn resize(&self, width: u16, height: u16) {
        self.with_screen(|screen| {
            screen.width = width.max(2);
            screen.height = height.max(1);
            screen.column = screen.column.min(screen.width - 1);
            screen.row = screen.row.min(screen.height - 1);
        });
    }

    /// Print host output such as a prompt
    pub fn print(&self, text: &str) -> io::Result<()> {
        let mut out = io::stdout().lock();
        self.with_screen(|screen| screen.write(&mut out, text, WriteFlags::empty()))?;
        Ok(())
    }
}

impl EchoSink for TerminalEcho {
    fn write(&mut self, text: &str, flags: WriteFlags) -> WriteResult {
        let mut out = io::stdout().lock();
        match self.with_screen(|screen| screen.write(&mut out, text, flags)) {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!("Echo write failed: {}", e);
                WriteResult::default()
            }
        }
    }

    fn cursor_position(&self) -> CursorToken {
        self.with_screen(|screen| CursorToken::new(screen.column, i32::from(screen.row)))
    }

    fn set_cursor_position(&mut self, token: CursorToken) {
        let mut out = io::stdout().lock();
        let moved = self.with_screen(|screen| {
            screen.column = token.column().min(screen.width - 1);
            screen.row = u16::try_from(token.row().max(0))
                .unwrap_or(u16::MAX)
                .min(screen.height - 1);
            screen.move_to(&mut out).and_then(|_| out.flush())
        });
        if let Err(e) = moved {
            tracing::warn!("Cursor move failed: {}", e);
        }
    }
}
