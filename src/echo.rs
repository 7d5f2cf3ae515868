//! Echo of the edit line to the display.
//!
//! The line editor never computes screen coordinates. It records opaque
//! [`CursorToken`]s from the sink and hands them back to restore the cursor.

use bitflags::bitflags;
use unicode_width::UnicodeWidthChar;

bitflags! {
    /// Options for [`EchoSink::write`]
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct WriteFlags: u8 {
        /// Backspace erases the cell it moves over
        const DESTRUCTIVE_BACKSPACE = 0b0001;
        /// Scroll so the cursor stays on screen
        const KEEP_CURSOR_VISIBLE   = 0b0010;
    }
}

/// Saved cursor position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CursorToken {
    column: u16,
    row: i32,
}

impl CursorToken {
    pub fn new(column: u16, row: i32) -> Self {
        Self { column, row }
    }

    pub fn column(self) -> u16 {
        self.column
    }

    pub fn row(self) -> i32 {
        self.row
    }

    /// Same position after the screen scrolled by `delta` rows
    pub fn scrolled(self, delta: i32) -> Self {
        Self {
            column: self.column,
            row: self.row + delta,
        }
    }
}

/// Outcome of one echo write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteResult {
    pub cells_written: usize,
    /// Rows the saved positions moved by; negative when the screen scrolled up
    pub scroll_delta: i32,
}

/// Display service used by read sessions
pub trait EchoSink {
    fn write(&mut self, text: &str, flags: WriteFlags) -> WriteResult;
    fn cursor_position(&self) -> CursorToken;
    fn set_cursor_position(&mut self, token: CursorToken);
}

/// Sink that discards everything, for reads without a display
#[derive(Debug, Default)]
pub struct NullEcho;

impl EchoSink for NullEcho {
    fn write(&mut self, _text: &str, _flags: WriteFlags) -> WriteResult {
        WriteResult::default()
    }

    fn cursor_position(&self) -> CursorToken {
        CursorToken::default()
    }

    fn set_cursor_position(&mut self, _token: CursorToken) {}
}

/// In-memory character grid
#[derive(Debug)]
pub struct MemoryEcho {
    width: usize,
    rows: Vec<Vec<char>>,
    column: usize,
    row: usize,
    writes: Vec<String>,
}

/// Filler for the second cell of a wide character
const WIDE_TAIL: char = '\0';

impl MemoryEcho {
    pub fn new(width: usize) -> Self {
        Self {
            width: width.max(2),
            rows: vec![Vec::new()],
            column: 0,
            row: 0,
            writes: Vec::new(),
        }
    }

    /// Visible text of a row without trailing blanks
    pub fn line(&self, row: usize) -> String {
        self.rows
            .get(row)
            .map(|cells| {
                let text: String = cells.iter().filter(|&&c| c != WIDE_TAIL).collect();
                text.trim_end().to_string()
            })
            .unwrap_or_default()
    }

    /// `(column, row)`
    pub fn cursor(&self) -> (usize, usize) {
        (self.column, self.row)
    }

    /// Every string passed to `write`, in order
    pub fn writes(&self) -> &[String] {
        &self.writes
    }

    fn put(&mut self, ch: char, width: usize) {
        if self.column + width > self.width {
            self.column = 0;
            self.row += 1;
        }
        while self.rows.len() <= self.row {
            self.rows.push(Vec::new());
        }
        let cells = &mut self.rows[self.row];
        if cells.len() < self.column + width {
            cells.resize(self.column + width, ' ');
        }
        cells[self.column] = ch;
        if width == 2 {
            cells[self.column + 1] = WIDE_TAIL;
        }
        self.column += width;
    }

    fn back(&mut self, destructive: bool) {
        if self.column == 0 {
            if self.row == 0 {
                return;
            }
            self.row -= 1;
            self.column = self.width;
        }
        self.column -= 1;
        if destructive {
            if let Some(cell) = self.rows.get_mut(self.row).and_then(|r| r.get_mut(self.column)) {
                *cell = ' ';
            }
        }
    }
}

impl EchoSink for MemoryEcho {
    fn write(&mut self, text: &str, flags: WriteFlags) -> WriteResult {
        self.writes.push(text.to_string());
        let mut cells_written = 0;
        for ch in text.chars() {
            match ch {
                '\x08' => self.back(flags.contains(WriteFlags::DESTRUCTIVE_BACKSPACE)),
                '\r' => self.column = 0,
                '\n' => self.row += 1,
                c => {
                    let width = UnicodeWidthChar::width(c).unwrap_or(1).clamp(1, 2);
                    self.put(c, width);
                    cells_written += width;
                }
            }
        }
        WriteResult {
            cells_written,
            scroll_delta: 0,
        }
    }

    fn cursor_position(&self) -> CursorToken {
        CursorToken::new(self.column as u16, self.row as i32)
    }

    fn set_cursor_position(&mut self, token: CursorToken) {
        self.column = usize::from(token.column());
        self.row = usize::try_from(token.row()).unwrap_or(0);
    }
}
