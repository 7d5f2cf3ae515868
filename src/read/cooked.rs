//! Cooked reads: the interactive line editor.
//!
//! The session owns the edit buffer and caret. It pulls keys from the
//! [`ReadContext`] until Enter (or a wakeup control character) completes the
//! line, or until the key source runs dry and the session parks.
//!
//! # Editing keys
//!
//! | Key | Action |
//! |-----|--------|
//! | Esc | Clear the line |
//! | Up / F5, Down | Recall history |
//! | PgUp / PgDn | Oldest / newest history entry |
//! | Home / End | Caret to start / end |
//! | Ctrl+Home / Ctrl+End | Delete to start / end |
//! | Left / Right, Ctrl+Left / Ctrl+Right | Caret by character / word |
//! | F1, F3 | Copy one / remaining characters of the last command |
//! | F2, F4, F7, F9 | Popups |
//! | F6 | Insert Ctrl+Z |
//! | F8 | Search history for the text before the caret |
//! | Alt+F7, Alt+F10 | Empty history, clear aliases |
//! | Ins, Del | Toggle insert mode, delete at caret |

use tracing::{debug, warn};

use super::popup::{Popup, PopupKind};
use super::{
    encode_for_caller, next_key, skip_chars, EditSettings, KeyClass, KeyPress, ReadContext,
    ReadEncoding, ReadOutput, Step, WaitReason,
};
use crate::echo::{CursorToken, EchoSink, WriteFlags, WriteResult};
use crate::error::{ConsoleError, Result};
use crate::history::{Direction, HistoryId, HistoryRing, MatchFlags};
use crate::input::{ControlKeyState, KeyEvent, VirtualKey};
use crate::text::{cells, display_text};

/// Smallest edit buffer, whatever the caller asks for
pub const MIN_EDIT_CAPACITY: usize = 256;

/// Character produced by Ctrl+Backspace
pub const ERASE_PREV_WORD: char = '\x7f';

/// Character inserted by F6
pub const CTRL_Z: char = '\x1a';

/// Parameters of a line read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineReadRequest {
    /// Caller buffer size in caller units
    pub capacity: usize,
    pub encoding: ReadEncoding,
    /// Bit N set: control character N completes the read
    pub ctrl_wakeup_mask: u32,
    pub echo: bool,
    pub processed: bool,
}

impl LineReadRequest {
    pub fn new(capacity: usize, encoding: ReadEncoding) -> Self {
        Self {
            capacity,
            encoding,
            ctrl_wakeup_mask: 0,
            echo: true,
            processed: true,
        }
    }
}

/// Where a line read stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditState {
    Editing,
    PopupActive,
    Complete,
    Parked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharOutcome {
    Continue,
    /// A control character in the wakeup mask was typed
    Wakeup,
    Enter,
}

/// An in-progress cooked read
#[derive(Debug)]
pub struct LineEditSession {
    pub(super) buffer: Vec<char>,
    pub(super) caret: usize,
    /// Edit buffer size in characters, terminator included
    pub(super) capacity: usize,
    user_capacity: usize,
    encoding: ReadEncoding,
    /// Cursor when editing started
    pub(super) origin: CursorToken,
    /// Cells currently drawn for the line
    visible_cells: usize,
    insert_mode: bool,
    ctrl_wakeup_mask: u32,
    control_key_state: ControlKeyState,
    pub(super) history: Option<HistoryId>,
    exe_name: String,
    pub(super) echo: bool,
    processed: bool,
    pub(super) popups: Vec<Popup>,
    state: EditState,
}

impl LineEditSession {
    pub fn new(
        request: &LineReadRequest,
        exe_name: &str,
        history: Option<HistoryId>,
        settings: &EditSettings,
        echo: &dyn EchoSink,
    ) -> Result<Self> {
        let capacity = request.capacity.max(MIN_EDIT_CAPACITY);
        let mut buffer = Vec::new();
        buffer.try_reserve(capacity)?;

        Ok(Self {
            buffer,
            caret: 0,
            capacity,
            user_capacity: request.capacity,
            encoding: request.encoding,
            origin: echo.cursor_position(),
            visible_cells: 0,
            insert_mode: settings.insert_mode,
            ctrl_wakeup_mask: request.ctrl_wakeup_mask,
            control_key_state: ControlKeyState::empty(),
            history,
            exe_name: exe_name.to_string(),
            echo: request.echo,
            processed: request.processed,
            popups: Vec::new(),
            state: EditState::Editing,
        })
    }

    pub fn state(&self) -> EditState {
        self.state
    }

    /// Mark the read as waiting for input
    pub(crate) fn park(&mut self) {
        self.state = EditState::Parked;
    }

    /// Current edit line
    pub fn text(&self) -> String {
        self.buffer.iter().collect()
    }

    pub fn caret(&self) -> usize {
        self.caret
    }

    pub fn insert_mode(&self) -> bool {
        self.insert_mode
    }

    pub fn exe_name(&self) -> &str {
        &self.exe_name
    }

    pub fn popups(&self) -> &[Popup] {
        &self.popups
    }

    /// Process keys until the line completes or input runs out
    pub fn run(&mut self, cx: &mut ReadContext<'_>) -> Step {
        debug_assert!(self.state != EditState::Complete, "completed read driven again");
        loop {
            let class = if self.popups.is_empty() {
                KeyClass::LineEditing
            } else {
                KeyClass::Popup
            };
            let Some(key) = next_key(cx.keys, true, class) else {
                return Step::WouldBlock;
            };

            let step = if self.popups.is_empty() {
                match key {
                    KeyPress::Char { ch, state } => self.char_step(ch, state, cx),
                    KeyPress::Command(event) => self.process_command(event, cx),
                }
            } else {
                self.process_popup_key(key, cx)
            };
            if let Some(step) = step {
                return step;
            }

            self.state = if self.popups.is_empty() {
                EditState::Editing
            } else {
                EditState::PopupActive
            };
        }
    }

    /// Resume a parked read
    pub fn notify(&mut self, reason: WaitReason, cx: &mut ReadContext<'_>) -> Step {
        match reason.cancel_reason() {
            None => self.run(cx),
            Some(cancel) => {
                debug!(reason = %cancel, popups = self.popups.len(), "line read cancelled");
                self.buffer.clear();
                self.caret = 0;
                self.popups.clear();
                self.exe_name.clear();
                self.state = EditState::Complete;
                Step::Done(Err(ConsoleError::Cancelled(cancel)))
            }
        }
    }

    pub(super) fn char_step(
        &mut self,
        ch: char,
        state: ControlKeyState,
        cx: &mut ReadContext<'_>,
    ) -> Option<Step> {
        match self.process_char(ch, state, cx) {
            CharOutcome::Continue => None,
            CharOutcome::Wakeup => Some(Step::Done(self.complete(false, cx))),
            CharOutcome::Enter => Some(Step::Done(self.complete(true, cx))),
        }
    }

    fn process_char(
        &mut self,
        ch: char,
        state: ControlKeyState,
        cx: &mut ReadContext<'_>,
    ) -> CharOutcome {
        // Keep room for CR/LF
        if self.buffer.len() >= self.capacity - 2 && ch != '\r' && ch != '\x08' {
            return CharOutcome::Continue;
        }

        let code = u32::from(ch);
        if code < 0x20 && self.ctrl_wakeup_mask & (1 << code) != 0 {
            self.insert_at_caret(ch, cx);
            self.control_key_state = state;
            return CharOutcome::Wakeup;
        }

        let erase_word = ch == ERASE_PREV_WORD;
        let ch = if erase_word { '\x08' } else { ch };

        if ch == '\x08' && self.processed {
            self.erase_left(erase_word, cx);
            return CharOutcome::Continue;
        }

        if ch == '\r' {
            if self.caret != self.buffer.len() {
                self.caret = self.buffer.len();
                self.place_caret(cx);
            }
            self.buffer.push('\r');
            let mut echoed = "\r";
            if self.processed && self.buffer.len() < self.capacity {
                self.buffer.push('\n');
                echoed = "\r\n";
            }
            self.caret = self.buffer.len();
            if self.echo {
                self.echo_write(echoed, WriteFlags::KEEP_CURSOR_VISIBLE, cx);
            }
            return CharOutcome::Enter;
        }

        self.insert_at_caret(ch, cx);
        CharOutcome::Continue
    }

    fn insert_at_caret(&mut self, ch: char, cx: &mut ReadContext<'_>) {
        if self.caret == self.buffer.len() {
            let column = cells(&self.buffer);
            self.buffer.push(ch);
            self.caret += 1;
            if self.echo {
                let shown = display_text(&[ch], column);
                self.echo_write(&shown, WriteFlags::KEEP_CURSOR_VISIBLE, cx);
                self.visible_cells = cells(&self.buffer);
            }
        } else {
            if self.insert_mode {
                self.buffer.insert(self.caret, ch);
            } else {
                self.buffer[self.caret] = ch;
            }
            self.caret += 1;
            self.redraw(cx);
        }
    }

    /// Backspace, or with `erase_word` one run of word or delimiter
    /// characters
    fn erase_left(&mut self, erase_word: bool, cx: &mut ReadContext<'_>) {
        if self.caret == 0 {
            return;
        }

        let at_eol = self.caret == self.buffer.len();
        let cells_before = cells(&self.buffer[..self.caret]);
        let start_from_delim = cx.settings.is_word_delimiter(self.buffer[self.caret - 1]);
        loop {
            self.caret -= 1;
            self.buffer.remove(self.caret);
            let more = erase_word
                && self.caret > 0
                && (start_from_delim ^ !cx.settings.is_word_delimiter(self.buffer[self.caret - 1]));
            if !more {
                break;
            }
        }

        if at_eol && self.echo {
            let removed = cells_before - cells(&self.buffer);
            let backspaces = "\x08".repeat(removed);
            self.echo_write(
                &backspaces,
                WriteFlags::DESTRUCTIVE_BACKSPACE | WriteFlags::KEEP_CURSOR_VISIBLE,
                cx,
            );
            self.visible_cells = self.visible_cells.saturating_sub(removed);
        } else {
            self.redraw(cx);
        }
    }

    fn process_command(&mut self, event: KeyEvent, cx: &mut ReadContext<'_>) -> Option<Step> {
        let ctrl = event.modifiers.ctrl();
        let alt = event.modifiers.alt();

        match event.vk {
            VirtualKey::Escape => {
                self.buffer.clear();
                self.caret = 0;
                self.redraw(cx);
                self.with_history(cx, HistoryRing::reset);
            }
            VirtualKey::Up | VirtualKey::F(5) => self.recall(Direction::Up, cx),
            VirtualKey::Down => self.recall(Direction::Down, cx),
            VirtualKey::PageUp => {
                let oldest = self
                    .with_history(cx, |ring| ring.retrieve_nth(0).map(str::to_owned))
                    .flatten();
                if let Some(text) = oldest {
                    self.set_line(&text, cx);
                }
            }
            VirtualKey::PageDown => {
                let newest = self
                    .with_history(cx, |ring| {
                        let last = ring.len().checked_sub(1)?;
                        ring.retrieve_nth(last).map(str::to_owned)
                    })
                    .flatten();
                if let Some(text) = newest {
                    self.set_line(&text, cx);
                }
            }
            VirtualKey::Home if ctrl => {
                self.buffer.drain(..self.caret);
                self.caret = 0;
                self.redraw(cx);
            }
            VirtualKey::Home => {
                self.caret = 0;
                self.place_caret(cx);
            }
            VirtualKey::End if ctrl => {
                self.buffer.truncate(self.caret);
                self.redraw(cx);
            }
            VirtualKey::End => {
                self.caret = self.buffer.len();
                self.place_caret(cx);
            }
            VirtualKey::Left if ctrl => {
                self.caret = self.word_left(cx.settings);
                self.place_caret(cx);
            }
            VirtualKey::Left => {
                if self.caret > 0 {
                    self.caret -= 1;
                    self.place_caret(cx);
                }
            }
            VirtualKey::Right if ctrl => {
                self.caret = self.word_right(cx.settings);
                self.place_caret(cx);
            }
            VirtualKey::Right | VirtualKey::F(1) => {
                if self.caret < self.buffer.len() {
                    self.caret += 1;
                    self.place_caret(cx);
                } else {
                    self.copy_from_last_command(1, cx);
                }
            }
            VirtualKey::F(2) if self.history.is_some() => {
                self.open_popup(PopupKind::CopyToChar, cx);
            }
            VirtualKey::F(3) => self.copy_from_last_command(usize::MAX, cx),
            VirtualKey::F(4) if self.history.is_some() => {
                self.open_popup(PopupKind::CopyFromChar, cx);
            }
            VirtualKey::F(6) => return self.char_step(CTRL_Z, event.modifiers, cx),
            VirtualKey::F(7) if alt => {
                self.with_history(cx, HistoryRing::empty);
            }
            VirtualKey::F(7) => {
                let selected = self
                    .with_history(cx, |ring| {
                        let newest = ring.len().checked_sub(1)?;
                        Some(ring.last_displayed().unwrap_or(newest))
                    })
                    .flatten();
                if let Some(selected) = selected {
                    self.open_popup(PopupKind::CommandList { selected }, cx);
                }
            }
            VirtualKey::F(8) => self.search_history(cx),
            VirtualKey::F(9) => {
                let has_commands = self.with_history(cx, |ring| !ring.is_empty());
                if has_commands == Some(true) {
                    self.open_popup(PopupKind::CommandNumber { digits: String::new() }, cx);
                }
            }
            VirtualKey::F(10) if alt => cx.aliases.clear(&self.exe_name),
            VirtualKey::Insert => self.insert_mode = !self.insert_mode,
            VirtualKey::Delete => {
                if self.caret < self.buffer.len() {
                    self.buffer.remove(self.caret);
                    self.redraw(cx);
                }
            }
            _ => {}
        }
        None
    }

    pub(super) fn with_history<T>(
        &self,
        cx: &mut ReadContext<'_>,
        f: impl FnOnce(&mut HistoryRing) -> T,
    ) -> Option<T> {
        let id = self.history?;
        cx.histories.get_mut(id).map(f)
    }

    fn recall(&mut self, direction: Direction, cx: &mut ReadContext<'_>) {
        let text = self
            .with_history(cx, |ring| ring.retrieve(direction).map(str::to_owned))
            .flatten();
        if let Some(text) = text {
            self.set_line(&text, cx);
        }
    }

    /// F8: cycle through entries starting with the text before the caret
    fn search_history(&mut self, cx: &mut ReadContext<'_>) {
        if self.caret == 0 {
            self.recall(Direction::Up, cx);
            return;
        }

        let prefix: String = self.buffer[..self.caret].iter().collect();
        let found = self
            .with_history(cx, |ring| {
                let start = ring.last_displayed()?;
                let idx = ring.find_matching_command(&prefix, start, MatchFlags::empty())?;
                ring.retrieve_nth(idx).map(str::to_owned)
            })
            .flatten();

        if let Some(text) = found {
            let caret = self.caret;
            self.set_line(&text, cx);
            self.caret = caret.min(self.buffer.len());
            self.place_caret(cx);
        }
    }

    /// Copy up to `count` characters of the last command, starting at the
    /// caret, over the edit line
    fn copy_from_last_command(&mut self, count: usize, cx: &mut ReadContext<'_>) {
        let last = self
            .with_history(cx, |ring| ring.last_command().map(str::to_owned))
            .flatten();
        let Some(last) = last else {
            return;
        };

        let source: Vec<char> = last.chars().collect();
        if source.len() <= self.caret {
            return;
        }
        let end = source
            .len()
            .min(self.caret.saturating_add(count))
            .min(self.capacity - 2);
        self.overwrite_from(&source, end, cx);
    }

    /// Overwrite the edit line from the caret with `source[caret..end]`
    pub(super) fn overwrite_from(&mut self, source: &[char], end: usize, cx: &mut ReadContext<'_>) {
        if end <= self.caret {
            return;
        }
        for &ch in &source[self.caret..end] {
            if self.caret < self.buffer.len() {
                self.buffer[self.caret] = ch;
            } else {
                self.buffer.push(ch);
            }
            self.caret += 1;
        }
        self.redraw(cx);
    }

    fn word_left(&self, settings: &EditSettings) -> usize {
        let mut caret = self.caret;
        if caret == 0 {
            return 0;
        }
        caret -= 1;
        while caret > 0 && settings.is_word_delimiter(self.buffer[caret]) {
            caret -= 1;
        }
        while caret > 0 && !settings.is_word_delimiter(self.buffer[caret - 1]) {
            caret -= 1;
        }
        caret
    }

    fn word_right(&self, settings: &EditSettings) -> usize {
        let mut caret = self.caret;
        let len = self.buffer.len();
        while caret < len && !settings.is_word_delimiter(self.buffer[caret]) {
            caret += 1;
        }
        while caret < len && settings.is_word_delimiter(self.buffer[caret]) {
            caret += 1;
        }
        caret
    }

    /// Replace the whole line, caret at the end
    pub(super) fn set_line(&mut self, text: &str, cx: &mut ReadContext<'_>) {
        self.buffer.clear();
        self.buffer
            .extend(text.chars().take(self.capacity.saturating_sub(2)));
        self.caret = self.buffer.len();
        self.redraw(cx);
    }

    pub(super) fn echo_write(
        &mut self,
        text: &str,
        flags: WriteFlags,
        cx: &mut ReadContext<'_>,
    ) -> WriteResult {
        let result = cx.echo.write(text, flags);
        if result.scroll_delta != 0 {
            self.origin = self.origin.scrolled(result.scroll_delta);
            for popup in &mut self.popups {
                popup.saved_cursor = popup.saved_cursor.scrolled(result.scroll_delta);
            }
        }
        result
    }

    /// Draw the whole line again from the origin
    pub(super) fn redraw(&mut self, cx: &mut ReadContext<'_>) {
        if !self.echo {
            return;
        }
        cx.echo.set_cursor_position(self.origin);
        let mut shown = display_text(&self.buffer, 0);
        let line_cells = cells(&self.buffer);
        if line_cells < self.visible_cells {
            shown.extend(std::iter::repeat(' ').take(self.visible_cells - line_cells));
        }
        self.echo_write(
            &shown,
            WriteFlags::DESTRUCTIVE_BACKSPACE | WriteFlags::KEEP_CURSOR_VISIBLE,
            cx,
        );
        self.visible_cells = line_cells;
        self.place_caret(cx);
    }

    /// Move the display cursor to the caret
    pub(super) fn place_caret(&mut self, cx: &mut ReadContext<'_>) {
        if !self.echo {
            return;
        }
        cx.echo.set_cursor_position(self.origin);
        let prefix = display_text(&self.buffer[..self.caret], 0);
        if !prefix.is_empty() {
            self.echo_write(&prefix, WriteFlags::KEEP_CURSOR_VISIBLE, cx);
        }
    }

    /// Finish the read: record history, expand aliases and split what does
    /// not fit into pending input
    fn complete(&mut self, entered: bool, cx: &mut ReadContext<'_>) -> Result<ReadOutput> {
        self.popups.clear();
        self.state = EditState::Complete;
        self.insert_mode = cx.settings.insert_mode;

        let line: String = self.buffer.drain(..).collect();
        self.caret = 0;

        let mut text = line.clone();
        let mut line_count = 1;
        if entered && self.echo {
            let command = line.strip_suffix('\n').unwrap_or(&line);
            let command = command.strip_suffix('\r').unwrap_or(command);
            let no_duplicates = cx.settings.history_no_duplicates;
            if let Some(Err(err)) = self.with_history(cx, |ring| ring.add(command, no_duplicates)) {
                warn!(%err, "command not recorded in history");
            }

            match cx.aliases.expand(&self.exe_name, &line, self.capacity) {
                Ok(expansion) => {
                    text = expansion.text;
                    line_count = expansion.line_count;
                }
                Err(err) => warn!(%err, exe = %self.exe_name, "alias expansion skipped"),
            }
        }

        let first_len = if line_count > 1 {
            text.find('\n').map_or(text.len(), |idx| idx + 1)
        } else {
            text.len()
        };
        let (first, rest) = text.split_at(first_len);
        let (data, consumed) = encode_for_caller(first, self.encoding, self.user_capacity, cx.carry)?;

        let mut remaining = skip_chars(first, consumed).to_string();
        remaining.push_str(rest);
        if !remaining.is_empty() {
            cx.pending.store(&remaining, line_count > 1);
        }

        debug!(
            units = data.len(),
            pending = remaining.len(),
            lines = line_count,
            "line read complete"
        );
        Ok(ReadOutput {
            data,
            control_key_state: self.control_key_state,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CancelReason;
    use crate::input::CodePage;
    use crate::read::harness::{wide, Harness, APP};
    use crate::read::ReadData;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_simple_line() {
        let mut h = Harness::new();
        let mut session = h.session();
        h.type_text("dir\r");
        assert_eq!(wide(h.run(&mut session)), "dir\r\n");
        assert_eq!(h.echo.line(0), "dir");
        assert_eq!(h.ring().commands(), &["dir"]);
        assert_eq!(session.state(), EditState::Complete);
    }

    #[test]
    fn test_insert_in_middle() {
        let mut h = Harness::new();
        let mut session = h.session();
        h.type_text("ac");
        h.key(VirtualKey::Left);
        h.type_text("b");
        assert!(matches!(h.run(&mut session), Step::WouldBlock));
        assert_eq!(session.text(), "abc");
        assert_eq!(session.caret(), 2);
        assert_eq!(h.echo.line(0), "abc");

        h.type_text("\r");
        assert_eq!(wide(h.run(&mut session)), "abc\r\n");
    }

    #[test]
    fn test_overwrite_mode() {
        let mut h = Harness::new();
        let mut session = h.session();
        h.type_text("abc");
        h.key(VirtualKey::Home);
        h.key(VirtualKey::Insert);
        h.type_text("X");
        assert!(matches!(h.run(&mut session), Step::WouldBlock));
        assert!(!session.insert_mode());

        h.type_text("\r");
        assert_eq!(wide(h.run(&mut session)), "Xbc\r\n");
        assert!(session.insert_mode());
    }

    #[test]
    fn test_backspace() {
        let mut h = Harness::new();
        let mut session = h.session();
        h.type_text("abd\x08c\r");
        assert_eq!(wide(h.run(&mut session)), "abc\r\n");
    }

    #[test]
    fn test_backspace_over_wide_character() {
        let mut h = Harness::new();
        let mut session = h.session();
        h.type_text("日\x08");
        assert!(matches!(h.run(&mut session), Step::WouldBlock));
        assert_eq!(session.text(), "");
        assert_eq!(h.echo.writes().last().map(String::as_str), Some("\x08\x08"));
        assert_eq!(h.echo.line(0), "");
    }

    #[test]
    fn test_erase_previous_word() {
        let mut h = Harness::new();
        let mut session = h.session();
        h.type_text("echo hello\x7f");
        assert!(matches!(h.run(&mut session), Step::WouldBlock));
        assert_eq!(session.text(), "echo ");

        h.type_text("\x7f");
        assert!(matches!(h.run(&mut session), Step::WouldBlock));
        assert_eq!(session.text(), "echo");
    }

    #[test]
    fn test_capacity_keeps_room_for_terminator() {
        let mut h = Harness::new();
        let mut session = h.session();
        h.type_text(&"a".repeat(300));
        h.type_text("\r");
        let line = wide(h.run(&mut session));
        assert_eq!(line.chars().count(), 256);
        assert!(line.ends_with("a\r\n"));
        assert!(h.pending.is_empty());
    }

    #[test]
    fn test_long_line_split_into_pending() {
        let mut h = Harness::new();
        let request = h.request(4);
        let mut session = h.session_for(&request);
        h.type_text("abcdef\r");
        assert_eq!(wide(h.run(&mut session)), "abcd");
        assert_eq!(h.pending.text(), "ef\r\n");
        assert!(!h.pending.is_multi_line());
    }

    #[test]
    fn test_ctrl_wakeup() {
        let mut h = Harness::new();
        let mut request = h.request(256);
        request.ctrl_wakeup_mask = 1 << 9;
        let mut session = h.session_for(&request);
        h.type_text("ab");
        h.keys
            .push(KeyEvent::from_char('\t').with_modifiers(ControlKeyState::SHIFT));

        match h.run(&mut session) {
            Step::Done(Ok(output)) => {
                assert_eq!(output.data, ReadData::Wide("ab\t".to_string()));
                assert_eq!(output.control_key_state, ControlKeyState::SHIFT);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(h.ring().is_empty());
    }

    #[test]
    fn test_up_arrow_wraps() {
        let mut h = Harness::with_history(&["a", "b", "c"]);
        let mut session = h.session();
        for expected in ["c", "b", "a", "c"] {
            h.key(VirtualKey::Up);
            assert!(matches!(h.run(&mut session), Step::WouldBlock));
            assert_eq!(session.text(), expected);
        }
        h.key(VirtualKey::Down);
        h.run(&mut session);
        assert_eq!(session.text(), "a");
    }

    #[test]
    fn test_page_keys() {
        let mut h = Harness::with_history(&["first", "middle", "last"]);
        let mut session = h.session();
        h.key(VirtualKey::PageUp);
        h.run(&mut session);
        assert_eq!(session.text(), "first");
        h.key(VirtualKey::PageDown);
        h.run(&mut session);
        assert_eq!(session.text(), "last");
    }

    #[test]
    fn test_escape_clears_line() {
        let mut h = Harness::new();
        let mut session = h.session();
        h.type_text("abc");
        h.key(VirtualKey::Escape);
        h.run(&mut session);
        assert_eq!(session.text(), "");
        assert_eq!(h.echo.line(0), "");
    }

    #[test]
    fn test_history_no_duplicates() {
        let mut h = Harness::with_history(&["a", "b"]);
        h.settings.history_no_duplicates = true;
        let mut session = h.session();
        h.type_text("a\r");
        assert_eq!(wide(h.run(&mut session)), "a\r\n");
        assert_eq!(h.ring().commands(), &["b", "a"]);
    }

    #[test]
    fn test_alias_with_multiple_lines() {
        let mut h = Harness::new();
        h.aliases.define(APP, "gd", "cd $1$Tdir").unwrap();
        let mut session = h.session();
        h.type_text("gd src\r");
        assert_eq!(wide(h.run(&mut session)), "cd src\r\n");
        assert_eq!(h.pending.text(), "dir\r\n");
        assert!(h.pending.is_multi_line());
        assert_eq!(h.ring().commands(), &["gd src"]);
    }

    #[test]
    fn test_echo_off_skips_history_and_display() {
        let mut h = Harness::new();
        h.aliases.define(APP, "secret", "nope").unwrap();
        let mut request = h.request(256);
        request.echo = false;
        let mut session = h.session_for(&request);
        h.type_text("secret\r");
        assert_eq!(wide(h.run(&mut session)), "secret\r\n");
        assert!(h.ring().is_empty());
        assert!(h.echo.writes().is_empty());
    }

    #[test]
    fn test_unprocessed_backspace_is_stored() {
        let mut h = Harness::new();
        let mut request = h.request(256);
        request.processed = false;
        let mut session = h.session_for(&request);
        h.type_text("a\x08\r");
        assert_eq!(wide(h.run(&mut session)), "a\x08\r");
    }

    #[test]
    fn test_f1_and_f3_copy_last_command() {
        let mut h = Harness::with_history(&["abc"]);
        let mut session = h.session();
        h.key(VirtualKey::F(1));
        h.key(VirtualKey::F(1));
        h.run(&mut session);
        assert_eq!(session.text(), "ab");

        let mut h = Harness::with_history(&["hello world"]);
        let mut session = h.session();
        h.type_text("hey");
        h.key(VirtualKey::F(3));
        h.run(&mut session);
        assert_eq!(session.text(), "heylo world");
        assert_eq!(session.caret(), 11);
    }

    #[test]
    fn test_f6_inserts_ctrl_z() {
        let mut h = Harness::new();
        let mut session = h.session();
        h.key(VirtualKey::F(6));
        h.run(&mut session);
        assert_eq!(session.text(), "\x1a");
        assert_eq!(h.echo.line(0), "^Z");
    }

    #[test]
    fn test_f8_searches_prefix() {
        let mut h = Harness::with_history(&["dir a", "cd x", "dir b"]);
        let mut session = h.session();
        h.type_text("di");
        h.key(VirtualKey::F(8));
        h.run(&mut session);
        assert_eq!(session.text(), "dir b");
        assert_eq!(session.caret(), 2);

        h.key(VirtualKey::F(8));
        h.run(&mut session);
        assert_eq!(session.text(), "dir a");
        assert_eq!(session.caret(), 2);
    }

    #[test]
    fn test_ctrl_home_and_ctrl_end() {
        let mut h = Harness::new();
        let mut session = h.session();
        h.type_text("abcdef");
        h.key(VirtualKey::Left);
        h.key(VirtualKey::Left);
        h.key_with(VirtualKey::Home, ControlKeyState::LEFT_CTRL);
        h.run(&mut session);
        assert_eq!(session.text(), "ef");
        assert_eq!(session.caret(), 0);

        h.key(VirtualKey::Right);
        h.key_with(VirtualKey::End, ControlKeyState::RIGHT_CTRL);
        h.run(&mut session);
        assert_eq!(session.text(), "e");
    }

    #[test]
    fn test_word_movement() {
        let mut h = Harness::new();
        let mut session = h.session();
        h.type_text("one two three");
        h.key_with(VirtualKey::Left, ControlKeyState::LEFT_CTRL);
        h.run(&mut session);
        assert_eq!(session.caret(), 8);

        h.key_with(VirtualKey::Left, ControlKeyState::LEFT_CTRL);
        h.run(&mut session);
        assert_eq!(session.caret(), 4);

        h.key_with(VirtualKey::Right, ControlKeyState::LEFT_CTRL);
        h.run(&mut session);
        assert_eq!(session.caret(), 8);
    }

    #[test]
    fn test_configured_word_delimiter() {
        let mut h = Harness::new();
        h.settings.word_delimiters = vec!['\\'];
        let mut session = h.session();
        h.type_text("c:\\dir\\sub\x7f");
        h.run(&mut session);
        assert_eq!(session.text(), "c:\\dir\\");
    }

    #[test]
    fn test_parked_read_resumes_with_state() {
        let mut h = Harness::new();
        let mut session = h.session();
        h.type_text("ab");
        assert!(matches!(h.run(&mut session), Step::WouldBlock));
        assert_eq!(session.state(), EditState::Editing);
        session.park();
        assert_eq!(session.state(), EditState::Parked);

        h.type_text("c\r");
        let step = {
            let mut cx = h.cx();
            session.notify(WaitReason::NewData, &mut cx)
        };
        assert_eq!(wide(step), "abc\r\n");
    }

    #[test]
    fn test_ctrl_c_cancels() {
        let mut h = Harness::new();
        let mut session = h.session();
        h.type_text("ab");
        h.run(&mut session);

        let step = {
            let mut cx = h.cx();
            session.notify(WaitReason::CtrlC, &mut cx)
        };
        match step {
            Step::Done(Err(err)) => assert_eq!(err, ConsoleError::Cancelled(CancelReason::CtrlC)),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(session.text(), "");
        assert_eq!(session.exe_name(), "");
        assert!(h.ring().is_empty());
    }

    #[test]
    fn test_alt_f7_and_alt_f10() {
        let mut h = Harness::with_history(&["a", "b"]);
        h.aliases.define(APP, "ll", "dir").unwrap();
        let mut session = h.session();
        h.key_with(VirtualKey::F(7), ControlKeyState::LEFT_ALT);
        h.key_with(VirtualKey::F(10), ControlKeyState::LEFT_ALT);
        h.run(&mut session);
        assert!(h.ring().is_empty());
        assert!(h.aliases.list(APP).is_empty());
        assert!(session.popups().is_empty());
    }

    #[test]
    fn test_narrow_read_carries_split_character() {
        let mut h = Harness::new();
        let request = LineReadRequest::new(2, ReadEncoding::Narrow(CodePage::Utf8));
        let mut session = h.session_for(&request);
        h.type_text("a日\r");
        match h.run(&mut session) {
            Step::Done(Ok(output)) => assert_eq!(output.data, ReadData::Narrow(vec![b'a', 0xE6])),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(h.carry, vec![0x97, 0xA5]);
        assert_eq!(h.pending.text(), "\r\n");
    }

    #[test]
    fn test_read_without_history() {
        let mut h = Harness::new();
        h.history = None;
        let mut session = h.session();
        h.key(VirtualKey::Up);
        h.key(VirtualKey::F(7));
        h.type_text("x\r");
        assert_eq!(wide(h.run(&mut session)), "x\r\n");
    }
}
