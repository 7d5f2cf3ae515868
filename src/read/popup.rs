//! Popups layered over an in-progress line edit.
//!
//! Popups stack: the top one receives every key until it closes. Only the
//! command list opens a nested popup (F9).

use unicode_width::UnicodeWidthStr;

use super::cooked::LineEditSession;
use super::{KeyPress, ReadContext, Step};
use crate::echo::{CursorToken, WriteFlags};
use crate::history::MatchFlags;
use crate::input::VirtualKey;

/// Rows the command list moves on PgUp/PgDn
pub const COMMAND_LIST_HEIGHT: usize = 10;

/// Cells reserved for the command list line
pub const COMMAND_LIST_WIDTH: usize = 40;

/// Digits accepted by the command number popup
pub const COMMAND_NUMBER_DIGITS: usize = 5;

const COPY_TO_PROMPT: &str = "Enter char to copy up to: ";
const COPY_FROM_PROMPT: &str = "Enter char to delete up to: ";
const NUMBER_PROMPT: &str = "Enter command number: ";

/// What a popup does
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PopupKind {
    /// Browse history (F7)
    CommandList { selected: usize },
    /// Jump to a history entry by number (F9)
    CommandNumber { digits: String },
    /// Copy from the last command up to a character (F2)
    CopyToChar,
    /// Delete from the caret up to a character (F4)
    CopyFromChar,
}

impl PopupKind {
    /// Cells reserved on screen
    pub fn width(&self) -> usize {
        match self {
            PopupKind::CommandList { .. } => COMMAND_LIST_WIDTH,
            PopupKind::CommandNumber { .. } => NUMBER_PROMPT.width() + COMMAND_NUMBER_DIGITS,
            PopupKind::CopyToChar => COPY_TO_PROMPT.width(),
            PopupKind::CopyFromChar => COPY_FROM_PROMPT.width(),
        }
    }
}

/// An open popup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Popup {
    pub kind: PopupKind,
    /// Cursor before the popup opened
    pub saved_cursor: CursorToken,
    pub width: usize,
    /// Cells of the label currently on screen
    drawn: usize,
}

impl LineEditSession {
    pub(super) fn open_popup(&mut self, kind: PopupKind, cx: &mut ReadContext<'_>) {
        let saved_cursor = if self.echo {
            cx.echo.cursor_position()
        } else {
            self.origin
        };
        let width = kind.width();
        self.popups.push(Popup {
            kind,
            saved_cursor,
            width,
            drawn: 0,
        });
        self.draw_popup(cx);
    }

    fn popup_label(&self, cx: &mut ReadContext<'_>) -> String {
        let Some(popup) = self.popups.last() else {
            return String::new();
        };
        let label = match &popup.kind {
            PopupKind::CopyToChar => COPY_TO_PROMPT.to_string(),
            PopupKind::CopyFromChar => COPY_FROM_PROMPT.to_string(),
            PopupKind::CommandNumber { digits } => format!("{NUMBER_PROMPT}{digits}"),
            PopupKind::CommandList { selected } => {
                let selected = *selected;
                let command = self
                    .history
                    .and_then(|id| cx.histories.get(id))
                    .and_then(|ring| ring.get_nth(selected))
                    .unwrap_or_default();
                format!("{selected}: {command}")
            }
        };
        label.chars().take(popup.width).collect()
    }

    fn draw_popup(&mut self, cx: &mut ReadContext<'_>) {
        if !self.echo {
            return;
        }
        let mut label = self.popup_label(cx);
        let Some(popup) = self.popups.last_mut() else {
            return;
        };
        let cells = label.width();
        if cells < popup.drawn {
            label.extend(std::iter::repeat(' ').take(popup.drawn - cells));
        }
        popup.drawn = cells;
        let saved = popup.saved_cursor;
        cx.echo.set_cursor_position(saved);
        self.echo_write(&label, WriteFlags::KEEP_CURSOR_VISIBLE, cx);
    }

    fn erase_top_popup(&mut self, cx: &mut ReadContext<'_>) {
        let Some(popup) = self.popups.pop() else {
            return;
        };
        if self.echo && popup.drawn > 0 {
            cx.echo.set_cursor_position(popup.saved_cursor);
            let blank = " ".repeat(popup.drawn);
            self.echo_write(&blank, WriteFlags::empty(), cx);
            cx.echo.set_cursor_position(popup.saved_cursor);
        }
    }

    /// Close the top popup and show whatever is underneath
    pub(super) fn close_popup(&mut self, cx: &mut ReadContext<'_>) {
        self.erase_top_popup(cx);
        if self.popups.is_empty() {
            self.redraw(cx);
        } else {
            self.draw_popup(cx);
        }
    }

    /// Close every popup and return to the edit line
    pub(super) fn close_all_popups(&mut self, cx: &mut ReadContext<'_>) {
        while !self.popups.is_empty() {
            self.erase_top_popup(cx);
        }
        self.redraw(cx);
    }

    pub(super) fn process_popup_key(&mut self, key: KeyPress, cx: &mut ReadContext<'_>) -> Option<Step> {
        let kind = self.popups.last()?.kind.clone();
        match kind {
            PopupKind::CommandList { selected } => self.command_list_key(selected, key, cx),
            PopupKind::CommandNumber { .. } => {
                self.command_number_key(key, cx);
                None
            }
            PopupKind::CopyToChar => {
                self.copy_to_char_key(key, cx);
                None
            }
            PopupKind::CopyFromChar => {
                self.copy_from_char_key(key, cx);
                None
            }
        }
    }

    fn command_number_key(&mut self, key: KeyPress, cx: &mut ReadContext<'_>) {
        match key {
            KeyPress::Command(event) if event.vk == VirtualKey::Escape => {
                let saved = self.popups.last().map(|p| p.saved_cursor);
                self.close_popup(cx);
                if let (Some(saved), true, true) = (saved, self.echo, self.popups.is_empty()) {
                    cx.echo.set_cursor_position(saved);
                }
            }
            KeyPress::Char { ch: '\r', .. } => {
                let number = match self.popups.last() {
                    Some(Popup {
                        kind: PopupKind::CommandNumber { digits },
                        ..
                    }) => digits.parse::<usize>().unwrap_or(0),
                    _ => 0,
                };
                let text = self
                    .with_history(cx, |ring| {
                        let index = number.min(ring.len().checked_sub(1)?);
                        ring.retrieve_nth(index).map(str::to_owned)
                    })
                    .flatten();
                self.close_all_popups(cx);
                if let Some(text) = text {
                    self.set_line(&text, cx);
                }
            }
            KeyPress::Char { ch, .. } => {
                if let Some(Popup {
                    kind: PopupKind::CommandNumber { digits },
                    ..
                }) = self.popups.last_mut()
                {
                    if ch == '\x08' {
                        digits.pop();
                    } else if ch.is_ascii_digit() && digits.len() < COMMAND_NUMBER_DIGITS {
                        digits.push(ch);
                    } else {
                        return;
                    }
                }
                self.draw_popup(cx);
            }
            KeyPress::Command(_) => {}
        }
    }

    fn copy_to_char_key(&mut self, key: KeyPress, cx: &mut ReadContext<'_>) {
        match key {
            KeyPress::Command(event) if event.vk == VirtualKey::Escape => self.close_popup(cx),
            KeyPress::Command(_) => {}
            KeyPress::Char { ch, .. } => {
                let last = self
                    .with_history(cx, |ring| ring.last_command().map(str::to_owned))
                    .flatten();
                self.close_popup(cx);

                let Some(last) = last else {
                    return;
                };
                let source: Vec<char> = last.chars().collect();
                let found = source
                    .iter()
                    .enumerate()
                    .skip(self.caret + 1)
                    .find(|(_, &c)| c == ch)
                    .map(|(idx, _)| idx);
                if let Some(end) = found {
                    self.overwrite_from(&source, end.min(self.capacity - 2), cx);
                }
            }
        }
    }

    fn copy_from_char_key(&mut self, key: KeyPress, cx: &mut ReadContext<'_>) {
        match key {
            KeyPress::Command(event) if event.vk == VirtualKey::Escape => self.close_popup(cx),
            KeyPress::Command(_) => {}
            KeyPress::Char { ch, .. } => {
                self.close_popup(cx);
                if self.caret >= self.buffer.len() {
                    return;
                }
                let end = self
                    .buffer
                    .iter()
                    .enumerate()
                    .skip(self.caret + 1)
                    .find(|(_, &c)| c == ch)
                    .map_or(self.buffer.len(), |(idx, _)| idx);
                self.buffer.drain(self.caret..end);
                self.redraw(cx);
            }
        }
    }

    fn set_list_selection(&mut self, selected: usize, cx: &mut ReadContext<'_>) {
        if let Some(Popup {
            kind: PopupKind::CommandList { selected: current },
            ..
        }) = self.popups.last_mut()
        {
            *current = selected;
        }
        self.draw_popup(cx);
    }

    fn command_list_key(
        &mut self,
        selected: usize,
        key: KeyPress,
        cx: &mut ReadContext<'_>,
    ) -> Option<Step> {
        let count = self.with_history(cx, |ring| ring.len()).unwrap_or(0);
        if count == 0 {
            self.close_popup(cx);
            return None;
        }
        let last = count - 1;
        let selected = selected.min(last);

        match key {
            KeyPress::Command(event) => match event.vk {
                VirtualKey::Escape => self.close_popup(cx),
                VirtualKey::Up => self.set_list_selection(selected.saturating_sub(1), cx),
                VirtualKey::Down => self.set_list_selection((selected + 1).min(last), cx),
                VirtualKey::PageUp => {
                    self.set_list_selection(selected.saturating_sub(COMMAND_LIST_HEIGHT), cx)
                }
                VirtualKey::PageDown => {
                    self.set_list_selection((selected + COMMAND_LIST_HEIGHT).min(last), cx)
                }
                VirtualKey::Home => self.set_list_selection(0, cx),
                VirtualKey::End => self.set_list_selection(last, cx),
                VirtualKey::Left | VirtualKey::Right => {
                    let text = self
                        .with_history(cx, |ring| ring.retrieve_nth(selected).map(str::to_owned))
                        .flatten();
                    self.close_popup(cx);
                    if let Some(text) = text {
                        self.set_line(&text, cx);
                    }
                }
                VirtualKey::F(9) => {
                    self.open_popup(PopupKind::CommandNumber { digits: String::new() }, cx);
                }
                VirtualKey::Delete => {
                    let remaining = self
                        .with_history(cx, |ring| {
                            ring.remove(selected);
                            ring.len()
                        })
                        .unwrap_or(0);
                    if remaining == 0 {
                        self.close_popup(cx);
                    } else {
                        self.set_list_selection(selected.min(remaining - 1), cx);
                    }
                }
                _ => {}
            },
            KeyPress::Char { ch: '\r', state } => {
                let text = self
                    .with_history(cx, |ring| ring.retrieve_nth(selected).map(str::to_owned))
                    .flatten();
                self.close_all_popups(cx);
                if let Some(text) = text {
                    self.set_line(&text, cx);
                }
                return self.char_step('\r', state, cx);
            }
            KeyPress::Char { ch, .. } => {
                let prefix = ch.to_string();
                let found = self
                    .with_history(cx, |ring| {
                        ring.find_matching_command(&prefix, selected, MatchFlags::JUST_LOOKING)
                    })
                    .flatten();
                if let Some(idx) = found {
                    self.set_list_selection(idx, cx);
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::read::harness::{wide, Harness};
    use crate::read::EditState;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_number_popup_nested_in_list() {
        let mut h = Harness::with_history(&["a", "b", "c"]);
        let mut session = h.session();
        h.key(VirtualKey::F(7));
        h.key(VirtualKey::F(9));
        h.run(&mut session);
        assert_eq!(session.popups().len(), 2);
        assert_eq!(session.state(), EditState::PopupActive);

        h.type_text("1\r");
        h.run(&mut session);
        assert!(session.popups().is_empty());
        assert_eq!(session.text(), "b");
        assert_eq!(session.caret(), 1);
        assert_eq!(session.state(), EditState::Editing);
        assert_eq!(h.ring().last_displayed(), Some(1));
    }

    #[test]
    fn test_number_popup_escape_restores_line() {
        let mut h = Harness::with_history(&["a"]);
        let mut session = h.session();
        h.type_text("xy");
        h.key(VirtualKey::F(9));
        h.type_text("2");
        h.run(&mut session);
        assert!(h.echo.line(0).starts_with("xyEnter command number: 2"));

        h.key(VirtualKey::Escape);
        h.run(&mut session);
        assert!(session.popups().is_empty());
        assert_eq!(session.text(), "xy");
        assert_eq!(h.echo.line(0), "xy");
        assert_eq!(h.echo.cursor(), (2, 0));
    }

    #[test]
    fn test_number_popup_digits() {
        let mut h = Harness::with_history(&["a", "b", "c"]);
        let mut session = h.session();
        h.key(VirtualKey::F(9));
        h.type_text("1234567\x08x");
        h.run(&mut session);
        assert_eq!(
            session.popups()[0].kind,
            PopupKind::CommandNumber {
                digits: "1234".to_string()
            }
        );

        h.type_text("\r");
        h.run(&mut session);
        assert_eq!(session.text(), "c");
    }

    #[test]
    fn test_number_popup_needs_history() {
        let mut h = Harness::new();
        let mut session = h.session();
        h.key(VirtualKey::F(9));
        h.run(&mut session);
        assert!(session.popups().is_empty());
    }

    #[test]
    fn test_list_enter_completes_read() {
        let mut h = Harness::with_history(&["a", "b", "c"]);
        let mut session = h.session();
        h.key(VirtualKey::F(7));
        h.key(VirtualKey::Up);
        h.type_text("\r");
        assert_eq!(wide(h.run(&mut session)), "b\r\n");
        assert!(session.popups().is_empty());
    }

    #[test]
    fn test_list_typed_char_selects_match() {
        let mut h = Harness::with_history(&["apple", "banana", "cherry"]);
        let mut session = h.session();
        h.key(VirtualKey::F(7));
        h.type_text("a\r");
        assert_eq!(wide(h.run(&mut session)), "apple\r\n");
    }

    #[test]
    fn test_list_navigation_keys() {
        let mut h = Harness::with_history(&["a", "b", "c"]);
        let mut session = h.session();
        h.key(VirtualKey::F(7));
        h.key(VirtualKey::Home);
        h.run(&mut session);
        assert_eq!(session.popups()[0].kind, PopupKind::CommandList { selected: 0 });

        h.key(VirtualKey::PageDown);
        h.run(&mut session);
        assert_eq!(session.popups()[0].kind, PopupKind::CommandList { selected: 2 });

        h.key(VirtualKey::Up);
        h.key(VirtualKey::Left);
        h.run(&mut session);
        assert!(session.popups().is_empty());
        assert_eq!(session.text(), "b");
    }

    #[test]
    fn test_list_delete_removes_entry() {
        let mut h = Harness::with_history(&["a", "b", "c"]);
        let mut session = h.session();
        h.key(VirtualKey::F(7));
        h.key(VirtualKey::Delete);
        h.run(&mut session);
        assert_eq!(h.ring().commands(), &["a", "b"]);
        assert_eq!(session.popups()[0].kind, PopupKind::CommandList { selected: 1 });

        h.key(VirtualKey::Escape);
        h.run(&mut session);
        assert!(session.popups().is_empty());
        assert_eq!(session.text(), "");
    }

    #[test]
    fn test_copy_to_char() {
        let mut h = Harness::with_history(&["abcdef"]);
        let mut session = h.session();
        h.key(VirtualKey::F(2));
        h.run(&mut session);
        assert_eq!(h.echo.line(0), COPY_TO_PROMPT.trim_end());

        h.type_text("d");
        h.run(&mut session);
        assert!(session.popups().is_empty());
        assert_eq!(session.text(), "abc");
        assert_eq!(session.caret(), 3);
        assert_eq!(h.echo.line(0), "abc");
    }

    #[test]
    fn test_copy_to_missing_char_does_nothing() {
        let mut h = Harness::with_history(&["abcdef"]);
        let mut session = h.session();
        h.key(VirtualKey::F(2));
        h.type_text("z");
        h.run(&mut session);
        assert_eq!(session.text(), "");
        assert_eq!(h.echo.line(0), "");
    }

    #[test]
    fn test_copy_from_char_deletes_up_to_char() {
        let mut h = Harness::with_history(&["x"]);
        let mut session = h.session();
        h.type_text("abcdef");
        h.key(VirtualKey::Home);
        h.key(VirtualKey::F(4));
        h.type_text("d");
        h.run(&mut session);
        assert_eq!(session.text(), "def");
        assert_eq!(session.caret(), 0);
        assert_eq!(h.echo.line(0), "def");
    }

    #[test]
    fn test_copy_from_missing_char_deletes_to_end() {
        let mut h = Harness::with_history(&["x"]);
        let mut session = h.session();
        h.type_text("abcdef");
        h.key(VirtualKey::Home);
        h.key(VirtualKey::Right);
        h.key(VirtualKey::F(4));
        h.type_text("z");
        h.run(&mut session);
        assert_eq!(session.text(), "a");
    }
}
