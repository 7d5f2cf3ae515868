//! Read sessions: cooked line edits and raw character reads.
//!
//! ```text
//! ConsoleSession::begin_*_read
//! ├── LineEditSession      (cooked, line editing + popups)
//! │   └── Popup stack      (list, number, copy-to, copy-from)
//! └── CharacterReadSession (raw)
//! ```
//!
//! A session that runs out of keys returns [`Step::WouldBlock`] and is parked
//! by the console. Every later notification calls back into the same session
//! object with its state intact.

pub mod cooked;
pub mod pending;
pub mod popup;
pub mod raw;
pub mod wait;

#[cfg(test)]
pub(crate) mod harness;

pub use cooked::{EditState, LineEditSession, LineReadRequest};
pub use pending::PendingInput;
pub use popup::{Popup, PopupKind};
pub use raw::{CharReadRequest, CharacterReadSession};
pub use wait::{ReadHandle, Step, WaitReason};

use crate::alias::AliasStore;
use crate::echo::EchoSink;
use crate::error::Result;
use crate::history::HistoryPool;
use crate::input::{CodePage, ControlKeyState, KeyEvent, KeySource, VirtualKey};

/// How the caller sizes its buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadEncoding {
    /// Capacity counts characters
    Wide,
    /// Capacity counts bytes in the given code page
    Narrow(CodePage),
}

impl ReadEncoding {
    /// Units `text` occupies in the caller's buffer
    pub fn units(self, text: &str) -> usize {
        match self {
            ReadEncoding::Wide => text.chars().count(),
            ReadEncoding::Narrow(cp) => cp.encoded_len(text),
        }
    }

    pub fn char_units(self, ch: char) -> usize {
        match self {
            ReadEncoding::Wide => 1,
            ReadEncoding::Narrow(cp) => cp.char_len(ch),
        }
    }
}

/// Data handed back to the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadData {
    Wide(String),
    Narrow(Vec<u8>),
}

impl ReadData {
    /// Length in caller units
    pub fn len(&self) -> usize {
        match self {
            ReadData::Wide(text) => text.chars().count(),
            ReadData::Narrow(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_wide(&self) -> Option<&str> {
        match self {
            ReadData::Wide(text) => Some(text),
            ReadData::Narrow(_) => None,
        }
    }

    pub fn as_narrow(&self) -> Option<&[u8]> {
        match self {
            ReadData::Narrow(bytes) => Some(bytes),
            ReadData::Wide(_) => None,
        }
    }
}

/// A completed read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOutput {
    pub data: ReadData,
    /// Modifier state of the key that woke the read, if any
    pub control_key_state: ControlKeyState,
}

impl ReadOutput {
    pub fn new(data: ReadData) -> Self {
        Self {
            data,
            control_key_state: ControlKeyState::empty(),
        }
    }
}

/// Line editing preferences shared by all sessions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditSettings {
    pub insert_mode: bool,
    pub history_no_duplicates: bool,
    /// Extra word delimiters besides space
    pub word_delimiters: Vec<char>,
}

impl Default for EditSettings {
    fn default() -> Self {
        Self {
            insert_mode: true,
            history_no_duplicates: false,
            word_delimiters: Vec::new(),
        }
    }
}

impl EditSettings {
    pub fn is_word_delimiter(&self, ch: char) -> bool {
        ch == ' ' || self.word_delimiters.contains(&ch)
    }
}

/// Everything a session touches while it runs, borrowed from the console
pub struct ReadContext<'a> {
    pub keys: &'a mut dyn KeySource,
    /// Bytes of a character that did not fit the previous narrow read
    pub carry: &'a mut Vec<u8>,
    pub echo: &'a mut dyn EchoSink,
    pub histories: &'a mut HistoryPool,
    pub aliases: &'a mut AliasStore,
    pub pending: &'a mut PendingInput,
    pub settings: &'a EditSettings,
}

/// Which function keys the caller wants reported as commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum KeyClass {
    LineEditing,
    Popup,
}

/// A key after filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum KeyPress {
    Char { ch: char, state: ControlKeyState },
    Command(KeyEvent),
}

/// Pull the next key a session cares about, skipping key-up events and
/// keys that produce nothing.
pub(crate) fn next_key(keys: &mut dyn KeySource, block: bool, class: KeyClass) -> Option<KeyPress> {
    loop {
        let event = keys.try_get_next_key(block)?;
        if !event.key_down {
            continue;
        }

        let command = match class {
            KeyClass::LineEditing => event.is_line_editing_key(),
            KeyClass::Popup => event.is_popup_key(),
        };
        if command {
            return Some(KeyPress::Command(event));
        }
        if event.ch != '\0' && event.vk != VirtualKey::Escape && event.ch != '\n' {
            return Some(KeyPress::Char {
                ch: event.ch,
                state: event.modifiers,
            });
        }
    }
}

/// Pull the next typed character for a raw read
pub(crate) fn next_char(keys: &mut dyn KeySource, block: bool) -> Option<char> {
    loop {
        let event = keys.try_get_next_key(block)?;
        if event.key_down && event.ch != '\0' {
            return Some(event.ch);
        }
    }
}

/// Encode as much of `text` as fits in `capacity` caller units.
///
/// Returns the data and the number of characters consumed. In narrow mode a
/// character whose encoding only partly fits is consumed: its leading bytes
/// are returned and the rest goes to `carry`.
pub(crate) fn encode_for_caller(
    text: &str,
    encoding: ReadEncoding,
    capacity: usize,
    carry: &mut Vec<u8>,
) -> Result<(ReadData, usize)> {
    match encoding {
        ReadEncoding::Wide => {
            let consumed = text.chars().count().min(capacity);
            let mut out = String::new();
            out.try_reserve(consumed)?;
            out.extend(text.chars().take(consumed));
            Ok((ReadData::Wide(out), consumed))
        }
        ReadEncoding::Narrow(cp) => {
            let mut out = Vec::new();
            out.try_reserve(capacity.min(cp.encoded_len(text)))?;
            let mut consumed = 0;
            let mut scratch = Vec::with_capacity(4);
            for ch in text.chars() {
                if out.len() >= capacity {
                    break;
                }
                scratch.clear();
                cp.encode_char(ch, &mut scratch);
                let room = capacity - out.len();
                if scratch.len() <= room {
                    out.extend_from_slice(&scratch);
                } else {
                    out.extend_from_slice(&scratch[..room]);
                    carry.extend_from_slice(&scratch[room..]);
                }
                consumed += 1;
            }
            Ok((ReadData::Narrow(out), consumed))
        }
    }
}

/// Hand out bytes carried from the previous narrow read
pub(crate) fn take_carry(carry: &mut Vec<u8>, capacity: usize) -> Vec<u8> {
    let take = carry.len().min(capacity);
    carry.drain(..take).collect()
}

/// Skip `count` characters of `text`
pub(crate) fn skip_chars(text: &str, count: usize) -> &str {
    match text.char_indices().nth(count) {
        Some((idx, _)) => &text[idx..],
        None => "",
    }
}

/// Prefix carried bytes onto freshly encoded narrow data
pub(crate) fn prepend_bytes(prefix: Vec<u8>, data: ReadData) -> ReadData {
    match data {
        ReadData::Narrow(bytes) if !prefix.is_empty() => {
            let mut out = prefix;
            out.extend_from_slice(&bytes);
            ReadData::Narrow(out)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::KeyQueue;

    #[test]
    fn test_next_key_filters() {
        let mut queue = KeyQueue::default();
        queue.push(KeyEvent::from_char('a').key_up());
        queue.push(KeyEvent::from_key(VirtualKey::F(12)));
        queue.push(KeyEvent::from_char('b'));
        assert_eq!(
            next_key(&mut queue, true, KeyClass::LineEditing),
            Some(KeyPress::Char {
                ch: 'b',
                state: ControlKeyState::empty()
            })
        );

        queue.push(KeyEvent::from_key(VirtualKey::Escape));
        assert_eq!(
            next_key(&mut queue, true, KeyClass::LineEditing),
            Some(KeyPress::Command(KeyEvent::from_key(VirtualKey::Escape)))
        );
        assert_eq!(next_key(&mut queue, true, KeyClass::LineEditing), None);
    }

    #[test]
    fn test_encode_wide_truncates() {
        let mut carry = Vec::new();
        let (data, consumed) = encode_for_caller("hello", ReadEncoding::Wide, 3, &mut carry).unwrap();
        assert_eq!(data, ReadData::Wide("hel".to_string()));
        assert_eq!(consumed, 3);
    }

    #[test]
    fn test_encode_narrow_carries_split_character() {
        let mut carry = Vec::new();
        let enc = ReadEncoding::Narrow(CodePage::Utf8);
        let (data, consumed) = encode_for_caller("a日b", enc, 3, &mut carry).unwrap();
        assert_eq!(data, ReadData::Narrow(vec![b'a', 0xE6, 0x97]));
        assert_eq!(consumed, 2);
        assert_eq!(carry, vec![0xA5]);
    }

    #[test]
    fn test_skip_chars() {
        assert_eq!(skip_chars("日本語", 1), "本語");
        assert_eq!(skip_chars("ab", 5), "");
    }
}
