//! Console input queue.

use std::collections::VecDeque;

use super::codepage::CodePage;
use super::key::KeyEvent;

/// Source of decoded key events for read sessions.
///
/// `block` tells the source whether the caller is prepared to park when no
/// key is available; sources never block the calling thread.
pub trait KeySource {
    fn try_get_next_key(&mut self, block: bool) -> Option<KeyEvent>;
}

/// FIFO of pending key events
#[derive(Debug, Default)]
pub struct KeyQueue {
    events: VecDeque<KeyEvent>,
}

impl KeyQueue {
    pub fn push(&mut self, event: KeyEvent) {
        self.events.push_back(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl KeySource for KeyQueue {
    fn try_get_next_key(&mut self, _block: bool) -> Option<KeyEvent> {
        self.events.pop_front()
    }
}

/// Console input buffer.
///
/// Besides the key queue it keeps two carries for narrow callers:
/// - bytes of a multi-byte character written by the producer whose tail has
///   not arrived yet
/// - bytes of a character that did not fit into the last narrow read
#[derive(Debug, Default)]
pub struct InputBuffer {
    queue: KeyQueue,
    code_page: CodePage,
    partial_input: Vec<u8>,
    partial_output: Vec<u8>,
}

impl InputBuffer {
    pub fn new(code_page: CodePage) -> Self {
        Self {
            code_page,
            ..Default::default()
        }
    }

    pub fn code_page(&self) -> CodePage {
        self.code_page
    }

    pub fn set_code_page(&mut self, code_page: CodePage) {
        if code_page != self.code_page {
            self.partial_input.clear();
            self.partial_output.clear();
            self.code_page = code_page;
        }
    }

    /// Queue key events; returns how many were queued
    pub fn write(&mut self, events: impl IntoIterator<Item = KeyEvent>) -> usize {
        let before = self.queue.len();
        for event in events {
            self.queue.push(event);
        }
        self.queue.len() - before
    }

    /// Queue one key-down event per character
    pub fn write_text(&mut self, text: &str) -> usize {
        self.write(text.chars().map(KeyEvent::from_char))
    }

    /// Queue narrow text in the buffer's code page. A character split across
    /// two writes is queued once its last byte arrives.
    pub fn write_narrow(&mut self, bytes: &[u8]) -> usize {
        let text = self.code_page.decode(&mut self.partial_input, bytes);
        self.write_text(&text)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Drop everything queued, including carried bytes
    pub fn flush(&mut self) {
        self.queue.clear();
        self.partial_input.clear();
        self.partial_output.clear();
    }

    /// Split into the key source and the outgoing narrow carry
    pub(crate) fn parts(&mut self) -> (&mut KeyQueue, &mut Vec<u8>) {
        (&mut self.queue, &mut self.partial_output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_text_queues_keys() {
        let mut input = InputBuffer::new(CodePage::Utf8);
        assert_eq!(input.write_text("ab\r"), 3);
        assert_eq!(input.len(), 3);
        let (queue, _) = input.parts();
        assert_eq!(queue.try_get_next_key(true).map(|k| k.ch), Some('a'));
    }

    #[test]
    fn test_split_narrow_character_reassembled() {
        let mut input = InputBuffer::new(CodePage::Utf8);
        let bytes = "é".as_bytes();
        assert_eq!(input.write_narrow(&bytes[..1]), 0);
        assert_eq!(input.write_narrow(&bytes[1..]), 1);
        let (queue, _) = input.parts();
        assert_eq!(queue.try_get_next_key(false).map(|k| k.ch), Some('é'));
        assert_eq!(queue.try_get_next_key(false), None);
    }

    #[test]
    fn test_set_code_page_drops_carries() {
        let mut input = InputBuffer::new(CodePage::Utf8);
        input.write_narrow(&"é".as_bytes()[..1]);
        input.set_code_page(CodePage::Latin1);
        assert_eq!(input.write_narrow(&[0xE9]), 1);
    }
}
