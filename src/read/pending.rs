//! Text produced by a completed line read that the caller had no room for.

use super::{encode_for_caller, skip_chars, ReadData, ReadEncoding};
use crate::error::Result;

/// Leftover text of one input handle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingInput {
    text: String,
    /// Text holds more than one line from a `$T` alias
    multi_line: bool,
}

impl PendingInput {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn is_multi_line(&self) -> bool {
        self.multi_line
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn store(&mut self, text: &str, multi_line: bool) {
        self.text.push_str(text);
        self.multi_line |= multi_line;
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.multi_line = false;
    }

    /// Hand out the next chunk: the next line when multi-line, otherwise as
    /// much as fits.
    pub fn take(
        &mut self,
        encoding: ReadEncoding,
        capacity: usize,
        carry: &mut Vec<u8>,
    ) -> Result<Option<ReadData>> {
        if self.text.is_empty() {
            return Ok(None);
        }

        let chunk = if self.multi_line {
            match self.text.find('\n') {
                Some(idx) => &self.text[..=idx],
                None => self.text.as_str(),
            }
        } else {
            self.text.as_str()
        };

        let (data, consumed) = encode_for_caller(chunk, encoding, capacity, carry)?;
        self.text = skip_chars(&self.text, consumed).to_string();
        if self.text.is_empty() {
            self.multi_line = false;
        }
        Ok(Some(data))
    }
}
