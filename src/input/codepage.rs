//! Narrow (byte) encodings for callers that read and write bytes.

/// Built-in narrow code pages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CodePage {
    /// 65001
    #[default]
    Utf8,
    /// 28591
    Latin1,
}

impl CodePage {
    pub fn from_id(id: u32) -> Option<Self> {
        match id {
            65001 => Some(CodePage::Utf8),
            28591 => Some(CodePage::Latin1),
            _ => None,
        }
    }

    pub fn id(self) -> u32 {
        match self {
            CodePage::Utf8 => 65001,
            CodePage::Latin1 => 28591,
        }
    }

    /// Append the encoding of `ch` to `out`
    pub fn encode_char(self, ch: char, out: &mut Vec<u8>) {
        match self {
            CodePage::Utf8 => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
            }
            CodePage::Latin1 => {
                out.push(u8::try_from(u32::from(ch)).unwrap_or(b'?'));
            }
        }
    }

    /// Bytes needed for `ch`
    pub fn char_len(self, ch: char) -> usize {
        match self {
            CodePage::Utf8 => ch.len_utf8(),
            CodePage::Latin1 => 1,
        }
    }

    /// Bytes needed for `text`
    pub fn encoded_len(self, text: &str) -> usize {
        match self {
            CodePage::Utf8 => text.len(),
            CodePage::Latin1 => text.chars().count(),
        }
    }

    pub fn encode(self, text: &str) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len(text));
        for ch in text.chars() {
            self.encode_char(ch, &mut out);
        }
        out
    }

    /// Decode `bytes` after whatever is left in `carry` from the previous
    /// call. An incomplete trailing sequence stays in `carry`.
    pub fn decode(self, carry: &mut Vec<u8>, bytes: &[u8]) -> String {
        match self {
            CodePage::Latin1 => bytes.iter().map(|&b| char::from(b)).collect(),
            CodePage::Utf8 => {
                let mut pending = std::mem::take(carry);
                pending.extend_from_slice(bytes);

                let mut out = String::with_capacity(pending.len());
                let mut rest = pending.as_slice();
                loop {
                    match std::str::from_utf8(rest) {
                        Ok(text) => {
                            out.push_str(text);
                            break;
                        }
                        Err(err) => {
                            let (valid, after) = rest.split_at(err.valid_up_to());
                            if let Ok(text) = std::str::from_utf8(valid) {
                                out.push_str(text);
                            }
                            match err.error_len() {
                                Some(bad) => {
                                    out.push(char::REPLACEMENT_CHARACTER);
                                    rest = &after[bad..];
                                }
                                None => {
                                    carry.extend_from_slice(after);
                                    break;
                                }
                            }
                        }
                    }
                }
                out
            }
        }
    }
}
