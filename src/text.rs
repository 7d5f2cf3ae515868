//! Text helpers shared by the alias table, history and the line editor.
//!
//! - Case-insensitive comparisons for application names, alias sources and
//!   history prefix searches
//! - Display cell widths used when echoing the edit line

use unicode_width::UnicodeWidthChar;

/// Columns between tab stops when echoing
pub const TAB_WIDTH: usize = 8;

/// Compare two strings ignoring case
pub fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.chars()
        .flat_map(char::to_lowercase)
        .eq(b.chars().flat_map(char::to_lowercase))
}

/// Check whether `text` starts with `prefix`, ignoring case
pub fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    let mut text_chars = text.chars().flat_map(char::to_lowercase);
    prefix
        .chars()
        .flat_map(char::to_lowercase)
        .all(|p| text_chars.next() == Some(p))
}

/// Display cells for one character written at `column` cells past the
/// start of the edit line.
pub fn char_cells(ch: char, column: usize) -> usize {
    match ch {
        '\t' => TAB_WIDTH - (column % TAB_WIDTH),
        c if (c as u32) < 0x20 || c == '\x7f' => 2,
        c => UnicodeWidthChar::width(c).unwrap_or(1),
    }
}

/// Total display cells of an edit buffer prefix
pub fn cells(chars: &[char]) -> usize {
    chars.iter().fold(0, |column, &ch| column + char_cells(ch, column))
}

/// Render characters the way they appear on screen: control characters as
/// `^X`, tabs expanded to the next stop.
pub fn display_text(chars: &[char], start_column: usize) -> String {
    let mut out = String::with_capacity(chars.len());
    let mut column = start_column;
    for &ch in chars {
        let width = char_cells(ch, column);
        match ch {
            '\t' => out.extend(std::iter::repeat(' ').take(width)),
            '\x7f' => out.push_str("^?"),
            c if (c as u32) < 0x20 => {
                out.push('^');
                out.push(char::from(b'@' + c as u8));
            }
            c => out.push(c),
        }
        column += width;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eq_ignore_case() {
        assert!(eq_ignore_case("CMD.EXE", "cmd.exe"));
        assert!(!eq_ignore_case("cmd", "cmd.exe"));
    }

    #[test]
    fn test_starts_with_ignore_case() {
        assert!(starts_with_ignore_case("Dir /s", "di"));
        assert!(starts_with_ignore_case("dir", ""));
        assert!(!starts_with_ignore_case("di", "dir"));
    }

    #[test]
    fn test_cells() {
        assert_eq!(cells(&['a', 'b']), 2);
        assert_eq!(cells(&['日', 'a']), 3);
        assert_eq!(cells(&['\x03']), 2);
        assert_eq!(cells(&['a', '\t', 'b']), 9);
    }

    #[test]
    fn test_display_text() {
        assert_eq!(display_text(&['a', '\x03'], 0), "a^C");
        assert_eq!(display_text(&['\t'], 5), "   ");
    }
}
