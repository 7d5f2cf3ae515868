//! Key mapping for terminal input
//!
//! Converts crossterm key events to console key events.

use crossterm::event::{KeyCode, KeyEvent as TermKeyEvent, KeyEventKind, KeyModifiers};

use crate::input::{ControlKeyState, KeyEvent, VirtualKey};

impl From<KeyModifiers> for ControlKeyState {
    fn from(mods: KeyModifiers) -> Self {
        let mut result = ControlKeyState::empty();
        if mods.contains(KeyModifiers::SHIFT) {
            result |= ControlKeyState::SHIFT;
        }
        if mods.contains(KeyModifiers::CONTROL) {
            result |= ControlKeyState::LEFT_CTRL;
        }
        if mods.contains(KeyModifiers::ALT) {
            result |= ControlKeyState::LEFT_ALT;
        }
        result
    }
}

/// Key mapper for converting terminal key events to console key events
pub struct KeyMapper;

impl KeyMapper {
    /// Map a crossterm KeyEvent; `None` for keys the console has no use for
    pub fn map(event: &TermKeyEvent) -> Option<KeyEvent> {
        let mods = ControlKeyState::from(event.modifiers);

        let key = match event.code {
            KeyCode::Char(ch) => KeyEvent::from_char(Self::map_char(ch, mods)),
            KeyCode::Enter => KeyEvent::from_key(VirtualKey::Return),
            // Ctrl+Backspace erases a word
            KeyCode::Backspace if mods.ctrl() => KeyEvent {
                ch: '\x7f',
                ..KeyEvent::from_key(VirtualKey::Back)
            },
            KeyCode::Backspace => KeyEvent::from_key(VirtualKey::Back),
            KeyCode::Tab => KeyEvent::from_key(VirtualKey::Tab),
            KeyCode::Esc => KeyEvent::from_key(VirtualKey::Escape),

            // Arrow keys
            KeyCode::Up => KeyEvent::from_key(VirtualKey::Up),
            KeyCode::Down => KeyEvent::from_key(VirtualKey::Down),
            KeyCode::Right => KeyEvent::from_key(VirtualKey::Right),
            KeyCode::Left => KeyEvent::from_key(VirtualKey::Left),

            // Navigation keys
            KeyCode::Home => KeyEvent::from_key(VirtualKey::Home),
            KeyCode::End => KeyEvent::from_key(VirtualKey::End),
            KeyCode::PageUp => KeyEvent::from_key(VirtualKey::PageUp),
            KeyCode::PageDown => KeyEvent::from_key(VirtualKey::PageDown),
            KeyCode::Insert => KeyEvent::from_key(VirtualKey::Insert),
            KeyCode::Delete => KeyEvent::from_key(VirtualKey::Delete),

            KeyCode::F(n) => KeyEvent::from_key(VirtualKey::F(n)),

            _ => return None,
        };

        let key = key.with_modifiers(mods);
        Some(match event.kind {
            KeyEventKind::Release => key.key_up(),
            KeyEventKind::Press | KeyEventKind::Repeat => key,
        })
    }

    /// Map a character with modifiers
    fn map_char(ch: char, mods: ControlKeyState) -> char {
        if !mods.ctrl() || mods.alt() {
            return ch;
        }
        // Ctrl + letter = control character
        if ch.is_ascii_alphabetic() {
            return char::from(ch.to_ascii_lowercase() as u8 - b'a' + 1);
        }
        match ch {
            '@' | '`' | ' ' => '\0',
            '[' => '\x1b',
            '\\' => '\x1c',
            ']' => '\x1d',
            '^' | '~' => '\x1e',
            '_' | '?' => '\x1f',
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_event(code: KeyCode, mods: KeyModifiers) -> TermKeyEvent {
        TermKeyEvent::new(code, mods)
    }

    #[test]
    fn test_char_keys() {
        let event = key_event(KeyCode::Char('a'), KeyModifiers::NONE);
        assert_eq!(KeyMapper::map(&event), Some(KeyEvent::from_char('a')));

        // Ctrl+C
        let event = key_event(KeyCode::Char('c'), KeyModifiers::CONTROL);
        let key = KeyMapper::map(&event).unwrap();
        assert_eq!(key.ch, '\x03');
        assert!(key.modifiers.ctrl());

        // Alt+x keeps the character
        let event = key_event(KeyCode::Char('x'), KeyModifiers::ALT);
        let key = KeyMapper::map(&event).unwrap();
        assert_eq!(key.ch, 'x');
        assert_eq!(key.modifiers, ControlKeyState::LEFT_ALT);
    }

    #[test]
    fn test_backspace_keys() {
        let event = key_event(KeyCode::Backspace, KeyModifiers::NONE);
        assert_eq!(KeyMapper::map(&event).map(|k| k.ch), Some('\x08'));

        let event = key_event(KeyCode::Backspace, KeyModifiers::CONTROL);
        assert_eq!(KeyMapper::map(&event).map(|k| k.ch), Some('\x7f'));
    }

    #[test]
    fn test_editing_keys() {
        let event = key_event(KeyCode::Up, KeyModifiers::NONE);
        assert!(KeyMapper::map(&event).unwrap().is_line_editing_key());

        let event = key_event(KeyCode::F(7), KeyModifiers::ALT);
        let key = KeyMapper::map(&event).unwrap();
        assert_eq!(key.vk, VirtualKey::F(7));
        assert!(key.is_line_editing_key());

        let event = key_event(KeyCode::Enter, KeyModifiers::NONE);
        assert_eq!(KeyMapper::map(&event).map(|k| k.ch), Some('\r'));
    }

    #[test]
    fn test_release_is_key_up() {
        let mut event = key_event(KeyCode::Char('a'), KeyModifiers::NONE);
        event.kind = KeyEventKind::Release;
        assert!(!KeyMapper::map(&event).unwrap().key_down);
    }

    #[test]
    fn test_unmapped_keys() {
        let event = key_event(KeyCode::CapsLock, KeyModifiers::NONE);
        assert_eq!(KeyMapper::map(&event), None);
    }
}
