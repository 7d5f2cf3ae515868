//! Decoded key events as delivered by the input producer.

use bitflags::bitflags;

bitflags! {
    /// Modifier and toggle state reported with every key
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct ControlKeyState: u32 {
        const RIGHT_ALT  = 0x0001;
        const LEFT_ALT   = 0x0002;
        const RIGHT_CTRL = 0x0004;
        const LEFT_CTRL  = 0x0008;
        const SHIFT      = 0x0010;
        const NUMLOCK    = 0x0020;
        const SCROLLLOCK = 0x0040;
        const CAPSLOCK   = 0x0080;
        const ENHANCED   = 0x0100;
    }
}

impl ControlKeyState {
    pub fn ctrl(self) -> bool {
        self.intersects(Self::LEFT_CTRL | Self::RIGHT_CTRL)
    }

    pub fn alt(self) -> bool {
        self.intersects(Self::LEFT_ALT | Self::RIGHT_ALT)
    }
}

/// Virtual key of a key event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VirtualKey {
    /// Plain character key
    None,
    Back,
    Tab,
    Return,
    Escape,
    PageUp,
    PageDown,
    End,
    Home,
    Left,
    Up,
    Right,
    Down,
    Insert,
    Delete,
    /// Function key F1..F24
    F(u8),
}

/// One keyboard event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    /// Character produced, `'\0'` if none
    pub ch: char,
    pub vk: VirtualKey,
    pub modifiers: ControlKeyState,
    pub key_down: bool,
}

impl KeyEvent {
    /// Key-down event for a typed character
    pub fn from_char(ch: char) -> Self {
        let vk = match ch {
            '\x08' => VirtualKey::Back,
            '\t' => VirtualKey::Tab,
            '\r' => VirtualKey::Return,
            '\x1b' => VirtualKey::Escape,
            _ => VirtualKey::None,
        };
        Self {
            ch,
            vk,
            modifiers: ControlKeyState::empty(),
            key_down: true,
        }
    }

    /// Key-down event for a key without a character
    pub fn from_key(vk: VirtualKey) -> Self {
        let ch = match vk {
            VirtualKey::Back => '\x08',
            VirtualKey::Tab => '\t',
            VirtualKey::Return => '\r',
            VirtualKey::Escape => '\x1b',
            _ => '\0',
        };
        Self {
            ch,
            vk,
            modifiers: ControlKeyState::empty(),
            key_down: true,
        }
    }

    pub fn with_modifiers(mut self, modifiers: ControlKeyState) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn key_up(mut self) -> Self {
        self.key_down = false;
        self
    }

    /// Keys the line editor handles itself instead of storing
    pub fn is_line_editing_key(&self) -> bool {
        use VirtualKey::*;

        let ctrl = self.modifiers.ctrl();
        let alt = self.modifiers.alt();
        match (ctrl, alt) {
            (false, false) => matches!(
                self.vk,
                Escape | PageUp | PageDown | End | Home | Left | Up | Right | Down | Insert | Delete
            ) || matches!(self.vk, F(n) if (1..=9).contains(&n)),
            (true, false) => matches!(self.vk, End | Home | Left | Right),
            (false, true) => matches!(self.vk, F(7) | F(10)),
            (true, true) => false,
        }
    }

    /// Keys a popup handles instead of treating as typed characters
    pub fn is_popup_key(&self) -> bool {
        use VirtualKey::*;

        if self.modifiers.ctrl() || self.modifiers.alt() {
            return false;
        }
        matches!(
            self.vk,
            Escape | PageUp | PageDown | End | Home | Left | Up | Right | Down | Delete
                | F(2) | F(4) | F(7) | F(9)
        )
    }
}
