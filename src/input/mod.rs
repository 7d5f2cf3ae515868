//! Keyboard input as seen by read sessions.
//!
//! - **key**: decoded key events and modifier state
//! - **buffer**: the input queue, [`KeySource`] and narrow carry bytes
//! - **codepage**: the built-in narrow encodings

pub mod buffer;
pub mod codepage;
pub mod key;

pub use buffer::{InputBuffer, KeyQueue, KeySource};
pub use codepage::CodePage;
pub use key::{ControlKeyState, KeyEvent, VirtualKey};
