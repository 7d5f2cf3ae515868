//! wtread - console line-input engine
//!
//! Turns a stream of key events into lines and characters for console
//! clients, the way an interactive console host does.
//!
//! # Features
//!
//! - **Line Editing**: insert/overwrite, word movement, template keys (F1-F9)
//! - **Command History**: per-application rings with prefix search
//! - **Aliases**: per-application macros with `$1`-`$9`, `$*` and `$T`
//! - **Popups**: command list, command number and copy-to/from-char prompts
//! - **Resumable Reads**: reads park when input runs out and resume later
//!
//! # Layout
//!
//! ```text
//! console   ConsoleSession, the entry point for every operation
//! read      cooked line edit, raw character read, popups, park/resume
//! history   history rings and the shared pool
//! alias     alias tables and macro expansion
//! input     key events, input queue, code pages
//! echo      display sink used by the line editor
//! ui        crossterm key mapping and terminal echo
//! ```

pub mod alias;
pub mod config;
pub mod console;
pub mod echo;
pub mod error;
pub mod history;
pub mod input;
pub mod read;
pub mod text;
pub mod ui;

pub use config::Config;
pub use console::{
    CompletedRead, ConsoleSession, InputHandleId, InputMode, ReadStatus, ResumeStatus,
};
pub use echo::{EchoSink, MemoryEcho, NullEcho};
pub use error::{CancelReason, ConsoleError, Result};
pub use history::ClientId;
pub use input::{CodePage, ControlKeyState, KeyEvent, VirtualKey};
pub use read::{ReadData, ReadEncoding, ReadHandle, ReadOutput, WaitReason};
