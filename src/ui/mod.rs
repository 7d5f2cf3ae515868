//! Terminal front end for the demo host.
//!
//! - **keymapper**: crossterm key events to console key events
//! - **terminal**: [`EchoSink`](crate::echo::EchoSink) on stdout

pub mod keymapper;
pub mod terminal;

pub use keymapper::KeyMapper;
pub use terminal::TerminalEcho;
