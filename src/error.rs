//! Error types shared by every part of the line-input engine.
//!
//! Lookup misses (unknown alias, empty history) are not errors; they come back
//! as `None` or empty collections.

use std::fmt;

use thiserror::Error;

/// Why a parked read was aborted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    CtrlC,
    CtrlBreak,
    ThreadDying,
    HandleClosing,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CancelReason::CtrlC => "Ctrl+C",
            CancelReason::CtrlBreak => "Ctrl+Break",
            CancelReason::ThreadDying => "owning thread exited",
            CancelReason::HandleClosing => "input handle closed",
        };
        f.write_str(name)
    }
}

/// Console input errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsoleError {
    #[error("Out of memory")]
    OutOfMemory,

    #[error("Buffer too small: {required} units required")]
    BufferTooSmall { required: usize },

    #[error("Invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("Read cancelled: {0}")]
    Cancelled(CancelReason),

    #[error("No parked read with handle {0}")]
    UnknownRead(u64),
}

impl From<std::collections::TryReserveError> for ConsoleError {
    fn from(_: std::collections::TryReserveError) -> Self {
        ConsoleError::OutOfMemory
    }
}

pub type Result<T> = std::result::Result<T, ConsoleError>;
