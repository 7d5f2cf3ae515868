//! Park and resume protocol for reads that ran out of input.

use std::fmt;

use super::ReadOutput;
use crate::error::{CancelReason, Result};

/// Why a parked read is being called again
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitReason {
    /// New input was written
    NewData,
    CtrlC,
    CtrlBreak,
    /// The client thread that issued the read exited
    ThreadDying,
    /// The input handle the read was issued on is closing
    HandleClosing,
}

impl WaitReason {
    pub fn cancel_reason(self) -> Option<CancelReason> {
        match self {
            WaitReason::NewData => None,
            WaitReason::CtrlC => Some(CancelReason::CtrlC),
            WaitReason::CtrlBreak => Some(CancelReason::CtrlBreak),
            WaitReason::ThreadDying => Some(CancelReason::ThreadDying),
            WaitReason::HandleClosing => Some(CancelReason::HandleClosing),
        }
    }
}

/// Handle of a parked read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReadHandle(pub(crate) u64);

impl fmt::Display for ReadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "read#{}", self.0)
    }
}

/// Result of driving a session
#[derive(Debug)]
pub enum Step {
    Done(Result<ReadOutput>),
    /// No key available; park and wait for a notification
    WouldBlock,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_reason() {
        assert_eq!(WaitReason::NewData.cancel_reason(), None);
        assert_eq!(
            WaitReason::HandleClosing.cancel_reason(),
            Some(CancelReason::HandleClosing)
        );
    }
}
