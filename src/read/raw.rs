//! Raw reads: characters as typed, no editing or echo.

use tracing::debug;

use super::{
    encode_for_caller, next_char, prepend_bytes, take_carry, ReadContext, ReadData, ReadEncoding,
    ReadOutput, Step, WaitReason,
};
use crate::error::{CancelReason, ConsoleError, Result};

/// Parameters of a raw read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharReadRequest {
    /// Caller buffer size in caller units
    pub capacity: usize,
    pub encoding: ReadEncoding,
}

impl CharReadRequest {
    pub fn new(capacity: usize, encoding: ReadEncoding) -> Self {
        Self { capacity, encoding }
    }
}

/// An in-progress raw read
#[derive(Debug)]
pub struct CharacterReadSession {
    request: CharReadRequest,
    complete: bool,
}

impl CharacterReadSession {
    pub fn new(request: CharReadRequest) -> Self {
        Self {
            request,
            complete: false,
        }
    }

    pub fn request(&self) -> CharReadRequest {
        self.request
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Collect whatever is available; park if nothing is
    pub fn run(&mut self, cx: &mut ReadContext<'_>) -> Step {
        debug_assert!(!self.complete, "completed read driven again");
        let capacity = self.request.capacity;
        let encoding = self.request.encoding;

        if capacity == 0 {
            return self.finish(Err(ConsoleError::BufferTooSmall { required: 1 }));
        }

        let narrow = matches!(encoding, ReadEncoding::Narrow(_));
        let carried = if narrow { cx.carry.len().min(capacity) } else { 0 };
        if carried == capacity {
            let bytes = take_carry(cx.carry, capacity);
            return self.finish(Ok(ReadOutput::new(ReadData::Narrow(bytes))));
        }

        // Carried bytes already guarantee progress
        let mut text = String::new();
        let mut used = carried;
        if carried == 0 {
            let Some(ch) = next_char(cx.keys, true) else {
                return Step::WouldBlock;
            };
            used += encoding.char_units(ch);
            text.push(ch);
        }
        while used < capacity {
            let Some(ch) = next_char(cx.keys, false) else {
                break;
            };
            used += encoding.char_units(ch);
            text.push(ch);
        }

        let prefix = take_carry(cx.carry, carried);
        let result = encode_for_caller(&text, encoding, capacity - carried, cx.carry)
            .map(|(data, _)| ReadOutput::new(prepend_bytes(prefix, data)));
        self.finish(result)
    }

    /// Resume a parked read. Ctrl+C leaves it waiting.
    pub fn notify(&mut self, reason: WaitReason, cx: &mut ReadContext<'_>) -> Step {
        match reason.cancel_reason() {
            None => self.run(cx),
            Some(CancelReason::CtrlC) => Step::WouldBlock,
            Some(cancel) => {
                debug!(reason = %cancel, "raw read cancelled");
                self.finish(Err(ConsoleError::Cancelled(cancel)))
            }
        }
    }

    fn finish(&mut self, result: Result<ReadOutput>) -> Step {
        self.complete = true;
        if let Ok(output) = &result {
            debug!(units = output.data.len(), "raw read complete");
        }
        Step::Done(result)
    }
}
