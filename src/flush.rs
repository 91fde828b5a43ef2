//! When buffered TX bytes have to leave for the network.
//!
//! A flush is due when any of these hold:
//! - the pending write would not fit next to what is already buffered
//!   ([`FlushReason::Overflow`], checked before appending),
//! - the buffer is exactly full ([`FlushReason::Full`]),
//! - the oldest unflushed byte is older than the timeout
//!   ([`FlushReason::Timeout`]),
//! - the last byte written is `'\n'` or NUL ([`FlushReason::Sentinel`]).
//!
//! NUL is treated exactly like a newline. That matches the firmware this
//! bridge replaces even though it likely conflates "binary zero" with "end of
//! line"; binary payloads containing zeros therefore flush more eagerly.

use std::time::Duration;

/// Why a flush happened. Only used for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushReason {
    Overflow,
    Full,
    Timeout,
    Sentinel,
    Explicit,
}

/// Size, age and sentinel thresholds for the TX buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushPolicy {
    capacity: usize,
    timeout_ms: u64,
}

impl FlushPolicy {
    pub fn new(capacity: usize, timeout: Duration) -> Self {
        Self {
            capacity,
            timeout_ms: timeout.as_millis() as u64,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Whether `buffered` bytes must be flushed before `incoming` more can be
    /// appended.
    pub fn needs_room(&self, buffered: usize, incoming: usize) -> bool {
        buffered > 0 && buffered.saturating_add(incoming) > self.capacity
    }

    /// Whether `byte` terminates a record and forces an immediate flush.
    pub fn is_sentinel(byte: u8) -> bool {
        byte == b'\n' || byte == 0
    }

    /// The periodic check: full buffer, or non-empty buffer past its timeout.
    pub fn due(&self, buffered: usize, last_flush_ms: u64, now_ms: u64) -> Option<FlushReason> {
        if buffered == 0 {
            return None;
        }
        if buffered >= self.capacity {
            Some(FlushReason::Full)
        } else if now_ms.saturating_sub(last_flush_ms) > self.timeout_ms {
            Some(FlushReason::Timeout)
        } else {
            None
        }
    }
}
