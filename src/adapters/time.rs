//! Wall-clock adapter.
//!
//! The countdown must survive a restart, so every persisted timestamp is
//! Unix-epoch milliseconds rather than time since boot.  A clock that
//! reads before the epoch reports `0`.

use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }

    /// Milliseconds since the Unix epoch.
    pub fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}
