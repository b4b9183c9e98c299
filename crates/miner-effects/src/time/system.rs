//! Real clock handler for production use

use miner_core::effects::ClockSource;
use miner_core::TimestampMs;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Real clock handler.
///
/// Stateless; every read delegates to the operating system's wall clock. A system
/// clock set before the Unix epoch reads as zero rather than failing.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    /// Create a new system clock
    pub fn new() -> Self {
        Self
    }
}

impl ClockSource for SystemClock {
    fn now_ms(&self) -> TimestampMs {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_millis() as u64
    }
}
