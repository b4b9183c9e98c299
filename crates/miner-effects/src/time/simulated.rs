//! Simulated clock handler for testing and accelerated runs

use miner_core::effects::ClockSource;
use miner_core::TimestampMs;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Manually driven clock.
///
/// Clones share the same underlying time, so a test can hand one clone to the
/// engine and keep another to advance it.
#[derive(Debug, Clone)]
pub struct SimulatedClock {
    current_time: Arc<Mutex<TimestampMs>>,
}

impl SimulatedClock {
    /// Create a simulated clock starting at `start_time_ms`.
    pub fn new(start_time_ms: TimestampMs) -> Self {
        Self {
            current_time: Arc::new(Mutex::new(start_time_ms)),
        }
    }

    /// Advance by `duration_ms` milliseconds.
    pub fn advance_ms(&self, duration_ms: u64) {
        let mut time = self.current_time.lock();
        *time = time.saturating_add(duration_ms);
    }

    /// Advance by whole seconds.
    pub fn advance_secs(&self, secs: u64) {
        self.advance_ms(secs.saturating_mul(1000));
    }

    /// Advance by a duration.
    pub fn advance(&self, duration: Duration) {
        self.advance_ms(duration.as_millis() as u64);
    }

    /// Set the absolute time. Setting an earlier time models a clock adjustment.
    pub fn set_ms(&self, time_ms: TimestampMs) {
        *self.current_time.lock() = time_ms;
    }
}

impl Default for SimulatedClock {
    fn default() -> Self {
        Self::new(0)
    }
}

impl ClockSource for SimulatedClock {
    fn now_ms(&self) -> TimestampMs {
        *self.current_time.lock()
    }
}
