//! Wall-clock time effect.
//!
//! # Effect Classification
//!
//! - **Category**: Infrastructure Effect
//! - **Implementation**: `miner-effects` (`SystemClock`, `SimulatedClock`)
//! - **Usage**: every elapsed-time computation in the session engine
//!
//! The engine never counts scheduler ticks. It reads `now()` and derives elapsed time
//! from the difference, so a suspended or throttled process catches up correctly on
//! the next read.

use crate::TimestampMs;
use std::sync::Arc;

/// Source of wall-clock time in milliseconds since the Unix epoch.
pub trait ClockSource: Send + Sync {
    /// Current wall-clock time.
    fn now_ms(&self) -> TimestampMs;

    /// Current wall-clock time in whole seconds.
    fn now_secs(&self) -> u64 {
        self.now_ms() / 1000
    }
}

impl<T: ClockSource + ?Sized> ClockSource for Arc<T> {
    fn now_ms(&self) -> TimestampMs {
        (**self).now_ms()
    }
}

impl<T: ClockSource + ?Sized> ClockSource for &T {
    fn now_ms(&self) -> TimestampMs {
        (**self).now_ms()
    }
}
