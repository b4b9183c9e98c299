//! Start/stop activation cooldown

use miner_core::{MinerError, Result};
use std::time::Duration;
use tokio::time::Instant;

/// Rejects activations that arrive within `cooldown` of the last accepted one.
#[derive(Debug, Clone)]
pub struct ActionDebouncer {
    cooldown: Duration,
    last_accepted: Option<Instant>,
}

impl ActionDebouncer {
    /// Debouncer with the given cooldown.
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_accepted: None,
        }
    }

    /// Check whether an activation at `now` is allowed, without recording it.
    pub fn check(&self, now: Instant) -> Result<()> {
        let Some(last) = self.last_accepted else {
            return Ok(());
        };
        let since = now.saturating_duration_since(last);
        if since < self.cooldown {
            return Err(MinerError::Debounced {
                retry_after: self.cooldown - since,
            });
        }
        Ok(())
    }

    /// Record an accepted activation at `now`.
    pub fn record(&mut self, now: Instant) {
        self.last_accepted = Some(now);
    }
}
