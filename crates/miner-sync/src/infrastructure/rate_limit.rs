//! Fixed-window rate limiting per operation class
//!
//! Each [`OperationClass`] owns an independent budget. The first admitted operation
//! opens a window; once the window has elapsed the next operation opens a fresh
//! one. Denials report the time left until the current window closes.
//!
//! Callers pass the current monotonic instant, so the limiter never reads a clock
//! itself and tests can drive it with paused tokio time.

use miner_core::effects::OperationClass;
use miner_core::OperationBudget;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// Result of a rate limit check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitResult {
    /// Operation allowed
    Allowed,

    /// Operation denied - budget for this window is spent
    Denied {
        /// Time until the window resets
        retry_after: Duration,
    },
}

impl RateLimitResult {
    /// Check if operation is allowed
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitResult::Allowed)
    }

    /// Get retry-after duration if denied
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            RateLimitResult::Denied { retry_after } => Some(*retry_after),
            RateLimitResult::Allowed => None,
        }
    }
}

#[derive(Debug, Clone)]
struct Window {
    opened_at: Instant,
    count: u32,
}

/// Counters for monitoring.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateLimiterStatistics {
    /// Operations admitted
    pub allowed: u64,
    /// Operations denied
    pub denied: u64,
}

/// Per-class fixed-window limiter.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    budgets: HashMap<OperationClass, OperationBudget>,
    windows: HashMap<OperationClass, Window>,
    stats: RateLimiterStatistics,
}

impl RateLimiter {
    /// Create a limiter with separate read and write budgets.
    pub fn new(read: OperationBudget, write: OperationBudget) -> Self {
        let budgets = HashMap::from([(OperationClass::Read, read), (OperationClass::Write, write)]);
        Self {
            budgets,
            windows: HashMap::new(),
            stats: RateLimiterStatistics::default(),
        }
    }

    /// Admit one operation of `class` at `now`, or report when to retry.
    pub fn check(&mut self, class: OperationClass, now: Instant) -> RateLimitResult {
        let Some(budget) = self.budgets.get(&class).copied() else {
            return RateLimitResult::Allowed;
        };
        let window_len = budget.window();

        let window = self.windows.entry(class).or_insert(Window {
            opened_at: now,
            count: 0,
        });

        if now.saturating_duration_since(window.opened_at) > window_len {
            window.opened_at = now;
            window.count = 0;
        }

        if window.count >= budget.max_operations {
            let resets_at = window.opened_at + window_len;
            self.stats.denied += 1;
            return RateLimitResult::Denied {
                retry_after: resets_at.saturating_duration_since(now),
            };
        }

        window.count += 1;
        self.stats.allowed += 1;
        RateLimitResult::Allowed
    }

    /// Operations still available in the current window for `class`.
    pub fn remaining(&self, class: OperationClass, now: Instant) -> u32 {
        let Some(budget) = self.budgets.get(&class) else {
            return u32::MAX;
        };
        match self.windows.get(&class) {
            Some(window) if now.saturating_duration_since(window.opened_at) <= budget.window() => {
                budget.max_operations.saturating_sub(window.count)
            }
            _ => budget.max_operations,
        }
    }

    /// Time until the window for `class` resets, `None` when no window is open.
    pub fn reset_in(&self, class: OperationClass, now: Instant) -> Option<Duration> {
        let budget = self.budgets.get(&class)?;
        let window = self.windows.get(&class)?;
        let resets_at = window.opened_at + budget.window();
        (resets_at > now).then(|| resets_at - now)
    }

    /// Get limiter statistics
    pub fn statistics(&self) -> &RateLimiterStatistics {
        &self.stats
    }

    /// Drop all open windows.
    pub fn reset(&mut self) {
        self.windows.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter() -> RateLimiter {
        RateLimiter::new(
            OperationBudget {
                max_operations: 3,
                window_ms: 60_000,
            },
            OperationBudget {
                max_operations: 2,
                window_ms: 60_000,
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn classes_have_independent_budgets() {
        let mut limiter = limiter();
        let now = Instant::now();

        assert!(limiter.check(OperationClass::Write, now).is_allowed());
        assert!(limiter.check(OperationClass::Write, now).is_allowed());
        assert!(!limiter.check(OperationClass::Write, now).is_allowed());

        assert!(limiter.check(OperationClass::Read, now).is_allowed());
        assert_eq!(limiter.remaining(OperationClass::Read, now), 2);
        assert_eq!(limiter.statistics().denied, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn denial_reports_time_to_window_reset() {
        let mut limiter = limiter();
        let start = Instant::now();
        limiter.check(OperationClass::Write, start);
        limiter.check(OperationClass::Write, start);

        let later = start + Duration::from_secs(20);
        let result = limiter.check(OperationClass::Write, later);
        assert_eq!(result.retry_after(), Some(Duration::from_secs(40)));
        assert_eq!(
            limiter.reset_in(OperationClass::Write, later),
            Some(Duration::from_secs(40))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn window_reopens_after_expiry() {
        let mut limiter = limiter();
        let start = Instant::now();
        limiter.check(OperationClass::Write, start);
        limiter.check(OperationClass::Write, start);

        let after = start + Duration::from_secs(61);
        assert!(limiter.check(OperationClass::Write, after).is_allowed());
        assert_eq!(limiter.remaining(OperationClass::Write, after), 1);
    }
}
