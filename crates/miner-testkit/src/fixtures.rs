//! State builders and common assertions

use miner_core::{MiningState, TimestampMs};

/// Tolerance for reward comparisons after six-decimal rounding.
pub const REWARD_TOLERANCE: f64 = 1e-9;

/// Assert two reward amounts are equal within [`REWARD_TOLERANCE`].
#[track_caller]
pub fn assert_reward_eq(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < REWARD_TOLERANCE,
        "reward mismatch: expected {expected}, got {actual}"
    );
}

/// Fluent builder for [`MiningState`] fixtures.
#[derive(Debug, Clone)]
pub struct StateBuilder {
    state: MiningState,
}

impl StateBuilder {
    /// Idle state owned by `user_id`.
    pub fn user(user_id: &str) -> Self {
        Self {
            state: MiningState::for_user(user_id),
        }
    }

    /// Idle anonymous state.
    pub fn anonymous() -> Self {
        Self {
            state: MiningState::default(),
        }
    }

    /// Set the balance.
    pub fn balance(mut self, balance: f64) -> Self {
        self.state.balance = balance;
        self
    }

    /// Set the reward rate.
    pub fn rate(mut self, rate: f64) -> Self {
        self.state.mining_rate = rate;
        self
    }

    /// Set the session length.
    pub fn period(mut self, period_secs: u64) -> Self {
        self.state.mining_period = period_secs;
        self
    }

    /// Mark as running with `remaining_secs` left, measured from `now_ms`.
    pub fn running(mut self, now_ms: TimestampMs, remaining_secs: u64) -> Self {
        self.state.mining_active = true;
        self.state.mining_time = remaining_secs.min(self.state.mining_period);
        self.state.mining_end_time = Some(now_ms + remaining_secs * 1000);
        self
    }

    /// Set the in-session accrual.
    pub fn session_reward(mut self, amount: f64) -> Self {
        self.state.mining_session = amount;
        self
    }

    /// Finish building.
    pub fn build(self) -> MiningState {
        self.state
    }
}
