//! Notifications emitted by the engine.
//!
//! These are the only coupling to presentation: a UI subscribes and shows a toast.

use serde::{Deserialize, Serialize};

/// Observable engine event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A session was started.
    SessionStarted {
        /// Session length in seconds
        period_secs: u64,
    },
    /// One or more reward boundaries were crossed.
    RewardEarned {
        /// Amount credited to the balance
        amount: f64,
    },
    /// The countdown reached zero.
    SessionCompleted {
        /// Total reward accrued during the finished session
        session_reward: f64,
    },
    /// The session was cancelled before completion.
    SessionStopped {
        /// Reward accrued before the stop
        session_reward: f64,
    },
    /// Remote writes started failing for connectivity reasons.
    ConnectivityLost,
    /// A remote write succeeded after connectivity had been lost.
    ConnectivityRestored,
}

impl SessionEvent {
    /// Whether the event ends a session.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::SessionCompleted { .. } | Self::SessionStopped { .. }
        )
    }
}
