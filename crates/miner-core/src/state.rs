//! Mining session entity
//!
//! [`MiningState`] is the single canonical record of a user's mining progress. The
//! session engine owns the live copy. LocalStore and RemoteStore hold serialized
//! snapshots of it, always tagged with `schemaVersion` so that [`migrate`] can lift
//! older payloads.
//!
//! Invariants maintained by [`MiningState::enforce_invariants`]:
//! - `0 <= mining_time <= mining_period`
//! - `balance >= 0` and `mining_session >= 0`
//! - an active session always carries `mining_end_time`

use crate::{MinerError, Result, TimestampMs};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

/// Default session length: six hours.
pub const DEFAULT_MINING_PERIOD_SECS: u64 = 6 * 60 * 60;

/// Default reward rate, per minute.
pub const DEFAULT_MINING_RATE: f64 = 0.003;

/// Schema version written by this build.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Three-minute reward cycles per hour, used for the daily-rate estimate.
const CYCLES_PER_HOUR: f64 = 20.0;

/// Fields older clients persisted that no longer belong to the entity.
const OBSOLETE_FIELDS: &[&str] = &["progress", "miningStartTime", "isLoading"];

/// Whether the countdown is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Not mining.
    Idle,
    /// Countdown active.
    Running,
}

/// Canonical mining state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MiningState {
    /// Owner; `None` for anonymous, local-only sessions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Accumulated reward.
    pub balance: f64,
    /// Reward per minute.
    pub mining_rate: f64,
    /// Whether the countdown is running.
    pub mining_active: bool,
    /// Seconds remaining in the current session.
    pub mining_time: u64,
    /// Configured session length in seconds.
    pub mining_period: u64,
    /// Reward accrued within the current running session only.
    pub mining_session: f64,
    /// Wall-clock instant the running session finishes.
    #[serde(default)]
    pub mining_end_time: Option<TimestampMs>,
    /// Instant of the most recent local write.
    #[serde(default)]
    pub last_saved: TimestampMs,
    /// Payload schema version.
    #[serde(default = "current_schema_version")]
    pub schema_version: u32,
}

fn current_schema_version() -> u32 {
    CURRENT_SCHEMA_VERSION
}

impl Default for MiningState {
    fn default() -> Self {
        Self {
            user_id: None,
            balance: 0.0,
            mining_rate: DEFAULT_MINING_RATE,
            mining_active: false,
            mining_time: 0,
            mining_period: DEFAULT_MINING_PERIOD_SECS,
            mining_session: 0.0,
            mining_end_time: None,
            last_saved: 0,
            schema_version: CURRENT_SCHEMA_VERSION,
        }
    }
}

impl MiningState {
    /// Fresh state owned by `user_id`.
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Self::default()
        }
    }

    /// Fresh state with explicit rate and period.
    pub fn with_parameters(user_id: Option<String>, mining_rate: f64, mining_period: u64) -> Self {
        Self {
            user_id,
            mining_rate,
            mining_period,
            ..Self::default()
        }
    }

    /// Current phase derived from `mining_active`.
    pub fn phase(&self) -> SessionPhase {
        if self.mining_active {
            SessionPhase::Running
        } else {
            SessionPhase::Idle
        }
    }

    /// Reward granted per boundary of `reward_interval_secs`.
    pub fn reward_per_boundary(&self, reward_interval_secs: u64) -> f64 {
        round_reward(self.mining_rate * reward_interval_secs as f64 / 60.0)
    }

    /// Seconds left until `mining_end_time`, measured at `now_ms`.
    ///
    /// Returns `None` when no end time is set.
    pub fn remaining_at(&self, now_ms: TimestampMs) -> Option<u64> {
        self.mining_end_time
            .map(|end| end.saturating_sub(now_ms) / 1000)
    }

    /// Fraction of the period already elapsed, in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        if self.mining_period == 0 || !self.mining_active {
            return 0.0;
        }
        let remaining = self.mining_time.min(self.mining_period);
        let elapsed = self.mining_period - remaining;
        (elapsed as f64 / self.mining_period as f64).clamp(0.0, 1.0)
    }

    /// Remaining time as `HH:MM:SS`.
    pub fn format_remaining(&self) -> String {
        format_hms(self.mining_time)
    }

    /// Estimated reward per day at the current rate.
    pub fn daily_rate(&self) -> f64 {
        round_reward(self.mining_rate * CYCLES_PER_HOUR * 24.0)
    }

    /// Clamp the state back into its invariants.
    ///
    /// Violations are programming errors, never user errors. They are logged and
    /// repaired so the timer loop keeps running. Returns whether anything changed.
    pub fn enforce_invariants(&mut self) -> bool {
        let mut repaired = false;

        if !self.balance.is_finite() || self.balance < 0.0 {
            warn!(balance = self.balance, "Negative or non-finite balance clamped to zero");
            self.balance = 0.0;
            repaired = true;
        }
        if !self.mining_session.is_finite() || self.mining_session < 0.0 {
            warn!(
                session = self.mining_session,
                "Negative or non-finite session reward clamped to zero"
            );
            self.mining_session = 0.0;
            repaired = true;
        }
        if self.mining_time > self.mining_period {
            warn!(
                time = self.mining_time,
                period = self.mining_period,
                "Remaining time exceeds period, clamped"
            );
            self.mining_time = self.mining_period;
            repaired = true;
        }
        if self.mining_active && self.mining_end_time.is_none() {
            warn!("Active session without end time, marking idle");
            self.mining_active = false;
            self.mining_session = 0.0;
            repaired = true;
        }

        repaired
    }
}

/// Round a reward amount to six decimal places.
pub fn round_reward(amount: f64) -> f64 {
    (amount * 1_000_000.0).round() / 1_000_000.0
}

fn format_hms(seconds: u64) -> String {
    let hours = seconds / 3600;
    let mins = (seconds % 3600) / 60;
    let secs = seconds % 60;
    format!("{hours:02}:{mins:02}:{secs:02}")
}

/// Decode a persisted payload of any supported schema version.
///
/// Payloads without `schemaVersion` are the legacy loosely-typed format: every
/// field may be missing, numbers may be floats, and obsolete presentation fields
/// may be present. They are normalised field by field and then decoded as the
/// current version.
pub fn migrate(value: Value) -> Result<MiningState> {
    let Value::Object(mut fields) = value else {
        return Err(MinerError::serialization("payload is not a JSON object"));
    };

    let version = fields
        .get("schemaVersion")
        .and_then(Value::as_u64)
        .unwrap_or(0);

    if version > u64::from(CURRENT_SCHEMA_VERSION) {
        return Err(MinerError::invalid(format!(
            "payload schema version {version} is newer than supported {CURRENT_SCHEMA_VERSION}"
        )));
    }

    if version == 0 {
        migrate_legacy_fields(&mut fields);
    }

    let mut state: MiningState = serde_json::from_value(Value::Object(fields))?;
    state.schema_version = CURRENT_SCHEMA_VERSION;
    state.enforce_invariants();
    Ok(state)
}

fn migrate_legacy_fields(fields: &mut Map<String, Value>) {
    for name in OBSOLETE_FIELDS {
        fields.remove(*name);
    }

    let number = |fields: &Map<String, Value>, name: &str| {
        fields
            .get(name)
            .and_then(Value::as_f64)
            .filter(|v| v.is_finite())
    };

    let balance = number(fields, "balance").unwrap_or(0.0).max(0.0);
    let rate = number(fields, "miningRate")
        .filter(|r| *r > 0.0)
        .unwrap_or(DEFAULT_MINING_RATE);
    let period = number(fields, "miningPeriod")
        .filter(|p| *p >= 1.0)
        .map_or(DEFAULT_MINING_PERIOD_SECS, |p| p.floor() as u64);
    let time = number(fields, "miningTime").map_or(0, |t| t.max(0.0).floor() as u64);
    let session = number(fields, "miningSession").unwrap_or(0.0).max(0.0);
    let active = fields
        .get("miningActive")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let end_time = number(fields, "miningEndTime")
        .filter(|_| active)
        .map(|t| t.max(0.0) as u64);
    let last_saved = number(fields, "lastSaved").map_or(0, |t| t.max(0.0) as u64);

    fields.insert("balance".into(), Value::from(balance));
    fields.insert("miningRate".into(), Value::from(rate));
    fields.insert("miningPeriod".into(), Value::from(period));
    fields.insert("miningTime".into(), Value::from(time));
    fields.insert("miningSession".into(), Value::from(session));
    fields.insert("miningActive".into(), Value::from(active));
    fields.insert(
        "miningEndTime".into(),
        end_time.map_or(Value::Null, Value::from),
    );
    fields.insert("lastSaved".into(), Value::from(last_saved));
    fields.insert(
        "schemaVersion".into(),
        Value::from(CURRENT_SCHEMA_VERSION),
    );

    if !matches!(fields.get("userId"), Some(Value::String(_))) {
        fields.remove("userId");
    }
}
