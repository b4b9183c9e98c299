//! Engine configuration
//!
//! Every knob the engine reads comes from [`MinerConfig`]. All fields default, so an
//! empty or missing TOML file yields the documented defaults. Partial files override
//! only what they name.
//!
//! ```toml
//! [session]
//! tick_interval_ms = 500
//!
//! [remote]
//! write_limit = { max_operations = 10, window_ms = 60000 }
//! ```

use crate::state::{DEFAULT_MINING_PERIOD_SECS, DEFAULT_MINING_RATE};
use crate::{MinerError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Slowest tick cadence that still bounds drift-correction error.
const MAX_TICK_INTERVAL_MS: u64 = 1000;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinerConfig {
    /// Timer and reward settings
    pub session: SessionConfig,
    /// Fast-tier settings
    pub local: LocalConfig,
    /// Durable-tier settings
    pub remote: RemoteConfig,
}

/// Timer and reward settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Session length for new sessions
    pub period_secs: u64,
    /// Spacing between reward boundaries
    pub reward_interval_secs: u64,
    /// Tick loop cadence
    pub tick_interval_ms: u64,
    /// Opportunistic local save cadence between reward events
    pub local_save_interval_secs: u64,
    /// Minimum spacing between accepted start/stop activations
    pub action_cooldown_ms: u64,
    /// Reward per minute for fresh states
    pub mining_rate: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            period_secs: DEFAULT_MINING_PERIOD_SECS,
            reward_interval_secs: 180,
            tick_interval_ms: 500,
            local_save_interval_secs: 10,
            action_cooldown_ms: 3000,
            mining_rate: DEFAULT_MINING_RATE,
        }
    }
}

impl SessionConfig {
    /// Tick cadence as a duration.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Debounce window as a duration.
    pub fn action_cooldown(&self) -> Duration {
        Duration::from_millis(self.action_cooldown_ms)
    }
}

/// Fast-tier key layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalConfig {
    /// Key prefix; also the global fallback key
    pub namespace: String,
    /// Version tag embedded in user keys
    pub schema_version: String,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            namespace: "fcMinerUserData".to_string(),
            schema_version: "v1.0".to_string(),
        }
    }
}

/// Request budget for one operation class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationBudget {
    /// Operations admitted per window
    pub max_operations: u32,
    /// Window length in milliseconds
    pub window_ms: u64,
}

impl OperationBudget {
    /// Window length as a duration.
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

/// Durable-tier settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Collection holding one document per user
    pub collection: String,
    /// Per-attempt timeout
    pub timeout_ms: u64,
    /// Total attempts for a save, including the first
    pub max_attempts: u32,
    /// Linear backoff base: the delay before retry `n` is `base * n`
    pub backoff_base_ms: u64,
    /// Read budget
    pub read_limit: OperationBudget,
    /// Write budget
    pub write_limit: OperationBudget,
    /// TTL for cached reads
    pub cache_ttl_ms: u64,
    /// Maximum cached documents
    pub cache_max_entries: usize,
    /// Minimum spacing between throttled remote writes
    pub min_save_interval_ms: u64,
    /// Balance change that counts as significant
    pub balance_epsilon: f64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            collection: "users".to_string(),
            timeout_ms: 20_000,
            max_attempts: 3,
            backoff_base_ms: 3_000,
            read_limit: OperationBudget {
                max_operations: 30,
                window_ms: 60_000,
            },
            write_limit: OperationBudget {
                max_operations: 10,
                window_ms: 60_000,
            },
            cache_ttl_ms: 120_000,
            cache_max_entries: 1000,
            min_save_interval_ms: 30_000,
            balance_epsilon: 0.0,
        }
    }
}

impl RemoteConfig {
    /// Per-attempt timeout as a duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Cache TTL as a duration.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }
}

impl MinerConfig {
    /// Parse a TOML document and validate it.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)
            .map_err(|e| MinerError::invalid(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Render as TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| MinerError::serialization(format!("Failed to render config: {e}")))
    }

    /// Check every field, reporting all violations at once.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();
        let session = &self.session;
        let remote = &self.remote;

        if session.period_secs == 0 {
            errors.push("session.period_secs must be positive".to_string());
        }
        if session.reward_interval_secs == 0 {
            errors.push("session.reward_interval_secs must be positive".to_string());
        }
        if session.tick_interval_ms == 0 || session.tick_interval_ms > MAX_TICK_INTERVAL_MS {
            errors.push(format!(
                "session.tick_interval_ms must be between 1 and {MAX_TICK_INTERVAL_MS}"
            ));
        }
        if !(session.mining_rate.is_finite() && session.mining_rate > 0.0) {
            errors.push("session.mining_rate must be positive".to_string());
        }
        if self.local.namespace.is_empty() {
            errors.push("local.namespace cannot be empty".to_string());
        }
        if remote.collection.is_empty() {
            errors.push("remote.collection cannot be empty".to_string());
        }
        if remote.timeout_ms == 0 {
            errors.push("remote.timeout_ms must be positive".to_string());
        }
        if remote.max_attempts == 0 {
            errors.push("remote.max_attempts must be at least 1".to_string());
        }
        for (name, budget) in [
            ("remote.read_limit", &remote.read_limit),
            ("remote.write_limit", &remote.write_limit),
        ] {
            if budget.max_operations == 0 || budget.window_ms == 0 {
                errors.push(format!("{name} needs a non-zero budget and window"));
            }
        }
        if !(remote.balance_epsilon.is_finite() && remote.balance_epsilon >= 0.0) {
            errors.push("remote.balance_epsilon must be non-negative".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(MinerError::invalid(errors.join("; ")))
        }
    }
}
