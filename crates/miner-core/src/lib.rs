//! Miner Core - data model and effect interfaces
//!
//! This crate holds the pieces every other layer agrees on and nothing else:
//!
//! - [`MiningState`]: the canonical, versioned session entity and its invariants
//! - [`SessionEvent`]: the notifications the engine emits for presentation layers
//! - [`effects`]: pure effect traits for time, local key-value storage and remote
//!   documents (implementations live in `miner-effects`)
//! - [`MinerError`]: the unified error type
//! - [`MinerConfig`]: TOML-backed configuration with validation
//!
//! There is no I/O in this crate.

#![forbid(unsafe_code)]

/// Configuration loading and validation
pub mod config;

/// Pure effect interfaces (no implementations)
pub mod effects;

/// Unified error handling
pub mod errors;

/// Engine notifications
pub mod events;

/// Mining session entity, defaults and schema migration
pub mod state;

pub use config::{
    LocalConfig, MinerConfig, OperationBudget, RemoteConfig, SessionConfig,
};
pub use errors::{MinerError, Result};
pub use events::SessionEvent;
pub use state::{
    migrate, round_reward, MiningState, SessionPhase, CURRENT_SCHEMA_VERSION,
    DEFAULT_MINING_PERIOD_SECS, DEFAULT_MINING_RATE,
};

/// Milliseconds since the Unix epoch, as produced by [`effects::ClockSource`].
pub type TimestampMs = u64;
