//! Miner Sync - persistence tiers and reconciliation
//!
//! Everything between the session engine and its storage backends:
//!
//! - [`LocalStore`]: synchronous, write-verified snapshots in a key-value backend
//! - [`RemoteStore`]: rate-limited, cached, retrying document persistence
//! - [`reconcile`]: deterministic choice between a local and a remote snapshot
//! - [`PersistenceScheduler`]: throttled single-flight remote writes
//! - [`infrastructure`]: the rate limiter, cache and retry policy the remote tier
//!   is built from
//!
//! The crate is generic over the effect traits in `miner-core`; concrete backends
//! come from `miner-effects` or a test double.

#![forbid(unsafe_code)]

pub mod infrastructure;
pub mod local;
pub mod reconciliation;
pub mod remote;
pub mod scheduler;

pub use local::LocalStore;
pub use reconciliation::{reconcile, ReconcileAction, Reconciled};
pub use remote::{RemoteStore, RemoteWrite};
pub use scheduler::{PersistenceScheduler, ScheduleOutcome, ThrottlePolicy};
