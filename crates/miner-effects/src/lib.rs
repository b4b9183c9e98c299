//! Miner Effects - effect handlers
//!
//! Concrete implementations of the effect traits declared in `miner-core`:
//!
//! - [`time`]: [`SystemClock`] for production, [`SimulatedClock`] for deterministic
//!   runs and the CLI's accelerated mode
//! - [`storage`]: in-memory and filesystem [`KeyValueStorage`](miner_core::effects::KeyValueStorage)
//!   backends for the fast tier
//! - [`remote`]: in-memory and filesystem document stores for the durable tier
//!
//! Handlers are stateless with respect to policy. Rate limiting, retries, caching
//! and reconciliation belong to `miner-sync`.

#![forbid(unsafe_code)]

pub mod remote;
pub mod storage;
pub mod time;

pub use remote::{FilesystemDocumentHandler, MemoryDocumentHandler};
pub use storage::{FilesystemStorageHandler, MemoryStorageHandler};
pub use time::{SimulatedClock, SystemClock};
