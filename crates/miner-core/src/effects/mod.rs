//! Effect interfaces
//!
//! Pure trait definitions for the three kinds of side effect the engine performs.
//!
//! - [`ClockSource`]: wall-clock reads, isolated so tests can fake time
//! - [`KeyValueStorage`]: the synchronous fast tier (think `localStorage`)
//! - [`DocumentStoreEffects`]: the asynchronous durable tier (a document database)
//!
//! Handlers live in `miner-effects`; test doubles live in `miner-testkit`.

pub mod remote;
pub mod storage;
pub mod time;

pub use remote::{merge_document, DocumentStoreEffects, OperationClass, RemoteError, SaveOptions};
pub use storage::{KeyValueStorage, StorageError};
pub use time::ClockSource;
