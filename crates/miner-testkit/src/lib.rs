//! Miner Testing Infrastructure
//!
//! Shared doubles and fixtures for the sync and agent test suites:
//!
//! - [`mocks`]: a scriptable document store that can go offline, hang or reject,
//!   and a key-value backend that fails or corrupts writes on demand
//! - [`fixtures`]: state builders and a bundled clock + memory backends harness
//! - [`strategies`]: proptest strategies for [`MiningState`](miner_core::MiningState)
//!
//! Add it to `[dev-dependencies]` only.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

pub mod fixtures;
pub mod mocks;
pub mod strategies;

pub use fixtures::*;
pub use mocks::*;
