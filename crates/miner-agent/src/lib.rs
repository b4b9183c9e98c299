//! Miner Agent - session runtime
//!
//! Composes the lower layers into a running mining session:
//!
//! - [`session`]: the pure countdown/reward state machine and the start/stop
//!   debouncer
//! - [`MiningAgent`]: the application handle owning the machine, both persistence
//!   tiers, the remote write scheduler and the tick loop
//! - [`AgentBuilder`]: wires effect handlers and configuration into an agent
//!
//! Effect handlers come from `miner-effects`; policies come from `miner-sync`.

#![forbid(unsafe_code)]

pub mod agent;
pub mod builder;
pub mod session;
pub mod task_registry;

pub use agent::{MiningAgent, MiningStatus, SharedClock, SharedDocuments, SharedStorage};
pub use builder::AgentBuilder;
pub use session::{ActionDebouncer, PersistAction, SessionStateMachine, Transition};
pub use task_registry::TaskRegistry;
