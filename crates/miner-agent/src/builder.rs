//! Agent builder infrastructure.

use crate::agent::{MiningAgent, SharedClock, SharedDocuments, SharedStorage};
use miner_core::{MinerConfig, MinerError, Result};
use miner_effects::SystemClock;
use std::sync::Arc;

/// Builder for [`MiningAgent`].
#[derive(Default)]
pub struct AgentBuilder {
    config: MinerConfig,
    user_id: Option<String>,
    storage: Option<SharedStorage>,
    documents: Option<SharedDocuments>,
    clock: Option<SharedClock>,
}

impl AgentBuilder {
    /// Create a new agent builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the configuration
    pub fn with_config(mut self, config: MinerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the session owner. Without one the session is anonymous and local-only.
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Set the fast-tier backend
    pub fn with_storage(mut self, storage: SharedStorage) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Set the durable-tier backend
    pub fn with_documents(mut self, documents: SharedDocuments) -> Self {
        self.documents = Some(documents);
        self
    }

    /// Set the clock. Defaults to the system clock.
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Validate the configuration and assemble the agent.
    pub fn build(self) -> Result<MiningAgent> {
        self.config.validate()?;

        if self.user_id.as_deref().is_some_and(str::is_empty) {
            return Err(MinerError::invalid("user id cannot be empty"));
        }
        let storage = self
            .storage
            .ok_or_else(|| MinerError::invalid("local storage backend required"))?;
        let documents = self
            .documents
            .ok_or_else(|| MinerError::invalid("remote document backend required"))?;
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock::new()));

        Ok(MiningAgent::assemble(
            self.config,
            self.user_id,
            storage,
            documents,
            clock,
        ))
    }
}
