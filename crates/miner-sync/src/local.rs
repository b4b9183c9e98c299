//! Fast persistence tier
//!
//! [`LocalStore`] keeps one JSON snapshot per user under
//! `{namespace}_{userId}_{schemaVersion}`, plus a global `{namespace}` key that holds
//! anonymous state and mirrors the most recent user's snapshot.
//!
//! Saves never fail to the caller. Every write is read back and compared; a
//! mismatch is rewritten once before the failure is logged.

use miner_core::effects::{ClockSource, KeyValueStorage};
use miner_core::{migrate, LocalConfig, MinerError, MiningState, Result};
use tracing::{debug, error, info, warn};

/// Namespaced, write-verified snapshot store.
#[derive(Debug, Clone)]
pub struct LocalStore<S, C> {
    storage: S,
    clock: C,
    namespace: String,
    schema_version: String,
}

impl<S: KeyValueStorage, C: ClockSource> LocalStore<S, C> {
    /// Create a store over `storage` using the key layout in `config`.
    pub fn new(storage: S, clock: C, config: &LocalConfig) -> Self {
        Self {
            storage,
            clock,
            namespace: config.namespace.clone(),
            schema_version: config.schema_version.clone(),
        }
    }

    /// Key holding the snapshot for `user_id`, or the global key when anonymous.
    pub fn key_for(&self, user_id: Option<&str>) -> String {
        match user_id {
            Some(user) => format!("{}_{}_{}", self.namespace, user, self.schema_version),
            None => self.namespace.clone(),
        }
    }

    /// Fallback key for anonymous state.
    pub fn global_key(&self) -> &str {
        &self.namespace
    }

    /// Underlying backend.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Persist `state`, stamping `last_saved`. Returns whether the write verified.
    ///
    /// An active session whose end time has passed is written as finished, with
    /// its accrual already in the balance. User snapshots are mirrored to the
    /// global key on a best-effort basis.
    pub fn save(&self, state: &mut MiningState) -> bool {
        state.last_saved = self.clock.now_ms();
        state.schema_version = miner_core::CURRENT_SCHEMA_VERSION;

        if state.mining_active && state.mining_end_time.is_some_and(|end| end <= state.last_saved) {
            warn!(
                user_id = ?state.user_id,
                "Active session already expired, persisting it as finished"
            );
            state.mining_active = false;
            state.mining_time = state.mining_period;
            state.mining_session = 0.0;
            state.mining_end_time = None;
        }

        let payload = match serde_json::to_string(state) {
            Ok(payload) => payload,
            Err(e) => {
                error!(error = %e, "Failed to encode mining state");
                return false;
            }
        };

        let key = self.key_for(state.user_id.as_deref());
        let saved = self.write_verified(&key, &payload);

        if state.user_id.is_some() && !self.write_verified(self.global_key(), &payload) {
            debug!("Global mirror write failed");
        }

        if saved {
            debug!(key = %key, balance = state.balance, "Local state saved");
        }
        saved
    }

    /// Load the snapshot for `user_id`.
    ///
    /// Corrupt entries are deleted and read as absent. For a user with no snapshot
    /// of their own, a global snapshot owned by the same user is adopted and moved
    /// to the user key.
    pub fn load(&self, user_id: Option<&str>) -> Option<MiningState> {
        let key = self.key_for(user_id);
        if let Some(mut state) = self.read_recovering(&key) {
            if state.user_id.is_none() {
                state.user_id = user_id.map(str::to_string);
            }
            return Some(state);
        }

        let user = user_id?;
        let mut legacy = self.read_recovering(self.global_key())?;
        if legacy.user_id.as_deref() != Some(user) {
            debug!(user_id = user, "Global snapshot belongs to another user, ignoring");
            return None;
        }

        info!(user_id = user, "Migrating global snapshot to user key");
        if let Ok(payload) = serde_json::to_string(&legacy) {
            self.write_verified(&key, &payload);
        }
        Some(legacy)
    }

    /// Decode the entry at `key`.
    ///
    /// Returns [`MinerError::StorageCorruption`] for malformed payloads and leaves
    /// them in place.
    pub fn read(&self, key: &str) -> Result<Option<MiningState>> {
        let Some(raw) = self.storage.get(key)? else {
            return Ok(None);
        };
        let value: serde_json::Value =
            serde_json::from_str(&raw).map_err(|e| MinerError::corruption(key, e.to_string()))?;
        migrate(value)
            .map(Some)
            .map_err(|e| MinerError::corruption(key, e.to_string()))
    }

    /// Remove the snapshot for `user_id`, and the global mirror when it holds the
    /// same user's data.
    pub fn clear(&self, user_id: Option<&str>) {
        let key = self.key_for(user_id);
        if let Err(e) = self.storage.remove(&key) {
            error!(key = %key, error = %e, "Failed to clear local state");
        }

        if let Some(user) = user_id {
            let mirrored = matches!(
                self.read(self.global_key()),
                Ok(Some(global)) if global.user_id.as_deref() == Some(user)
            );
            if mirrored {
                if let Err(e) = self.storage.remove(self.global_key()) {
                    error!(error = %e, "Failed to clear global mirror");
                }
            }
        }
    }

    /// Remove every key in the namespace. Returns the number of keys removed.
    pub fn clear_all(&self) -> Result<usize> {
        let keys = self.storage.keys_with_prefix(&self.namespace)?;
        let mut removed = 0;
        for key in keys {
            if self.storage.remove(&key)? {
                removed += 1;
            }
        }
        info!(removed, "Cleared local namespace");
        Ok(removed)
    }

    fn read_recovering(&self, key: &str) -> Option<MiningState> {
        match self.read(key) {
            Ok(state) => state,
            Err(MinerError::StorageCorruption { key, message }) => {
                warn!(key = %key, error = %message, "Discarding corrupt local state");
                if let Err(e) = self.storage.remove(&key) {
                    error!(key = %key, error = %e, "Failed to remove corrupt entry");
                }
                None
            }
            Err(e) => {
                error!(key = %key, error = %e, "Failed to read local state");
                None
            }
        }
    }

    fn write_verified(&self, key: &str, payload: &str) -> bool {
        for attempt in 1..=2 {
            if let Err(e) = self.storage.set(key, payload) {
                warn!(key = %key, attempt, error = %e, "Local write failed");
                continue;
            }
            match self.storage.get(key) {
                Ok(Some(stored)) if stored == payload => return true,
                Ok(_) => warn!(key = %key, attempt, "Local write did not verify"),
                Err(e) => warn!(key = %key, attempt, error = %e, "Local read-back failed"),
            }
        }
        error!(key = %key, "Local write abandoned after retry");
        false
    }
}
