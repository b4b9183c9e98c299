//! Durable persistence tier
//!
//! [`RemoteStore`] wraps any [`DocumentStoreEffects`] backend with the policies the
//! durable tier needs:
//!
//! - per-class fixed-window rate limits, checked before anything else
//! - a bounded TTL cache in front of reads, invalidated on every write
//! - a timeout on each attempt
//! - linear-backoff retries for connectivity failures on writes
//!
//! Connectivity failures never surface as errors. Reads report the document as
//! absent and writes report [`RemoteWrite::Offline`]; local persistence carries on.

use crate::infrastructure::{RateLimitResult, RateLimiter, RetryPolicy, TtlCache};
use miner_core::effects::{
    merge_document, DocumentStoreEffects, OperationClass, RemoteError, SaveOptions,
};
use miner_core::{migrate, MinerError, MiningState, RemoteConfig, Result};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::time::Duration;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

/// Outcome of a save that did not fail outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteWrite {
    /// The backend acknowledged the write.
    Committed {
        /// Attempts used, including the successful one
        attempts: u32,
    },
    /// Every attempt failed for connectivity reasons.
    Offline {
        /// Attempts made before giving up
        attempts: u32,
    },
}

impl RemoteWrite {
    /// Whether the write reached the backend.
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed { .. })
    }
}

/// Rate-limited, cached, retrying front for a document backend.
pub struct RemoteStore<D> {
    documents: D,
    collection: String,
    attempt_timeout: Duration,
    retry: RetryPolicy,
    limiter: Mutex<RateLimiter>,
    cache: Mutex<TtlCache<Value>>,
}

impl<D: DocumentStoreEffects> RemoteStore<D> {
    /// Create a store over `documents` configured by `config`.
    pub fn new(documents: D, config: &RemoteConfig) -> Self {
        let retry = RetryPolicy::linear()
            .with_max_attempts(config.max_attempts)
            .with_initial_delay(Duration::from_millis(config.backoff_base_ms));
        Self {
            documents,
            collection: config.collection.clone(),
            attempt_timeout: config.timeout(),
            retry,
            limiter: Mutex::new(RateLimiter::new(config.read_limit, config.write_limit)),
            cache: Mutex::new(TtlCache::new(config.cache_ttl(), config.cache_max_entries)),
        }
    }

    /// Replace the retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Backend handle.
    pub fn documents(&self) -> &D {
        &self.documents
    }

    /// Time until the `class` budget resets, `None` when it is not constrained.
    pub fn rate_limit_reset(&self, class: OperationClass) -> Option<Duration> {
        self.limiter.lock().reset_in(class, Instant::now())
    }

    fn cache_key(&self, id: &str) -> String {
        format!("{}/{}", self.collection, id)
    }

    fn admit(&self, class: OperationClass) -> std::result::Result<(), RemoteError> {
        match self.limiter.lock().check(class, Instant::now()) {
            RateLimitResult::Allowed => Ok(()),
            RateLimitResult::Denied { retry_after } => {
                warn!(%class, ?retry_after, "Remote rate limit exceeded");
                Err(RemoteError::RateLimitExceeded { class, retry_after })
            }
        }
    }

    /// Fetch document `id`, serving from the cache when fresh.
    pub async fn load(&self, id: &str) -> std::result::Result<Option<Value>, RemoteError> {
        self.admit(OperationClass::Read)?;

        let cache_key = self.cache_key(id);
        if let Some(cached) = self.cache.lock().get(&cache_key, Instant::now()) {
            debug!(document = %cache_key, "Cache hit");
            return Ok(Some(cached));
        }

        let fetched = match timeout(
            self.attempt_timeout,
            self.documents.get_document(&self.collection, id),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(RemoteError::Timeout {
                timeout: self.attempt_timeout,
            }),
        };

        match fetched {
            Ok(Some(document)) => {
                self.cache
                    .lock()
                    .insert(cache_key, document.clone(), Instant::now());
                Ok(Some(document))
            }
            Ok(None) => Ok(None),
            Err(e) if e.is_connectivity() => {
                warn!(document = %cache_key, error = %e, "Remote read failed, treating as absent");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Merge `data` into document `id`, retrying connectivity failures.
    pub async fn save(
        &self,
        id: &str,
        data: Value,
    ) -> std::result::Result<RemoteWrite, RemoteError> {
        self.admit(OperationClass::Write)?;

        let cache_key = self.cache_key(id);
        let previous = self.cache.lock().get(&cache_key, Instant::now());
        self.cache.lock().invalidate(&cache_key);

        let attempt_timeout = self.attempt_timeout;
        let outcome = self
            .retry
            .execute(
                |attempt| {
                    let data = data.clone();
                    async move {
                        debug!(document = %id, attempt, "Remote write attempt");
                        match timeout(
                            attempt_timeout,
                            self.documents.save_document(
                                &self.collection,
                                id,
                                data,
                                SaveOptions::default(),
                            ),
                        )
                        .await
                        {
                            Ok(result) => result,
                            Err(_) => Err(RemoteError::Timeout {
                                timeout: attempt_timeout,
                            }),
                        }
                    }
                },
                RemoteError::is_connectivity,
            )
            .await;

        let attempts = outcome.attempts;
        match outcome.into_result() {
            Ok(()) => {
                let mut document = previous.unwrap_or_else(|| Value::Object(Map::new()));
                merge_document(&mut document, data);
                self.cache.lock().insert(cache_key, document, Instant::now());
                Ok(RemoteWrite::Committed { attempts })
            }
            Err(e) if e.is_connectivity() => {
                warn!(document = %cache_key, attempts, error = %e, "Remote write gave up, staying local");
                Ok(RemoteWrite::Offline { attempts })
            }
            Err(e) => Err(e),
        }
    }

    /// Load and decode the mining state stored for `user_id`.
    pub async fn load_state(&self, user_id: &str) -> Result<Option<MiningState>> {
        let Some(document) = self.load(user_id).await? else {
            return Ok(None);
        };
        let mut state = migrate(document)
            .map_err(|e| MinerError::corruption(self.cache_key(user_id), e.to_string()))?;
        state.user_id = Some(user_id.to_string());
        Ok(Some(state))
    }

    /// Write `state` to its owner's document.
    pub async fn save_state(&self, state: &MiningState) -> Result<RemoteWrite> {
        let user_id = state
            .user_id
            .as_deref()
            .ok_or_else(|| MinerError::invalid_state("anonymous state is local-only"))?;
        let data = serde_json::to_value(state)?;
        let write = self.save(user_id, data).await?;
        if let RemoteWrite::Committed { attempts } = write {
            info!(user_id, attempts, balance = state.balance, "Remote state saved");
        }
        Ok(write)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use miner_effects::MemoryDocumentHandler;
    use serde_json::json;

    fn config() -> RemoteConfig {
        RemoteConfig::default()
    }

    #[tokio::test(start_paused = true)]
    async fn save_then_load_uses_cache() {
        let backend = MemoryDocumentHandler::new();
        backend.insert("users", "u1", json!({ "name": "miner" }));
        let store = RemoteStore::new(backend.clone(), &config());

        let write = store.save("u1", json!({ "balance": 3.0 })).await.unwrap();
        assert_eq!(write, RemoteWrite::Committed { attempts: 1 });
        assert_eq!(
            backend.document("users", "u1"),
            Some(json!({ "name": "miner", "balance": 3.0 }))
        );

        backend.insert("users", "u1", json!({ "balance": 99.0 }));
        let cached = store.load("u1").await.unwrap().unwrap();
        assert_eq!(cached["balance"], json!(3.0));
    }

    #[tokio::test(start_paused = true)]
    async fn cache_expires_after_ttl() {
        let backend = MemoryDocumentHandler::new();
        backend.insert("users", "u1", json!({ "balance": 1.0 }));
        let store = RemoteStore::new(backend.clone(), &config());

        store.load("u1").await.unwrap();
        backend.insert("users", "u1", json!({ "balance": 2.0 }));
        tokio::time::advance(Duration::from_secs(121)).await;

        let fresh = store.load("u1").await.unwrap().unwrap();
        assert_eq!(fresh["balance"], json!(2.0));
    }

    #[tokio::test(start_paused = true)]
    async fn write_budget_is_enforced() {
        let mut config = config();
        config.write_limit.max_operations = 1;
        let store = RemoteStore::new(MemoryDocumentHandler::new(), &config);

        store.save("u1", json!({})).await.unwrap();
        let err = store.save("u1", json!({})).await.unwrap_err();
        assert!(matches!(
            err,
            RemoteError::RateLimitExceeded {
                class: OperationClass::Write,
                ..
            }
        ));
        assert!(store.rate_limit_reset(OperationClass::Write).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn anonymous_state_is_refused() {
        let store = RemoteStore::new(MemoryDocumentHandler::new(), &config());
        let err = store.save_state(&MiningState::default()).await.unwrap_err();
        assert!(matches!(err, MinerError::InvalidState { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn state_round_trips_with_owner() {
        let store = RemoteStore::new(MemoryDocumentHandler::new(), &config());
        let mut state = MiningState::for_user("u1");
        state.balance = 7.25;
        store.save_state(&state).await.unwrap();

        let loaded = store.load_state("u1").await.unwrap().unwrap();
        assert_eq!(loaded.user_id.as_deref(), Some("u1"));
        assert!((loaded.balance - 7.25).abs() < 1e-9);
    }
}
