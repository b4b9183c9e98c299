//! Fault-injecting effect handlers

use async_trait::async_trait;
use miner_core::effects::{
    DocumentStoreEffects, KeyValueStorage, RemoteError, SaveOptions, StorageError,
};
use miner_effects::{MemoryDocumentHandler, MemoryStorageHandler};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// One scripted failure for the next remote call.
#[derive(Debug, Clone, PartialEq)]
pub enum Fault {
    /// Fail with [`RemoteError::Unavailable`].
    Unavailable,
    /// Never answer; the caller's timeout fires.
    Hang,
    /// Fail with [`RemoteError::Rejected`].
    Reject,
}

/// Document store with scripted faults and call counters.
///
/// Clones share script, switches and counters.
#[derive(Debug, Clone, Default)]
pub struct FlakyDocumentStore {
    inner: MemoryDocumentHandler,
    script: Arc<Mutex<VecDeque<Fault>>>,
    offline: Arc<AtomicBool>,
    latency: Arc<Mutex<Duration>>,
    get_calls: Arc<AtomicU32>,
    save_calls: Arc<AtomicU32>,
}

impl FlakyDocumentStore {
    /// Healthy store with no documents.
    pub fn new() -> Self {
        Self::default()
    }

    /// Backing in-memory documents.
    pub fn backend(&self) -> &MemoryDocumentHandler {
        &self.inner
    }

    /// Queue faults consumed one per call, before the offline switch applies.
    pub fn script(&self, faults: impl IntoIterator<Item = Fault>) {
        self.script.lock().extend(faults);
    }

    /// Fail every call with `Unavailable` until switched back.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = latency;
    }

    /// Number of `get_document` calls seen.
    pub fn get_calls(&self) -> u32 {
        self.get_calls.load(Ordering::SeqCst)
    }

    /// Number of `save_document` calls seen.
    pub fn save_calls(&self) -> u32 {
        self.save_calls.load(Ordering::SeqCst)
    }

    /// Stored document, bypassing faults.
    pub fn document(&self, collection: &str, id: &str) -> Option<Value> {
        self.inner.document(collection, id)
    }

    async fn gate(&self) -> Result<(), RemoteError> {
        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let fault = self.script.lock().pop_front();
        match fault {
            Some(Fault::Unavailable) => Err(RemoteError::Unavailable {
                reason: "scripted outage".to_string(),
            }),
            Some(Fault::Reject) => Err(RemoteError::Rejected {
                reason: "scripted rejection".to_string(),
            }),
            Some(Fault::Hang) => {
                std::future::pending::<()>().await;
                Ok(())
            }
            None if self.offline.load(Ordering::SeqCst) => Err(RemoteError::Unavailable {
                reason: "offline".to_string(),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DocumentStoreEffects for FlakyDocumentStore {
    async fn get_document(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Value>, RemoteError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.gate().await?;
        self.inner.get_document(collection, id).await
    }

    async fn save_document(
        &self,
        collection: &str,
        id: &str,
        data: Value,
        options: SaveOptions,
    ) -> Result<(), RemoteError> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        self.gate().await?;
        self.inner.save_document(collection, id, data, options).await
    }
}

/// Key-value backend that can fail or corrupt upcoming writes.
#[derive(Debug, Clone, Default)]
pub struct FaultyStorage {
    inner: MemoryStorageHandler,
    failing_writes: Arc<AtomicU32>,
    corrupting_writes: Arc<AtomicU32>,
    set_calls: Arc<AtomicU32>,
}

impl FaultyStorage {
    /// Healthy empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend over an existing memory handler.
    pub fn wrap(inner: MemoryStorageHandler) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    /// Fail the next `count` writes.
    pub fn fail_next_writes(&self, count: u32) {
        self.failing_writes.store(count, Ordering::SeqCst);
    }

    /// Store a truncated payload for the next `count` writes.
    pub fn corrupt_next_writes(&self, count: u32) {
        self.corrupting_writes.store(count, Ordering::SeqCst);
    }

    /// Number of `set` calls seen.
    pub fn set_calls(&self) -> u32 {
        self.set_calls.load(Ordering::SeqCst)
    }

    /// Underlying memory handler.
    pub fn inner(&self) -> &MemoryStorageHandler {
        &self.inner
    }
}

fn take_one(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

impl KeyValueStorage for FaultyStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.set_calls.fetch_add(1, Ordering::SeqCst);
        if take_one(&self.failing_writes) {
            return Err(StorageError::WriteFailed("injected failure".to_string()));
        }
        if take_one(&self.corrupting_writes) {
            let truncated: String = value.chars().take(value.len() / 2).collect();
            return self.inner.set(key, &truncated);
        }
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<bool, StorageError> {
        self.inner.remove(key)
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        self.inner.keys_with_prefix(prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn script_runs_before_offline_switch() {
        let store = FlakyDocumentStore::new();
        store.script([Fault::Reject]);

        let err = store.get_document("users", "u1").await.unwrap_err();
        assert!(matches!(err, RemoteError::Rejected { .. }));
        assert_eq!(store.get_document("users", "u1").await.unwrap(), None);

        store.set_offline(true);
        assert!(store
            .save_document("users", "u1", json!({}), SaveOptions::default())
            .await
            .is_err());
        assert_eq!(store.get_calls(), 2);
        assert_eq!(store.save_calls(), 1);
    }

    #[test]
    fn faulty_storage_counts_down() {
        let storage = FaultyStorage::new();
        storage.fail_next_writes(1);
        assert!(storage.set("k", "v").is_err());
        assert!(storage.set("k", "v").is_ok());

        storage.corrupt_next_writes(1);
        storage.set("k", "value").unwrap();
        assert_eq!(storage.get("k").unwrap().as_deref(), Some("va"));
        assert_eq!(storage.set_calls(), 3);
    }
}
