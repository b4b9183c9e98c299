//! In-memory document store

use super::validate_path;
use async_trait::async_trait;
use miner_core::effects::{merge_document, DocumentStoreEffects, RemoteError, SaveOptions};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// In-memory document store.
///
/// Clones share the same documents.
#[derive(Debug, Clone, Default)]
pub struct MemoryDocumentHandler {
    documents: Arc<RwLock<HashMap<(String, String), Value>>>,
}

impl MemoryDocumentHandler {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a document without going through the effect trait.
    pub fn document(&self, collection: &str, id: &str) -> Option<Value> {
        self.documents
            .read()
            .get(&(collection.to_string(), id.to_string()))
            .cloned()
    }

    /// Seed a document directly.
    pub fn insert(&self, collection: &str, id: &str, data: Value) {
        self.documents
            .write()
            .insert((collection.to_string(), id.to_string()), data);
    }
}

#[async_trait]
impl DocumentStoreEffects for MemoryDocumentHandler {
    async fn get_document(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Value>, RemoteError> {
        validate_path(collection, id)?;
        Ok(self.document(collection, id))
    }

    async fn save_document(
        &self,
        collection: &str,
        id: &str,
        data: Value,
        options: SaveOptions,
    ) -> Result<(), RemoteError> {
        validate_path(collection, id)?;
        let mut documents = self.documents.write();
        let key = (collection.to_string(), id.to_string());
        match documents.get_mut(&key) {
            Some(existing) if options.merge => merge_document(existing, data),
            _ => {
                documents.insert(key, data);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn merge_and_replace() {
        let store = MemoryDocumentHandler::new();
        store
            .save_document("users", "u1", json!({ "a": 1, "b": 2 }), SaveOptions::default())
            .await
            .unwrap();
        store
            .save_document("users", "u1", json!({ "b": 3 }), SaveOptions { merge: true })
            .await
            .unwrap();
        assert_eq!(store.document("users", "u1"), Some(json!({ "a": 1, "b": 3 })));

        store
            .save_document("users", "u1", json!({ "c": 4 }), SaveOptions { merge: false })
            .await
            .unwrap();
        assert_eq!(
            store.get_document("users", "u1").await.unwrap(),
            Some(json!({ "c": 4 }))
        );
    }

    #[tokio::test]
    async fn invalid_ids_are_rejected() {
        let store = MemoryDocumentHandler::new();
        let err = store.get_document("users", "../x").await.unwrap_err();
        assert!(matches!(err, RemoteError::Rejected { .. }));
    }
}
