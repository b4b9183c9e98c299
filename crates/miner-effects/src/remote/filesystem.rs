//! Filesystem document store
//!
//! Stores each document as `{base}/{collection}/{id}.json`. Useful as a durable
//! mirror for the CLI and for exercising the remote tier without a network.
//! I/O errors surface as [`RemoteError::Unavailable`] so the store's retry policy
//! treats a missing mount like a dropped connection.

use super::validate_path;
use async_trait::async_trait;
use miner_core::effects::{merge_document, DocumentStoreEffects, RemoteError, SaveOptions};
use serde_json::Value;
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::fs;

/// Filesystem-backed document store.
#[derive(Debug, Clone)]
pub struct FilesystemDocumentHandler {
    base_path: PathBuf,
}

impl FilesystemDocumentHandler {
    /// Create a handler rooted at `base_path`.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn document_path(&self, collection: &str, id: &str) -> PathBuf {
        self.base_path.join(collection).join(format!("{id}.json"))
    }

    async fn read(&self, collection: &str, id: &str) -> Result<Option<Value>, RemoteError> {
        let path = self.document_path(collection, id);
        let contents = match fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(RemoteError::Unavailable {
                    reason: format!("Failed to read {}: {e}", path.display()),
                })
            }
        };
        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|e| RemoteError::Serialization {
                message: format!("Malformed document {collection}/{id}: {e}"),
            })
    }
}

#[async_trait]
impl DocumentStoreEffects for FilesystemDocumentHandler {
    async fn get_document(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Value>, RemoteError> {
        validate_path(collection, id)?;
        self.read(collection, id).await
    }

    async fn save_document(
        &self,
        collection: &str,
        id: &str,
        data: Value,
        options: SaveOptions,
    ) -> Result<(), RemoteError> {
        validate_path(collection, id)?;

        let document = match self.read(collection, id).await? {
            Some(mut existing) if options.merge => {
                merge_document(&mut existing, data);
                existing
            }
            _ => data,
        };

        let path = self.document_path(collection, id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| RemoteError::Unavailable {
                    reason: format!("Failed to create {}: {e}", parent.display()),
                })?;
        }

        let contents =
            serde_json::to_string_pretty(&document).map_err(|e| RemoteError::Serialization {
                message: e.to_string(),
            })?;
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, contents)
            .await
            .map_err(|e| RemoteError::Unavailable {
                reason: format!("Failed to write {}: {e}", temp_path.display()),
            })?;
        fs::rename(&temp_path, &path)
            .await
            .map_err(|e| RemoteError::Unavailable {
                reason: format!("Failed to commit {}: {e}", path.display()),
            })
    }
}
