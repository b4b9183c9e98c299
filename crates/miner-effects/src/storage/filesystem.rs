//! Filesystem storage handler
//!
//! One file per key under a base directory. Writes go to a temporary sibling first
//! and are renamed into place, so a crash mid-write leaves either the old value or
//! the new one, never a torn file.

use super::validate_key;
use miner_core::effects::{KeyValueStorage, StorageError};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

const VALUE_EXTENSION: &str = "json";
const TEMP_EXTENSION: &str = "json.tmp";

/// Filesystem-backed key-value storage.
#[derive(Debug, Clone)]
pub struct FilesystemStorageHandler {
    /// Base directory for storage files
    base_path: PathBuf,
}

impl FilesystemStorageHandler {
    /// Create a handler rooted at `base_path`, creating the directory if needed.
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path).map_err(|e| {
            StorageError::WriteFailed(format!("Failed to create storage directory: {e}"))
        })?;
        debug!(path = %base_path.display(), "Initialized filesystem storage");
        Ok(Self { base_path })
    }

    /// Root directory of this store.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn key_to_path(&self, key: &str) -> PathBuf {
        self.base_path.join(format!("{key}.{VALUE_EXTENSION}"))
    }

    fn key_to_temp_path(&self, key: &str) -> PathBuf {
        self.base_path.join(format!("{key}.{TEMP_EXTENSION}"))
    }
}

impl KeyValueStorage for FilesystemStorageHandler {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        validate_key(key)?;
        match fs::read_to_string(self.key_to_path(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::ReadFailed(format!(
                "Failed to read '{key}': {e}"
            ))),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        let temp_path = self.key_to_temp_path(key);
        fs::write(&temp_path, value).map_err(|e| {
            StorageError::WriteFailed(format!("Failed to write '{key}': {e}"))
        })?;
        fs::rename(&temp_path, self.key_to_path(key)).map_err(|e| {
            StorageError::WriteFailed(format!("Failed to commit '{key}': {e}"))
        })
    }

    fn remove(&self, key: &str) -> Result<bool, StorageError> {
        validate_key(key)?;
        match fs::remove_file(self.key_to_path(key)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::DeleteFailed(format!(
                "Failed to remove '{key}': {e}"
            ))),
        }
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let entries = match fs::read_dir(&self.base_path) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(StorageError::ReadFailed(format!(
                    "Failed to read directory: {e}"
                )))
            }
        };

        let suffix = format!(".{VALUE_EXTENSION}");
        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                StorageError::ReadFailed(format!("Failed to read directory entry: {e}"))
            })?;
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if let Some(key) = name.strip_suffix(&suffix) {
                if key.starts_with(prefix) {
                    keys.push(key.to_string());
                }
            }
        }

        keys.sort();
        Ok(keys)
    }
}
