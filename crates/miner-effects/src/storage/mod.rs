//! Local key-value storage handlers

mod filesystem;
mod memory;

pub use filesystem::FilesystemStorageHandler;
pub use memory::MemoryStorageHandler;

use miner_core::effects::StorageError;

/// Reject keys that are empty, oversized, or could escape a storage directory.
pub(crate) fn validate_key(key: &str) -> Result<(), StorageError> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey {
            reason: "Key cannot be empty".to_string(),
        });
    }

    if key.len() > 255 {
        return Err(StorageError::InvalidKey {
            reason: "Key too long (max 255 characters)".to_string(),
        });
    }

    if key.contains("..") || key.contains('\0') || key.contains('/') || key.contains('\\') {
        return Err(StorageError::InvalidKey {
            reason: "Key contains invalid characters".to_string(),
        });
    }

    Ok(())
}
