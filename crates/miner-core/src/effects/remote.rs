//! Remote document storage effect.
//!
//! # Effect Classification
//!
//! - **Category**: Infrastructure Effect
//! - **Implementation**: `miner-effects` (memory and filesystem document handlers)
//! - **Usage**: `miner-sync::RemoteStore`, which layers rate limiting, caching,
//!   timeouts and retries over any handler
//!
//! Handlers report raw outcomes only. A handler that cannot reach its backend returns
//! [`RemoteError::Unavailable`]. The store decides what to retry.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Logical operation class. Each class has its own rate-limit budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationClass {
    Read,
    Write,
}

impl fmt::Display for OperationClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationClass::Read => write!(f, "read"),
            OperationClass::Write => write!(f, "write"),
        }
    }
}

/// Error type for remote document operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RemoteError {
    /// Budget for this operation class is exhausted; nothing was sent.
    #[error("Rate limit exceeded for {class} operations, retry after {retry_after:?}")]
    RateLimitExceeded {
        class: OperationClass,
        retry_after: Duration,
    },

    /// The attempt did not complete within the configured bound.
    #[error("Remote operation timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    /// The backend could not be reached.
    #[error("Remote service unavailable: {reason}")]
    Unavailable { reason: String },

    /// The backend refused the operation (permissions, validation, ...).
    #[error("Remote operation rejected: {reason}")]
    Rejected { reason: String },

    /// Payload could not be encoded or decoded.
    #[error("Remote payload error: {message}")]
    Serialization { message: String },
}

impl RemoteError {
    /// Timeouts and unavailability are connectivity failures. They are retried and
    /// then degrade silently to local-only persistence.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Unavailable { .. })
    }
}

/// Write options for [`DocumentStoreEffects::save_document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveOptions {
    /// Merge top-level fields into the existing document instead of replacing it.
    pub merge: bool,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self { merge: true }
    }
}

/// Document database collaborator.
#[async_trait]
pub trait DocumentStoreEffects: Send + Sync {
    /// Fetch a document, `None` when it does not exist.
    async fn get_document(&self, collection: &str, id: &str)
        -> Result<Option<Value>, RemoteError>;

    /// Write a document.
    async fn save_document(
        &self,
        collection: &str,
        id: &str,
        data: Value,
        options: SaveOptions,
    ) -> Result<(), RemoteError>;
}

#[async_trait]
impl<T: DocumentStoreEffects + ?Sized> DocumentStoreEffects for Arc<T> {
    async fn get_document(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Value>, RemoteError> {
        (**self).get_document(collection, id).await
    }

    async fn save_document(
        &self,
        collection: &str,
        id: &str,
        data: Value,
        options: SaveOptions,
    ) -> Result<(), RemoteError> {
        (**self).save_document(collection, id, data, options).await
    }
}

/// Merge `patch` into `base` at the top level, the way a `{ merge: true }` write
/// behaves. Non-object values replace the base wholesale.
pub fn merge_document(base: &mut Value, patch: Value) {
    match (base, patch) {
        (Value::Object(base), Value::Object(patch)) => {
            for (key, value) in patch {
                base.insert(key, value);
            }
        }
        (base, patch) => *base = patch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_keeps_absent_fields() {
        let mut base = json!({ "balance": 1.0, "name": "miner" });
        merge_document(&mut base, json!({ "balance": 2.5 }));
        assert_eq!(base, json!({ "balance": 2.5, "name": "miner" }));
    }

    #[test]
    fn merge_replaces_non_objects() {
        let mut base = json!(3);
        merge_document(&mut base, json!({ "a": 1 }));
        assert_eq!(base, json!({ "a": 1 }));
    }
}
