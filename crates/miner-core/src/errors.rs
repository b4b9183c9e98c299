//! Unified error system for the mining engine
//!
//! One error enum for everything above the effect handlers. Handler-level errors
//! ([`StorageError`], [`RemoteError`]) convert into it with `?`.

use crate::effects::{RemoteError, StorageError};
use std::time::Duration;

/// Unified error type for mining engine operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum MinerError {
    /// Invalid input or configuration
    #[error("Invalid: {message}")]
    Invalid {
        /// Error message describing the invalid input
        message: String,
    },

    /// Operation not allowed in the current session state
    #[error("Invalid state: {message}")]
    InvalidState {
        /// Error message describing the state conflict
        message: String,
    },

    /// A start/stop activation arrived inside the cooldown window
    #[error("Action debounced, retry after {retry_after:?}")]
    Debounced {
        /// Remaining cooldown before the next activation is accepted
        retry_after: Duration,
    },

    /// Local storage operation failed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Persisted payload could not be decoded
    #[error("Storage corruption at '{key}': {message}")]
    StorageCorruption {
        /// Storage key holding the malformed payload
        key: String,
        /// Decoder message
        message: String,
    },

    /// Serialization/deserialization error
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message describing the serialization failure
        message: String,
    },

    /// Remote tier failure
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    /// Internal system error
    #[error("Internal error: {message}")]
    Internal {
        /// Error message describing the internal error
        message: String,
    },
}

impl MinerError {
    /// Create an invalid input error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Create an invalid state error
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Create a corruption error for `key`
    pub fn corruption(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StorageCorruption {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// True when the failure came from losing contact with the remote tier.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Remote(err) if err.is_connectivity())
    }
}

/// Standard Result type for mining engine operations
pub type Result<T> = std::result::Result<T, MinerError>;

impl From<serde_json::Error> for MinerError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

impl From<std::io::Error> for MinerError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::invalid(err.to_string()),
            _ => Self::internal(err.to_string()),
        }
    }
}
