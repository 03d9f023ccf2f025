//! Error types for the storage context.

use flexstore_backend::{BackendError, BackendType};
use flexstore_cache::CacheError;
use flexstore_semantics::SemanticsError;
use std::io;
use thiserror::Error;

/// Result type for storage context operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur while opening or using a [`Storage`](crate::Storage).
#[derive(Debug, Error)]
pub enum StorageError {
    /// Backend error.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// Cache error.
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// Semantics error.
    #[error("semantics error: {0}")]
    Semantics(#[from] SemanticsError),

    /// I/O error while reading configuration.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Configuration file is not valid JSON for [`Config`](crate::Config).
    #[error("config parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The configuration is invalid.
    #[error("invalid config: {message}")]
    InvalidConfig {
        /// Description of the problem.
        message: String,
    },

    /// No backend of the requested type was configured.
    #[error("no {kind} backend configured")]
    NotConfigured {
        /// The requested backend type.
        kind: BackendType,
    },
}

impl StorageError {
    /// Creates an invalid config error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}
