//! Shared types for the backend contract.

use crate::error::{BackendError, BackendResult};
use std::fmt;
use std::time::SystemTime;

/// The two kinds of backend a module may provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendType {
    /// Stores small structured documents by namespace and key.
    Meta,
    /// Stores raw byte ranges in named objects.
    Data,
}

impl fmt::Display for BackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Meta => f.write_str("meta"),
            Self::Data => f.write_str("data"),
        }
    }
}

/// Size and modification time of a data object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectStatus {
    /// Object size in bytes.
    pub size: u64,
    /// Time of the last write.
    pub modified: SystemTime,
}

/// Rejects an empty namespace.
pub fn validate_namespace(namespace: &str) -> BackendResult<()> {
    if namespace.is_empty() {
        return Err(BackendError::invalid_argument("namespace must not be empty"));
    }
    Ok(())
}

/// Rejects an empty key.
pub fn validate_key(key: &str) -> BackendResult<()> {
    if key.is_empty() {
        return Err(BackendError::invalid_argument("key must not be empty"));
    }
    Ok(())
}
