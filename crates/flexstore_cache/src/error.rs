//! Error types for the arena cache.

use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors that can occur when creating or using a cache.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// A cache must have a non-zero capacity.
    #[error("cache capacity must be greater than zero")]
    ZeroCapacity,

    /// The request is larger than the remaining budget.
    #[error("insufficient cache capacity: requested {requested} bytes, {remaining} remaining")]
    InsufficientCapacity {
        /// The requested length.
        requested: usize,
        /// The budget left at the time of the request.
        remaining: usize,
    },
}

impl CacheError {
    /// Returns true if the caller can recover by falling back to a direct
    /// allocation or by retrying after a clear.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::InsufficientCapacity { .. })
    }
}
