//! Error types for backend operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// Errors that can occur in backend operations.
///
/// Not-found is never an error: lookups return `Ok(None)`. No operation
/// retries on its own; the caller decides whether a failure is worth
/// another attempt.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend could not open or create its store.
    #[error("backend init failed at {}: {reason}", path.display())]
    Init {
        /// The locator passed to `init`.
        path: PathBuf,
        /// Why the store could not be opened.
        reason: String,
    },

    /// An operation was called before `init` succeeded or after `fini`.
    #[error("backend is not initialized")]
    NotInitialized,

    /// `init` was called on a backend that is already initialized.
    #[error("backend is already initialized")]
    AlreadyInitialized,

    /// An argument violates the contract (empty key, empty namespace, ...).
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the violation.
        message: String,
    },

    /// A handle does not belong to this backend.
    #[error("invalid handle: expected {expected}")]
    InvalidHandle {
        /// The backend name or handle type the backend expected.
        expected: &'static str,
    },

    /// `iterate` was called on a cursor that already reported exhaustion.
    #[error("cursor already exhausted")]
    CursorExhausted,

    /// No object exists at the given location.
    #[error("object not found: {namespace}/{path}")]
    ObjectNotFound {
        /// Object namespace.
        namespace: String,
        /// Object path within the namespace.
        path: String,
    },

    /// An object already exists at the given location.
    #[error("object already exists: {namespace}/{path}")]
    ObjectExists {
        /// Object namespace.
        namespace: String,
        /// Object path within the namespace.
        path: String,
    },

    /// I/O error inside the engine.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The engine's persistent state is corrupted.
    #[error("store corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// A document could not be encoded or decoded.
    #[error("codec error: {message}")]
    Codec {
        /// Description of the codec failure.
        message: String,
    },

    /// No backend module is registered under the name.
    #[error("unknown backend: {name}")]
    UnknownBackend {
        /// The requested backend name.
        name: String,
    },

    /// The backend module does not provide the requested backend type.
    #[error("backend {name} does not provide a {kind} backend")]
    UnsupportedType {
        /// The backend name.
        name: String,
        /// The requested backend type.
        kind: crate::types::BackendType,
    },
}

impl BackendError {
    /// Creates an init error.
    pub fn init(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Init {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a corruption error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted {
            message: message.into(),
        }
    }

    /// Creates a codec error.
    pub fn codec(message: impl ToString) -> Self {
        Self::Codec {
            message: message.to_string(),
        }
    }

    /// Returns true if the error reports a caller-side contract violation
    /// rather than an engine failure.
    #[must_use]
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Self::NotInitialized
                | Self::AlreadyInitialized
                | Self::InvalidArgument { .. }
                | Self::InvalidHandle { .. }
                | Self::CursorExhausted
        )
    }
}
