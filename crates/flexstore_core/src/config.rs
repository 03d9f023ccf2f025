//! Storage configuration.

use crate::error::{StorageError, StorageResult};
use flexstore_semantics::SemanticsConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default arena cache budget.
pub const DEFAULT_CACHE_CAPACITY: u64 = 64 * 1024 * 1024;

/// Selects a registered backend and its store location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Name the backend module is registered under.
    pub backend: String,
    /// Locator passed to the backend's `init`.
    pub path: PathBuf,
}

impl BackendConfig {
    /// Creates a backend selection.
    pub fn new(backend: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            backend: backend.into(),
            path: path.into(),
        }
    }
}

/// Configuration for opening a [`Storage`](crate::Storage).
///
/// ```json
/// {
///   "meta": { "backend": "journal", "path": "/var/lib/flexstore/meta" },
///   "data": { "backend": "posix", "path": "/var/lib/flexstore/data" },
///   "cache_capacity": 1048576,
///   "semantics": { "template": "posix" }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Meta backend, if any.
    pub meta: Option<BackendConfig>,

    /// Data backend, if any.
    pub data: Option<BackendConfig>,

    /// Arena cache budget in bytes.
    pub cache_capacity: u64,

    /// Default semantics handed out by the storage context.
    pub semantics: SemanticsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            meta: None,
            data: None,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            semantics: SemanticsConfig::default(),
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if `json` is not a valid configuration.
    pub fn from_json_str(json: &str) -> StorageResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_json_file(path: &Path) -> StorageResult<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Sets the meta backend.
    #[must_use]
    pub fn meta_backend(mut self, backend: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.meta = Some(BackendConfig::new(backend, path));
        self
    }

    /// Sets the data backend.
    #[must_use]
    pub fn data_backend(mut self, backend: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.data = Some(BackendConfig::new(backend, path));
        self
    }

    /// Sets the arena cache budget.
    #[must_use]
    pub const fn cache_capacity(mut self, bytes: u64) -> Self {
        self.cache_capacity = bytes;
        self
    }

    /// Sets the default semantics.
    #[must_use]
    pub fn semantics(mut self, semantics: SemanticsConfig) -> Self {
        self.semantics = semantics;
        self
    }

    /// Checks the configuration for values no backend could accept.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidConfig`] on the first problem found.
    pub fn validate(&self) -> StorageResult<()> {
        if self.cache_capacity == 0 {
            return Err(StorageError::invalid_config("cache_capacity must be > 0"));
        }
        if usize::try_from(self.cache_capacity).is_err() {
            return Err(StorageError::invalid_config(format!(
                "cache_capacity {} exceeds the address space",
                self.cache_capacity
            )));
        }
        for (kind, backend) in [("meta", &self.meta), ("data", &self.data)] {
            if let Some(backend) = backend {
                if backend.backend.is_empty() {
                    return Err(StorageError::invalid_config(format!(
                        "{kind} backend name is empty"
                    )));
                }
            }
        }
        Ok(())
    }
}
