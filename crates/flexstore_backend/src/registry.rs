//! Backend modules and lookup by name.
//!
//! A backend module is a named entry point that, asked for a [`BackendType`],
//! returns a fresh uninitialized backend of that type or `None` when the
//! module does not provide one. The framework resolves the configured meta
//! and data backend names through a [`BackendRegistry`].

use crate::dispatch::{DynDataBackend, DynMetaBackend};
use crate::error::{BackendError, BackendResult};
use crate::types::BackendType;
use crate::{journal, memory, posix};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// A backend produced by a module entry point.
pub enum LoadedBackend {
    /// A meta backend.
    Meta(Box<dyn DynMetaBackend>),
    /// A data backend.
    Data(Box<dyn DynDataBackend>),
}

impl LoadedBackend {
    /// Returns the type of the loaded backend.
    #[must_use]
    pub fn kind(&self) -> BackendType {
        match self {
            Self::Meta(_) => BackendType::Meta,
            Self::Data(_) => BackendType::Data,
        }
    }
}

impl fmt::Debug for LoadedBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Meta(backend) => f.debug_tuple("Meta").field(&backend.name()).finish(),
            Self::Data(backend) => f.debug_tuple("Data").field(&backend.name()).finish(),
        }
    }
}

/// A backend module entry point.
pub type BackendEntry = fn(BackendType) -> Option<LoadedBackend>;

/// Maps backend names to module entry points.
#[derive(Clone, Default)]
pub struct BackendRegistry {
    modules: BTreeMap<String, BackendEntry>,
}

impl BackendRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the reference backends:
    /// `memory` (meta and data), `journal` (meta) and `posix` (data).
    #[must_use]
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register("memory", memory::backend_info);
        registry.register("journal", journal::backend_info);
        registry.register("posix", posix::backend_info);
        registry
    }

    /// Registers a module under `name`, replacing any previous entry.
    pub fn register(&mut self, name: impl Into<String>, entry: BackendEntry) {
        let name = name.into();
        debug!(backend = %name, "backend module registered");
        self.modules.insert(name, entry);
    }

    /// Returns true if a module is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// Returns the registered module names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    /// Asks the module `name` for a backend of type `kind`.
    ///
    /// # Errors
    ///
    /// Returns `UnknownBackend` if no module is registered under `name`, and
    /// `UnsupportedType` if the module does not provide `kind`.
    pub fn load(&self, name: &str, kind: BackendType) -> BackendResult<LoadedBackend> {
        let entry = self
            .modules
            .get(name)
            .ok_or_else(|| BackendError::UnknownBackend {
                name: name.to_string(),
            })?;

        match entry(kind) {
            Some(backend) if backend.kind() == kind => Ok(backend),
            _ => Err(BackendError::UnsupportedType {
                name: name.to_string(),
                kind,
            }),
        }
    }

    /// Loads the meta backend provided by module `name`.
    ///
    /// # Errors
    ///
    /// See [`load`](Self::load).
    pub fn load_meta(&self, name: &str) -> BackendResult<Box<dyn DynMetaBackend>> {
        match self.load(name, BackendType::Meta)? {
            LoadedBackend::Meta(backend) => Ok(backend),
            LoadedBackend::Data(_) => Err(BackendError::UnsupportedType {
                name: name.to_string(),
                kind: BackendType::Meta,
            }),
        }
    }

    /// Loads the data backend provided by module `name`.
    ///
    /// # Errors
    ///
    /// See [`load`](Self::load).
    pub fn load_data(&self, name: &str) -> BackendResult<Box<dyn DynDataBackend>> {
        match self.load(name, BackendType::Data)? {
            LoadedBackend::Data(backend) => Ok(backend),
            LoadedBackend::Meta(_) => Err(BackendError::UnsupportedType {
                name: name.to_string(),
                kind: BackendType::Data,
            }),
        }
    }
}

impl fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.modules.keys()).finish()
    }
}
