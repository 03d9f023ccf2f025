//! # flexstore Backend
//!
//! The pluggable storage backend contract for flexstore.
//!
//! A backend is one of two kinds:
//!
//! - a **meta backend** ([`MetaBackend`]) stores small structured
//!   [`Document`]s by namespace and key, written through batches and read
//!   back by key or through forward-only cursors
//! - a **data backend** ([`DataBackend`]) stores raw byte ranges in named
//!   objects
//!
//! Backends are opaque to the framework. Each engine picks its own batch,
//! cursor and object handle types; the framework reaches them through the
//! object-safe [`DynMetaBackend`] and [`DynDataBackend`] layers, which every
//! typed backend implements automatically.
//!
//! ## Available Backends
//!
//! - [`MemoryMetaBackend`] and [`MemoryDataBackend`] for tests and scratch storage
//! - [`JournalMetaBackend`] for persistent metadata in an append-only journal
//! - [`PosixDataBackend`] for objects stored as regular files
//!
//! Backends are looked up by name through a [`BackendRegistry`].
//!
//! ## Example
//!
//! ```rust
//! use flexstore_backend::{BackendRegistry, Document, DynMetaBackend};
//! use flexstore_semantics::Semantics;
//! use std::path::Path;
//!
//! let registry = BackendRegistry::builtin();
//! let mut meta = registry.load_meta("memory").unwrap();
//! meta.init(Path::new("scratch")).unwrap();
//!
//! let mut batch = meta.batch_start("items", &Semantics::new()).unwrap();
//! meta.put(&mut batch, "a", &Document::from(&b"doc"[..])).unwrap();
//! meta.batch_execute(batch).unwrap();
//!
//! let all: Vec<_> = meta.documents(meta.get_all("items").unwrap()).collect();
//! assert_eq!(all.len(), 1);
//! meta.fini();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod batch;
mod cursor;
mod data;
mod dispatch;
mod document;
mod error;
mod index;
mod journal;
mod memory;
mod meta;
mod posix;
mod query;
mod registry;
mod types;

pub use batch::{BatchOp, WriteBatch};
pub use cursor::SnapshotCursor;
pub use data::DataBackend;
pub use dispatch::{
    BatchHandle, CursorHandle, Documents, DynDataBackend, DynMetaBackend, ObjectHandle,
};
pub use document::Document;
pub use error::{BackendError, BackendResult};
pub use journal::JournalMetaBackend;
pub use memory::{MemoryDataBackend, MemoryMetaBackend, MemoryObject};
pub use meta::MetaBackend;
pub use posix::{PosixDataBackend, PosixObject};
pub use query::ValueQuery;
pub use registry::{BackendEntry, BackendRegistry, LoadedBackend};
pub use types::{validate_key, validate_namespace, BackendType, ObjectStatus};
