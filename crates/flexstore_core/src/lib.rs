//! # flexstore Core
//!
//! The storage context tying flexstore together.
//!
//! A [`Storage`] is opened from a [`Config`] naming a meta backend, a data
//! backend, an arena cache budget and a default semantics template. It
//! resolves backend names through a
//! [`BackendRegistry`](flexstore_backend::BackendRegistry), initializes the
//! backends and finalizes them again when closed.
//!
//! ## Example
//!
//! ```rust
//! use flexstore_core::{Config, Storage};
//!
//! let config = Config::from_json_str(
//!     r#"{ "meta": { "backend": "memory", "path": "scratch" }, "cache_capacity": 4096 }"#,
//! )
//! .unwrap();
//! let storage = Storage::open(config).unwrap();
//!
//! let _guard = storage.thread_guard().unwrap();
//! let document = storage.stage(b"hello");
//! assert_eq!(document.as_bytes(), b"hello");
//! assert_eq!(storage.cache().remaining(), 4096 - 5);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod storage;

pub use config::{BackendConfig, Config, DEFAULT_CACHE_CAPACITY};
pub use error::{StorageError, StorageResult};
pub use storage::{Storage, ThreadGuard};

pub use flexstore_backend as backend;
pub use flexstore_cache as cache;
pub use flexstore_semantics as semantics;
