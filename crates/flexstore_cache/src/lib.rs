//! # flexstore Cache
//!
//! A fixed-budget arena for staging serialized documents and I/O buffers.
//!
//! The cache owns one contiguous region of `size` bytes. Every grant is carved
//! off the front of what remains (bump allocation); grants are never returned
//! individually. [`Cache::clear`] restores the whole budget at once and marks
//! every earlier buffer as stale.
//!
//! Running out of budget is an expected outcome, reported as
//! [`CacheError::InsufficientCapacity`]. Callers fall back to a direct
//! allocation or wait for the next clear.
//!
//! ## Example
//!
//! ```rust
//! use flexstore_cache::Cache;
//!
//! let mut cache = Cache::new(1024).unwrap();
//! let buffer = cache.put(b"staged document").unwrap();
//! assert_eq!(&buffer[..], b"staged document");
//! assert_eq!(cache.remaining(), 1024 - 15);
//!
//! cache.clear();
//! assert_eq!(cache.remaining(), 1024);
//! assert!(!cache.is_current(&buffer));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod buffer;
mod cache;
mod error;
mod shared;

pub use buffer::CacheBuffer;
pub use cache::{Cache, CacheStats};
pub use error::{CacheError, CacheResult};
pub use shared::SharedCache;
