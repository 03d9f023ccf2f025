//! In-memory reference backends.
//!
//! Both backends keep all state in process memory and lose it on `fini`.
//! They exist for tests and for scratch storage that does not need to
//! survive the process.

mod data;
mod meta;

pub use data::{MemoryDataBackend, MemoryObject};
pub use meta::MemoryMetaBackend;

use crate::registry::LoadedBackend;
use crate::types::BackendType;

/// Module entry point for the `memory` backends.
pub fn backend_info(kind: BackendType) -> Option<LoadedBackend> {
    match kind {
        BackendType::Meta => Some(LoadedBackend::Meta(Box::new(MemoryMetaBackend::new()))),
        BackendType::Data => Some(LoadedBackend::Data(Box::new(MemoryDataBackend::new()))),
    }
}
