//! The meta backend contract.

use crate::document::Document;
use crate::error::BackendResult;
use flexstore_semantics::Semantics;
use std::path::Path;

/// A storage engine for small structured documents keyed by namespace and key.
///
/// # Lifecycle
///
/// A backend value is created empty, opened once with [`init`](Self::init)
/// and closed with [`fini`](Self::fini). Every data operation on a backend
/// that is not initialized returns
/// [`BackendError::NotInitialized`](crate::BackendError::NotInitialized).
/// Engines with per-thread state use [`thread_init`](Self::thread_init) and
/// [`thread_fini`](Self::thread_fini); the default hooks do nothing.
///
/// # Batches
///
/// Writes go through a batch: [`batch_start`](Self::batch_start) creates it,
/// [`put`](Self::put) and [`delete`](Self::delete) stage operations without
/// touching the store, and [`batch_execute`](Self::batch_execute) applies them
/// as one write unit. Within a batch the last operation on a key wins.
/// `batch_execute` consumes the batch, so it is released whatever the outcome.
/// On failure the caller must assume none or an unknown prefix of the
/// operations was applied; each backend documents which.
///
/// # Cursors
///
/// [`get_all`](Self::get_all) and [`get_by_value`](Self::get_by_value) open a
/// forward-only cursor. Each successful [`iterate`](Self::iterate) returns one
/// document; the first `Ok(None)` reports exhaustion and releases the
/// cursor's resources. Dropping a cursor early releases it too.
///
/// # Threading
///
/// Operations take `&self` and may block on I/O. Batch and cursor handles are
/// single-owner values: the borrow checker keeps one thread advancing them at
/// a time. Whether concurrent writes to the same key are serialized depends on
/// the backend and the concurrency level of the caller's semantics.
pub trait MetaBackend: Send + Sync {
    /// Engine-specific batch handle.
    type Batch: Send + 'static;

    /// Engine-specific cursor handle.
    type Cursor: Send + 'static;

    /// Returns the name the backend is registered under.
    fn name(&self) -> &'static str;

    /// Opens or creates the persistent store at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Init`](crate::BackendError::Init) if the path is
    /// unusable, or `AlreadyInitialized` on a second call.
    fn init(&mut self, path: &Path) -> BackendResult<()>;

    /// Releases all engine resources.
    ///
    /// Safe to call on a backend whose `init` failed or was never called, and
    /// safe to call twice.
    fn fini(&mut self);

    /// Creates per-thread engine state for the calling thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot allocate thread state.
    fn thread_init(&self) -> BackendResult<()> {
        Ok(())
    }

    /// Destroys per-thread engine state for the calling thread.
    fn thread_fini(&self) {}

    /// Creates an empty batch for `namespace`.
    ///
    /// The levels of `semantics` are captured now; the persistency level
    /// decides how hard `batch_execute` pushes the write to stable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the namespace is empty or resources are exhausted.
    fn batch_start(&self, namespace: &str, semantics: &Semantics) -> BackendResult<Self::Batch>;

    /// Stages a write of `document` under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if `key` is empty.
    fn put(&self, batch: &mut Self::Batch, key: &str, document: &Document) -> BackendResult<()>;

    /// Stages a deletion of `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if `key` is empty.
    fn delete(&self, batch: &mut Self::Batch, key: &str) -> BackendResult<()>;

    /// Applies every staged operation as one write unit.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine could not apply the batch.
    fn batch_execute(&self, batch: Self::Batch) -> BackendResult<()>;

    /// Looks up a single document.
    ///
    /// # Errors
    ///
    /// Returns an error only on engine failure; a missing key is `Ok(None)`.
    fn get(&self, namespace: &str, key: &str) -> BackendResult<Option<Document>>;

    /// Opens a cursor over every document in `namespace`, in backend order.
    ///
    /// Returns `Ok(None)` if the namespace holds nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the namespace is empty or on engine failure.
    fn get_all(&self, namespace: &str) -> BackendResult<Option<Self::Cursor>>;

    /// Opens a cursor over documents that match `query`.
    ///
    /// Engines without secondary lookups may always return `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the namespace is empty or on engine failure.
    fn get_by_value(&self, namespace: &str, query: &Document)
        -> BackendResult<Option<Self::Cursor>>;

    /// Advances a cursor.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::CursorExhausted`](crate::BackendError::CursorExhausted)
    /// if the cursor already reported exhaustion, or an engine error.
    fn iterate(&self, cursor: &mut Self::Cursor) -> BackendResult<Option<Document>>;
}
