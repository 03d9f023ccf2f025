//! The data backend contract.

use crate::error::BackendResult;
use crate::types::ObjectStatus;
use std::path::Path;

/// A storage engine for raw byte ranges held in named objects.
///
/// Data backends share the meta backend lifecycle (`init`, `fini` and the
/// per-thread hooks). Objects are addressed by namespace and path and are
/// accessed through an engine-specific [`Object`](Self::Object) handle,
/// obtained from [`create`](Self::create) or [`open`](Self::open) and given
/// back through [`close`](Self::close) or [`delete`](Self::delete).
pub trait DataBackend: Send + Sync {
    /// Engine-specific open-object handle.
    type Object: Send + 'static;

    /// Returns the name the backend is registered under.
    fn name(&self) -> &'static str;

    /// Opens or creates the store rooted at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Init`](crate::BackendError::Init) if the path is unusable.
    fn init(&mut self, path: &Path) -> BackendResult<()>;

    /// Releases all engine resources. Safe after a failed `init`.
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

    /// Creates an empty object and opens it.
    ///
    /// # Errors
    ///
    /// Returns `ObjectExists` if an object is already stored at that location.
    fn create(&self, namespace: &str, path: &str) -> BackendResult<Self::Object>;

    /// Opens an existing object.
    ///
    /// # Errors
    ///
    /// Returns `ObjectNotFound` if nothing is stored at that location.
    fn open(&self, namespace: &str, path: &str) -> BackendResult<Self::Object>;

    /// Removes an object, consuming its handle.
    ///
    /// # Errors
    ///
    /// Returns an error if the object could not be removed.
    fn delete(&self, object: Self::Object) -> BackendResult<()>;

    /// Closes an object handle.
    ///
    /// # Errors
    ///
    /// Returns an error if pending writes could not be flushed.
    fn close(&self, object: Self::Object) -> BackendResult<()>;

    /// Returns the object's size and modification time.
    ///
    /// # Errors
    ///
    /// Returns an error if the status cannot be determined.
    fn status(&self, object: &Self::Object) -> BackendResult<ObjectStatus>;

    /// Makes every write to the object durable.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    fn sync(&self, object: &Self::Object) -> BackendResult<()>;

    /// Reads up to `buf.len()` bytes starting at `offset`.
    ///
    /// Returns the number of bytes read, which is short only at the end of
    /// the object.
    ///
    /// # Errors
    ///
    /// Returns an error on engine failure.
    fn read(&self, object: &Self::Object, buf: &mut [u8], offset: u64) -> BackendResult<usize>;

    /// Writes `data` at `offset`, growing the object as needed.
    ///
    /// Returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns an error on engine failure.
    fn write(&self, object: &Self::Object, data: &[u8], offset: u64) -> BackendResult<usize>;
}
