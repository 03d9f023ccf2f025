//! Test fixtures and backend helpers.
//!
//! Provides initialized backends with automatic cleanup, plus a meta
//! backend that counts its lifecycle hook calls.

use flexstore_backend::{
    BackendResult, Document, DynDataBackend, DynMetaBackend, JournalMetaBackend,
    MemoryDataBackend, MemoryMetaBackend, MetaBackend, PosixDataBackend, SnapshotCursor,
    WriteBatch,
};
use flexstore_semantics::Semantics;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// An initialized meta backend, finalized on drop.
pub struct TestMeta {
    /// The backend instance.
    pub backend: Box<dyn DynMetaBackend>,
    /// The temporary directory (kept alive to prevent cleanup).
    temp_dir: Option<TempDir>,
}

impl TestMeta {
    /// Creates an initialized memory meta backend.
    pub fn memory() -> Self {
        let mut backend: Box<dyn DynMetaBackend> = Box::new(MemoryMetaBackend::new());
        backend
            .init(Path::new("testkit"))
            .expect("Failed to init memory meta backend");
        Self {
            backend,
            temp_dir: None,
        }
    }

    /// Creates an initialized journal meta backend in a temporary directory.
    pub fn journal() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let mut backend: Box<dyn DynMetaBackend> = Box::new(JournalMetaBackend::new());
        backend
            .init(temp_dir.path())
            .expect("Failed to init journal meta backend");
        Self {
            backend,
            temp_dir: Some(temp_dir),
        }
    }

    /// Returns the store directory if file-based, None if in-memory.
    pub fn path(&self) -> Option<&Path> {
        self.temp_dir.as_ref().map(TempDir::path)
    }

    /// Finalizes and re-initializes the backend at the same location.
    ///
    /// Memory backends come back empty; persistent backends come back with
    /// their contents.
    pub fn reopen(&mut self) {
        self.backend.fini();
        let path = self
            .temp_dir
            .as_ref()
            .map_or_else(|| Path::new("testkit").to_path_buf(), |d| d.path().to_path_buf());
        self.backend
            .init(&path)
            .expect("Failed to re-init meta backend");
    }
}

impl std::ops::Deref for TestMeta {
    type Target = dyn DynMetaBackend;

    fn deref(&self) -> &Self::Target {
        self.backend.as_ref()
    }
}

impl Drop for TestMeta {
    fn drop(&mut self) {
        self.backend.fini();
    }
}

/// An initialized data backend, finalized on drop.
pub struct TestData {
    /// The backend instance.
    pub backend: Box<dyn DynDataBackend>,
    _temp_dir: Option<TempDir>,
}

impl TestData {
    /// Creates an initialized memory data backend.
    pub fn memory() -> Self {
        let mut backend: Box<dyn DynDataBackend> = Box::new(MemoryDataBackend::new());
        backend
            .init(Path::new("testkit"))
            .expect("Failed to init memory data backend");
        Self {
            backend,
            _temp_dir: None,
        }
    }

    /// Creates an initialized posix data backend in a temporary directory.
    pub fn posix() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let mut backend: Box<dyn DynDataBackend> = Box::new(PosixDataBackend::new());
        backend
            .init(temp_dir.path())
            .expect("Failed to init posix data backend");
        Self {
            backend,
            _temp_dir: Some(temp_dir),
        }
    }
}

impl std::ops::Deref for TestData {
    type Target = dyn DynDataBackend;

    fn deref(&self) -> &Self::Target {
        self.backend.as_ref()
    }
}

impl Drop for TestData {
    fn drop(&mut self) {
        self.backend.fini();
    }
}

/// Runs a test with an initialized memory meta backend.
pub fn with_memory_meta<F, R>(f: F) -> R
where
    F: FnOnce(&dyn DynMetaBackend) -> R,
{
    let meta = TestMeta::memory();
    f(&*meta)
}

/// Runs a test with an initialized journal meta backend.
pub fn with_journal_meta<F, R>(f: F) -> R
where
    F: FnOnce(&dyn DynMetaBackend, &Path) -> R,
{
    let meta = TestMeta::journal();
    let path = meta
        .path()
        .expect("Journal backend should have a path")
        .to_path_buf();
    f(&*meta, &path)
}

/// Call counts of backend lifecycle hooks.
#[derive(Debug, Default)]
pub struct HookCounter {
    /// Successful `init` calls.
    pub inits: AtomicUsize,
    /// `fini` calls.
    pub finis: AtomicUsize,
    /// `thread_init` calls.
    pub thread_inits: AtomicUsize,
    /// `thread_fini` calls.
    pub thread_finis: AtomicUsize,
}

/// A memory meta backend that records every lifecycle hook in a shared
/// [`HookCounter`].
#[derive(Debug)]
pub struct HookCountingMetaBackend {
    inner: MemoryMetaBackend,
    counter: Arc<HookCounter>,
}

impl HookCountingMetaBackend {
    /// Creates an uninitialized backend reporting to `counter`.
    pub fn new(counter: Arc<HookCounter>) -> Self {
        Self {
            inner: MemoryMetaBackend::new(),
            counter,
        }
    }
}

impl MetaBackend for HookCountingMetaBackend {
    type Batch = WriteBatch;
    type Cursor = SnapshotCursor;

    fn name(&self) -> &'static str {
        "counting"
    }

    fn init(&mut self, path: &Path) -> BackendResult<()> {
        MetaBackend::init(&mut self.inner, path)?;
        self.counter.inits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn fini(&mut self) {
        self.counter.finis.fetch_add(1, Ordering::SeqCst);
        MetaBackend::fini(&mut self.inner);
    }

    fn thread_init(&self) -> BackendResult<()> {
        self.counter.thread_inits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn thread_fini(&self) {
        self.counter.thread_finis.fetch_add(1, Ordering::SeqCst);
    }

    fn batch_start(&self, namespace: &str, semantics: &Semantics) -> BackendResult<WriteBatch> {
        MetaBackend::batch_start(&self.inner, namespace, semantics)
    }

    fn put(&self, batch: &mut WriteBatch, key: &str, document: &Document) -> BackendResult<()> {
        MetaBackend::put(&self.inner, batch, key, document)
    }

    fn delete(&self, batch: &mut WriteBatch, key: &str) -> BackendResult<()> {
        MetaBackend::delete(&self.inner, batch, key)
    }

    fn batch_execute(&self, batch: WriteBatch) -> BackendResult<()> {
        MetaBackend::batch_execute(&self.inner, batch)
    }

    fn get(&self, namespace: &str, key: &str) -> BackendResult<Option<Document>> {
        MetaBackend::get(&self.inner, namespace, key)
    }

    fn get_all(&self, namespace: &str) -> BackendResult<Option<SnapshotCursor>> {
        MetaBackend::get_all(&self.inner, namespace)
    }

    fn get_by_value(
        &self,
        namespace: &str,
        query: &Document,
    ) -> BackendResult<Option<SnapshotCursor>> {
        MetaBackend::get_by_value(&self.inner, namespace, query)
    }

    fn iterate(&self, cursor: &mut SnapshotCursor) -> BackendResult<Option<Document>> {
        MetaBackend::iterate(&self.inner, cursor)
    }
}
