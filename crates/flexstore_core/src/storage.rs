//! The storage context.

use crate::config::{BackendConfig, Config};
use crate::error::{StorageError, StorageResult};
use flexstore_backend::{BackendRegistry, BackendType, Document, DynDataBackend, DynMetaBackend};
use flexstore_cache::SharedCache;
use flexstore_semantics::Semantics;
use std::fmt;
use std::marker::PhantomData;
use tracing::{debug, info, trace};

/// An open storage context.
///
/// Owns the configured meta and data backends, the arena cache and the
/// default semantics descriptor. Backends are initialized by
/// [`open`](Self::open) and finalized by [`close`](Self::close) or on drop.
///
/// # Example
///
/// ```rust
/// use flexstore_core::{Config, Storage};
///
/// let storage = Storage::open(Config::new().meta_backend("memory", "scratch")).unwrap();
/// let meta = storage.meta().unwrap();
///
/// let mut batch = meta.batch_start("items", &storage.semantics()).unwrap();
/// meta.put(&mut batch, "a", &storage.stage(b"doc")).unwrap();
/// meta.batch_execute(batch).unwrap();
///
/// assert_eq!(meta.get("items", "a").unwrap().unwrap().as_bytes(), b"doc");
/// assert!(storage.data().is_err());
/// ```
pub struct Storage {
    config: Config,
    meta: Option<Box<dyn DynMetaBackend>>,
    data: Option<Box<dyn DynDataBackend>>,
    cache: SharedCache,
    semantics: Semantics,
}

impl Storage {
    /// Opens a storage context with the built-in backend modules.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, a backend name is not
    /// registered, or a backend fails to initialize.
    pub fn open(config: Config) -> StorageResult<Self> {
        Self::open_with_registry(config, &BackendRegistry::builtin())
    }

    /// Opens a storage context resolving backend names through `registry`.
    ///
    /// If the data backend fails to initialize, the already initialized meta
    /// backend is finalized before the error is returned.
    ///
    /// # Errors
    ///
    /// See [`open`](Self::open).
    pub fn open_with_registry(config: Config, registry: &BackendRegistry) -> StorageResult<Self> {
        config.validate()?;
        let semantics = config.semantics.build()?;
        let capacity = usize::try_from(config.cache_capacity)
            .map_err(|_| StorageError::invalid_config("cache_capacity exceeds the address space"))?;
        let cache = SharedCache::new(capacity)?;

        let mut meta = match &config.meta {
            Some(selection) => Some(open_meta(registry, selection)?),
            None => None,
        };
        let data = match &config.data {
            Some(selection) => match open_data(registry, selection) {
                Ok(backend) => Some(backend),
                Err(err) => {
                    if let Some(meta) = meta.as_mut() {
                        meta.fini();
                    }
                    return Err(err);
                }
            },
            None => None,
        };

        info!(
            meta = config.meta.as_ref().map(|c| c.backend.as_str()),
            data = config.data.as_ref().map(|c| c.backend.as_str()),
            cache_capacity = capacity,
            semantics = ?semantics.snapshot(),
            "storage opened"
        );

        Ok(Self {
            config,
            meta,
            data,
            cache,
            semantics,
        })
    }

    /// Returns the configuration the context was opened with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the meta backend.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotConfigured`] if no meta backend was configured.
    pub fn meta(&self) -> StorageResult<&dyn DynMetaBackend> {
        self.meta
            .as_deref()
            .ok_or(StorageError::NotConfigured {
                kind: BackendType::Meta,
            })
    }

    /// Returns the data backend.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotConfigured`] if no data backend was configured.
    pub fn data(&self) -> StorageResult<&dyn DynDataBackend> {
        self.data
            .as_deref()
            .ok_or(StorageError::NotConfigured {
                kind: BackendType::Data,
            })
    }

    /// Returns a share of the default semantics descriptor.
    ///
    /// Changes made through any share are visible to every holder. Use
    /// [`Semantics::detach`] for a private copy.
    #[must_use]
    pub fn semantics(&self) -> Semantics {
        self.semantics.share()
    }

    /// Returns the arena cache.
    #[must_use]
    pub fn cache(&self) -> &SharedCache {
        &self.cache
    }

    /// Runs the per-thread hooks of every backend for the calling thread.
    ///
    /// The returned guard runs the matching teardown hooks when dropped.
    ///
    /// # Errors
    ///
    /// Returns the first `thread_init` failure. Hooks that already ran are
    /// torn down again before returning.
    pub fn thread_guard(&self) -> StorageResult<ThreadGuard<'_>> {
        ThreadGuard::enter(self.meta.as_deref(), self.data.as_deref())
    }

    /// Copies `bytes` into a document, staging it in the arena cache when
    /// budget remains and allocating directly otherwise.
    #[must_use]
    pub fn stage(&self, bytes: &[u8]) -> Document {
        match self.cache.put(bytes) {
            Ok(buffer) => Document::from_bytes(buffer.freeze()),
            Err(err) => {
                trace!(len = bytes.len(), %err, "staging outside the cache");
                Document::from_bytes(bytes.to_vec())
            }
        }
    }

    /// Finalizes the backends and closes the context.
    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(mut data) = self.data.take() {
            data.fini();
        }
        if let Some(mut meta) = self.meta.take() {
            meta.fini();
        }
        debug!("storage closed");
    }
}

fn open_meta(
    registry: &BackendRegistry,
    selection: &BackendConfig,
) -> StorageResult<Box<dyn DynMetaBackend>> {
    let mut backend = registry.load_meta(&selection.backend)?;
    if let Err(err) = backend.init(&selection.path) {
        backend.fini();
        return Err(err.into());
    }
    Ok(backend)
}

fn open_data(
    registry: &BackendRegistry,
    selection: &BackendConfig,
) -> StorageResult<Box<dyn DynDataBackend>> {
    let mut backend = registry.load_data(&selection.backend)?;
    if let Err(err) = backend.init(&selection.path) {
        backend.fini();
        return Err(err.into());
    }
    Ok(backend)
}

impl Drop for Storage {
    fn drop(&mut self) {
        if self.meta.is_some() || self.data.is_some() {
            self.shutdown();
        }
    }
}

impl fmt::Debug for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Storage")
            .field("meta", &self.meta.as_ref().map(|b| b.name()))
            .field("data", &self.data.as_ref().map(|b| b.name()))
            .field("cache", &self.cache)
            .field("semantics", &self.semantics)
            .finish()
    }
}

/// Per-thread backend state for the thread that created it.
///
/// Created by [`Storage::thread_guard`]. Not `Send`: the teardown hooks must
/// run on the thread that ran the setup hooks.
pub struct ThreadGuard<'a> {
    meta: Option<&'a dyn DynMetaBackend>,
    data: Option<&'a dyn DynDataBackend>,
    _not_send: PhantomData<*const ()>,
}

impl<'a> ThreadGuard<'a> {
    fn enter(
        meta: Option<&'a dyn DynMetaBackend>,
        data: Option<&'a dyn DynDataBackend>,
    ) -> StorageResult<Self> {
        if let Some(meta) = meta {
            meta.thread_init()?;
        }
        if let Some(data) = data {
            if let Err(err) = data.thread_init() {
                if let Some(meta) = meta {
                    meta.thread_fini();
                }
                return Err(err.into());
            }
        }
        Ok(Self {
            meta,
            data,
            _not_send: PhantomData,
        })
    }
}

impl Drop for ThreadGuard<'_> {
    fn drop(&mut self) {
        if let Some(data) = self.data {
            data.thread_fini();
        }
        if let Some(meta) = self.meta {
            meta.thread_fini();
        }
    }
}

impl fmt::Debug for ThreadGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadGuard")
            .field("meta", &self.meta.map(|b| b.name()))
            .field("data", &self.data.map(|b| b.name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flexstore_backend::{BackendError, LoadedBackend};
    use flexstore_semantics::{Persistency, SemanticsConfig, Template};
    use flexstore_testkit::fixtures::{HookCounter, HookCountingMetaBackend};
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    fn memory_config() -> Config {
        Config::new()
            .meta_backend("memory", "scratch")
            .data_backend("memory", "scratch")
            .cache_capacity(1024)
    }

    #[test]
    fn storage_open_memory_backends() {
        let storage = Storage::open(memory_config()).unwrap();
        assert_eq!(storage.meta().unwrap().name(), "memory");
        assert_eq!(storage.data().unwrap().name(), "memory");
        assert_eq!(storage.cache().size(), 1024);
        storage.close();
    }

    #[test]
    fn storage_missing_backends_not_configured() {
        let storage = Storage::open(Config::new().cache_capacity(64)).unwrap();
        assert!(matches!(
            storage.meta(),
            Err(StorageError::NotConfigured {
                kind: BackendType::Meta
            })
        ));
        assert!(matches!(
            storage.data(),
            Err(StorageError::NotConfigured {
                kind: BackendType::Data
            })
        ));
    }

    #[test]
    fn storage_unknown_backend_rejected() {
        let result = Storage::open(Config::new().meta_backend("leveldb", "x"));
        assert!(matches!(
            result,
            Err(StorageError::Backend(BackendError::UnknownBackend { .. }))
        ));
    }

    #[test]
    fn storage_init_failure_reported() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("plain-file");
        std::fs::write(&file_path, b"x").unwrap();

        let result = Storage::open(Config::new().meta_backend("journal", &file_path));
        assert!(matches!(
            result,
            Err(StorageError::Backend(BackendError::Init { .. }))
        ));
    }

    #[test]
    fn storage_failed_data_init_releases_meta() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("plain-file");
        std::fs::write(&file_path, b"x").unwrap();
        let meta_path = dir.path().join("meta");

        let config = Config::new()
            .meta_backend("journal", &meta_path)
            .data_backend("posix", &file_path);
        assert!(Storage::open(config).is_err());

        // The journal lock was released, so the store opens again.
        let storage = Storage::open(Config::new().meta_backend("journal", &meta_path)).unwrap();
        assert!(storage.meta().is_ok());
    }

    #[test]
    fn storage_journal_persists_across_contexts() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::new()
            .meta_backend("journal", dir.path().join("meta"))
            .data_backend("posix", dir.path().join("data"));

        {
            let storage = Storage::open(config.clone()).unwrap();
            let meta = storage.meta().unwrap();
            let mut batch = meta.batch_start("files", &storage.semantics()).unwrap();
            meta.put(&mut batch, "a.txt", &storage.stage(b"inode")).unwrap();
            meta.batch_execute(batch).unwrap();

            let data = storage.data().unwrap();
            let object = data.create("files", "a.txt").unwrap();
            data.write(&object, b"contents", 0).unwrap();
            data.close(object).unwrap();
        }

        let storage = Storage::open(config).unwrap();
        let document = storage.meta().unwrap().get("files", "a.txt").unwrap().unwrap();
        assert_eq!(document.as_bytes(), b"inode");
        let data = storage.data().unwrap();
        let object = data.open("files", "a.txt").unwrap();
        assert_eq!(data.status(&object).unwrap().size, 8);
    }

    #[test]
    fn storage_semantics_are_shared() {
        let config = memory_config().semantics(SemanticsConfig::new(Template::Posix));
        let storage = Storage::open(config).unwrap();

        let first = storage.semantics();
        let second = storage.semantics();
        assert!(first.ptr_eq(&second));
        first.set_persistency(Persistency::None);
        assert_eq!(second.persistency(), Persistency::None);
        assert_eq!(storage.semantics().persistency(), Persistency::None);
    }

    #[test]
    fn storage_stage_falls_back_when_cache_full() {
        let storage = Storage::open(Config::new().cache_capacity(8)).unwrap();
        let staged = storage.stage(b"12345");
        assert_eq!(storage.cache().remaining(), 3);

        let direct = storage.stage(b"too large for the rest");
        assert_eq!(direct.as_bytes(), b"too large for the rest");
        assert_eq!(storage.cache().remaining(), 3);
        assert_eq!(storage.cache().stats().refusals, 1);
        assert_eq!(staged.as_bytes(), b"12345");
    }

    #[test]
    fn storage_clear_reuses_region_after_staged_documents_are_stored() {
        let capacity = 4096;
        let storage = Storage::open(
            Config::new()
                .meta_backend("memory", "scratch")
                .cache_capacity(capacity),
        )
        .unwrap();
        let meta = storage.meta().unwrap();

        let mut addresses = Vec::new();
        for i in 0..8u8 {
            let staged = storage.stage(&[i]);
            addresses.push(staged.as_bytes().as_ptr() as usize);

            let mut batch = meta.batch_start("ns", &storage.semantics()).unwrap();
            meta.put(&mut batch, &format!("k{i}"), &staged).unwrap();
            meta.batch_execute(batch).unwrap();
            drop(staged);
            storage.cache().clear();
        }

        let region = addresses[0];
        assert!(
            addresses
                .iter()
                .all(|&address| address >= region && address < region + capacity as usize),
            "staging after clear used a new region: {addresses:?}"
        );
        for i in 0..8u8 {
            let stored = meta.get("ns", &format!("k{i}")).unwrap().unwrap();
            assert_eq!(stored.as_bytes(), &[i][..]);
        }
    }

    #[test]
    fn storage_thread_guard_runs_hooks() {
        let counter = Arc::new(HookCounter::default());
        let mut registry = BackendRegistry::builtin();
        registry.register("counting", counting_entry);
        COUNTER.with(|slot| *slot.borrow_mut() = Some(Arc::clone(&counter)));

        let storage = Storage::open_with_registry(
            Config::new().meta_backend("counting", "scratch"),
            &registry,
        )
        .unwrap();
        {
            let _guard = storage.thread_guard().unwrap();
            assert_eq!(counter.thread_inits.load(Ordering::SeqCst), 1);
            assert_eq!(counter.thread_finis.load(Ordering::SeqCst), 0);
        }
        assert_eq!(counter.thread_finis.load(Ordering::SeqCst), 1);

        storage.close();
        assert_eq!(counter.finis.load(Ordering::SeqCst), 1);
    }

    thread_local! {
        static COUNTER: std::cell::RefCell<Option<Arc<HookCounter>>> =
            const { std::cell::RefCell::new(None) };
    }

    fn counting_entry(kind: BackendType) -> Option<LoadedBackend> {
        let counter = COUNTER.with(|slot| slot.borrow().clone())?;
        match kind {
            BackendType::Meta => Some(LoadedBackend::Meta(Box::new(
                HookCountingMetaBackend::new(counter),
            ))),
            BackendType::Data => None,
        }
    }
}
