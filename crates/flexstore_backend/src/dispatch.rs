//! Type-erased backend dispatch.
//!
//! [`MetaBackend`] and [`DataBackend`] use associated handle types, which keeps
//! each engine in control of its own batch, cursor and object
//! representation but makes the traits unusable as trait objects. The
//! framework loads backends by name at configuration time, so it talks to
//! them through [`DynMetaBackend`] and [`DynDataBackend`] instead. Every typed
//! backend implements these automatically; handles are boxed, tagged with
//! the name of the backend that issued them and checked on the way back in,
//! so a handle from a different backend is rejected with
//! [`BackendError::InvalidHandle`].
//!
//! Each call through this layer runs inside a `trace` span named after the
//! operation, so every backend gets entry/exit tracing without doing any
//! itself.

use crate::data::DataBackend;
use crate::document::Document;
use crate::error::{BackendError, BackendResult};
use crate::meta::MetaBackend;
use crate::types::ObjectStatus;
use flexstore_semantics::Semantics;
use std::any::{type_name, Any};
use std::fmt;
use std::path::Path;
use tracing::trace_span;

fn invalid_handle<T>() -> BackendError {
    BackendError::InvalidHandle {
        expected: type_name::<T>(),
    }
}

fn check_owner(owner: &'static str, backend: &'static str) -> BackendResult<()> {
    if owner == backend {
        Ok(())
    } else {
        Err(BackendError::InvalidHandle { expected: backend })
    }
}

/// A boxed batch handle returned by [`DynMetaBackend::batch_start`].
pub struct BatchHandle {
    backend: &'static str,
    namespace: String,
    inner: Box<dyn Any + Send>,
}

impl BatchHandle {
    fn new<T: Send + 'static>(backend: &'static str, namespace: &str, batch: T) -> Self {
        Self {
            backend,
            namespace: namespace.to_string(),
            inner: Box::new(batch),
        }
    }

    /// Returns the name of the backend that issued the batch.
    #[must_use]
    pub fn backend(&self) -> &'static str {
        self.backend
    }

    /// Returns the namespace the batch writes to.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn downcast_mut<T: 'static>(&mut self, backend: &'static str) -> BackendResult<&mut T> {
        check_owner(self.backend, backend)?;
        self.inner.downcast_mut::<T>().ok_or_else(invalid_handle::<T>)
    }

    fn into_inner<T: 'static>(self, backend: &'static str) -> BackendResult<T> {
        check_owner(self.backend, backend)?;
        self.inner
            .downcast::<T>()
            .map(|batch| *batch)
            .map_err(|_| invalid_handle::<T>())
    }
}

impl fmt::Debug for BatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchHandle")
            .field("backend", &self.backend)
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

/// A boxed cursor handle returned by [`DynMetaBackend::get_all`] and
/// [`DynMetaBackend::get_by_value`].
pub struct CursorHandle {
    backend: &'static str,
    namespace: String,
    inner: Box<dyn Any + Send>,
}

impl CursorHandle {
    fn new<T: Send + 'static>(backend: &'static str, namespace: &str, cursor: T) -> Self {
        Self {
            backend,
            namespace: namespace.to_string(),
            inner: Box::new(cursor),
        }
    }

    /// Returns the name of the backend that opened the cursor.
    #[must_use]
    pub fn backend(&self) -> &'static str {
        self.backend
    }

    /// Returns the namespace the cursor walks.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn downcast_mut<T: 'static>(&mut self, backend: &'static str) -> BackendResult<&mut T> {
        check_owner(self.backend, backend)?;
        self.inner.downcast_mut::<T>().ok_or_else(invalid_handle::<T>)
    }
}

impl fmt::Debug for CursorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CursorHandle")
            .field("backend", &self.backend)
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

/// A boxed open-object handle returned by [`DynDataBackend::create`] and
/// [`DynDataBackend::open`].
pub struct ObjectHandle {
    backend: &'static str,
    namespace: String,
    path: String,
    inner: Box<dyn Any + Send>,
}

impl ObjectHandle {
    fn new<T: Send + 'static>(
        backend: &'static str,
        namespace: &str,
        path: &str,
        object: T,
    ) -> Self {
        Self {
            backend,
            namespace: namespace.to_string(),
            path: path.to_string(),
            inner: Box::new(object),
        }
    }

    /// Returns the name of the backend that opened the object.
    #[must_use]
    pub fn backend(&self) -> &'static str {
        self.backend
    }

    /// Returns the object namespace.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns the object path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    fn downcast_ref<T: 'static>(&self, backend: &'static str) -> BackendResult<&T> {
        check_owner(self.backend, backend)?;
        self.inner.downcast_ref::<T>().ok_or_else(invalid_handle::<T>)
    }

    fn into_inner<T: 'static>(self, backend: &'static str) -> BackendResult<T> {
        check_owner(self.backend, backend)?;
        self.inner
            .downcast::<T>()
            .map(|object| *object)
            .map_err(|_| invalid_handle::<T>())
    }
}

impl fmt::Debug for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectHandle")
            .field("backend", &self.backend)
            .field("namespace", &self.namespace)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Object-safe form of [`MetaBackend`]. See that trait for the contract.
#[allow(missing_docs)]
pub trait DynMetaBackend: Send + Sync {
    fn name(&self) -> &'static str;
    fn init(&mut self, path: &Path) -> BackendResult<()>;
    fn fini(&mut self);
    fn thread_init(&self) -> BackendResult<()>;
    fn thread_fini(&self);
    fn batch_start(&self, namespace: &str, semantics: &Semantics) -> BackendResult<BatchHandle>;
    fn put(&self, batch: &mut BatchHandle, key: &str, document: &Document) -> BackendResult<()>;
    fn delete(&self, batch: &mut BatchHandle, key: &str) -> BackendResult<()>;
    fn batch_execute(&self, batch: BatchHandle) -> BackendResult<()>;
    fn get(&self, namespace: &str, key: &str) -> BackendResult<Option<Document>>;
    fn get_all(&self, namespace: &str) -> BackendResult<Option<CursorHandle>>;
    fn get_by_value(&self, namespace: &str, query: &Document)
        -> BackendResult<Option<CursorHandle>>;
    fn iterate(&self, cursor: &mut CursorHandle) -> BackendResult<Option<Document>>;
}

impl<B: MetaBackend> DynMetaBackend for B {
    fn name(&self) -> &'static str {
        MetaBackend::name(self)
    }

    fn init(&mut self, path: &Path) -> BackendResult<()> {
        let _span = trace_span!("init", backend = MetaBackend::name(self), path = %path.display())
            .entered();
        MetaBackend::init(self, path)
    }

    fn fini(&mut self) {
        let _span = trace_span!("fini", backend = MetaBackend::name(self)).entered();
        MetaBackend::fini(self);
    }

    fn thread_init(&self) -> BackendResult<()> {
        let _span = trace_span!("thread_init", backend = MetaBackend::name(self)).entered();
        MetaBackend::thread_init(self)
    }

    fn thread_fini(&self) {
        let _span = trace_span!("thread_fini", backend = MetaBackend::name(self)).entered();
        MetaBackend::thread_fini(self);
    }

    fn batch_start(&self, namespace: &str, semantics: &Semantics) -> BackendResult<BatchHandle> {
        let _span =
            trace_span!("batch_start", backend = MetaBackend::name(self), namespace).entered();
        let batch = MetaBackend::batch_start(self, namespace, semantics)?;
        Ok(BatchHandle::new(MetaBackend::name(self), namespace, batch))
    }

    fn put(&self, batch: &mut BatchHandle, key: &str, document: &Document) -> BackendResult<()> {
        let _span = trace_span!(
            "put",
            backend = MetaBackend::name(self),
            namespace = batch.namespace(),
            key,
            len = document.len()
        )
        .entered();
        let batch = batch.downcast_mut::<B::Batch>(MetaBackend::name(self))?;
        MetaBackend::put(self, batch, key, document)
    }

    fn delete(&self, batch: &mut BatchHandle, key: &str) -> BackendResult<()> {
        let _span = trace_span!(
            "delete",
            backend = MetaBackend::name(self),
            namespace = batch.namespace(),
            key
        )
        .entered();
        let batch = batch.downcast_mut::<B::Batch>(MetaBackend::name(self))?;
        MetaBackend::delete(self, batch, key)
    }

    fn batch_execute(&self, batch: BatchHandle) -> BackendResult<()> {
        let _span = trace_span!(
            "batch_execute",
            backend = MetaBackend::name(self),
            namespace = batch.namespace()
        )
        .entered();
        let batch = batch.into_inner::<B::Batch>(MetaBackend::name(self))?;
        MetaBackend::batch_execute(self, batch)
    }

    fn get(&self, namespace: &str, key: &str) -> BackendResult<Option<Document>> {
        let _span =
            trace_span!("get", backend = MetaBackend::name(self), namespace, key).entered();
        MetaBackend::get(self, namespace, key)
    }

    fn get_all(&self, namespace: &str) -> BackendResult<Option<CursorHandle>> {
        let _span = trace_span!("get_all", backend = MetaBackend::name(self), namespace).entered();
        let name = MetaBackend::name(self);
        Ok(MetaBackend::get_all(self, namespace)?
            .map(|cursor| CursorHandle::new(name, namespace, cursor)))
    }

    fn get_by_value(
        &self,
        namespace: &str,
        query: &Document,
    ) -> BackendResult<Option<CursorHandle>> {
        let _span =
            trace_span!("get_by_value", backend = MetaBackend::name(self), namespace).entered();
        let name = MetaBackend::name(self);
        Ok(MetaBackend::get_by_value(self, namespace, query)?
            .map(|cursor| CursorHandle::new(name, namespace, cursor)))
    }

    fn iterate(&self, cursor: &mut CursorHandle) -> BackendResult<Option<Document>> {
        let _span = trace_span!(
            "iterate",
            backend = MetaBackend::name(self),
            namespace = cursor.namespace()
        )
        .entered();
        let cursor = cursor.downcast_mut::<B::Cursor>(MetaBackend::name(self))?;
        MetaBackend::iterate(self, cursor)
    }
}

impl dyn DynMetaBackend + '_ {
    /// Adapts a cursor into an iterator over its documents.
    ///
    /// Pass the result of `get_all` or `get_by_value` directly; `None`
    /// yields an empty iterator.
    pub fn documents(&self, cursor: Option<CursorHandle>) -> Documents<'_> {
        Documents {
            backend: self,
            cursor,
        }
    }
}

/// Iterator over the documents of a cursor. Created by
/// [`documents`](trait.DynMetaBackend.html#method.documents).
///
/// The iterator stops after the cursor reports exhaustion or after the first
/// error, which it yields once.
pub struct Documents<'a> {
    backend: &'a dyn DynMetaBackend,
    cursor: Option<CursorHandle>,
}

impl Iterator for Documents<'_> {
    type Item = BackendResult<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        let cursor = self.cursor.as_mut()?;
        match self.backend.iterate(cursor) {
            Ok(Some(document)) => Some(Ok(document)),
            Ok(None) => {
                self.cursor = None;
                None
            }
            Err(err) => {
                self.cursor = None;
                Some(Err(err))
            }
        }
    }
}

/// Object-safe form of [`DataBackend`]. See that trait for the contract.
#[allow(missing_docs)]
pub trait DynDataBackend: Send + Sync {
    fn name(&self) -> &'static str;
    fn init(&mut self, path: &Path) -> BackendResult<()>;
    fn fini(&mut self);
    fn thread_init(&self) -> BackendResult<()>;
    fn thread_fini(&self);
    fn create(&self, namespace: &str, path: &str) -> BackendResult<ObjectHandle>;
    fn open(&self, namespace: &str, path: &str) -> BackendResult<ObjectHandle>;
    fn delete(&self, object: ObjectHandle) -> BackendResult<()>;
    fn close(&self, object: ObjectHandle) -> BackendResult<()>;
    fn status(&self, object: &ObjectHandle) -> BackendResult<ObjectStatus>;
    fn sync(&self, object: &ObjectHandle) -> BackendResult<()>;
    fn read(&self, object: &ObjectHandle, buf: &mut [u8], offset: u64) -> BackendResult<usize>;
    fn write(&self, object: &ObjectHandle, data: &[u8], offset: u64) -> BackendResult<usize>;
}

impl<B: DataBackend> DynDataBackend for B {
    fn name(&self) -> &'static str {
        DataBackend::name(self)
    }

    fn init(&mut self, path: &Path) -> BackendResult<()> {
        let _span = trace_span!("init", backend = DataBackend::name(self), path = %path.display())
            .entered();
        DataBackend::init(self, path)
    }

    fn fini(&mut self) {
        let _span = trace_span!("fini", backend = DataBackend::name(self)).entered();
        DataBackend::fini(self);
    }

    fn thread_init(&self) -> BackendResult<()> {
        let _span = trace_span!("thread_init", backend = DataBackend::name(self)).entered();
        DataBackend::thread_init(self)
    }

    fn thread_fini(&self) {
        let _span = trace_span!("thread_fini", backend = DataBackend::name(self)).entered();
        DataBackend::thread_fini(self);
    }

    fn create(&self, namespace: &str, path: &str) -> BackendResult<ObjectHandle> {
        let _span =
            trace_span!("create", backend = DataBackend::name(self), namespace, path).entered();
        let object = DataBackend::create(self, namespace, path)?;
        Ok(ObjectHandle::new(DataBackend::name(self), namespace, path, object))
    }

    fn open(&self, namespace: &str, path: &str) -> BackendResult<ObjectHandle> {
        let _span =
            trace_span!("open", backend = DataBackend::name(self), namespace, path).entered();
        let object = DataBackend::open(self, namespace, path)?;
        Ok(ObjectHandle::new(DataBackend::name(self), namespace, path, object))
    }

    fn delete(&self, object: ObjectHandle) -> BackendResult<()> {
        let _span = trace_span!(
            "delete",
            backend = DataBackend::name(self),
            namespace = object.namespace(),
            path = object.path()
        )
        .entered();
        let object = object.into_inner::<B::Object>(DataBackend::name(self))?;
        DataBackend::delete(self, object)
    }

    fn close(&self, object: ObjectHandle) -> BackendResult<()> {
        let _span = trace_span!(
            "close",
            backend = DataBackend::name(self),
            namespace = object.namespace(),
            path = object.path()
        )
        .entered();
        let object = object.into_inner::<B::Object>(DataBackend::name(self))?;
        DataBackend::close(self, object)
    }

    fn status(&self, object: &ObjectHandle) -> BackendResult<ObjectStatus> {
        let _span = trace_span!("status", backend = DataBackend::name(self), path = object.path())
            .entered();
        let object = object.downcast_ref::<B::Object>(DataBackend::name(self))?;
        DataBackend::status(self, object)
    }

    fn sync(&self, object: &ObjectHandle) -> BackendResult<()> {
        let _span =
            trace_span!("sync", backend = DataBackend::name(self), path = object.path()).entered();
        let object = object.downcast_ref::<B::Object>(DataBackend::name(self))?;
        DataBackend::sync(self, object)
    }

    fn read(&self, object: &ObjectHandle, buf: &mut [u8], offset: u64) -> BackendResult<usize> {
        let _span = trace_span!(
            "read",
            backend = DataBackend::name(self),
            path = object.path(),
            offset,
            len = buf.len()
        )
        .entered();
        let object = object.downcast_ref::<B::Object>(DataBackend::name(self))?;
        DataBackend::read(self, object, buf, offset)
    }

    fn write(&self, object: &ObjectHandle, data: &[u8], offset: u64) -> BackendResult<usize> {
        let _span = trace_span!(
            "write",
            backend = DataBackend::name(self),
            path = object.path(),
            offset,
            len = data.len()
        )
        .entered();
        let object = object.downcast_ref::<B::Object>(DataBackend::name(self))?;
        DataBackend::write(self, object, data, offset)
    }
}
