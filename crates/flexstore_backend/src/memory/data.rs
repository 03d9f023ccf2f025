//! In-memory data backend.

use crate::data::DataBackend;
use crate::error::{BackendError, BackendResult};
use crate::types::{validate_key, validate_namespace, ObjectStatus};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::debug;

#[derive(Debug)]
struct ObjectData {
    bytes: Vec<u8>,
    modified: SystemTime,
}

type ObjectKey = (String, String);

/// An open object of a [`MemoryDataBackend`].
#[derive(Debug)]
pub struct MemoryObject {
    key: ObjectKey,
    data: Arc<RwLock<ObjectData>>,
}

impl MemoryObject {
    /// Returns the object namespace.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.key.0
    }

    /// Returns the object path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.key.1
    }
}

/// A data backend that keeps object contents in memory.
///
/// Several handles to the same object share its contents.
#[derive(Debug, Default)]
pub struct MemoryDataBackend {
    objects: Option<RwLock<HashMap<ObjectKey, Arc<RwLock<ObjectData>>>>>,
}

impl MemoryDataBackend {
    /// Creates an uninitialized backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn objects(&self) -> BackendResult<&RwLock<HashMap<ObjectKey, Arc<RwLock<ObjectData>>>>> {
        self.objects.as_ref().ok_or(BackendError::NotInitialized)
    }

    fn key(namespace: &str, path: &str) -> BackendResult<ObjectKey> {
        validate_namespace(namespace)?;
        validate_key(path)?;
        Ok((namespace.to_string(), path.to_string()))
    }
}

impl DataBackend for MemoryDataBackend {
    type Object = MemoryObject;

    fn name(&self) -> &'static str {
        "memory"
    }

    fn init(&mut self, path: &Path) -> BackendResult<()> {
        if self.objects.is_some() {
            return Err(BackendError::AlreadyInitialized);
        }
        if path.as_os_str().is_empty() {
            return Err(BackendError::init(path, "empty locator"));
        }
        self.objects = Some(RwLock::new(HashMap::new()));
        debug!(locator = %path.display(), "memory data backend initialized");
        Ok(())
    }

    fn fini(&mut self) {
        self.objects = None;
    }

    fn create(&self, namespace: &str, path: &str) -> BackendResult<MemoryObject> {
        let key = Self::key(namespace, path)?;
        let mut objects = self.objects()?.write();
        if objects.contains_key(&key) {
            return Err(BackendError::ObjectExists {
                namespace: key.0,
                path: key.1,
            });
        }

        let data = Arc::new(RwLock::new(ObjectData {
            bytes: Vec::new(),
            modified: SystemTime::now(),
        }));
        objects.insert(key.clone(), Arc::clone(&data));
        Ok(MemoryObject { key, data })
    }

    fn open(&self, namespace: &str, path: &str) -> BackendResult<MemoryObject> {
        let key = Self::key(namespace, path)?;
        let objects = self.objects()?.read();
        match objects.get(&key) {
            Some(data) => Ok(MemoryObject {
                data: Arc::clone(data),
                key,
            }),
            None => Err(BackendError::ObjectNotFound {
                namespace: key.0,
                path: key.1,
            }),
        }
    }

    fn delete(&self, object: MemoryObject) -> BackendResult<()> {
        self.objects()?.write().remove(&object.key);
        Ok(())
    }

    fn close(&self, object: MemoryObject) -> BackendResult<()> {
        drop(object);
        Ok(())
    }

    fn status(&self, object: &MemoryObject) -> BackendResult<ObjectStatus> {
        let data = object.data.read();
        Ok(ObjectStatus {
            size: data.bytes.len() as u64,
            modified: data.modified,
        })
    }

    fn sync(&self, _object: &MemoryObject) -> BackendResult<()> {
        // Nothing to make durable
        Ok(())
    }

    fn read(&self, object: &MemoryObject, buf: &mut [u8], offset: u64) -> BackendResult<usize> {
        let data = object.data.read();
        let Ok(start) = usize::try_from(offset) else {
            return Ok(0);
        };
        if start >= data.bytes.len() {
            return Ok(0);
        }
        let len = buf.len().min(data.bytes.len() - start);
        buf[..len].copy_from_slice(&data.bytes[start..start + len]);
        Ok(len)
    }

    fn write(&self, object: &MemoryObject, bytes: &[u8], offset: u64) -> BackendResult<usize> {
        let start = usize::try_from(offset)
            .map_err(|_| BackendError::invalid_argument("write offset exceeds address space"))?;
        let end = start
            .checked_add(bytes.len())
            .ok_or_else(|| BackendError::invalid_argument("write extends past address space"))?;

        let mut data = object.data.write();
        if data.bytes.len() < end {
            data.bytes.resize(end, 0);
        }
        data.bytes[start..end].copy_from_slice(bytes);
        data.modified = SystemTime::now();
        Ok(bytes.len())
    }
}
