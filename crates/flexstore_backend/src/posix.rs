//! File-based data backend.
//!
//! Objects are regular files at `<root>/<namespace>/<path>`. Paths may
//! contain `/`-separated subdirectories, which are created on demand.

use crate::data::DataBackend;
use crate::error::{BackendError, BackendResult};
use crate::registry::LoadedBackend;
use crate::types::{validate_key, validate_namespace, BackendType, ObjectStatus};
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Module entry point for the `posix` backend.
pub fn backend_info(kind: BackendType) -> Option<LoadedBackend> {
    match kind {
        BackendType::Meta => None,
        BackendType::Data => Some(LoadedBackend::Data(Box::new(PosixDataBackend::new()))),
    }
}

/// An open object of a [`PosixDataBackend`].
#[derive(Debug)]
pub struct PosixObject {
    namespace: String,
    path: String,
    location: PathBuf,
    file: Mutex<File>,
}

impl PosixObject {
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

    /// Returns the file backing the object.
    #[must_use]
    pub fn location(&self) -> &Path {
        &self.location
    }
}

/// A data backend storing each object in its own file.
///
/// # Durability
///
/// - `write` hands data to the OS
/// - `sync` calls `File::sync_all()` so the data is on disk
///
/// # Example
///
/// ```no_run
/// use flexstore_backend::{DataBackend, PosixDataBackend};
/// use std::path::Path;
///
/// let mut backend = PosixDataBackend::new();
/// backend.init(Path::new("store/data")).unwrap();
/// let object = backend.create("chunks", "0001").unwrap();
/// backend.write(&object, b"payload", 0).unwrap();
/// backend.sync(&object).unwrap();
/// backend.close(object).unwrap();
/// ```
#[derive(Debug, Default)]
pub struct PosixDataBackend {
    root: Option<PathBuf>,
}

impl PosixDataBackend {
    /// Creates an uninitialized backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the store root, if initialized.
    #[must_use]
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    fn location(&self, namespace: &str, path: &str) -> BackendResult<PathBuf> {
        let root = self.root.as_ref().ok_or(BackendError::NotInitialized)?;
        validate_namespace(namespace)?;
        validate_key(path)?;
        if !is_relative_normal(namespace) || namespace.contains('/') {
            return Err(BackendError::invalid_argument(format!(
                "namespace is not a plain name: {namespace}"
            )));
        }
        if !is_relative_normal(path) {
            return Err(BackendError::invalid_argument(format!(
                "object path must be relative without '..': {path}"
            )));
        }
        Ok(root.join(namespace).join(path))
    }

    fn object(namespace: &str, path: &str, location: PathBuf, file: File) -> PosixObject {
        PosixObject {
            namespace: namespace.to_string(),
            path: path.to_string(),
            location,
            file: Mutex::new(file),
        }
    }
}

fn is_relative_normal(path: &str) -> bool {
    Path::new(path)
        .components()
        .all(|component| matches!(component, Component::Normal(_)))
}

impl DataBackend for PosixDataBackend {
    type Object = PosixObject;

    fn name(&self) -> &'static str {
        "posix"
    }

    fn init(&mut self, path: &Path) -> BackendResult<()> {
        if self.root.is_some() {
            return Err(BackendError::AlreadyInitialized);
        }
        if path.as_os_str().is_empty() {
            return Err(BackendError::init(path, "empty path"));
        }
        if path.exists() && !path.is_dir() {
            return Err(BackendError::init(path, "path is not a directory"));
        }
        fs::create_dir_all(path).map_err(|e| BackendError::init(path, e))?;

        self.root = Some(path.to_path_buf());
        debug!(root = %path.display(), "posix data backend initialized");
        Ok(())
    }

    fn fini(&mut self) {
        self.root = None;
    }

    fn create(&self, namespace: &str, path: &str) -> BackendResult<PosixObject> {
        let location = self.location(namespace, path)?;
        if let Some(parent) = location.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&location)
            .map_err(|e| match e.kind() {
                io::ErrorKind::AlreadyExists => BackendError::ObjectExists {
                    namespace: namespace.to_string(),
                    path: path.to_string(),
                },
                _ => BackendError::Io(e),
            })?;
        Ok(Self::object(namespace, path, location, file))
    }

    fn open(&self, namespace: &str, path: &str) -> BackendResult<PosixObject> {
        let location = self.location(namespace, path)?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&location)
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => BackendError::ObjectNotFound {
                    namespace: namespace.to_string(),
                    path: path.to_string(),
                },
                _ => BackendError::Io(e),
            })?;
        Ok(Self::object(namespace, path, location, file))
    }

    fn delete(&self, object: PosixObject) -> BackendResult<()> {
        let PosixObject { location, file, .. } = object;
        drop(file);
        match fs::remove_file(&location) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn close(&self, object: PosixObject) -> BackendResult<()> {
        object.file.lock().flush()?;
        Ok(())
    }

    fn status(&self, object: &PosixObject) -> BackendResult<ObjectStatus> {
        let metadata = object.file.lock().metadata()?;
        Ok(ObjectStatus {
            size: metadata.len(),
            modified: metadata.modified()?,
        })
    }

    fn sync(&self, object: &PosixObject) -> BackendResult<()> {
        object.file.lock().sync_all()?;
        Ok(())
    }

    fn read(&self, object: &PosixObject, buf: &mut [u8], offset: u64) -> BackendResult<usize> {
        let mut file = object.file.lock();
        file.seek(SeekFrom::Start(offset))?;

        let mut filled = 0;
        while filled < buf.len() {
            match file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(filled)
    }

    fn write(&self, object: &PosixObject, data: &[u8], offset: u64) -> BackendResult<usize> {
        let mut file = object.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;
        Ok(data.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open(path: &Path) -> PosixDataBackend {
        let mut backend = PosixDataBackend::new();
        backend.init(path).unwrap();
        backend
    }

    #[test]
    fn posix_write_and_read() {
        let dir = tempdir().unwrap();
        let backend = open(dir.path());
        let object = backend.create("ns", "obj").unwrap();
        assert_eq!(backend.write(&object, b"hello world", 0).unwrap(), 11);

        let mut buf = [0u8; 5];
        assert_eq!(backend.read(&object, &mut buf, 6).unwrap(), 5);
        assert_eq!(&buf, b"world");
        assert_eq!(backend.status(&object).unwrap().size, 11);
        assert_eq!(object.location(), dir.path().join("ns").join("obj"));
    }

    #[test]
    fn posix_persistence() {
        let dir = tempdir().unwrap();
        {
            let backend = open(dir.path());
            let object = backend.create("ns", "nested/dir/obj").unwrap();
            backend.write(&object, b"persistent data", 0).unwrap();
            backend.sync(&object).unwrap();
            backend.close(object).unwrap();
        }

        let backend = open(dir.path());
        let object = backend.open("ns", "nested/dir/obj").unwrap();
        let mut buf = [0u8; 32];
        assert_eq!(backend.read(&object, &mut buf, 0).unwrap(), 15);
        assert_eq!(&buf[..15], b"persistent data");
    }

    #[test]
    fn posix_sparse_write_reads_zeros() {
        let dir = tempdir().unwrap();
        let backend = open(dir.path());
        let object = backend.create("ns", "obj").unwrap();
        backend.write(&object, b"x", 3).unwrap();

        let mut buf = [9u8; 8];
        assert_eq!(backend.read(&object, &mut buf, 0).unwrap(), 4);
        assert_eq!(&buf[..4], &[0, 0, 0, b'x']);
        assert_eq!(backend.read(&object, &mut buf, 100).unwrap(), 0);
    }

    #[test]
    fn posix_create_open_delete_errors() {
        let dir = tempdir().unwrap();
        let backend = open(dir.path());
        assert!(matches!(
            backend.open("ns", "missing"),
            Err(BackendError::ObjectNotFound { .. })
        ));

        let object = backend.create("ns", "obj").unwrap();
        assert!(matches!(
            backend.create("ns", "obj"),
            Err(BackendError::ObjectExists { .. })
        ));
        backend.delete(object).unwrap();
        assert!(backend.open("ns", "obj").is_err());
    }

    #[test]
    fn posix_rejects_escaping_paths() {
        let dir = tempdir().unwrap();
        let backend = open(dir.path());
        assert!(matches!(
            backend.create("ns", "../outside"),
            Err(BackendError::InvalidArgument { .. })
        ));
        assert!(matches!(
            backend.create("ns", "/abs"),
            Err(BackendError::InvalidArgument { .. })
        ));
        assert!(matches!(
            backend.create("a/b", "obj"),
            Err(BackendError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn posix_init_on_file_fails() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("plain-file");
        fs::write(&file_path, b"x").unwrap();

        let mut backend = PosixDataBackend::new();
        assert!(matches!(
            backend.init(&file_path),
            Err(BackendError::Init { .. })
        ));
        backend.fini();
        assert!(matches!(
            backend.open("ns", "obj"),
            Err(BackendError::NotInitialized)
        ));
    }
}
