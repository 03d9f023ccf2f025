//! In-memory meta backend.

use crate::batch::WriteBatch;
use crate::cursor::SnapshotCursor;
use crate::document::Document;
use crate::error::{BackendError, BackendResult};
use crate::index::NamespaceIndex;
use crate::meta::MetaBackend;
use crate::query::ValueQuery;
use crate::types::{validate_key, validate_namespace};
use flexstore_semantics::Semantics;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug)]
struct MemoryState {
    locator: PathBuf,
    index: NamespaceIndex,
}

/// A meta backend that keeps every namespace in memory.
///
/// Suitable for tests and for ephemeral metadata. The `init` path is only a
/// label and must not be empty. Documents within a namespace iterate in key
/// order.
///
/// A batch is applied under a single write lock, so readers see either none
/// or all of it.
///
/// # Example
///
/// ```rust
/// use flexstore_backend::{Document, MemoryMetaBackend, MetaBackend};
/// use flexstore_semantics::Semantics;
/// use std::path::Path;
///
/// let mut backend = MemoryMetaBackend::new();
/// backend.init(Path::new("scratch")).unwrap();
///
/// let mut batch = backend.batch_start("items", &Semantics::new()).unwrap();
/// backend.put(&mut batch, "a", &Document::from(&b"doc"[..])).unwrap();
/// backend.batch_execute(batch).unwrap();
///
/// let doc = backend.get("items", "a").unwrap().unwrap();
/// assert_eq!(doc.as_bytes(), b"doc");
/// ```
#[derive(Debug, Default)]
pub struct MemoryMetaBackend {
    state: Option<MemoryState>,
}

impl MemoryMetaBackend {
    /// Creates an uninitialized backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the locator passed to `init`, if initialized.
    #[must_use]
    pub fn locator(&self) -> Option<&Path> {
        self.state.as_ref().map(|state| state.locator.as_path())
    }

    /// Returns the number of documents stored in `namespace`.
    #[must_use]
    pub fn len(&self, namespace: &str) -> usize {
        self.state
            .as_ref()
            .map_or(0, |state| state.index.len(namespace))
    }

    fn state(&self) -> BackendResult<&MemoryState> {
        self.state.as_ref().ok_or(BackendError::NotInitialized)
    }

    fn snapshot(&self, namespace: &str) -> BackendResult<Vec<Document>> {
        validate_namespace(namespace)?;
        Ok(self.state()?.index.snapshot(namespace))
    }
}

impl MetaBackend for MemoryMetaBackend {
    type Batch = WriteBatch;
    type Cursor = SnapshotCursor;

    fn name(&self) -> &'static str {
        "memory"
    }

    fn init(&mut self, path: &Path) -> BackendResult<()> {
        if self.state.is_some() {
            return Err(BackendError::AlreadyInitialized);
        }
        if path.as_os_str().is_empty() {
            return Err(BackendError::init(path, "empty locator"));
        }

        self.state = Some(MemoryState {
            locator: path.to_path_buf(),
            index: NamespaceIndex::new(),
        });
        debug!(locator = %path.display(), "memory meta backend initialized");
        Ok(())
    }

    fn fini(&mut self) {
        if let Some(state) = self.state.take() {
            debug!(locator = %state.locator.display(), "memory meta backend closed");
        }
    }

    fn batch_start(&self, namespace: &str, semantics: &Semantics) -> BackendResult<WriteBatch> {
        self.state()?;
        WriteBatch::new(namespace, semantics)
    }

    fn put(&self, batch: &mut WriteBatch, key: &str, document: &Document) -> BackendResult<()> {
        batch.put(key, document)
    }

    fn delete(&self, batch: &mut WriteBatch, key: &str) -> BackendResult<()> {
        batch.delete(key)
    }

    fn batch_execute(&self, batch: WriteBatch) -> BackendResult<()> {
        let state = self.state()?;
        if batch.is_empty() {
            return Ok(());
        }

        state.index.apply(batch.namespace(), batch.ops());
        Ok(())
    }

    fn get(&self, namespace: &str, key: &str) -> BackendResult<Option<Document>> {
        validate_namespace(namespace)?;
        validate_key(key)?;
        Ok(self.state()?.index.get(namespace, key))
    }

    fn get_all(&self, namespace: &str) -> BackendResult<Option<SnapshotCursor>> {
        let documents = self.snapshot(namespace)?;
        if documents.is_empty() {
            return Ok(None);
        }
        Ok(Some(SnapshotCursor::new(documents)))
    }

    fn get_by_value(
        &self,
        namespace: &str,
        query: &Document,
    ) -> BackendResult<Option<SnapshotCursor>> {
        let query = ValueQuery::parse(query)?;
        let matching = query.select(&self.snapshot(namespace)?);
        if matching.is_empty() {
            return Ok(None);
        }
        Ok(Some(SnapshotCursor::new(matching)))
    }

    fn iterate(&self, cursor: &mut SnapshotCursor) -> BackendResult<Option<Document>> {
        cursor.advance()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn open() -> MemoryMetaBackend {
        let mut backend = MemoryMetaBackend::new();
        backend.init(Path::new("test")).unwrap();
        backend
    }

    fn doc(bytes: &[u8]) -> Document {
        Document::from(bytes)
    }

    fn write(backend: &MemoryMetaBackend, namespace: &str, pairs: &[(&str, &[u8])]) {
        let mut batch = backend.batch_start(namespace, &Semantics::new()).unwrap();
        for (key, value) in pairs {
            backend.put(&mut batch, key, &doc(value)).unwrap();
        }
        backend.batch_execute(batch).unwrap();
    }

    #[test]
    fn memory_operations_require_init() {
        let backend = MemoryMetaBackend::new();
        assert!(matches!(
            backend.get("ns", "a"),
            Err(BackendError::NotInitialized)
        ));
        assert!(matches!(
            backend.batch_start("ns", &Semantics::new()),
            Err(BackendError::NotInitialized)
        ));
    }

    #[test]
    fn memory_init_rejects_empty_locator() {
        let mut backend = MemoryMetaBackend::new();
        assert!(matches!(
            backend.init(Path::new("")),
            Err(BackendError::Init { .. })
        ));
        backend.fini();
        backend.fini();
    }

    #[test]
    fn memory_double_init_fails() {
        let mut backend = open();
        assert!(matches!(
            backend.init(Path::new("again")),
            Err(BackendError::AlreadyInitialized)
        ));
        assert_eq!(backend.locator(), Some(Path::new("test")));
    }

    #[test]
    fn memory_put_not_visible_before_execute() {
        let backend = open();
        let mut batch = backend.batch_start("ns", &Semantics::new()).unwrap();
        backend.put(&mut batch, "a", &doc(b"1")).unwrap();
        assert!(backend.get("ns", "a").unwrap().is_none());

        backend.batch_execute(batch).unwrap();
        assert_eq!(backend.get("ns", "a").unwrap(), Some(doc(b"1")));
    }

    #[test]
    fn memory_namespaces_are_separate() {
        let backend = open();
        write(&backend, "one", &[("k", b"1")]);
        write(&backend, "two", &[("k", b"2")]);
        assert_eq!(backend.get("one", "k").unwrap(), Some(doc(b"1")));
        assert_eq!(backend.get("two", "k").unwrap(), Some(doc(b"2")));
        assert_eq!(backend.len("one"), 1);
    }

    #[test]
    fn memory_get_all_in_key_order() {
        let backend = open();
        write(&backend, "ns", &[("c", b"3"), ("a", b"1"), ("b", b"2")]);

        let mut cursor = backend.get_all("ns").unwrap().unwrap();
        let mut seen = Vec::new();
        while let Some(document) = backend.iterate(&mut cursor).unwrap() {
            seen.push(document.as_bytes().to_vec());
        }
        assert_eq!(seen, vec![b"1".to_vec(), b"2".to_vec(), b"3".to_vec()]);
        assert!(matches!(
            backend.iterate(&mut cursor),
            Err(BackendError::CursorExhausted)
        ));
    }

    #[test]
    fn memory_get_all_empty_namespace() {
        let backend = open();
        assert!(backend.get_all("nothing").unwrap().is_none());
        assert!(backend.get_all("").is_err());
    }

    #[test]
    fn memory_delete_removes_namespace_when_empty() {
        let backend = open();
        write(&backend, "ns", &[("a", b"1")]);

        let mut batch = backend.batch_start("ns", &Semantics::new()).unwrap();
        backend.delete(&mut batch, "a").unwrap();
        backend.batch_execute(batch).unwrap();

        assert!(backend.get("ns", "a").unwrap().is_none());
        assert_eq!(backend.len("ns"), 0);
        assert!(backend.get_all("ns").unwrap().is_none());
    }

    #[test]
    fn memory_fini_drops_contents() {
        let mut backend = open();
        write(&backend, "ns", &[("a", b"1")]);
        backend.fini();
        assert!(backend.get("ns", "a").is_err());

        backend.init(Path::new("test")).unwrap();
        assert!(backend.get("ns", "a").unwrap().is_none());
    }

    #[test]
    fn memory_get_by_value_filters() {
        let backend = open();
        let mut batch = backend.batch_start("ns", &Semantics::new()).unwrap();
        for (key, kind) in [("a", "file"), ("b", "dir"), ("c", "file")] {
            let document =
                Document::encode(&BTreeMap::from([("kind", kind), ("key", key)])).unwrap();
            backend.put(&mut batch, key, &document).unwrap();
        }
        backend.batch_execute(batch).unwrap();

        let query = Document::encode(&BTreeMap::from([("kind", "file")])).unwrap();
        let mut cursor = backend.get_by_value("ns", &query).unwrap().unwrap();
        let mut keys = Vec::new();
        while let Some(document) = backend.iterate(&mut cursor).unwrap() {
            let fields: BTreeMap<String, String> = document.decode().unwrap();
            keys.push(fields["key"].clone());
        }
        assert_eq!(keys, vec!["a", "c"]);

        let none = Document::encode(&BTreeMap::from([("kind", "link")])).unwrap();
        assert!(backend.get_by_value("ns", &none).unwrap().is_none());
    }
}
