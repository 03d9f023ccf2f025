//! Persistent journal-backed meta backend.
//!
//! The store is a directory:
//!
//! ```text
//! <path>/
//! ├─ LOCK          # Advisory lock, one process per store
//! └─ meta.journal  # One framed record per executed batch
//! ```
//!
//! On `init` the journal is replayed into an in-memory index. A torn or
//! corrupted tail, left by a crash during an append, is truncated away.
//! Reads are served from the index; `batch_execute` appends the batch to the
//! journal before applying it, so an executed batch survives a restart.

mod record;

use crate::batch::WriteBatch;
use crate::cursor::SnapshotCursor;
use crate::document::Document;
use crate::error::{BackendError, BackendResult};
use crate::index::NamespaceIndex;
use crate::meta::MetaBackend;
use crate::query::ValueQuery;
use crate::registry::LoadedBackend;
use crate::types::{validate_key, validate_namespace, BackendType};
use flexstore_semantics::{Persistency, Semantics};
use fs2::FileExt;
use parking_lot::Mutex;
use record::Frame;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const LOCK_FILE: &str = "LOCK";
const JOURNAL_FILE: &str = "meta.journal";
const JOURNAL_TEMP: &str = "meta.journal.tmp";

/// Module entry point for the `journal` backend.
pub fn backend_info(kind: BackendType) -> Option<LoadedBackend> {
    match kind {
        BackendType::Meta => Some(LoadedBackend::Meta(Box::new(JournalMetaBackend::new()))),
        BackendType::Data => None,
    }
}

#[derive(Debug)]
struct JournalFile {
    file: File,
    len: u64,
}

impl JournalFile {
    /// Appends one framed record. On failure the file is cut back to its
    /// previous length.
    fn append(&mut self, frame: &[u8], persistency: Persistency) -> BackendResult<()> {
        let start = self.len;
        let result = self
            .file
            .seek(SeekFrom::Start(start))
            .and_then(|_| self.file.write_all(frame))
            .and_then(|()| self.file.flush())
            .and_then(|()| match persistency {
                Persistency::Immediate => self.file.sync_data(),
                Persistency::Eventual | Persistency::None => Ok(()),
            });

        if let Err(err) = result {
            if let Err(truncate_err) = self.file.set_len(start) {
                warn!(error = %truncate_err, "failed to roll back partial journal append");
            }
            return Err(err.into());
        }

        self.len += frame.len() as u64;
        Ok(())
    }
}

#[derive(Debug)]
struct JournalState {
    root: PathBuf,
    _lock_file: File,
    journal: Mutex<JournalFile>,
    index: NamespaceIndex,
}

/// A meta backend that persists batches to an append-only journal.
///
/// A batch is applied all-or-nothing: if the journal append fails the index
/// is left untouched and the journal is rolled back. With `Immediate`
/// persistency each append is synced to disk before `batch_execute`
/// returns; weaker levels leave durability to the OS page cache.
///
/// # Example
///
/// ```no_run
/// use flexstore_backend::{Document, JournalMetaBackend, MetaBackend};
/// use flexstore_semantics::Semantics;
/// use std::path::Path;
///
/// let mut backend = JournalMetaBackend::new();
/// backend.init(Path::new("store/meta")).unwrap();
///
/// let mut batch = backend.batch_start("files", &Semantics::new()).unwrap();
/// backend.put(&mut batch, "a.txt", &Document::from(&b"inode"[..])).unwrap();
/// backend.batch_execute(batch).unwrap();
/// backend.fini();
/// ```
#[derive(Debug, Default)]
pub struct JournalMetaBackend {
    state: Option<JournalState>,
}

impl JournalMetaBackend {
    /// Creates an uninitialized backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the store directory, if initialized.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.state.as_ref().map(|state| state.root.as_path())
    }

    /// Returns the current journal length in bytes.
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` before `init`.
    pub fn journal_len(&self) -> BackendResult<u64> {
        Ok(self.state()?.journal.lock().len)
    }

    /// Rewrites the journal as one record per namespace holding its current
    /// contents.
    ///
    /// The new journal is written to a temporary file, synced and renamed
    /// over the old one, so a crash leaves either journal intact. Appends
    /// switch to the new journal as soon as the rename succeeds.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the new journal cannot be written.
    pub fn compact(&self) -> BackendResult<()> {
        let state = self.state()?;
        let mut journal = state.journal.lock();

        let mut contents = Vec::new();
        for (namespace, ops) in state.index.export() {
            contents.extend_from_slice(&record::encode(&namespace, &ops)?);
        }

        let temp_path = state.root.join(JOURNAL_TEMP);
        let journal_path = state.root.join(JOURNAL_FILE);
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)?;
        file.write_all(&contents)?;
        file.sync_all()?;

        // The handle follows the file through the rename.
        fs::rename(&temp_path, &journal_path)?;
        let before = journal.len;
        *journal = JournalFile {
            file,
            len: contents.len() as u64,
        };
        info!(before, after = journal.len, "journal compacted");
        sync_dir(&state.root)?;
        Ok(())
    }

    fn state(&self) -> BackendResult<&JournalState> {
        self.state.as_ref().ok_or(BackendError::NotInitialized)
    }

    fn snapshot(&self, namespace: &str) -> BackendResult<Vec<Document>> {
        validate_namespace(namespace)?;
        Ok(self.state()?.index.snapshot(namespace))
    }

    fn open_store(path: &Path) -> BackendResult<JournalState> {
        if path.as_os_str().is_empty() {
            return Err(BackendError::init(path, "empty path"));
        }
        if path.exists() && !path.is_dir() {
            return Err(BackendError::init(path, "path is not a directory"));
        }
        fs::create_dir_all(path).map_err(|e| BackendError::init(path, e))?;

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))
            .map_err(|e| BackendError::init(path, e))?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(BackendError::init(path, "store is locked by another process"));
        }

        let mut file =
            open_journal(&path.join(JOURNAL_FILE)).map_err(|e| BackendError::init(path, e))?;
        let mut contents = Vec::new();
        file.read_to_end(&mut contents)
            .map_err(|e| BackendError::init(path, e))?;

        let index = NamespaceIndex::new();
        let (records, valid_len) = replay(&contents, &index);
        if valid_len < contents.len() {
            warn!(
                path = %path.display(),
                discarded = contents.len() - valid_len,
                "truncating damaged journal tail"
            );
            file.set_len(valid_len as u64)
                .and_then(|()| file.sync_all())
                .map_err(|e| BackendError::init(path, e))?;
        }
        debug!(
            path = %path.display(),
            records,
            namespaces = index.namespace_count(),
            "journal replayed"
        );

        Ok(JournalState {
            root: path.to_path_buf(),
            _lock_file: lock_file,
            journal: Mutex::new(JournalFile {
                file,
                len: valid_len as u64,
            }),
            index,
        })
    }
}

fn open_journal(path: &Path) -> std::io::Result<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
}

#[cfg(unix)]
fn sync_dir(path: &Path) -> std::io::Result<()> {
    File::open(path)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Applies every intact record to `index`. Returns the number of records
/// applied and the length of the intact prefix.
fn replay(contents: &[u8], index: &NamespaceIndex) -> (usize, usize) {
    let mut offset = 0;
    let mut records = 0;
    while offset < contents.len() {
        match record::decode(&contents[offset..]) {
            Frame::Complete(record, len) => {
                index.apply(&record.namespace, &record.ops);
                offset += len;
                records += 1;
            }
            Frame::Torn => {
                warn!(offset, "journal ends inside a record");
                break;
            }
            Frame::Corrupt(reason) => {
                warn!(offset, %reason, "corrupted journal record");
                break;
            }
        }
    }
    (records, offset)
}

impl MetaBackend for JournalMetaBackend {
    type Batch = WriteBatch;
    type Cursor = SnapshotCursor;

    fn name(&self) -> &'static str {
        "journal"
    }

    fn init(&mut self, path: &Path) -> BackendResult<()> {
        if self.state.is_some() {
            return Err(BackendError::AlreadyInitialized);
        }
        self.state = Some(Self::open_store(path)?);
        Ok(())
    }

    fn fini(&mut self) {
        if let Some(state) = self.state.take() {
            let journal = state.journal.lock();
            if let Err(err) = journal.file.sync_all() {
                warn!(error = %err, "failed to sync journal on close");
            }
            debug!(path = %state.root.display(), "journal meta backend closed");
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

        let frame = record::encode(batch.namespace(), batch.ops())?;
        // The journal lock is held across the index update so the index
        // applies batches in journal order.
        let mut journal = state.journal.lock();
        journal.append(&frame, batch.persistency())?;
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
    use tempfile::tempdir;

    fn doc(bytes: &[u8]) -> Document {
        Document::from(bytes)
    }

    fn open(path: &Path) -> JournalMetaBackend {
        let mut backend = JournalMetaBackend::new();
        backend.init(path).unwrap();
        backend
    }

    fn write(backend: &JournalMetaBackend, namespace: &str, ops: &[(&str, Option<&[u8]>)]) {
        let mut batch = backend.batch_start(namespace, &Semantics::new()).unwrap();
        for (key, value) in ops {
            match value {
                Some(bytes) => backend.put(&mut batch, key, &doc(bytes)).unwrap(),
                None => backend.delete(&mut batch, key).unwrap(),
            }
        }
        backend.batch_execute(batch).unwrap();
    }

    fn replace_journal_file(backend: &JournalMetaBackend, file: File) {
        backend.state.as_ref().unwrap().journal.lock().file = file;
    }

    #[test]
    fn journal_survives_reopen() {
        let dir = tempdir().unwrap();
        {
            let mut backend = open(dir.path());
            write(&backend, "ns", &[("a", Some(b"1")), ("b", Some(b"2"))]);
            write(&backend, "ns", &[("b", None)]);
            write(&backend, "other", &[("a", Some(b"x"))]);
            backend.fini();
        }

        let backend = open(dir.path());
        assert_eq!(backend.get("ns", "a").unwrap(), Some(doc(b"1")));
        assert!(backend.get("ns", "b").unwrap().is_none());
        assert_eq!(backend.get("other", "a").unwrap(), Some(doc(b"x")));
    }

    #[test]
    fn journal_init_on_file_fails_and_fini_is_safe() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("plain-file");
        fs::write(&file_path, b"not a directory").unwrap();

        let mut backend = JournalMetaBackend::new();
        assert!(matches!(
            backend.init(&file_path),
            Err(BackendError::Init { .. })
        ));
        backend.fini();
        assert!(matches!(
            backend.get("ns", "a"),
            Err(BackendError::NotInitialized)
        ));
    }

    #[test]
    fn journal_second_process_lock_rejected() {
        let dir = tempdir().unwrap();
        let _first = open(dir.path());
        let mut second = JournalMetaBackend::new();
        assert!(matches!(
            second.init(dir.path()),
            Err(BackendError::Init { .. })
        ));
    }

    #[test]
    fn journal_torn_tail_truncated() {
        let dir = tempdir().unwrap();
        let journal_path = dir.path().join(JOURNAL_FILE);
        let intact_len;
        {
            let mut backend = open(dir.path());
            write(&backend, "ns", &[("a", Some(b"1"))]);
            intact_len = backend.journal_len().unwrap();
            backend.fini();
        }

        let mut file = OpenOptions::new().append(true).open(&journal_path).unwrap();
        file.write_all(b"FXJ1\x10\x00").unwrap();
        drop(file);

        let backend = open(dir.path());
        assert_eq!(backend.get("ns", "a").unwrap(), Some(doc(b"1")));
        assert_eq!(backend.journal_len().unwrap(), intact_len);
        assert_eq!(fs::metadata(&journal_path).unwrap().len(), intact_len);

        write(&backend, "ns", &[("b", Some(b"2"))]);
        assert!(backend.journal_len().unwrap() > intact_len);
    }

    #[test]
    fn journal_corrupt_record_drops_suffix() {
        let dir = tempdir().unwrap();
        let journal_path = dir.path().join(JOURNAL_FILE);
        let first_len;
        {
            let mut backend = open(dir.path());
            write(&backend, "ns", &[("a", Some(b"1"))]);
            first_len = backend.journal_len().unwrap() as usize;
            write(&backend, "ns", &[("b", Some(b"2"))]);
            backend.fini();
        }

        let mut contents = fs::read(&journal_path).unwrap();
        let last = contents.len() - 1;
        contents[last] ^= 0xFF;
        fs::write(&journal_path, &contents).unwrap();

        let backend = open(dir.path());
        assert!(backend.get("ns", "a").unwrap().is_some());
        assert!(backend.get("ns", "b").unwrap().is_none());
        assert_eq!(backend.journal_len().unwrap() as usize, first_len);
    }

    #[test]
    fn journal_failed_append_leaves_index_untouched() {
        let dir = tempdir().unwrap();
        let journal_path = dir.path().join(JOURNAL_FILE);
        let mut backend = open(dir.path());
        write(&backend, "ns", &[("a", Some(b"1"))]);
        let len = backend.journal_len().unwrap();

        replace_journal_file(&backend, File::open(&journal_path).unwrap());
        let mut batch = backend.batch_start("ns", &Semantics::new()).unwrap();
        backend.put(&mut batch, "b", &doc(b"2")).unwrap();
        backend.delete(&mut batch, "a").unwrap();
        assert!(matches!(
            backend.batch_execute(batch),
            Err(BackendError::Io(_))
        ));

        assert_eq!(backend.journal_len().unwrap(), len);
        assert_eq!(fs::metadata(&journal_path).unwrap().len(), len);
        assert!(backend.get("ns", "b").unwrap().is_none());
        assert_eq!(backend.get("ns", "a").unwrap(), Some(doc(b"1")));

        replace_journal_file(&backend, open_journal(&journal_path).unwrap());
        write(&backend, "ns", &[("c", Some(b"3"))]);
        backend.fini();

        let backend = open(dir.path());
        assert_eq!(backend.get("ns", "a").unwrap(), Some(doc(b"1")));
        assert!(backend.get("ns", "b").unwrap().is_none());
        assert_eq!(backend.get("ns", "c").unwrap(), Some(doc(b"3")));
    }

    #[test]
    fn journal_empty_batch_appends_nothing() {
        let dir = tempdir().unwrap();
        let backend = open(dir.path());
        let batch = backend.batch_start("ns", &Semantics::new()).unwrap();
        backend.batch_execute(batch).unwrap();
        assert_eq!(backend.journal_len().unwrap(), 0);
    }

    #[test]
    fn journal_relaxed_persistency_still_journals() {
        let dir = tempdir().unwrap();
        {
            let mut backend = open(dir.path());
            let semantics = Semantics::new();
            semantics.set_persistency(Persistency::Eventual);
            let mut batch = backend.batch_start("ns", &semantics).unwrap();
            backend.put(&mut batch, "k", &doc(b"v")).unwrap();
            backend.batch_execute(batch).unwrap();
            backend.fini();
        }
        let backend = open(dir.path());
        assert_eq!(backend.get("ns", "k").unwrap(), Some(doc(b"v")));
    }

    #[test]
    fn journal_compaction_preserves_contents() {
        let dir = tempdir().unwrap();
        {
            let mut backend = open(dir.path());
            for i in 0..20u8 {
                write(&backend, "ns", &[("k", Some(&[i]))]);
            }
            write(&backend, "gone", &[("x", Some(b"1"))]);
            write(&backend, "gone", &[("x", None)]);

            let before = backend.journal_len().unwrap();
            backend.compact().unwrap();
            assert!(backend.journal_len().unwrap() < before);

            write(&backend, "ns", &[("after", Some(b"compact"))]);
            assert_eq!(
                fs::metadata(dir.path().join(JOURNAL_FILE)).unwrap().len(),
                backend.journal_len().unwrap()
            );
            backend.fini();
        }

        let backend = open(dir.path());
        assert_eq!(backend.get("ns", "k").unwrap(), Some(doc(&[19])));
        assert_eq!(backend.get("ns", "after").unwrap(), Some(doc(b"compact")));
        assert!(backend.get_all("gone").unwrap().is_none());
        assert!(!dir.path().join(JOURNAL_TEMP).exists());
    }

    #[test]
    fn journal_get_by_value() {
        let dir = tempdir().unwrap();
        let backend = open(dir.path());
        let mut batch = backend.batch_start("ns", &Semantics::new()).unwrap();
        for (key, size) in [("a", 1), ("b", 2), ("c", 1)] {
            let document =
                Document::encode(&std::collections::BTreeMap::from([("size", size)])).unwrap();
            backend.put(&mut batch, key, &document).unwrap();
        }
        backend.batch_execute(batch).unwrap();

        let query = Document::encode(&std::collections::BTreeMap::from([("size", 1)])).unwrap();
        let mut cursor = backend.get_by_value("ns", &query).unwrap().unwrap();
        assert_eq!(cursor.remaining(), 2);
        while backend.iterate(&mut cursor).unwrap().is_some() {}
        assert!(matches!(
            backend.iterate(&mut cursor),
            Err(BackendError::CursorExhausted)
        ));
    }
}
