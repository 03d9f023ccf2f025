//! Backend-agnostic contract checks.
//!
//! Each check takes an initialized backend and panics with a descriptive
//! message when the backend breaks the contract. Checks use namespaces
//! prefixed with `conformance_` and leave them populated.

use crate::generators::{model_apply, GeneratedOp};
use flexstore_backend::{BackendError, Document, DynDataBackend, DynMetaBackend};
use flexstore_semantics::Semantics;
use std::collections::BTreeMap;

fn doc(bytes: &[u8]) -> Document {
    Document::from(bytes)
}

fn put_one(backend: &dyn DynMetaBackend, namespace: &str, key: &str, document: &Document) {
    let mut batch = backend
        .batch_start(namespace, &Semantics::new())
        .expect("batch_start failed");
    backend
        .put(&mut batch, key, document)
        .expect("put failed");
    backend.batch_execute(batch).expect("batch_execute failed");
}

fn collect_all(backend: &dyn DynMetaBackend, namespace: &str) -> Vec<Document> {
    let cursor = backend.get_all(namespace).expect("get_all failed");
    backend
        .documents(cursor)
        .collect::<Result<_, _>>()
        .expect("iterate failed")
}

/// A put document reads back with identical bytes.
pub fn check_put_get(backend: &dyn DynMetaBackend) {
    let ns = "conformance_put_get";
    let document = doc(b"\x00binary\xffdocument");
    put_one(backend, ns, "k", &document);

    let read = backend
        .get(ns, "k")
        .expect("get failed")
        .expect("document not found after put");
    assert_eq!(read.as_bytes(), document.as_bytes(), "get returned different bytes");
}

/// After a delete, get reports not-found rather than an error.
pub fn check_delete(backend: &dyn DynMetaBackend) {
    let ns = "conformance_delete";
    put_one(backend, ns, "k", &doc(b"v"));

    let mut batch = backend.batch_start(ns, &Semantics::new()).expect("batch_start failed");
    backend.delete(&mut batch, "k").expect("delete failed");
    backend.batch_execute(batch).expect("batch_execute failed");

    assert!(
        backend.get(ns, "k").expect("get failed").is_none(),
        "deleted key still present"
    );
    assert!(
        backend.get(ns, "never").expect("get of missing key failed").is_none(),
        "missing key reported as present"
    );
}

/// Staged writes are invisible until the batch executes.
pub fn check_batch_isolation(backend: &dyn DynMetaBackend) {
    let ns = "conformance_isolation";
    let mut batch = backend.batch_start(ns, &Semantics::new()).expect("batch_start failed");
    backend.put(&mut batch, "k", &doc(b"v")).expect("put failed");
    assert!(
        backend.get(ns, "k").expect("get failed").is_none(),
        "put visible before batch_execute"
    );
    backend.batch_execute(batch).expect("batch_execute failed");
    assert!(backend.get(ns, "k").expect("get failed").is_some());
}

/// put(k, doc1), delete(k), put(k, doc2) in one batch leaves doc2.
pub fn check_last_writer_wins(backend: &dyn DynMetaBackend) {
    let ns = "conformance_lww";
    let mut batch = backend.batch_start(ns, &Semantics::new()).expect("batch_start failed");
    backend.put(&mut batch, "k", &doc(b"doc1")).expect("put failed");
    backend.delete(&mut batch, "k").expect("delete failed");
    backend.put(&mut batch, "k", &doc(b"doc2")).expect("put failed");
    backend.batch_execute(batch).expect("batch_execute failed");

    let read = backend.get(ns, "k").expect("get failed").expect("key missing");
    assert_eq!(read.as_bytes(), b"doc2", "last operation in the batch did not win");
}

/// `get_all` returns every document exactly once, then reports exhaustion
/// once, then rejects further iteration.
pub fn check_get_all_exhaustion(backend: &dyn DynMetaBackend) {
    let ns = "conformance_get_all";
    let mut expected: Vec<Vec<u8>> = Vec::new();
    let mut batch = backend.batch_start(ns, &Semantics::new()).expect("batch_start failed");
    for i in 0..5u8 {
        let bytes = vec![b'd', i];
        backend
            .put(&mut batch, &format!("key{i}"), &doc(&bytes))
            .expect("put failed");
        expected.push(bytes);
    }
    backend.batch_execute(batch).expect("batch_execute failed");

    let mut cursor = backend
        .get_all(ns)
        .expect("get_all failed")
        .expect("get_all found nothing");
    let mut seen = Vec::new();
    while let Some(document) = backend.iterate(&mut cursor).expect("iterate failed") {
        seen.push(document.as_bytes().to_vec());
    }
    seen.sort();
    expected.sort();
    assert_eq!(seen, expected, "get_all did not yield every document exactly once");

    assert!(
        matches!(backend.iterate(&mut cursor), Err(BackendError::CursorExhausted)),
        "iterate after exhaustion must fail"
    );
}

/// `get_all` on a namespace that never held a document finds nothing.
pub fn check_get_all_empty(backend: &dyn DynMetaBackend) {
    assert!(
        backend
            .get_all("conformance_empty")
            .expect("get_all failed")
            .is_none(),
        "empty namespace produced a cursor"
    );
}

/// The same key in two namespaces holds two documents.
pub fn check_namespace_isolation(backend: &dyn DynMetaBackend) {
    put_one(backend, "conformance_ns_one", "k", &doc(b"one"));
    put_one(backend, "conformance_ns_two", "k", &doc(b"two"));
    assert_eq!(
        backend.get("conformance_ns_one", "k").expect("get failed"),
        Some(doc(b"one"))
    );
    assert_eq!(
        backend.get("conformance_ns_two", "k").expect("get failed"),
        Some(doc(b"two"))
    );
}

/// Empty namespaces and keys are rejected as contract violations.
pub fn check_rejects_empty_names(backend: &dyn DynMetaBackend) {
    assert!(backend.batch_start("", &Semantics::new()).is_err());
    assert!(backend.get("", "k").is_err());
    assert!(backend.get("conformance_names", "").is_err());

    let mut batch = backend
        .batch_start("conformance_names", &Semantics::new())
        .expect("batch_start failed");
    let err = backend
        .put(&mut batch, "", &doc(b"v"))
        .expect_err("empty key accepted");
    assert!(err.is_contract_violation());
}

/// `get_by_value` selects CBOR map documents by field equality.
pub fn check_get_by_value(backend: &dyn DynMetaBackend) {
    let ns = "conformance_by_value";
    let mut batch = backend.batch_start(ns, &Semantics::new()).expect("batch_start failed");
    for (key, kind) in [("a", "file"), ("b", "dir"), ("c", "file")] {
        let record = BTreeMap::from([("kind", kind), ("name", key)]);
        let document = Document::encode(&record).expect("encode failed");
        backend.put(&mut batch, key, &document).expect("put failed");
    }
    backend
        .put(&mut batch, "raw", &doc(b"not cbor"))
        .expect("put failed");
    backend.batch_execute(batch).expect("batch_execute failed");

    let query = Document::encode(&BTreeMap::from([("kind", "file")])).expect("encode failed");
    let cursor = backend.get_by_value(ns, &query).expect("get_by_value failed");
    let mut names: Vec<String> = backend
        .documents(cursor)
        .map(|document| {
            let record: BTreeMap<String, String> = document
                .expect("iterate failed")
                .decode()
                .expect("decode failed");
            record["name"].clone()
        })
        .collect();
    names.sort();
    assert_eq!(names, vec!["a", "c"]);

    let nothing = Document::encode(&BTreeMap::from([("kind", "socket")])).expect("encode failed");
    assert!(backend
        .get_by_value(ns, &nothing)
        .expect("get_by_value failed")
        .is_none());
}

/// Executes `batches` against `namespace` and compares the result with a
/// plain map model.
pub fn check_against_model(
    backend: &dyn DynMetaBackend,
    namespace: &str,
    batches: &[Vec<GeneratedOp>],
) {
    for ops in batches {
        let mut batch = backend
            .batch_start(namespace, &Semantics::new())
            .expect("batch_start failed");
        for op in ops {
            let staged = match op {
                GeneratedOp::Put(key, document) => backend.put(&mut batch, key, document),
                GeneratedOp::Delete(key) => backend.delete(&mut batch, key),
            };
            staged.expect("staging failed");
        }
        backend.batch_execute(batch).expect("batch_execute failed");
    }
    verify_model(backend, namespace, batches);
}

/// Compares the contents of `namespace` with the model of `batches`
/// without writing anything.
pub fn verify_model(backend: &dyn DynMetaBackend, namespace: &str, batches: &[Vec<GeneratedOp>]) {
    let model = model_apply(batches);
    for key in ["a", "b", "c", "d", "e"] {
        let stored = backend.get(namespace, key).expect("get failed");
        assert_eq!(stored.as_ref(), model.get(key), "mismatch at key {key}");
    }
    assert_eq!(collect_all(backend, namespace).len(), model.len());
}

/// Runs every meta backend check.
pub fn run_meta_suite(backend: &dyn DynMetaBackend) {
    check_put_get(backend);
    check_delete(backend);
    check_batch_isolation(backend);
    check_last_writer_wins(backend);
    check_get_all_exhaustion(backend);
    check_get_all_empty(backend);
    check_namespace_isolation(backend);
    check_rejects_empty_names(backend);
    check_get_by_value(backend);
}

/// Writes and reads back, including a read past the end.
pub fn check_data_read_write(backend: &dyn DynDataBackend) {
    let object = backend
        .create("conformance", "read_write")
        .expect("create failed");
    assert_eq!(backend.write(&object, b"hello world", 0).expect("write failed"), 11);

    let mut buf = [0u8; 5];
    assert_eq!(backend.read(&object, &mut buf, 6).expect("read failed"), 5);
    assert_eq!(&buf, b"world");

    let mut tail = [0u8; 8];
    assert_eq!(
        backend.read(&object, &mut tail, 8).expect("read failed"),
        3,
        "read at the end must be short"
    );
    assert_eq!(backend.status(&object).expect("status failed").size, 11);
    backend.sync(&object).expect("sync failed");
    backend.close(object).expect("close failed");
}

/// Create, open and delete report existence errors.
pub fn check_data_lifecycle(backend: &dyn DynDataBackend) {
    assert!(matches!(
        backend.open("conformance", "lifecycle"),
        Err(BackendError::ObjectNotFound { .. })
    ));
    let object = backend
        .create("conformance", "lifecycle")
        .expect("create failed");
    assert!(matches!(
        backend.create("conformance", "lifecycle"),
        Err(BackendError::ObjectExists { .. })
    ));
    backend.write(&object, b"x", 0).expect("write failed");
    backend.close(object).expect("close failed");

    let reopened = backend
        .open("conformance", "lifecycle")
        .expect("open failed");
    assert_eq!(backend.status(&reopened).expect("status failed").size, 1);
    backend.delete(reopened).expect("delete failed");
    assert!(backend.open("conformance", "lifecycle").is_err());
}

/// Runs every data backend check.
pub fn run_data_suite(backend: &dyn DynDataBackend) {
    check_data_read_write(backend);
    check_data_lifecycle(backend);
}
