//! Runs the conformance suite against every reference backend.

use flexstore_backend::Document;
use flexstore_semantics::Semantics;
use flexstore_testkit::prelude::*;
use proptest::prelude::*;
use std::collections::BTreeMap;

#[test]
fn memory_meta_conformance() {
    init_test_logging();
    with_memory_meta(run_meta_suite);
}

#[test]
fn journal_meta_conformance() {
    init_test_logging();
    with_journal_meta(|backend, _path| run_meta_suite(backend));
}

#[test]
fn journal_meta_conformance_after_reopen() {
    init_test_logging();
    let mut meta = TestMeta::journal();
    check_put_get(&*meta);
    check_last_writer_wins(&*meta);
    meta.reopen();

    let read = meta
        .get("conformance_lww", "k")
        .unwrap()
        .expect("batch lost across reopen");
    assert_eq!(read.as_bytes(), b"doc2");
    assert!(meta.get("conformance_put_get", "k").unwrap().is_some());
    run_meta_suite(&*meta);
}

#[test]
fn memory_meta_reopen_is_empty() {
    let mut meta = TestMeta::memory();
    check_put_get(&*meta);
    meta.reopen();
    assert!(meta.get("conformance_put_get", "k").unwrap().is_none());
}

#[test]
fn memory_data_conformance() {
    init_test_logging();
    let data = TestData::memory();
    run_data_suite(&*data);
}

#[test]
fn posix_data_conformance() {
    init_test_logging();
    let data = TestData::posix();
    run_data_suite(&*data);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn memory_meta_matches_model(batches in batches_strategy(6)) {
        with_memory_meta(|backend| check_against_model(backend, "model", &batches));
    }

    #[test]
    fn journal_meta_matches_model_after_reopen(batches in batches_strategy(6)) {
        let mut meta = TestMeta::journal();
        check_against_model(&*meta, "model", &batches);
        meta.reopen();
        verify_model(&*meta, "model", &batches);
    }

    #[test]
    fn put_get_preserves_bytes(
        namespace in namespace_strategy(),
        key in key_strategy(),
        document in document_strategy(),
    ) {
        with_memory_meta(|backend| {
            let mut batch = backend
                .batch_start(&namespace, &Semantics::new())
                .unwrap();
            backend.put(&mut batch, &key, &document).unwrap();
            backend.batch_execute(batch).unwrap();
            let read = backend.get(&namespace, &key).unwrap().unwrap();
            assert_eq!(read.as_bytes(), document.as_bytes());
        });
    }

    #[test]
    fn get_by_value_selects_records_with_field(
        records in prop::collection::vec(record_strategy(), 1..12),
        value in -8i64..8,
    ) {
        with_memory_meta(|backend| {
            let mut batch = backend.batch_start("records", &Semantics::new()).unwrap();
            for (i, record) in records.iter().enumerate() {
                let document = Document::encode(record).unwrap();
                backend.put(&mut batch, &format!("r{i}"), &document).unwrap();
            }
            backend.batch_execute(batch).unwrap();

            let field = records[0]
                .keys()
                .next()
                .cloned()
                .unwrap_or_else(|| "a".to_string());
            let query = Document::encode(&BTreeMap::from([(field.clone(), value)])).unwrap();
            let expected = records
                .iter()
                .filter(|record| record.get(&field) == Some(&value))
                .count();
            let found = backend
                .documents(backend.get_by_value("records", &query).unwrap())
                .collect::<Result<Vec<_>, _>>()
                .unwrap();
            assert_eq!(found.len(), expected);
        });
    }
}
