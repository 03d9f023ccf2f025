//! Property-based test generators using proptest.
//!
//! Provides strategies for namespaces, keys, documents and batch
//! operation sequences accepted by every backend.

use flexstore_backend::Document;
use proptest::prelude::*;
use std::collections::BTreeMap;

/// Strategy for generating valid namespaces.
pub fn namespace_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,15}").expect("Invalid regex")
}

/// Strategy for generating valid keys.
pub fn key_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9_./-]{1,24}").expect("Invalid regex")
}

/// Strategy for generating documents of arbitrary bytes, including empty.
pub fn document_strategy() -> impl Strategy<Value = Document> {
    prop::collection::vec(any::<u8>(), 0..512).prop_map(Document::from)
}

/// Strategy for generating CBOR map documents with small integer fields.
pub fn record_strategy() -> impl Strategy<Value = BTreeMap<String, i64>> {
    prop::collection::btree_map(
        prop::string::string_regex("[a-z]{1,6}").expect("Invalid regex"),
        -8i64..8,
        0..5,
    )
}

/// A generated batch operation.
#[derive(Debug, Clone)]
pub enum GeneratedOp {
    /// Put a document.
    Put(String, Document),
    /// Delete a key.
    Delete(String),
}

/// Strategy for generating an operation over a small key space, so that
/// sequences revisit keys.
pub fn op_strategy() -> impl Strategy<Value = GeneratedOp> {
    let key = prop::sample::select(vec!["a", "b", "c", "d", "e"]).prop_map(str::to_string);
    prop_oneof![
        3 => (key.clone(), document_strategy()).prop_map(|(k, d)| GeneratedOp::Put(k, d)),
        1 => key.prop_map(GeneratedOp::Delete),
    ]
}

/// Strategy for generating a sequence of batches.
pub fn batches_strategy(max_batches: usize) -> impl Strategy<Value = Vec<Vec<GeneratedOp>>> {
    prop::collection::vec(prop::collection::vec(op_strategy(), 0..8), 1..=max_batches)
}

/// Applies batches to a plain map, giving the expected backend contents.
pub fn model_apply(batches: &[Vec<GeneratedOp>]) -> BTreeMap<String, Document> {
    let mut model = BTreeMap::new();
    for batch in batches {
        for op in batch {
            match op {
                GeneratedOp::Put(key, document) => {
                    model.insert(key.clone(), document.clone());
                }
                GeneratedOp::Delete(key) => {
                    model.remove(key);
                }
            }
        }
    }
    model
}
