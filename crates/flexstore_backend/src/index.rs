//! In-memory namespace index shared by the reference meta backends.

use crate::batch::{apply_ops, BatchOp};
use crate::document::Document;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

type Entries = BTreeMap<String, Document>;

/// Documents by namespace, then by key in key order.
///
/// Empty namespaces are removed, so a namespace exists exactly while it
/// holds at least one document.
#[derive(Debug, Default)]
pub(crate) struct NamespaceIndex {
    namespaces: RwLock<HashMap<String, Entries>>,
}

impl NamespaceIndex {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn get(&self, namespace: &str, key: &str) -> Option<Document> {
        self.namespaces
            .read()
            .get(namespace)
            .and_then(|entries| entries.get(key))
            .cloned()
    }

    /// Copies out the documents of `namespace` in key order.
    pub(crate) fn snapshot(&self, namespace: &str) -> Vec<Document> {
        self.namespaces
            .read()
            .get(namespace)
            .map(|entries| entries.values().cloned().collect())
            .unwrap_or_default()
    }

    pub(crate) fn len(&self, namespace: &str) -> usize {
        self.namespaces.read().get(namespace).map_or(0, Entries::len)
    }

    pub(crate) fn namespace_count(&self) -> usize {
        self.namespaces.read().len()
    }

    /// Applies `ops` to `namespace` under a single write lock.
    pub(crate) fn apply(&self, namespace: &str, ops: &[BatchOp]) {
        let mut namespaces = self.namespaces.write();
        let entries = namespaces.entry(namespace.to_string()).or_default();
        apply_ops(entries, ops);
        if entries.is_empty() {
            namespaces.remove(namespace);
        }
    }

    /// Returns every namespace as a list of puts, sorted by namespace.
    pub(crate) fn export(&self) -> Vec<(String, Vec<BatchOp>)> {
        let namespaces = self.namespaces.read();
        let mut exported: Vec<_> = namespaces
            .iter()
            .map(|(namespace, entries)| {
                let ops = entries
                    .iter()
                    .map(|(key, document)| BatchOp::Put {
                        key: key.clone(),
                        document: document.clone(),
                    })
                    .collect();
                (namespace.clone(), ops)
            })
            .collect();
        exported.sort_by(|a, b| a.0.cmp(&b.0));
        exported
    }
}
