//! Ordered write batches.

use crate::document::Document;
use crate::error::BackendResult;
use crate::types::{validate_key, validate_namespace};
use flexstore_semantics::{Persistency, Semantics, SemanticsSnapshot};
use std::collections::BTreeMap;

/// A single staged write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    /// Store `document` under `key`, replacing any previous value.
    Put {
        /// Target key.
        key: String,
        /// Document to store.
        document: Document,
    },
    /// Remove `key`. Removing a missing key is not an error.
    Delete {
        /// Target key.
        key: String,
    },
}

impl BatchOp {
    /// Returns the key this operation targets.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Put { key, .. } | Self::Delete { key } => key,
        }
    }
}

/// An ordered sequence of pending writes for one namespace.
///
/// Backends that have no engine-native batch type can use `WriteBatch` as
/// their [`MetaBackend::Batch`](crate::MetaBackend::Batch). Operations are
/// kept in enqueue order; when several touch the same key the last one wins.
///
/// The batch captures the semantics levels in effect at `batch_start`, so a
/// later change to the shared descriptor does not alter a batch in flight.
#[derive(Debug, Clone)]
pub struct WriteBatch {
    namespace: String,
    semantics: SemanticsSnapshot,
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    /// Creates an empty batch.
    ///
    /// # Errors
    ///
    /// Returns an error if `namespace` is empty.
    pub fn new(namespace: &str, semantics: &Semantics) -> BackendResult<Self> {
        validate_namespace(namespace)?;
        Ok(Self {
            namespace: namespace.to_string(),
            semantics: semantics.snapshot(),
            ops: Vec::new(),
        })
    }

    /// Returns the namespace the batch writes to.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns the semantics captured at batch start.
    #[must_use]
    pub fn semantics(&self) -> SemanticsSnapshot {
        self.semantics
    }

    /// Returns the persistency level captured at batch start.
    #[must_use]
    pub fn persistency(&self) -> Persistency {
        self.semantics.persistency
    }

    /// Returns the number of staged operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Returns true if nothing is staged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Returns the staged operations in enqueue order.
    #[must_use]
    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    /// Stages a put.
    ///
    /// # Errors
    ///
    /// Returns an error if `key` is empty.
    pub fn put(&mut self, key: &str, document: &Document) -> BackendResult<()> {
        validate_key(key)?;
        self.ops.push(BatchOp::Put {
            key: key.to_string(),
            document: document.clone(),
        });
        Ok(())
    }

    /// Stages a delete.
    ///
    /// # Errors
    ///
    /// Returns an error if `key` is empty.
    pub fn delete(&mut self, key: &str) -> BackendResult<()> {
        validate_key(key)?;
        self.ops.push(BatchOp::Delete {
            key: key.to_string(),
        });
        Ok(())
    }

    /// Collapses the batch to its net effect per key.
    ///
    /// `Some(document)` means the key ends up holding `document`, `None`
    /// means it ends up deleted.
    #[must_use]
    pub fn resolve(&self) -> BTreeMap<&str, Option<&Document>> {
        let mut net = BTreeMap::new();
        for op in &self.ops {
            match op {
                BatchOp::Put { key, document } => net.insert(key.as_str(), Some(document)),
                BatchOp::Delete { key } => net.insert(key.as_str(), None),
            };
        }
        net
    }

    /// Applies the operations, in order, to a namespace map.
    pub fn apply_to(&self, entries: &mut BTreeMap<String, Document>) {
        apply_ops(entries, &self.ops);
    }
}

/// Applies `ops`, in order, to a namespace map.
///
/// Stored documents are detached from the caller's buffers.
pub(crate) fn apply_ops(entries: &mut BTreeMap<String, Document>, ops: &[BatchOp]) {
    for op in ops {
        match op {
            BatchOp::Put { key, document } => {
                entries.insert(key.clone(), document.detach());
            }
            BatchOp::Delete { key } => {
                entries.remove(key);
            }
        }
    }
}
