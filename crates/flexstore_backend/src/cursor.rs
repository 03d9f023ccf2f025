//! Forward-only document cursors.

use crate::document::Document;
use crate::error::{BackendError, BackendResult};

/// A single-pass cursor over documents captured when it was opened.
///
/// Backends whose engine has no native iterator can use this as their
/// [`MetaBackend::Cursor`](crate::MetaBackend::Cursor). The first call that
/// finds no document returns `Ok(None)` and frees the remaining state; any
/// call after that is a contract violation and returns
/// [`BackendError::CursorExhausted`].
#[derive(Debug)]
pub struct SnapshotCursor {
    documents: Option<std::vec::IntoIter<Document>>,
}

impl SnapshotCursor {
    /// Creates a cursor positioned before the first document.
    #[must_use]
    pub fn new(documents: Vec<Document>) -> Self {
        Self {
            documents: Some(documents.into_iter()),
        }
    }

    /// Returns the next document, or `None` once the cursor is exhausted.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::CursorExhausted`] if exhaustion was already reported.
    pub fn advance(&mut self) -> BackendResult<Option<Document>> {
        let documents = self
            .documents
            .as_mut()
            .ok_or(BackendError::CursorExhausted)?;

        match documents.next() {
            Some(document) => Ok(Some(document)),
            None => {
                self.documents = None;
                Ok(None)
            }
        }
    }

    /// Returns true once exhaustion has been reported.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.documents.is_none()
    }

    /// Returns how many documents are left.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.documents.as_ref().map_or(0, ExactSizeIterator::len)
    }
}
