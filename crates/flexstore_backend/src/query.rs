//! Field-equality queries for `get_by_value`.

use crate::document::Document;
use crate::error::{BackendError, BackendResult};
use ciborium::Value;

/// A query that matches documents by top-level field equality.
///
/// The query document must be a CBOR map. A stored document matches when it
/// is a CBOR map and holds every query field with an equal value. Documents
/// that are not CBOR maps never match.
#[derive(Debug, Clone)]
pub struct ValueQuery {
    fields: Vec<(Value, Value)>,
}

impl ValueQuery {
    /// Parses a query document.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::InvalidArgument`] if `query` is not a CBOR map.
    pub fn parse(query: &Document) -> BackendResult<Self> {
        match query.to_value() {
            Some(Value::Map(fields)) => Ok(Self { fields }),
            _ => Err(BackendError::invalid_argument(
                "get_by_value query must be a CBOR map",
            )),
        }
    }

    /// Returns true if `document` holds every query field.
    #[must_use]
    pub fn matches(&self, document: &Document) -> bool {
        let Some(Value::Map(entries)) = document.to_value() else {
            return false;
        };
        self.fields
            .iter()
            .all(|(key, value)| entries.iter().any(|(k, v)| k == key && v == value))
    }

    /// Collects the matching documents, preserving order.
    pub fn select<'a>(&self, documents: impl IntoIterator<Item = &'a Document>) -> Vec<Document> {
        documents
            .into_iter()
            .filter(|document| self.matches(document))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn map(pairs: &[(&str, i64)]) -> Document {
        let map: BTreeMap<&str, i64> = pairs.iter().copied().collect();
        Document::encode(&map).unwrap()
    }

    #[test]
    fn query_must_be_map() {
        let query = Document::encode(&[1, 2, 3]).unwrap();
        assert!(matches!(
            ValueQuery::parse(&query),
            Err(BackendError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn query_matches_subset_of_fields() {
        let query = ValueQuery::parse(&map(&[("kind", 1)])).unwrap();
        assert!(query.matches(&map(&[("kind", 1), ("size", 10)])));
        assert!(!query.matches(&map(&[("kind", 2), ("size", 10)])));
        assert!(!query.matches(&map(&[("size", 10)])));
    }

    #[test]
    fn non_map_documents_never_match() {
        let query = ValueQuery::parse(&map(&[])).unwrap();
        assert!(query.matches(&map(&[("any", 0)])));
        assert!(!query.matches(&Document::from(&b"raw bytes"[..])));
    }

    #[test]
    fn select_keeps_order() {
        let docs = vec![
            map(&[("kind", 1), ("id", 1)]),
            map(&[("kind", 2), ("id", 2)]),
            map(&[("kind", 1), ("id", 3)]),
        ];
        let query = ValueQuery::parse(&map(&[("kind", 1)])).unwrap();
        let selected = query.select(&docs);
        assert_eq!(selected, vec![docs[0].clone(), docs[2].clone()]);
    }
}
