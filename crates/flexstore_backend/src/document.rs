//! Documents stored by meta backends.

use crate::error::{BackendError, BackendResult};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;

/// An immutable, self-describing serialized record.
///
/// Backends store and return documents verbatim. Cloning is cheap: the
/// bytes are reference counted, so a backend can hand the same document to
/// several cursors without copying.
///
/// Documents built with [`encode`](Self::encode) are CBOR, which reports its
/// own structure and length. Backends only look inside a document to answer
/// [`get_by_value`](crate::MetaBackend::get_by_value) queries.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Document {
    bytes: Bytes,
}

impl Document {
    /// Wraps raw bytes as a document.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    /// Serializes `value` as a CBOR document.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Codec`] if the value cannot be serialized.
    pub fn encode<T: Serialize + ?Sized>(value: &T) -> BackendResult<Self> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf).map_err(BackendError::codec)?;
        Ok(Self::from_bytes(buf))
    }

    /// Deserializes the document from CBOR.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Codec`] if the bytes are not valid CBOR for `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> BackendResult<T> {
        ciborium::from_reader(self.bytes.as_ref()).map_err(BackendError::codec)
    }

    /// Returns the document length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true for a zero-length document.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Returns the raw bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns a copy that owns its bytes.
    ///
    /// A document built from a slice of a larger buffer, such as an arena
    /// cache grant, keeps that whole buffer alive. Backends that retain
    /// documents store detached copies.
    #[must_use]
    pub fn detach(&self) -> Self {
        Self::from(self.as_bytes())
    }

    /// Returns the underlying shared bytes.
    #[must_use]
    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }

    /// Decodes the document as a generic CBOR value, if it is one.
    pub(crate) fn to_value(&self) -> Option<ciborium::Value> {
        ciborium::from_reader(self.bytes.as_ref()).ok()
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl AsRef<[u8]> for Document {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl From<Vec<u8>> for Document {
    fn from(bytes: Vec<u8>) -> Self {
        Self::from_bytes(bytes)
    }
}

impl From<Bytes> for Document {
    fn from(bytes: Bytes) -> Self {
        Self::from_bytes(bytes)
    }
}

impl From<&[u8]> for Document {
    fn from(bytes: &[u8]) -> Self {
        Self::from_bytes(Bytes::copy_from_slice(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Item {
        name: String,
        size: u64,
    }

    #[test]
    fn document_encode_decode() {
        let item = Item {
            name: "a".to_string(),
            size: 42,
        };
        let doc = Document::encode(&item).unwrap();
        assert!(!doc.is_empty());
        assert_eq!(doc.decode::<Item>().unwrap(), item);
    }

    #[test]
    fn document_decode_garbage_fails() {
        let doc = Document::from(vec![0xff, 0x00]);
        assert!(matches!(
            doc.decode::<Item>(),
            Err(BackendError::Codec { .. })
        ));
    }

    #[test]
    fn document_detach_copies_bytes() {
        let shared = Bytes::from(vec![1u8, 2, 3, 4]);
        let doc = Document::from(shared.slice(1..3));
        let detached = doc.detach();
        assert_eq!(detached, doc);
        assert_ne!(detached.as_bytes().as_ptr(), doc.as_bytes().as_ptr());
    }

    #[test]
    fn document_clone_shares_bytes() {
        let doc = Document::from(&b"payload"[..]);
        let copy = doc.clone();
        assert_eq!(doc, copy);
        assert_eq!(copy.as_bytes().as_ptr(), doc.as_bytes().as_ptr());
        assert_eq!(copy.len(), 7);
    }
}
