//! Journal record framing.
//!
//! Each executed batch is one record:
//!
//! ```text
//! | magic "FXJ1" (4) | payload len (4, LE) | CRC32 of payload (4, LE) | CBOR payload |
//! ```
//!
//! The payload is a CBOR array `[namespace, [op...]]` where a put is
//! `[1, key, bytes]` and a delete is `[2, key]`.

use crate::batch::BatchOp;
use crate::document::Document;
use crate::error::{BackendError, BackendResult};
use ciborium::Value;

/// Magic bytes opening every journal record.
pub const JOURNAL_MAGIC: [u8; 4] = *b"FXJ1";

/// Size of the record envelope preceding the payload.
pub const HEADER_LEN: usize = 12;

const OP_PUT: u8 = 1;
const OP_DELETE: u8 = 2;

/// A decoded journal record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalRecord {
    /// Namespace the batch wrote to.
    pub namespace: String,
    /// The batch operations in enqueue order.
    pub ops: Vec<BatchOp>,
}

/// The outcome of decoding one frame from the head of a buffer.
#[derive(Debug)]
pub enum Frame {
    /// A complete record and the number of bytes it occupied.
    Complete(JournalRecord, usize),
    /// The buffer ends inside a record.
    Torn,
    /// The bytes do not form a valid record.
    Corrupt(String),
}

/// Encodes a batch as a framed record.
///
/// # Errors
///
/// Returns a codec error if the payload cannot be serialized or exceeds the
/// 4-byte length field.
pub fn encode(namespace: &str, ops: &[BatchOp]) -> BackendResult<Vec<u8>> {
    let ops = ops
        .iter()
        .map(|op| match op {
            BatchOp::Put { key, document } => Value::Array(vec![
                Value::Integer(OP_PUT.into()),
                Value::Text(key.clone()),
                Value::Bytes(document.as_bytes().to_vec()),
            ]),
            BatchOp::Delete { key } => Value::Array(vec![
                Value::Integer(OP_DELETE.into()),
                Value::Text(key.clone()),
            ]),
        })
        .collect();
    let value = Value::Array(vec![Value::Text(namespace.to_string()), Value::Array(ops)]);

    let mut payload = Vec::new();
    ciborium::into_writer(&value, &mut payload).map_err(BackendError::codec)?;
    let len = u32::try_from(payload.len()).map_err(|_| {
        BackendError::codec(format!(
            "journal record too large: {} bytes",
            payload.len()
        ))
    })?;

    let mut buf = Vec::with_capacity(HEADER_LEN + payload.len());
    buf.extend_from_slice(&JOURNAL_MAGIC);
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    buf.extend_from_slice(&payload);
    Ok(buf)
}

/// Decodes the record at the head of `data`.
#[must_use]
pub fn decode(data: &[u8]) -> Frame {
    if data.len() < HEADER_LEN {
        return Frame::Torn;
    }
    if data[0..4] != JOURNAL_MAGIC {
        return Frame::Corrupt("bad record magic".to_string());
    }

    let len = u32::from_le_bytes([data[4], data[5], data[6], data[7]]) as usize;
    let stored_crc = u32::from_le_bytes([data[8], data[9], data[10], data[11]]);
    let Some(payload) = data.get(HEADER_LEN..HEADER_LEN + len) else {
        return Frame::Torn;
    };

    let computed_crc = crc32fast::hash(payload);
    if computed_crc != stored_crc {
        return Frame::Corrupt(format!(
            "checksum mismatch: expected {stored_crc:#010x}, got {computed_crc:#010x}"
        ));
    }

    match decode_payload(payload) {
        Ok(record) => Frame::Complete(record, HEADER_LEN + len),
        Err(message) => Frame::Corrupt(message),
    }
}

fn decode_payload(payload: &[u8]) -> Result<JournalRecord, String> {
    let value: Value = ciborium::from_reader(payload).map_err(|e| e.to_string())?;
    let Value::Array(mut fields) = value else {
        return Err("payload is not an array".to_string());
    };
    if fields.len() != 2 {
        return Err(format!("payload has {} fields, expected 2", fields.len()));
    }

    let ops = fields.pop();
    let namespace = fields.pop();
    let (Some(Value::Text(namespace)), Some(Value::Array(ops))) = (namespace, ops) else {
        return Err("payload fields have wrong types".to_string());
    };

    let ops = ops
        .into_iter()
        .map(decode_op)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(JournalRecord { namespace, ops })
}

fn decode_op(value: Value) -> Result<BatchOp, String> {
    let Value::Array(parts) = value else {
        return Err("operation is not an array".to_string());
    };
    let mut parts = parts.into_iter();
    let code = match parts.next() {
        Some(Value::Integer(code)) => i128::from(code),
        _ => return Err("operation code missing".to_string()),
    };
    let Some(Value::Text(key)) = parts.next() else {
        return Err("operation key missing".to_string());
    };

    match (code, parts.next(), parts.next()) {
        (c, Some(Value::Bytes(bytes)), None) if c == i128::from(OP_PUT) => Ok(BatchOp::Put {
            key,
            document: Document::from(bytes),
        }),
        (c, None, None) if c == i128::from(OP_DELETE) => Ok(BatchOp::Delete { key }),
        (c, _, _) => Err(format!("malformed operation with code {c}")),
    }
}
