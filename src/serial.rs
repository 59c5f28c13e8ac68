//! Binary encoding of bridge payloads for byte-oriented session backends.
//!
//! Sessions that only store bytes (cookies, key-value caches) wrap their
//! storage in [`BinarySession`], which frames each payload with a 28-byte
//! header followed by a bincode-encoded body.
//!
//! ## Wire Format
//!
//! ```text
//! Offset  Size  Field
//! 0       4     Magic bytes: b"DFBR"
//! 4       2     Format version (u16, little-endian)
//! 6       2     Reserved, zero
//! 8       4     Body length in bytes (u32, little-endian)
//! 12      16    BLAKE3 hash of the body (truncated to 16 bytes)
//! 28..    var   Bincode-encoded body
//! ```
//!
//! The format version must match exactly; anything else fails with
//! [`DeserializeError::IncompatibleVersion`].

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bridge::Session;
use crate::types::{Payload, Record, SessionError, Value};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const MAGIC: &[u8; 4] = b"DFBR";
const FORMAT_VERSION: u16 = 1;
const HEADER_SIZE: usize = 28;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur when encoding a [`Payload`] to bytes.
#[derive(Debug, Error)]
pub enum SerializeError {
    #[error("failed to encode payload: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("payload body of {0} bytes exceeds the 4 GiB frame limit")]
    TooLarge(usize),
}

/// Errors that can occur when decoding a [`Payload`] from bytes.
#[derive(Debug, Error)]
pub enum DeserializeError {
    #[error("not a bridge payload: invalid magic bytes")]
    BadMagic,

    #[error("incompatible format version: blob is v{blob}, this build supports v{supported}")]
    IncompatibleVersion { blob: u16, supported: u16 },

    #[error("integrity check failed: BLAKE3 checksum mismatch")]
    ChecksumMismatch,

    #[error("payload length mismatch: expected {expected} bytes, got {actual}")]
    LengthMismatch { expected: u32, actual: usize },

    #[error("failed to decode payload: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    #[error("validation failed: {0}")]
    Validation(String),
}

// ---------------------------------------------------------------------------
// Serialized type hierarchy
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
struct SerializedPayload {
    entries: Vec<(String, SerializedValue)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum SerializedValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<SerializedValue>),
    Record {
        id: Box<SerializedValue>,
        attributes: Vec<(String, SerializedValue)>,
    },
}

// ---------------------------------------------------------------------------
// Value conversion
// ---------------------------------------------------------------------------

fn serialize_value(value: &Value) -> SerializedValue {
    match value {
        Value::Null => SerializedValue::Null,
        Value::Bool(v) => SerializedValue::Bool(*v),
        Value::Int(v) => SerializedValue::Int(*v),
        Value::Float(v) => SerializedValue::Float(*v),
        Value::String(v) => SerializedValue::Str(v.clone()),
        Value::List(items) => SerializedValue::List(items.iter().map(serialize_value).collect()),
        Value::Record(record) => SerializedValue::Record {
            id: Box::new(serialize_value(record.id())),
            attributes: record
                .attributes()
                .map(|(name, value)| (name.to_owned(), serialize_value(value)))
                .collect(),
        },
    }
}

fn deserialize_value(value: SerializedValue) -> Value {
    match value {
        SerializedValue::Null => Value::Null,
        SerializedValue::Bool(v) => Value::Bool(v),
        SerializedValue::Int(v) => Value::Int(v),
        SerializedValue::Float(v) => Value::Float(v),
        SerializedValue::Str(v) => Value::String(v),
        SerializedValue::List(items) => {
            Value::List(items.into_iter().map(deserialize_value).collect())
        }
        SerializedValue::Record { id, attributes } => {
            let mut record = Record::new(deserialize_value(*id));
            for (name, value) in attributes {
                record.insert(&name, deserialize_value(value));
            }
            Value::Record(Arc::new(record))
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(ser: &SerializedPayload) -> Result<(), DeserializeError> {
    let mut previous: Option<&str> = None;
    for (name, _) in &ser.entries {
        if name.is_empty() {
            return Err(DeserializeError::Validation(
                "payload entry with an empty field name".to_owned(),
            ));
        }
        // Entries are written in key order; anything else was not produced here.
        if previous.is_some_and(|prev| prev >= name.as_str()) {
            return Err(DeserializeError::Validation(format!(
                "payload entry '{name}' is duplicated or out of order"
            )));
        }
        previous = Some(name);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Header I/O
// ---------------------------------------------------------------------------

fn write_header(buf: &mut Vec<u8>, body: &[u8]) -> Result<(), SerializeError> {
    let body_len = u32::try_from(body.len()).map_err(|_| SerializeError::TooLarge(body.len()))?;
    let hash = blake3::hash(body);

    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    buf.extend_from_slice(&0u16.to_le_bytes()); // reserved
    buf.extend_from_slice(&body_len.to_le_bytes());
    buf.extend_from_slice(&hash.as_bytes()[..16]);
    Ok(())
}

#[allow(clippy::cast_possible_truncation)] // HEADER_SIZE is 28, always fits in u32
fn read_header(bytes: &[u8]) -> Result<(u16, u32, [u8; 16]), DeserializeError> {
    if bytes.len() < HEADER_SIZE {
        return Err(DeserializeError::LengthMismatch {
            expected: HEADER_SIZE as u32,
            actual: bytes.len(),
        });
    }

    if &bytes[0..4] != MAGIC {
        return Err(DeserializeError::BadMagic);
    }

    let format_version = u16::from_le_bytes([bytes[4], bytes[5]]);
    let body_len = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);

    let mut hash = [0u8; 16];
    hash.copy_from_slice(&bytes[12..28]);

    Ok((format_version, body_len, hash))
}

// ---------------------------------------------------------------------------
// Public encode/decode
// ---------------------------------------------------------------------------

/// Encode a payload into a framed, checksummed blob.
///
/// # Errors
///
/// Returns [`SerializeError`] if bincode encoding fails or the body is too large to frame.
pub fn encode_payload(payload: &Payload) -> Result<Vec<u8>, SerializeError> {
    let serialized = SerializedPayload {
        entries: payload
            .iter()
            .map(|(name, value)| (name.clone(), serialize_value(value)))
            .collect(),
    };
    let body = bincode::serde::encode_to_vec(&serialized, bincode::config::standard())?;

    let mut buf = Vec::with_capacity(HEADER_SIZE + body.len());
    write_header(&mut buf, &body)?;
    buf.extend_from_slice(&body);
    Ok(buf)
}

/// Decode a blob produced by [`encode_payload`].
///
/// # Errors
///
/// Returns [`DeserializeError`] if the header, checksum, or body is invalid.
pub fn decode_payload(bytes: &[u8]) -> Result<Payload, DeserializeError> {
    let (format_version, body_len, stored_hash) = read_header(bytes)?;

    if format_version != FORMAT_VERSION {
        return Err(DeserializeError::IncompatibleVersion {
            blob: format_version,
            supported: FORMAT_VERSION,
        });
    }

    let body_end = HEADER_SIZE + body_len as usize;
    if bytes.len() != body_end {
        return Err(DeserializeError::LengthMismatch {
            expected: body_len,
            actual: bytes.len() - HEADER_SIZE,
        });
    }
    let body = &bytes[HEADER_SIZE..body_end];

    if blake3::hash(body).as_bytes()[..16] != stored_hash {
        return Err(DeserializeError::ChecksumMismatch);
    }

    let (serialized, _): (SerializedPayload, usize) =
        bincode::serde::decode_from_slice(body, bincode::config::standard())?;
    validate(&serialized)?;

    Ok(serialized
        .entries
        .into_iter()
        .map(|(name, value)| (name, deserialize_value(value)))
        .collect::<BTreeMap<_, _>>()
        .into())
}

// ---------------------------------------------------------------------------
// Byte-oriented sessions
// ---------------------------------------------------------------------------

/// Session storage that holds raw bytes under string keys.
pub trait ByteStore {
    /// # Errors
    ///
    /// Returns [`SessionError`] when the store cannot be accessed.
    fn has(&self, key: &str) -> Result<bool, SessionError>;

    /// # Errors
    ///
    /// Returns [`SessionError`] when the store cannot be accessed.
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, SessionError>;

    /// # Errors
    ///
    /// Returns [`SessionError`] when the store cannot be accessed.
    fn store(&self, key: &str, bytes: Vec<u8>) -> Result<(), SessionError>;

    /// # Errors
    ///
    /// Returns [`SessionError`] when the store cannot be accessed.
    fn delete(&self, key: &str) -> Result<(), SessionError>;
}

/// An in-process byte store.
#[derive(Debug, Default)]
pub struct MemoryByteStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryByteStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> Result<MutexGuard<'_, HashMap<String, Vec<u8>>>, SessionError> {
        self.entries
            .lock()
            .map_err(|_| SessionError::Backend("byte store lock poisoned".to_owned()))
    }
}

impl ByteStore for MemoryByteStore {
    fn has(&self, key: &str) -> Result<bool, SessionError> {
        Ok(self.entries()?.contains_key(key))
    }

    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, SessionError> {
        Ok(self.entries()?.get(key).cloned())
    }

    fn store(&self, key: &str, bytes: Vec<u8>) -> Result<(), SessionError> {
        self.entries()?.insert(key.to_owned(), bytes);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), SessionError> {
        self.entries()?.remove(key);
        Ok(())
    }
}

/// A [`Session`] over a [`ByteStore`], encoding payloads with [`encode_payload`].
///
/// A blob that fails to decode is reported as [`SessionError::Backend`], which
/// the bridge treats as an empty session.
#[derive(Debug, Default)]
pub struct BinarySession<S> {
    store: S,
}

impl<S: ByteStore> BinarySession<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S: ByteStore> Session for BinarySession<S> {
    fn has(&self, key: &str) -> Result<bool, SessionError> {
        self.store.has(key)
    }

    fn get(&self, key: &str) -> Result<Option<Payload>, SessionError> {
        self.store
            .load(key)?
            .map(|bytes| decode_payload(&bytes))
            .transpose()
            .map_err(|err| SessionError::Backend(err.to_string()))
    }

    fn set(&self, key: &str, payload: Payload) -> Result<(), SessionError> {
        let bytes = encode_payload(&payload).map_err(|err| SessionError::Backend(err.to_string()))?;
        self.store.store(key, bytes)
    }

    fn remove(&self, key: &str) -> Result<(), SessionError> {
        self.store.delete(key)
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
