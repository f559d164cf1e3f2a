// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The entry wire format.
//!
//! Layout, all offsets fixed once the preceding field's length is known:
//!
//! ```text
//! [0..2)   signature, 0x00 0x11
//! [2]      type tag | compressed flag (0x80)
//! [3..11)  expires_at, f64 little-endian, -1.0 = no expiration
//! [11..15) version length, i32 little-endian, -1 = no version
//! [15..)   version bytes, then payload bytes
//! ```

use std::io::Write;
use std::sync::Arc;

use bytes::Bytes;
use flate2::Compression;
use flate2::write::{ZlibDecoder, ZlibEncoder};
use tracing::warn;

use strata_backend::{
    CacheEntry, CacheValue, DEFAULT_COMPRESS_THRESHOLD, DeserializationError, Deserializer, Inflater,
};

/// Two-byte signature identifying this encoding version.
///
/// Bytes that do not start with the signature are handed to the legacy
/// fallback decoder.
pub const SIGNATURE: [u8; 2] = [0x00, 0x11];

/// Type tag: payload is a generic serialized object.
pub const TYPE_OBJECT: u8 = 0x00;
/// Type tag: payload is a raw UTF-8 string.
pub const TYPE_UTF8: u8 = 0x01;
/// Type tag: payload is a raw byte string.
pub const TYPE_BINARY: u8 = 0x02;
/// Type tag: payload is a raw ASCII string.
pub const TYPE_ASCII: u8 = 0x03;

/// OR'd into the type byte when the payload bytes are deflate-compressed.
pub const COMPRESSED_FLAG: u8 = 0x80;

/// Byte length of the fixed-size header fields (signature through version
/// length). Version bytes and payload follow.
pub const HEADER_LEN: usize = 15;

const NO_EXPIRY: f64 = -1.0;
const NO_VERSION: i32 = -1;

/// Construction-time codec configuration.
///
/// Configured once when the owning store is built, immutable thereafter.
#[derive(Debug, Clone)]
pub struct CodecConfig {
    /// Default byte threshold at or above which payloads are considered for
    /// compression. `None` disables compression.
    pub compress_threshold: Option<usize>,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            compress_threshold: Some(DEFAULT_COMPRESS_THRESHOLD),
        }
    }
}

/// Encodes and decodes [`CacheEntry`] values to and from the compact binary
/// wire format.
///
/// The codec takes two deliberate shortcuts:
///
/// - **String fast path**: plain text and byte-string values are written as
///   their raw bytes with a matching type tag; the generic serializer is
///   never invoked for them.
/// - **Lazy decode**: [`load`](Self::load) parses only the metadata and
///   returns an entry that defers payload inflation and deserialization to
///   first access.
///
/// Any two backends sharing this codec can read each other's stored bytes.
///
/// # Examples
///
/// ```
/// use strata_backend::{CacheEntry, CacheValue};
/// use strata_codec::Codec;
///
/// let codec = Codec::default();
/// let bytes = codec.dump(&CacheEntry::new(CacheValue::from("hello"))).unwrap();
/// let entry = codec.load(bytes).unwrap().unwrap();
/// assert_eq!(entry.value().unwrap(), &CacheValue::from("hello"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Codec {
    config: CodecConfig,
}

impl Codec {
    /// Creates a codec with the given configuration.
    #[must_use]
    pub fn new(config: CodecConfig) -> Self {
        Self { config }
    }

    /// Encodes an entry using the codec's configured compression threshold.
    ///
    /// # Errors
    ///
    /// Returns [`DeserializationError`] when the entry's own lazy payload
    /// turns out to be corrupt while materializing it for re-encoding.
    pub fn dump(&self, entry: &CacheEntry) -> Result<Bytes, DeserializationError> {
        self.dump_with_threshold(entry, self.config.compress_threshold)
    }

    /// Encodes an entry, compressing the payload only when it is at least
    /// `threshold` bytes long *and* compression actually shrinks it. A
    /// `threshold` of `None` disables compression entirely.
    ///
    /// # Errors
    ///
    /// Returns [`DeserializationError`] when the entry's own lazy payload
    /// turns out to be corrupt while materializing it for re-encoding.
    pub fn dump_with_threshold(
        &self,
        entry: &CacheEntry,
        threshold: Option<usize>,
    ) -> Result<Bytes, DeserializationError> {
        let (tag, payload) = encode_payload(entry.value()?)?;

        let (type_byte, payload) = match threshold {
            Some(threshold) if payload.len() >= threshold => match deflate(&payload) {
                // Keep the compressed form only when it is strictly smaller.
                Some(compressed) if compressed.len() < payload.len() => (tag | COMPRESSED_FLAG, compressed),
                _ => (tag, payload),
            },
            _ => (tag, payload),
        };

        let version = entry.version().map(str::as_bytes);
        let version_len = version.map_or(0, <[u8]>::len);

        let mut out = Vec::with_capacity(HEADER_LEN + version_len + payload.len());
        out.extend_from_slice(&SIGNATURE);
        out.push(type_byte);
        out.extend_from_slice(&entry.expires_at().unwrap_or(NO_EXPIRY).to_le_bytes());
        match version {
            Some(bytes) => {
                let len = i32::try_from(bytes.len())
                    .map_err(|_| DeserializationError::CorruptHeader("version tag exceeds 2 GiB".into()))?;
                out.extend_from_slice(&len.to_le_bytes());
                out.extend_from_slice(bytes);
            }
            None => out.extend_from_slice(&NO_VERSION.to_le_bytes()),
        }
        out.extend_from_slice(&payload);
        Ok(Bytes::from(out))
    }

    /// Decodes stored bytes into a lazy [`CacheEntry`].
    ///
    /// Bytes without the signature are handed to the legacy fallback decoder;
    /// if no fallback recognizes them either, a warning is logged and `None`
    /// is returned: a soft miss, expected during format migrations.
    ///
    /// # Errors
    ///
    /// Returns [`DeserializationError`] when the signature matches but the
    /// header is truncated or inconsistent. Payload corruption surfaces
    /// later, when the returned entry's value is first materialized.
    pub fn load(&self, bytes: Bytes) -> Result<Option<CacheEntry>, DeserializationError> {
        if bytes.len() < SIGNATURE.len() || bytes[..SIGNATURE.len()] != SIGNATURE {
            return Ok(load_legacy(&bytes));
        }
        if bytes.len() < HEADER_LEN {
            return Err(DeserializationError::CorruptHeader(format!(
                "{} bytes is shorter than the {HEADER_LEN}-byte header",
                bytes.len()
            )));
        }

        let type_byte = bytes[2];
        let compressed = type_byte & COMPRESSED_FLAG != 0;
        let tag = type_byte & !COMPRESSED_FLAG;

        let expires_at = f64::from_le_bytes(bytes[3..11].try_into().expect("8-byte slice"));
        let expires_at = (expires_at >= 0.0).then_some(expires_at);

        let version_len = i32::from_le_bytes(bytes[11..15].try_into().expect("4-byte slice"));
        let (version, payload_start) = match version_len {
            NO_VERSION => (None, HEADER_LEN),
            len if len >= 0 => {
                let len = len as usize;
                let end = HEADER_LEN
                    .checked_add(len)
                    .filter(|end| *end <= bytes.len())
                    .ok_or_else(|| {
                        DeserializationError::CorruptHeader(format!("version field of {len} bytes overruns the entry"))
                    })?;
                let version = std::str::from_utf8(&bytes[HEADER_LEN..end])
                    .map_err(|e| DeserializationError::CorruptHeader(format!("version tag is not UTF-8: {e}")))?
                    .to_owned();
                (Some(version), end)
            }
            len => {
                return Err(DeserializationError::CorruptHeader(format!(
                    "negative version length {len}"
                )));
            }
        };

        let deserializer = deserializer_for(tag).ok_or_else(|| {
            DeserializationError::CorruptHeader(format!("unknown type tag 0x{tag:02x}"))
        })?;
        let inflater = compressed.then(inflater);

        Ok(Some(CacheEntry::lazy(
            bytes.slice(payload_start..),
            deserializer,
            inflater,
            expires_at,
            version,
        )))
    }
}

fn encode_payload(value: &CacheValue) -> Result<(u8, Vec<u8>), DeserializationError> {
    match value {
        CacheValue::Text(text) => {
            let tag = if text.is_ascii() { TYPE_ASCII } else { TYPE_UTF8 };
            Ok((tag, text.as_bytes().to_vec()))
        }
        CacheValue::Binary(bytes) => Ok((TYPE_BINARY, bytes.to_vec())),
        CacheValue::Object(object) => {
            let payload = serde_json::to_vec(object)
                .map_err(|e| DeserializationError::CorruptPayload(format!("object failed to serialize: {e}")))?;
            Ok((TYPE_OBJECT, payload))
        }
    }
}

fn deserializer_for(tag: u8) -> Option<Deserializer> {
    let deserializer: Deserializer = match tag {
        TYPE_OBJECT => Arc::new(|bytes: &[u8]| {
            serde_json::from_slice(bytes)
                .map(CacheValue::Object)
                .map_err(|e| DeserializationError::CorruptPayload(format!("object failed to deserialize: {e}")))
        }),
        TYPE_UTF8 | TYPE_ASCII => Arc::new(|bytes: &[u8]| {
            String::from_utf8(bytes.to_vec())
                .map(CacheValue::Text)
                .map_err(|e| DeserializationError::CorruptPayload(format!("string payload is not UTF-8: {e}")))
        }),
        TYPE_BINARY => Arc::new(|bytes: &[u8]| Ok(CacheValue::Binary(Bytes::copy_from_slice(bytes)))),
        _ => return None,
    };
    Some(deserializer)
}

fn inflater() -> Inflater {
    Arc::new(|bytes: &[u8]| {
        let mut decoder = ZlibDecoder::new(Vec::new());
        decoder
            .write_all(bytes)
            .and_then(|()| decoder.finish())
            .map_err(|e| DeserializationError::Inflate(e.to_string()))
    })
}

/// Deflates `bytes`; `None` when compression itself fails (never expected for
/// valid input, but a cache must not panic over it).
fn deflate(bytes: &[u8]) -> Option<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).ok()?;
    encoder.finish().ok()
}

/// Decodes the previous encoder generation: a whole-entry JSON document
/// `{"value": ..., "expires_at": ..., "version": ...}`.
fn load_legacy(bytes: &[u8]) -> Option<CacheEntry> {
    let document: serde_json::Value = match serde_json::from_slice(bytes) {
        Ok(document) => document,
        Err(_) => {
            warn!(len = bytes.len(), "discarding unrecognized cache payload");
            return None;
        }
    };
    let Some(object) = document.as_object() else {
        warn!("discarding JSON cache payload that is not an entry document");
        return None;
    };
    if !object.contains_key("value") {
        warn!("discarding JSON cache payload without a value field");
        return None;
    }

    let value = match object.get("value").cloned().unwrap_or(serde_json::Value::Null) {
        serde_json::Value::String(text) => CacheValue::Text(text),
        other => CacheValue::Object(other),
    };
    let expires_at = object.get("expires_at").and_then(serde_json::Value::as_f64);
    let version = object
        .get("version")
        .and_then(serde_json::Value::as_str)
        .map(str::to_owned);

    let mut entry = CacheEntry::new(value).versioned(version);
    entry.set_expires_at(expires_at);
    Some(entry)
}
