// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The cached payload type.

use bytes::Bytes;

/// A cacheable payload.
///
/// Plain text and raw bytes are first-class variants so the codec can write
/// them to the wire without invoking the generic serializer; everything else
/// travels as a self-describing [`serde_json::Value`].
///
/// # Examples
///
/// ```
/// use strata_backend::CacheValue;
///
/// let text = CacheValue::from("hello");
/// assert_eq!(text.as_text(), Some("hello"));
///
/// let number = CacheValue::from(42i64);
/// assert_eq!(number.as_i64(), Some(42));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum CacheValue {
    /// A UTF-8 string, stored on the wire as its raw bytes.
    Text(String),
    /// An opaque byte string, stored on the wire untouched.
    Binary(Bytes),
    /// Any other serializable unit, stored via the generic serializer.
    Object(serde_json::Value),
}

impl CacheValue {
    /// The null value, the cacheable form of "the computation produced
    /// nothing".
    #[must_use]
    pub const fn null() -> Self {
        Self::Object(serde_json::Value::Null)
    }

    /// Returns `true` for [`CacheValue::null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Object(serde_json::Value::Null))
    }

    /// Returns the text payload, if this value is one.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Returns the binary payload, if this value is one.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Binary(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Numeric view used by increment/decrement.
    ///
    /// Raw counter entries are written as decimal text; object entries may
    /// hold a JSON integer. Anything else is not a counter.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Text(text) => text.trim().parse().ok(),
            Self::Object(value) => value.as_i64(),
            Self::Binary(_) => None,
        }
    }
}

impl From<&str> for CacheValue {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<String> for CacheValue {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Bytes> for CacheValue {
    fn from(bytes: Bytes) -> Self {
        Self::Binary(bytes)
    }
}

impl From<Vec<u8>> for CacheValue {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Binary(Bytes::from(bytes))
    }
}

impl From<i64> for CacheValue {
    fn from(number: i64) -> Self {
        Self::Object(serde_json::Value::from(number))
    }
}

impl From<serde_json::Value> for CacheValue {
    fn from(value: serde_json::Value) -> Self {
        Self::Object(value)
    }
}
