// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The value-plus-metadata unit stored under one cache key.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use once_cell::sync::OnceCell;

use crate::error::DeserializationError;
use crate::value::CacheValue;

/// Turns raw payload bytes into a [`CacheValue`]. Installed by the codec at
/// decode time according to the entry's wire type tag.
pub type Deserializer = Arc<dyn Fn(&[u8]) -> Result<CacheValue, DeserializationError> + Send + Sync>;

/// Reverses payload compression. Installed by the codec only when the wire
/// compressed flag was set.
pub type Inflater = Arc<dyn Fn(&[u8]) -> Result<Vec<u8>, DeserializationError> + Send + Sync>;

/// A cached value with expiration and version metadata.
///
/// Entries are created by a store just before a write (wrapping a fresh
/// value) or by the codec just after a read. Decoded entries are *lazy*: they
/// carry the raw payload bytes and defer inflation and deserialization until
/// the value is first accessed, so an entry that is read but discarded (say,
/// after a failed version check) never pays the deserialization cost. The
/// materialized value is memoized; later accesses are free.
///
/// Expiration is a pure function of the current time: an entry with
/// `expires_at = T` is expired for every `now >= T` and fresh for every
/// `now < T`.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use strata_backend::{CacheEntry, CacheValue};
///
/// let entry = CacheEntry::with_ttl(CacheValue::from("hello"), Duration::from_secs(60), 1_000.0);
/// assert!(!entry.expired(1_059.0));
/// assert!(entry.expired(1_060.0));
/// ```
#[derive(Clone)]
pub struct CacheEntry {
    state: ValueState,
    version: Option<String>,
    expires_at: Option<f64>,
}

#[derive(Clone)]
enum ValueState {
    Live(CacheValue),
    Lazy(LazyValue),
}

#[derive(Clone)]
struct LazyValue {
    payload: Bytes,
    deserializer: Deserializer,
    inflater: Option<Inflater>,
    materialized: OnceCell<CacheValue>,
}

impl LazyValue {
    fn materialize(&self) -> Result<&CacheValue, DeserializationError> {
        self.materialized.get_or_try_init(|| {
            let value = match &self.inflater {
                Some(inflate) => {
                    let inflated = inflate(&self.payload)?;
                    (self.deserializer)(&inflated)?
                }
                None => (self.deserializer)(&self.payload)?,
            };
            Ok(value)
        })
    }
}

impl CacheEntry {
    /// Creates an entry with no expiration or version.
    #[must_use]
    pub fn new(value: CacheValue) -> Self {
        Self {
            state: ValueState::Live(value),
            version: None,
            expires_at: None,
        }
    }

    /// Creates an entry expiring `ttl` after `now`.
    ///
    /// The resulting `expires_at` is always at or after the creation time.
    #[must_use]
    pub fn with_ttl(value: CacheValue, ttl: Duration, now: f64) -> Self {
        Self {
            state: ValueState::Live(value),
            version: None,
            expires_at: Some(now + ttl.as_secs_f64()),
        }
    }

    /// Creates a lazy entry wrapping undecoded payload bytes.
    ///
    /// This is the codec's decode-path constructor: `deserializer` matches
    /// the wire type tag and `inflater` is present exactly when the wire
    /// compressed flag was set.
    #[must_use]
    pub fn lazy(
        payload: Bytes,
        deserializer: Deserializer,
        inflater: Option<Inflater>,
        expires_at: Option<f64>,
        version: Option<String>,
    ) -> Self {
        Self {
            state: ValueState::Lazy(LazyValue {
                payload,
                deserializer,
                inflater,
                materialized: OnceCell::new(),
            }),
            version,
            expires_at,
        }
    }

    /// Attaches a version tag, consuming the entry.
    #[must_use]
    pub fn versioned(mut self, version: Option<String>) -> Self {
        self.version = version;
        self
    }

    /// The entry's version tag.
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// The absolute expiration time in epoch seconds, if any.
    #[must_use]
    pub fn expires_at(&self) -> Option<f64> {
        self.expires_at
    }

    /// Moves the expiration time. Used by the fetch protocol to extend a
    /// just-expired entry for the race-condition grace window.
    pub fn set_expires_at(&mut self, expires_at: Option<f64>) {
        self.expires_at = expires_at;
    }

    /// Returns `true` when `now` is at or past the expiration time.
    #[must_use]
    pub fn expired(&self, now: f64) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }

    /// Returns `true` when the payload is stored deflate-compressed.
    ///
    /// Only a lazy (decoded) entry can report `true`; a live entry has no
    /// wire representation yet.
    #[must_use]
    pub fn compressed(&self) -> bool {
        match &self.state {
            ValueState::Live(_) => false,
            ValueState::Lazy(lazy) => lazy.inflater.is_some(),
        }
    }

    /// Returns `true` when both the expected and stored versions are present
    /// and differ. An unversioned read matches a versioned entry and vice
    /// versa. The comparison never materializes a lazy value.
    #[must_use]
    pub fn mismatched(&self, version: Option<&str>) -> bool {
        match (self.version.as_deref(), version) {
            (Some(stored), Some(expected)) => stored != expected,
            _ => false,
        }
    }

    /// The entry's value, materializing and memoizing it on first access.
    ///
    /// # Errors
    ///
    /// Returns [`DeserializationError`] when the stored payload is corrupt.
    pub fn value(&self) -> Result<&CacheValue, DeserializationError> {
        match &self.state {
            ValueState::Live(value) => Ok(value),
            ValueState::Lazy(lazy) => lazy.materialize(),
        }
    }

    /// Consumes the entry and returns its value, materializing if needed.
    ///
    /// # Errors
    ///
    /// Returns [`DeserializationError`] when the stored payload is corrupt.
    pub fn into_value(self) -> Result<CacheValue, DeserializationError> {
        match self.state {
            ValueState::Live(value) => Ok(value),
            ValueState::Lazy(lazy) => lazy.materialize().cloned(),
        }
    }
}

impl std::fmt::Debug for CacheEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("CacheEntry");
        s.field("version", &self.version).field("expires_at", &self.expires_at);
        match &self.state {
            ValueState::Live(value) => s.field("value", value),
            ValueState::Lazy(lazy) => s
                .field("payload_len", &lazy.payload.len())
                .field("compressed", &lazy.inflater.is_some())
                .field("materialized", &lazy.materialized.get().is_some()),
        };
        s.finish()
    }
}

impl From<CacheValue> for CacheEntry {
    fn from(value: CacheValue) -> Self {
        Self::new(value)
    }
}
