// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Error types for cache operations.

/// The embedded payload of a stored entry could not be decoded.
///
/// This error means the bytes under a key carried a valid entry header but
/// the payload itself is corrupt or inconsistent (e.g. the compressed flag is
/// set but inflation fails). It is deliberately allowed to propagate to
/// callers: mapping it to a miss would be indistinguishable from the key
/// never having been written and could mask data corruption.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeserializationError {
    /// The entry header (signature, expiry, version fields) is truncated or
    /// internally inconsistent.
    #[error("cache entry header is corrupt: {0}")]
    CorruptHeader(String),

    /// The serialized object payload could not be deserialized.
    #[error("cache entry payload is corrupt: {0}")]
    CorruptPayload(String),

    /// The compressed flag and payload bytes disagree.
    #[error("compressed cache payload failed to inflate: {0}")]
    Inflate(String),
}

/// An error from a cache backend primitive.
///
/// The store layer resolves `Unavailable` internally (a failed read is a
/// miss, a failed write reports `false`) because a cache is a best-effort
/// accelerator whose outages must never break the computation it fronts.
/// `Deserialization` is the one exception and crosses the store boundary.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The backing medium failed (connection refused, timeout, full disk...).
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),

    /// The backend holds bytes it cannot decode.
    #[error(transparent)]
    Deserialization(#[from] DeserializationError),
}

impl BackendError {
    /// Creates an `Unavailable` error from any displayable cause.
    pub fn unavailable(cause: impl std::fmt::Display) -> Self {
        Self::Unavailable(cause.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialization_error_display_contains_cause() {
        let error = DeserializationError::CorruptPayload("bad token".into());
        assert!(format!("{error}").contains("bad token"));
    }

    #[test]
    fn backend_error_wraps_deserialization_transparently() {
        let inner = DeserializationError::Inflate("invalid stream".into());
        let error = BackendError::from(inner.clone());
        assert_eq!(format!("{error}"), format!("{inner}"));
    }
}
