// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The core trait for cache storage backends.
//!
//! [`CacheBackend`] defines the interface every concrete backend must
//! implement. The trait is designed for composition: implement the four
//! storage primitives, then let `strata` layer on the uniform fetch/read/
//! write protocol, option resolution, and multi-tier promotion.

use std::collections::HashMap;

use crate::entry::CacheEntry;
use crate::error::BackendError;
use crate::options::CacheOptions;

/// Trait for cache backend implementations.
///
/// Backends receive keys already normalized by the store layer (namespace
/// applied) and options already resolved (call-site merged over defaults).
///
/// The four single-key primitives plus `clear` are required. The batch
/// methods have loop-based defaults; backends whose medium supports true
/// batching (a network store pipelining a multi-get, for instance) should
/// override them, since that materially reduces round trips.
pub trait CacheBackend: Send + Sync {
    /// Reads the entry stored under a normalized key.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Unavailable`] when the backing medium fails
    /// and [`BackendError::Deserialization`] when the stored bytes are
    /// corrupt.
    fn read_entry(&self, key: &str, options: &CacheOptions) -> Result<Option<CacheEntry>, BackendError>;

    /// Writes an entry under a normalized key.
    ///
    /// Returns `false` when the write was declined without failing, e.g. an
    /// `unless_exist` write against a present key.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Unavailable`] when the backing medium fails.
    fn write_entry(&self, key: &str, entry: CacheEntry, options: &CacheOptions) -> Result<bool, BackendError>;

    /// Deletes the entry under a normalized key, returning whether an entry
    /// was present.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Unavailable`] when the backing medium fails.
    fn delete_entry(&self, key: &str, options: &CacheOptions) -> Result<bool, BackendError>;

    /// Reads many entries at once, returning only the keys that were found.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered; partial results are discarded.
    fn read_multi_entries(
        &self,
        keys: &[String],
        options: &CacheOptions,
    ) -> Result<HashMap<String, CacheEntry>, BackendError> {
        let mut found = HashMap::with_capacity(keys.len());
        for key in keys {
            if let Some(entry) = self.read_entry(key, options)? {
                found.insert(key.clone(), entry);
            }
        }
        Ok(found)
    }

    /// Writes many entries at once. Returns `true` only if every write
    /// succeeded.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered.
    fn write_multi_entries(
        &self,
        entries: Vec<(String, CacheEntry)>,
        options: &CacheOptions,
    ) -> Result<bool, BackendError> {
        let mut all_written = true;
        for (key, entry) in entries {
            all_written &= self.write_entry(&key, entry, options)?;
        }
        Ok(all_written)
    }

    /// Removes every entry from the backend.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Unavailable`] when the backing medium fails.
    fn clear(&self) -> Result<bool, BackendError>;
}

impl<B: CacheBackend + ?Sized> CacheBackend for std::sync::Arc<B> {
    fn read_entry(&self, key: &str, options: &CacheOptions) -> Result<Option<CacheEntry>, BackendError> {
        (**self).read_entry(key, options)
    }

    fn write_entry(&self, key: &str, entry: CacheEntry, options: &CacheOptions) -> Result<bool, BackendError> {
        (**self).write_entry(key, entry, options)
    }

    fn delete_entry(&self, key: &str, options: &CacheOptions) -> Result<bool, BackendError> {
        (**self).delete_entry(key, options)
    }

    fn read_multi_entries(
        &self,
        keys: &[String],
        options: &CacheOptions,
    ) -> Result<HashMap<String, CacheEntry>, BackendError> {
        (**self).read_multi_entries(keys, options)
    }

    fn write_multi_entries(
        &self,
        entries: Vec<(String, CacheEntry)>,
        options: &CacheOptions,
    ) -> Result<bool, BackendError> {
        (**self).write_multi_entries(entries, options)
    }

    fn clear(&self) -> Result<bool, BackendError> {
        (**self).clear()
    }
}
