// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The byte-budgeted in-process backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::debug;

use strata_backend::{BackendError, CacheBackend, CacheEntry, CacheOptions, CacheValue, Clock};
use strata_codec::Codec;

use crate::builder::BoundedMemoryStoreBuilder;

/// Fixed bookkeeping cost charged to every entry on top of its key and
/// payload bytes.
pub const PER_ENTRY_OVERHEAD: usize = 240;

/// Fraction of `max_size` that pruning shrinks the store down to.
pub(crate) const PRUNE_TARGET_NUMERATOR: usize = 3;
pub(crate) const PRUNE_TARGET_DENOMINATOR: usize = 4;

/// An in-process cache backend bounded by a byte budget.
///
/// Entries are stored codec-encoded, so the byte accounting is exact and a
/// read pays decode cost lazily. When a write pushes the aggregate size past
/// the budget, the store prunes least-recently-accessed entries down to 75%
/// of the budget. Pruning runs after the write lands, so a single write is
/// never rejected merely because the store happens to be full.
///
/// Every mutating and size-accounting operation runs under one store-wide
/// lock; the structure is deliberately coarse-grained.
///
/// # Examples
///
/// ```
/// use strata_backend::{CacheBackend, CacheEntry, CacheOptions, CacheValue, Clock};
/// use strata_memory::BoundedMemoryStore;
///
/// let store = BoundedMemoryStore::builder()
///     .max_size(1024 * 1024)
///     .clock(Clock::new_frozen())
///     .build();
///
/// let options = CacheOptions::new();
/// store.write_entry("key", CacheEntry::new(CacheValue::from("v")), &options).unwrap();
/// assert!(store.read_entry("key", &options).unwrap().is_some());
/// ```
#[derive(Debug)]
pub struct BoundedMemoryStore {
    state: Mutex<StoreState>,
    codec: Codec,
    clock: Clock,
    max_size: usize,
    pruning: AtomicBool,
}

#[derive(Debug, Default)]
struct StoreState {
    entries: HashMap<String, Bytes>,
    key_access: HashMap<String, u64>,
    access_counter: u64,
    cache_size: usize,
}

impl StoreState {
    fn touch(&mut self, key: &str) {
        self.access_counter += 1;
        self.key_access.insert(key.to_owned(), self.access_counter);
    }

    fn remove(&mut self, key: &str) -> Option<Bytes> {
        let payload = self.entries.remove(key)?;
        self.key_access.remove(key);
        self.cache_size -= cached_size(key, &payload);
        Some(payload)
    }

    fn insert(&mut self, key: &str, payload: Bytes) {
        self.remove(key);
        self.cache_size += cached_size(key, &payload);
        self.entries.insert(key.to_owned(), payload);
        self.touch(key);
    }
}

fn cached_size(key: &str, payload: &Bytes) -> usize {
    key.len() + payload.len() + PER_ENTRY_OVERHEAD
}

impl BoundedMemoryStore {
    /// Creates a builder for configuring the store.
    #[must_use]
    pub fn builder() -> BoundedMemoryStoreBuilder {
        BoundedMemoryStoreBuilder::new()
    }

    pub(crate) fn from_builder(builder: BoundedMemoryStoreBuilder) -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
            codec: Codec::new(builder.codec_config),
            clock: builder.clock.unwrap_or_default(),
            max_size: builder.max_size,
            pruning: AtomicBool::new(false),
        }
    }

    /// The aggregate size of all stored entries in bytes, overhead included.
    #[must_use]
    pub fn cache_size(&self) -> usize {
        self.state.lock().cache_size
    }

    /// The number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Returns `true` when the store holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }

    /// Deletes least-recently-accessed entries until the aggregate size is at
    /// or below `target_size`, or until the wall-clock budget `max_time` is
    /// spent, whichever comes first.
    ///
    /// A prune already in progress makes this call a no-op rather than
    /// stacking.
    pub fn prune(&self, target_size: usize, max_time: Option<Duration>) {
        if self.pruning.swap(true, Ordering::AcqRel) {
            return;
        }
        let started = Instant::now();
        let mut state = self.state.lock();

        let mut keys: Vec<(u64, String)> = state.key_access.iter().map(|(k, seq)| (*seq, k.clone())).collect();
        keys.sort_unstable();

        let before = state.cache_size;
        for (_, key) in keys {
            if state.cache_size <= target_size {
                break;
            }
            if max_time.is_some_and(|budget| started.elapsed() > budget) {
                break;
            }
            state.remove(&key);
        }
        debug!(before, after = state.cache_size, target_size, "pruned memory store");

        drop(state);
        self.pruning.store(false, Ordering::Release);
    }

    /// Sweeps out entries that are already expired.
    pub fn cleanup(&self) {
        let now = self.clock.now();
        let mut state = self.state.lock();
        let expired: Vec<String> = state
            .entries
            .iter()
            .filter_map(|(key, payload)| {
                let entry = self.codec.load(payload.clone()).ok().flatten()?;
                entry.expired(now).then(|| key.clone())
            })
            .collect();
        for key in expired {
            state.remove(&key);
        }
    }

    /// Atomically adjusts the numeric entry under `key` by `amount`,
    /// initializing an absent key to `amount`.
    ///
    /// This is the store's native override of the contract's non-atomic
    /// read-adjust-rewrite default: the whole adjustment happens under the
    /// store lock. Counter entries are written raw (uncompressed and
    /// unversioned) as decimal text. An expired counter counts as absent and
    /// is reinitialized with a fresh TTL. Returns `None` when the key holds a
    /// non-numeric entry.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Deserialization`] when the stored bytes are
    /// corrupt.
    pub fn increment(&self, key: &str, amount: i64, options: &CacheOptions) -> Result<Option<i64>, BackendError> {
        let now = self.clock.now();
        let mut state = self.state.lock();

        let (current, expires_at) = match state.entries.get(key) {
            Some(payload) => match self.codec.load(payload.clone())? {
                Some(entry) if !entry.expired(now) => {
                    let expires_at = entry.expires_at();
                    match entry.into_value()?.as_i64() {
                        Some(current) => (Some(current), expires_at),
                        None => return Ok(None),
                    }
                }
                _ => (None, None),
            },
            None => (None, None),
        };

        let next = current.unwrap_or(0) + amount;
        let mut entry = CacheEntry::new(CacheValue::Text(next.to_string()));
        entry.set_expires_at(expires_at.or_else(|| options.expires_in.map(|ttl| now + ttl.as_secs_f64())));

        let payload = self.codec.dump_with_threshold(&entry, None)?;
        state.insert(key, payload);
        Ok(Some(next))
    }

    /// Atomically decrements the numeric entry under `key`. See
    /// [`increment`](Self::increment).
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Deserialization`] when the stored bytes are
    /// corrupt.
    pub fn decrement(&self, key: &str, amount: i64, options: &CacheOptions) -> Result<Option<i64>, BackendError> {
        self.increment(key, -amount, options)
    }

    fn prune_target(&self) -> usize {
        self.max_size * PRUNE_TARGET_NUMERATOR / PRUNE_TARGET_DENOMINATOR
    }
}

impl Default for BoundedMemoryStore {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl CacheBackend for BoundedMemoryStore {
    fn read_entry(&self, key: &str, _options: &CacheOptions) -> Result<Option<CacheEntry>, BackendError> {
        let payload = {
            let mut state = self.state.lock();
            match state.entries.get(key).cloned() {
                Some(payload) => {
                    state.touch(key);
                    payload
                }
                None => {
                    // Drop stale recency bookkeeping for keys that are gone.
                    state.key_access.remove(key);
                    return Ok(None);
                }
            }
        };
        Ok(self.codec.load(payload)?)
    }

    fn write_entry(&self, key: &str, entry: CacheEntry, options: &CacheOptions) -> Result<bool, BackendError> {
        let payload = self
            .codec
            .dump_with_threshold(&entry, options.effective_compress_threshold())?;

        let needs_prune = {
            let mut state = self.state.lock();
            if options.unless_exist_enabled() && state.entries.contains_key(key) {
                return Ok(false);
            }
            state.insert(key, payload);
            state.cache_size > self.max_size
        };

        // Prune after the write completes so a single write is never rejected
        // for fullness.
        if needs_prune {
            self.prune(self.prune_target(), None);
        }
        Ok(true)
    }

    fn delete_entry(&self, key: &str, _options: &CacheOptions) -> Result<bool, BackendError> {
        Ok(self.state.lock().remove(key).is_some())
    }

    fn clear(&self) -> Result<bool, BackendError> {
        let mut state = self.state.lock();
        state.entries.clear();
        state.key_access.clear();
        state.cache_size = 0;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cached_size_includes_key_payload_and_overhead() {
        let payload = Bytes::from_static(b"0123456789");
        assert_eq!(cached_size("key", &payload), 3 + 10 + PER_ENTRY_OVERHEAD);
    }

    #[test]
    fn overwriting_a_key_does_not_double_count() {
        let store = BoundedMemoryStore::builder().clock(Clock::new_frozen()).build();
        let options = CacheOptions::new();

        store
            .write_entry("k", CacheEntry::new(CacheValue::from("aaaa")), &options)
            .unwrap();
        let first = store.cache_size();
        store
            .write_entry("k", CacheEntry::new(CacheValue::from("bbbb")), &options)
            .unwrap();
        assert_eq!(store.cache_size(), first);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn reentrant_prune_requests_noop() {
        let store = BoundedMemoryStore::builder().clock(Clock::new_frozen()).build();
        let options = CacheOptions::new();
        store
            .write_entry("k", CacheEntry::new(CacheValue::from("v")), &options)
            .unwrap();

        // Simulate a prune already in flight; the entry must survive.
        store.pruning.store(true, Ordering::Release);
        store.prune(0, None);
        assert_eq!(store.len(), 1);

        store.pruning.store(false, Ordering::Release);
        store.prune(0, None);
        assert_eq!(store.len(), 0);
    }
}
