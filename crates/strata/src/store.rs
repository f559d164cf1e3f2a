// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The store layer: the uniform cache protocol over any backend.

use std::collections::HashMap;

use tracing::warn;

use strata_backend::{
    BackendError, CacheBackend, CacheEntry, CacheOptions, CacheValue, Clock, DeserializationError,
};

use crate::builder::CacheStoreBuilder;

/// A cache store wrapping a [`CacheBackend`] with the uniform protocol:
/// option resolution, key namespacing, expiration and version checks, the
/// fetch read-through, and counter adjustment.
///
/// The store is the intended application-facing surface. It resolves each
/// call's options by merging the call site over the store defaults, prefixes
/// keys with the resolved namespace, and keeps the backend honest about
/// freshness: an expired or version-mismatched entry is never served, no
/// matter what the backend returned.
///
/// Backend *unavailability* is absorbed here rather than surfaced: a failed
/// read behaves as a miss and a failed write reports `false`, so a flaky
/// backend degrades a cache to slow, not broken. Payload *corruption* is the
/// opposite case and propagates as [`DeserializationError`].
///
/// # Examples
///
/// ```
/// use strata::{CacheStore, CacheValue, Clock};
/// use strata_backend::CacheOptions;
///
/// let store = CacheStore::builder(Clock::new()).memory().build();
/// let options = CacheOptions::new();
///
/// let value = store.fetch("answer", &options, || CacheValue::from(42)).unwrap();
/// assert_eq!(value.as_i64(), Some(42));
/// assert_eq!(store.read("answer", &options).unwrap(), Some(CacheValue::from(42)));
/// ```
#[derive(Debug)]
pub struct CacheStore<B> {
    backend: B,
    defaults: CacheOptions,
    clock: Clock,
}

impl CacheStore<()> {
    /// Creates a builder for configuring a store.
    #[must_use]
    pub fn builder(clock: Clock) -> CacheStoreBuilder<()> {
        CacheStoreBuilder::new(clock)
    }
}

impl<B: CacheBackend> CacheStore<B> {
    pub(crate) fn from_parts(backend: B, defaults: CacheOptions, clock: Clock) -> Self {
        Self { backend, defaults, clock }
    }

    /// The wrapped backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The store's default options, applied beneath every call's options.
    pub fn defaults(&self) -> &CacheOptions {
        &self.defaults
    }

    /// The clock the store consults for expiration.
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Reads the value under `key`, or computes, caches, and returns it.
    ///
    /// A hit requires a stored entry that is neither expired nor
    /// version-mismatched. On a miss `compute` runs, its result is written
    /// back (unless the result is null and `skip_nil` is set), and the result
    /// is returned. With `force` set the cached entry is ignored and
    /// `compute` always runs.
    ///
    /// When `race_condition_ttl` is set and the stored entry expired within
    /// that grace window, this caller briefly extends the stale entry's life
    /// before recomputing, so concurrent readers keep getting the stale value
    /// instead of dog-piling onto the computation.
    ///
    /// # Errors
    ///
    /// Returns [`DeserializationError`] when the stored payload is corrupt.
    pub fn fetch<F>(&self, key: &str, options: &CacheOptions, compute: F) -> Result<CacheValue, DeserializationError>
    where
        F: FnOnce() -> CacheValue,
    {
        let options = self.defaults.merge(options);
        let key = normalize_key(key, &options);

        if !options.force_enabled() {
            if let Some(entry) = self.read_fresh_entry(&key, &options)? {
                return entry.into_value();
            }
        }

        let value = compute();
        if !(value.is_null() && options.skip_nil_enabled()) {
            self.write_resolved(&key, value.clone(), &options);
        }
        Ok(value)
    }

    /// Reads the value under `key`, returning `None` on a miss, an expired
    /// entry, or a version mismatch.
    ///
    /// # Errors
    ///
    /// Returns [`DeserializationError`] when the stored payload is corrupt.
    pub fn read(&self, key: &str, options: &CacheOptions) -> Result<Option<CacheValue>, DeserializationError> {
        let options = self.defaults.merge(options);
        let key = normalize_key(key, &options);

        match self.read_entry_or_miss(&key, &options)? {
            Some(entry) if !entry.expired(self.clock.now()) && !entry.mismatched(options.version.as_deref()) => {
                entry.into_value().map(Some)
            }
            _ => Ok(None),
        }
    }

    /// Writes `value` under `key`, returning whether the backend accepted
    /// the write. A backend failure reports `false` rather than erroring.
    pub fn write(&self, key: &str, value: CacheValue, options: &CacheOptions) -> bool {
        let options = self.defaults.merge(options);
        let key = normalize_key(key, &options);
        self.write_resolved(&key, value, &options)
    }

    /// Deletes the entry under `key`, returning whether an entry was
    /// present. A backend failure reports `false`.
    pub fn delete(&self, key: &str, options: &CacheOptions) -> bool {
        let options = self.defaults.merge(options);
        let key = normalize_key(key, &options);
        match self.backend.delete_entry(&key, &options) {
            Ok(deleted) => deleted,
            Err(error) => {
                warn!(key, %error, "cache delete failed");
                false
            }
        }
    }

    /// Returns whether a fresh, version-matching entry exists under `key`.
    ///
    /// The check never materializes the stored value, so it is cheap even
    /// for large compressed entries.
    ///
    /// # Errors
    ///
    /// Returns [`DeserializationError`] when the stored payload is corrupt.
    pub fn exist(&self, key: &str, options: &CacheOptions) -> Result<bool, DeserializationError> {
        let options = self.defaults.merge(options);
        let key = normalize_key(key, &options);
        Ok(match self.read_entry_or_miss(&key, &options)? {
            Some(entry) => !entry.expired(self.clock.now()) && !entry.mismatched(options.version.as_deref()),
            None => false,
        })
    }

    /// Reads many keys at once, returning the values found fresh, keyed by
    /// the caller's original (un-namespaced) keys.
    ///
    /// # Errors
    ///
    /// Returns [`DeserializationError`] when any stored payload is corrupt.
    pub fn read_multi(
        &self,
        keys: &[&str],
        options: &CacheOptions,
    ) -> Result<HashMap<String, CacheValue>, DeserializationError> {
        let options = self.defaults.merge(options);
        let normalized: Vec<String> = keys.iter().map(|key| normalize_key(key, &options)).collect();

        let entries = match self.backend.read_multi_entries(&normalized, &options) {
            Ok(entries) => entries,
            Err(BackendError::Unavailable(reason)) => {
                warn!(%reason, "cache multi-read failed; treating as all-miss");
                return Ok(HashMap::new());
            }
            Err(BackendError::Deserialization(error)) => return Err(error),
        };

        let now = self.clock.now();
        let mut values = HashMap::with_capacity(entries.len());
        for (original, normalized) in keys.iter().zip(&normalized) {
            let Some(entry) = entries.get(normalized) else { continue };
            if entry.expired(now) || entry.mismatched(options.version.as_deref()) {
                continue;
            }
            values.insert((*original).to_owned(), entry.clone().into_value()?);
        }
        Ok(values)
    }

    /// Writes many key-value pairs at once. Returns `true` only if every
    /// write was accepted; a backend failure reports `false`.
    pub fn write_multi(&self, pairs: Vec<(String, CacheValue)>, options: &CacheOptions) -> bool {
        let options = self.defaults.merge(options);
        let entries: Vec<(String, CacheEntry)> = pairs
            .into_iter()
            .map(|(key, value)| (normalize_key(&key, &options), self.new_entry(value, &options)))
            .collect();

        match self.backend.write_multi_entries(entries, &options) {
            Ok(all_written) => all_written,
            Err(error) => {
                warn!(%error, "cache multi-write failed");
                false
            }
        }
    }

    /// Adds `amount` to the numeric counter under `key`, initializing an
    /// absent (or expired) key to `amount`, and returns the new value.
    ///
    /// Counters are stored as raw decimal text, uncompressed and unversioned,
    /// so backends with native arithmetic can operate on them in place. This
    /// default implementation is read-adjust-rewrite and therefore not atomic
    /// across concurrent callers; backends offering atomic counters should be
    /// used directly where that matters.
    ///
    /// Returns `None` when the key holds a non-numeric value or the backend
    /// fails.
    pub fn increment(&self, key: &str, amount: i64, options: &CacheOptions) -> Option<i64> {
        let options = self.defaults.merge(options);
        let key = normalize_key(key, &options);

        let current = match self.read_entry_or_miss(&key, &options) {
            Ok(Some(entry)) if !entry.expired(self.clock.now()) => match entry.into_value() {
                Ok(value) => Some(value.as_i64()?),
                Err(error) => {
                    warn!(key, %error, "counter entry is corrupt; treating as missing");
                    None
                }
            },
            _ => None,
        };

        let next = current.unwrap_or(0) + amount;
        let counter_options = options.clone().compress(false);
        let mut entry = CacheEntry::new(CacheValue::Text(next.to_string()));
        entry.set_expires_at(self.expires_at(&options));
        match self.backend.write_entry(&key, entry, &counter_options) {
            Ok(_) => Some(next),
            Err(error) => {
                warn!(key, %error, "counter write failed");
                None
            }
        }
    }

    /// Subtracts `amount` from the numeric counter under `key`. See
    /// [`increment`](Self::increment).
    pub fn decrement(&self, key: &str, amount: i64, options: &CacheOptions) -> Option<i64> {
        self.increment(key, -amount, options)
    }

    /// Removes every entry from the backend. A backend failure reports
    /// `false`.
    pub fn clear(&self) -> bool {
        match self.backend.clear() {
            Ok(cleared) => cleared,
            Err(error) => {
                warn!(%error, "cache clear failed");
                false
            }
        }
    }

    /// Reads an entry, mapping backend unavailability to a miss. Corruption
    /// still propagates.
    fn read_entry_or_miss(
        &self,
        key: &str,
        options: &CacheOptions,
    ) -> Result<Option<CacheEntry>, DeserializationError> {
        match self.backend.read_entry(key, options) {
            Ok(entry) => Ok(entry),
            Err(BackendError::Unavailable(reason)) => {
                warn!(key, %reason, "cache read failed; treating as miss");
                Ok(None)
            }
            Err(BackendError::Deserialization(error)) => Err(error),
        }
    }

    /// The fetch read path: returns an entry only when it can be served
    /// as-is. Expired entries are handed to the race-condition protocol.
    fn read_fresh_entry(
        &self,
        key: &str,
        options: &CacheOptions,
    ) -> Result<Option<CacheEntry>, DeserializationError> {
        let Some(entry) = self.read_entry_or_miss(key, options)? else {
            return Ok(None);
        };
        if entry.expired(self.clock.now()) {
            self.handle_expired_entry(entry, key, options);
            return Ok(None);
        }
        if entry.mismatched(options.version.as_deref()) {
            return Ok(None);
        }
        Ok(Some(entry))
    }

    /// Implements the race-condition grace window for fetch.
    ///
    /// When the entry expired within `race_condition_ttl`, its stored expiry
    /// is pushed `race_condition_ttl` past now and written back, so
    /// concurrent readers keep seeing the stale value while this caller (the
    /// first to observe the expiry) recomputes. Outside the window the dead
    /// entry is simply deleted.
    fn handle_expired_entry(&self, entry: CacheEntry, key: &str, options: &CacheOptions) {
        let now = self.clock.now();
        if let (Some(race_ttl), Some(expires_at)) = (options.race_condition_ttl, entry.expires_at()) {
            let grace = race_ttl.as_secs_f64();
            if now - expires_at <= grace {
                let mut stale = entry;
                stale.set_expires_at(Some(now + grace));
                if let Err(error) = self.backend.write_entry(key, stale, options) {
                    warn!(key, %error, "failed to extend stale entry for grace window");
                }
                return;
            }
        }
        if let Err(error) = self.backend.delete_entry(key, options) {
            warn!(key, %error, "failed to delete expired entry");
        }
    }

    fn write_resolved(&self, key: &str, value: CacheValue, options: &CacheOptions) -> bool {
        let entry = self.new_entry(value, options);
        match self.backend.write_entry(key, entry, options) {
            Ok(written) => written,
            Err(error) => {
                warn!(key, %error, "cache write failed");
                false
            }
        }
    }

    fn new_entry(&self, value: CacheValue, options: &CacheOptions) -> CacheEntry {
        let mut entry = CacheEntry::new(value).versioned(options.version.clone());
        entry.set_expires_at(self.expires_at(options));
        entry
    }

    fn expires_at(&self, options: &CacheOptions) -> Option<f64> {
        options.expires_in.map(|ttl| self.clock.now() + ttl.as_secs_f64())
    }
}

/// Applies the resolved namespace, if any, as a `namespace:key` prefix.
fn normalize_key(key: &str, options: &CacheOptions) -> String {
    match options.namespace.as_deref() {
        Some(namespace) => format!("{namespace}:{key}"),
        None => key.to_owned(),
    }
}
