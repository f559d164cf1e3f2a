// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! A multi-tier backend that promotes hits toward the fastest tier.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use strata_backend::{BackendError, CacheBackend, CacheEntry, CacheOptions, Clock};

/// One layer of a [`TieredStore`]: a backend plus the default options it
/// contributes to the composite.
pub struct Tier {
    backend: Arc<dyn CacheBackend>,
    defaults: CacheOptions,
}

impl Tier {
    /// Wraps a backend with no tier-level defaults.
    #[must_use]
    pub fn new(backend: impl CacheBackend + 'static) -> Self {
        Self::with_defaults(backend, CacheOptions::new())
    }

    /// Wraps a backend together with the defaults it contributes.
    #[must_use]
    pub fn with_defaults(backend: impl CacheBackend + 'static, defaults: CacheOptions) -> Self {
        Self {
            backend: Arc::new(backend),
            defaults,
        }
    }
}

impl std::fmt::Debug for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tier").field("defaults", &self.defaults).finish_non_exhaustive()
    }
}

/// A backend composed of an ordered list of tiers, fastest first.
///
/// Reads walk the tiers in order and stop at the first hit; a fresh hit
/// found in a slower tier is *promoted*, i.e. copied into every faster
/// tier, so subsequent reads resolve near the front. Writes and clears
/// broadcast to every tier and succeed only if every tier succeeded;
/// deletes broadcast and succeed if any tier held the entry.
///
/// An unavailable tier is skipped: a read falls through to the next tier
/// and a write counts the tier as failed without aborting the broadcast.
/// Corrupt payloads propagate, as everywhere.
///
/// # Examples
///
/// ```
/// use strata::{BoundedMemoryStore, Tier, TieredStore};
/// use strata_backend::{CacheBackend, CacheEntry, CacheOptions, CacheValue, Clock};
///
/// let clock = Clock::new();
/// let fast = BoundedMemoryStore::builder().max_size(1024 * 1024).clock(clock.clone()).build();
/// let big = BoundedMemoryStore::builder().max_size(64 * 1024 * 1024).clock(clock.clone()).build();
/// let store = TieredStore::new(vec![Tier::new(fast), Tier::new(big)], clock);
///
/// let options = CacheOptions::new();
/// store.write_entry("k", CacheEntry::new(CacheValue::from("v")), &options).unwrap();
/// assert!(store.read_entry("k", &options).unwrap().is_some());
/// ```
pub struct TieredStore {
    tiers: Vec<Tier>,
    inherited_defaults: CacheOptions,
    clock: Clock,
    // Serializes promotions so a burst of reads on one slow-tier hit does
    // not write the same entry into the fast tiers many times over.
    promotion: Mutex<()>,
}

impl TieredStore {
    /// Composes the given tiers, fastest first.
    #[must_use]
    pub fn new(tiers: Vec<Tier>, clock: Clock) -> Self {
        // Fold back to front so earlier tiers win field by field.
        let inherited_defaults = tiers
            .iter()
            .rev()
            .fold(CacheOptions::new(), |acc, tier| acc.merge(&tier.defaults));
        Self {
            tiers,
            inherited_defaults,
            clock,
            promotion: Mutex::new(()),
        }
    }

    /// The defaults the tiers contribute to a store built on this backend,
    /// resolved with earlier tiers winning.
    #[must_use]
    pub fn inherited_defaults(&self) -> &CacheOptions {
        &self.inherited_defaults
    }

    /// The number of tiers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    /// Returns `true` when the store has no tiers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    /// Copies an entry found in tier `found_at` into every faster tier.
    fn promote(&self, key: &str, entry: &CacheEntry, found_at: usize, options: &CacheOptions) {
        let _guard = self.promotion.lock();
        for (index, tier) in self.tiers[..found_at].iter().enumerate() {
            if let Err(error) = tier.backend.write_entry(key, entry.clone(), options) {
                warn!(key, tier = index, %error, "promotion write failed");
            }
        }
    }
}

impl std::fmt::Debug for TieredStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieredStore")
            .field("tiers", &self.tiers.len())
            .field("inherited_defaults", &self.inherited_defaults)
            .finish_non_exhaustive()
    }
}

impl CacheBackend for TieredStore {
    fn read_entry(&self, key: &str, options: &CacheOptions) -> Result<Option<CacheEntry>, BackendError> {
        for (index, tier) in self.tiers.iter().enumerate() {
            let entry = match tier.backend.read_entry(key, options) {
                Ok(entry) => entry,
                Err(BackendError::Unavailable(reason)) => {
                    warn!(key, tier = index, %reason, "tier read failed; falling through");
                    continue;
                }
                Err(error) => return Err(error),
            };
            if let Some(entry) = entry {
                // Never spread an entry that is already dead.
                if index > 0 && !entry.expired(self.clock.now()) {
                    self.promote(key, &entry, index, options);
                }
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    fn write_entry(&self, key: &str, entry: CacheEntry, options: &CacheOptions) -> Result<bool, BackendError> {
        let mut all_written = !self.tiers.is_empty();
        for (index, tier) in self.tiers.iter().enumerate() {
            match tier.backend.write_entry(key, entry.clone(), options) {
                Ok(written) => all_written &= written,
                Err(error) => {
                    warn!(key, tier = index, %error, "tier write failed");
                    all_written = false;
                }
            }
        }
        Ok(all_written)
    }

    fn delete_entry(&self, key: &str, options: &CacheOptions) -> Result<bool, BackendError> {
        let mut any_deleted = false;
        for (index, tier) in self.tiers.iter().enumerate() {
            match tier.backend.delete_entry(key, options) {
                Ok(deleted) => any_deleted |= deleted,
                Err(error) => {
                    warn!(key, tier = index, %error, "tier delete failed");
                }
            }
        }
        Ok(any_deleted)
    }

    fn read_multi_entries(
        &self,
        keys: &[String],
        options: &CacheOptions,
    ) -> Result<HashMap<String, CacheEntry>, BackendError> {
        let mut found: HashMap<String, CacheEntry> = HashMap::with_capacity(keys.len());
        let mut remaining: Vec<String> = keys.to_vec();

        for (index, tier) in self.tiers.iter().enumerate() {
            if remaining.is_empty() {
                break;
            }
            let entries = match tier.backend.read_multi_entries(&remaining, options) {
                Ok(entries) => entries,
                Err(BackendError::Unavailable(reason)) => {
                    warn!(tier = index, %reason, "tier multi-read failed; falling through");
                    continue;
                }
                Err(error) => return Err(error),
            };
            let now = self.clock.now();
            for (key, entry) in entries {
                if index > 0 && !entry.expired(now) {
                    self.promote(&key, &entry, index, options);
                }
                found.insert(key, entry);
            }
            remaining.retain(|key| !found.contains_key(key));
        }
        Ok(found)
    }

    fn write_multi_entries(
        &self,
        entries: Vec<(String, CacheEntry)>,
        options: &CacheOptions,
    ) -> Result<bool, BackendError> {
        let mut all_written = !self.tiers.is_empty();
        for (index, tier) in self.tiers.iter().enumerate() {
            match tier.backend.write_multi_entries(entries.clone(), options) {
                Ok(written) => all_written &= written,
                Err(error) => {
                    warn!(tier = index, %error, "tier multi-write failed");
                    all_written = false;
                }
            }
        }
        Ok(all_written)
    }

    fn clear(&self) -> Result<bool, BackendError> {
        let mut all_cleared = !self.tiers.is_empty();
        for (index, tier) in self.tiers.iter().enumerate() {
            match tier.backend.clear() {
                Ok(cleared) => all_cleared &= cleared,
                Err(error) => {
                    warn!(tier = index, %error, "tier clear failed");
                    all_cleared = false;
                }
            }
        }
        Ok(all_cleared)
    }
}
