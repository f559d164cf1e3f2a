// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Builder for configuring a [`CacheStore`].

use strata_backend::{CacheBackend, CacheOptions, Clock};

use crate::store::CacheStore;
use crate::tiered::{Tier, TieredStore};

/// Builder for [`CacheStore`].
///
/// The builder is created with a clock, pointed at a backend, given default
/// options, and built. The backend choice changes the builder's type
/// parameter, so `build` is only available once a backend is present.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use strata::{CacheStore, Clock};
/// use strata_backend::CacheOptions;
///
/// let store = CacheStore::builder(Clock::new())
///     .memory()
///     .defaults(CacheOptions::new().namespace("app").expires_in(Duration::from_secs(300)))
///     .build();
/// assert_eq!(store.defaults().namespace.as_deref(), Some("app"));
/// ```
#[derive(Debug)]
pub struct CacheStoreBuilder<B> {
    backend: B,
    defaults: CacheOptions,
    clock: Clock,
}

impl CacheStoreBuilder<()> {
    pub(crate) fn new(clock: Clock) -> Self {
        Self {
            backend: (),
            defaults: CacheOptions::new(),
            clock,
        }
    }

    /// Uses the given backend.
    #[must_use]
    pub fn backend<B: CacheBackend>(self, backend: B) -> CacheStoreBuilder<B> {
        CacheStoreBuilder {
            backend,
            defaults: self.defaults,
            clock: self.clock,
        }
    }

    /// Uses an in-process bounded memory store with its default budget,
    /// sharing the builder's clock.
    #[cfg(feature = "memory")]
    #[must_use]
    pub fn memory(self) -> CacheStoreBuilder<strata_memory::BoundedMemoryStore> {
        let store = strata_memory::BoundedMemoryStore::builder().clock(self.clock.clone()).build();
        self.backend(store)
    }

    /// Uses a multi-tier backend composed of the given tiers, fastest first.
    ///
    /// Defaults declared on the tiers are inherited by the store, with
    /// earlier tiers winning field by field; defaults set on the builder
    /// afterwards win over both.
    #[must_use]
    pub fn tiered(self, tiers: Vec<Tier>) -> CacheStoreBuilder<TieredStore> {
        let store = TieredStore::new(tiers, self.clock.clone());
        let inherited = store.inherited_defaults().clone();
        let mut builder = self.backend(store);
        builder.defaults = inherited.merge(&builder.defaults);
        builder
    }
}

impl<B> CacheStoreBuilder<B> {
    /// Sets the store's default options, merged beneath every call's
    /// options. Merges over any defaults already present.
    #[must_use]
    pub fn defaults(mut self, defaults: CacheOptions) -> Self {
        self.defaults = self.defaults.merge(&defaults);
        self
    }
}

impl<B: CacheBackend> CacheStoreBuilder<B> {
    /// Builds the store.
    #[must_use]
    pub fn build(self) -> CacheStore<B> {
        CacheStore::from_parts(self.backend, self.defaults, self.clock)
    }
}
