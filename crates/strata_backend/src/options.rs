// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Per-call cache configuration.

use std::time::Duration;

/// Payloads at or above this many bytes are considered for compression
/// unless a call or store says otherwise.
pub const DEFAULT_COMPRESS_THRESHOLD: usize = 1024;

/// Options resolved for a single cache call.
///
/// Every field is optional so a call site's options can be merged over a
/// store's defaults, field by field, with the call site winning. Accessors
/// supply the documented defaults for fields left unset on both sides.
///
/// The struct is configured once (at store construction for defaults, at the
/// call site for overrides) and never mutated by the store.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use strata_backend::CacheOptions;
///
/// let defaults = CacheOptions::new()
///     .namespace("app")
///     .expires_in(Duration::from_secs(300));
/// let call = CacheOptions::new().expires_in(Duration::from_secs(5));
///
/// let resolved = defaults.merge(&call);
/// assert_eq!(resolved.expires_in, Some(Duration::from_secs(5)));
/// assert_eq!(resolved.namespace.as_deref(), Some("app"));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheOptions {
    /// Relative time-to-live applied to written entries.
    pub expires_in: Option<Duration>,
    /// Version tag written into entries and checked on read.
    pub version: Option<String>,
    /// Grace window during which a just-expired entry is still served while
    /// one caller recomputes it.
    pub race_condition_ttl: Option<Duration>,
    /// Whether payloads may be compressed at all. Defaults to on.
    pub compress: Option<bool>,
    /// Byte-size threshold at which compression is attempted.
    pub compress_threshold: Option<usize>,
    /// Key prefix isolating this cache's keys within a shared backend.
    pub namespace: Option<String>,
    /// Bypass the cached entry and recompute unconditionally.
    pub force: Option<bool>,
    /// Do not cache a null result from the fetch closure.
    pub skip_nil: Option<bool>,
    /// Make writes a no-op when the key already holds an entry.
    pub unless_exist: Option<bool>,
}

impl CacheOptions {
    /// Creates an empty option set; unset fields defer to store defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the relative expiry for written entries.
    #[must_use]
    pub fn expires_in(mut self, ttl: Duration) -> Self {
        self.expires_in = Some(ttl);
        self
    }

    /// Sets the version tag.
    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Sets the race-condition grace window.
    #[must_use]
    pub fn race_condition_ttl(mut self, ttl: Duration) -> Self {
        self.race_condition_ttl = Some(ttl);
        self
    }

    /// Enables or disables compression.
    #[must_use]
    pub fn compress(mut self, compress: bool) -> Self {
        self.compress = Some(compress);
        self
    }

    /// Sets the compression threshold in bytes.
    #[must_use]
    pub fn compress_threshold(mut self, threshold: usize) -> Self {
        self.compress_threshold = Some(threshold);
        self
    }

    /// Sets the key namespace.
    #[must_use]
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Forces recomputation on fetch.
    #[must_use]
    pub fn force(mut self, force: bool) -> Self {
        self.force = Some(force);
        self
    }

    /// Suppresses caching of null fetch results.
    #[must_use]
    pub fn skip_nil(mut self, skip_nil: bool) -> Self {
        self.skip_nil = Some(skip_nil);
        self
    }

    /// Makes writes conditional on the key being absent.
    #[must_use]
    pub fn unless_exist(mut self, unless_exist: bool) -> Self {
        self.unless_exist = Some(unless_exist);
        self
    }

    /// Merges `call` over `self`, field by field; set fields in `call` win.
    #[must_use]
    pub fn merge(&self, call: &Self) -> Self {
        Self {
            expires_in: call.expires_in.or(self.expires_in),
            version: call.version.clone().or_else(|| self.version.clone()),
            race_condition_ttl: call.race_condition_ttl.or(self.race_condition_ttl),
            compress: call.compress.or(self.compress),
            compress_threshold: call.compress_threshold.or(self.compress_threshold),
            namespace: call.namespace.clone().or_else(|| self.namespace.clone()),
            force: call.force.or(self.force),
            skip_nil: call.skip_nil.or(self.skip_nil),
            unless_exist: call.unless_exist.or(self.unless_exist),
        }
    }

    /// Whether compression is enabled (defaults to on).
    #[must_use]
    pub fn compress_enabled(&self) -> bool {
        self.compress.unwrap_or(true)
    }

    /// The effective compression threshold:
    /// `None` when compression is disabled, otherwise the configured or
    /// default byte threshold.
    #[must_use]
    pub fn effective_compress_threshold(&self) -> Option<usize> {
        self.compress_enabled()
            .then(|| self.compress_threshold.unwrap_or(DEFAULT_COMPRESS_THRESHOLD))
    }

    /// Whether this call bypasses the cached entry.
    #[must_use]
    pub fn force_enabled(&self) -> bool {
        self.force.unwrap_or(false)
    }

    /// Whether null fetch results are left uncached.
    #[must_use]
    pub fn skip_nil_enabled(&self) -> bool {
        self.skip_nil.unwrap_or(false)
    }

    /// Whether writes are conditional on absence.
    #[must_use]
    pub fn unless_exist_enabled(&self) -> bool {
        self.unless_exist.unwrap_or(false)
    }
}
