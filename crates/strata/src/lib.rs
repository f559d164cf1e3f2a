// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! A composable tiered cache store with a versioned binary entry codec.
//!
//! `strata` layers a uniform cache protocol (read-through fetch, option
//! resolution, key namespacing, expiration, version checks, and counters)
//! over any storage backend implementing
//! [`CacheBackend`](strata_backend::CacheBackend). Backends can be composed
//! into a [`TieredStore`] that reads fastest-first and promotes hits toward
//! the front.
//!
//! The companion crates divide the work:
//!
//! - `strata_backend`: the backend trait, entries, values, options, errors,
//!   and the test clock.
//! - `strata_codec`: the binary wire codec with lazy deserialization and
//!   transparent compression.
//! - `strata_memory`: a byte-budgeted in-process backend, the usual fastest
//!   tier.
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//! use strata::{CacheStore, CacheValue, Clock};
//! use strata_backend::CacheOptions;
//!
//! let store = CacheStore::builder(Clock::new())
//!     .memory()
//!     .defaults(CacheOptions::new().expires_in(Duration::from_secs(300)))
//!     .build();
//!
//! let options = CacheOptions::new();
//! let value = store.fetch("user:42", &options, || CacheValue::from("loaded")).unwrap();
//! assert_eq!(value, CacheValue::from("loaded"));
//!
//! // The second fetch is a hit; the closure does not run.
//! let value = store.fetch("user:42", &options, || unreachable!()).unwrap();
//! assert_eq!(value, CacheValue::from("loaded"));
//! ```

mod builder;
mod store;
mod tiered;

#[doc(inline)]
pub use builder::CacheStoreBuilder;
#[doc(inline)]
pub use store::CacheStore;
#[doc(inline)]
pub use tiered::{Tier, TieredStore};

pub use strata_backend::{
    BackendError, CacheBackend, CacheEntry, CacheOptions, CacheValue, Clock, DeserializationError,
};
pub use strata_codec::{Codec, CodecConfig};
#[cfg(feature = "memory")]
pub use strata_memory::BoundedMemoryStore;
