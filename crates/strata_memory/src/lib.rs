// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Byte-budgeted in-process storage for the strata cache engine.
//!
//! [`BoundedMemoryStore`] holds codec-encoded entries in a process-local
//! table bounded by a byte budget, evicting least-recently-accessed entries
//! when the budget is exceeded. It implements
//! [`strata_backend::CacheBackend`] and is the usual fastest tier of a
//! multi-tier cache.

mod builder;
mod store;

#[doc(inline)]
pub use builder::{BoundedMemoryStoreBuilder, DEFAULT_MAX_SIZE};
#[doc(inline)]
pub use store::{BoundedMemoryStore, PER_ENTRY_OVERHEAD};
