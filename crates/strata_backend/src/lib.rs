// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Core backend abstractions for the strata cache engine.
//!
//! This crate defines the [`CacheBackend`] trait that all concrete cache
//! backends must satisfy, along with [`CacheEntry`] (the value+metadata unit
//! stored under one key, with lazy decode-time materialization),
//! [`CacheValue`] (the tagged payload union), [`CacheOptions`] (per-call
//! configuration merged over store defaults), the [`Clock`] time abstraction,
//! and the error taxonomy for fallible operations.
//!
//! # Overview
//!
//! The backend abstraction separates storage concerns from caching protocol.
//! Implement the four primitives of [`CacheBackend`] for your storage medium,
//! then use `strata` to layer on the uniform fetch/read/write protocol, key
//! normalization, option resolution, and multi-tier promotion.
//!
//! # Implementing a Backend
//!
//! ```
//! use std::collections::HashMap;
//! use parking_lot::RwLock;
//! use strata_backend::{BackendError, CacheBackend, CacheEntry, CacheOptions};
//!
//! #[derive(Default)]
//! struct SimpleBackend(RwLock<HashMap<String, CacheEntry>>);
//!
//! impl CacheBackend for SimpleBackend {
//!     fn read_entry(&self, key: &str, _: &CacheOptions) -> Result<Option<CacheEntry>, BackendError> {
//!         Ok(self.0.read().get(key).cloned())
//!     }
//!
//!     fn write_entry(&self, key: &str, entry: CacheEntry, _: &CacheOptions) -> Result<bool, BackendError> {
//!         self.0.write().insert(key.to_owned(), entry);
//!         Ok(true)
//!     }
//!
//!     fn delete_entry(&self, key: &str, _: &CacheOptions) -> Result<bool, BackendError> {
//!         Ok(self.0.write().remove(key).is_some())
//!     }
//!
//!     fn clear(&self) -> Result<bool, BackendError> {
//!         self.0.write().clear();
//!         Ok(true)
//!     }
//! }
//! ```

mod backend;
mod clock;
mod entry;
pub mod error;
mod options;
#[cfg(any(feature = "test-util", test))]
pub mod testing;
mod value;

#[doc(inline)]
pub use backend::CacheBackend;
#[doc(inline)]
pub use clock::Clock;
#[doc(inline)]
pub use entry::{CacheEntry, Deserializer, Inflater};
#[doc(inline)]
pub use error::{BackendError, DeserializationError};
#[doc(inline)]
pub use options::{CacheOptions, DEFAULT_COMPRESS_THRESHOLD};
#[doc(inline)]
pub use value::CacheValue;
