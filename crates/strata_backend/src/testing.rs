// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Mock backend for testing.
//!
//! This module provides [`MockBackend`], an in-memory backend that records
//! every operation and supports failure injection for exercising the store
//! layer's error paths.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::backend::CacheBackend;
use crate::entry::CacheEntry;
use crate::error::BackendError;
use crate::options::CacheOptions;

/// A recorded backend operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendOp {
    /// A single-key read with the given normalized key.
    Read(String),
    /// A single-key write with the given normalized key.
    Write(String),
    /// A single-key delete with the given normalized key.
    Delete(String),
    /// A batch read with the given normalized keys.
    ReadMulti(Vec<String>),
    /// A batch write with the given normalized keys.
    WriteMulti(Vec<String>),
    /// A clear of the whole backend.
    Clear,
}

type FailPredicate = Box<dyn Fn(&BackendOp) -> bool + Send + Sync>;

/// A configurable mock backend.
///
/// Stores entries in a plain map, records every operation for later
/// verification, and can be told to fail operations matching a predicate.
/// Clones share state, so a test can keep a handle for inspection while the
/// store under test owns another.
///
/// # Examples
///
/// ```
/// use strata_backend::testing::{BackendOp, MockBackend};
/// use strata_backend::{CacheBackend, CacheEntry, CacheOptions, CacheValue};
///
/// let backend = MockBackend::new();
/// let options = CacheOptions::new();
///
/// backend.write_entry("key", CacheEntry::new(CacheValue::from("v")), &options).unwrap();
/// assert!(backend.read_entry("key", &options).unwrap().is_some());
/// assert_eq!(
///     backend.operations(),
///     vec![BackendOp::Write("key".into()), BackendOp::Read("key".into())],
/// );
///
/// // Fail all further reads.
/// backend.fail_when(|op| matches!(op, BackendOp::Read(_)));
/// assert!(backend.read_entry("key", &options).is_err());
/// ```
#[derive(Clone, Default)]
pub struct MockBackend {
    data: Arc<Mutex<HashMap<String, CacheEntry>>>,
    operations: Arc<Mutex<Vec<BackendOp>>>,
    fail_when: Arc<Mutex<Option<FailPredicate>>>,
}

impl std::fmt::Debug for MockBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockBackend")
            .field("len", &self.data.lock().len())
            .field("operations", &self.operations.lock().len())
            .field("fail_when", &self.fail_when.lock().is_some())
            .finish()
    }
}

impl MockBackend {
    /// Creates a new empty mock backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures operations matching the predicate to fail with
    /// [`BackendError::Unavailable`]. Replaces any previous predicate.
    pub fn fail_when<F>(&self, predicate: F)
    where
        F: Fn(&BackendOp) -> bool + Send + Sync + 'static,
    {
        *self.fail_when.lock() = Some(Box::new(predicate));
    }

    /// Removes any configured failure predicate.
    pub fn fail_never(&self) {
        *self.fail_when.lock() = None;
    }

    /// Returns every operation performed so far, including failed ones.
    #[must_use]
    pub fn operations(&self) -> Vec<BackendOp> {
        self.operations.lock().clone()
    }

    /// Returns how many entries the backend currently holds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.lock().len()
    }

    /// Returns `true` when the backend holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.lock().is_empty()
    }

    /// Looks up an entry without recording the access.
    #[must_use]
    pub fn peek(&self, key: &str) -> Option<CacheEntry> {
        self.data.lock().get(key).cloned()
    }

    fn record(&self, op: BackendOp) -> Result<(), BackendError> {
        self.operations.lock().push(op.clone());
        let should_fail = self.fail_when.lock().as_ref().is_some_and(|f| f(&op));
        if should_fail {
            return Err(BackendError::unavailable("injected failure"));
        }
        Ok(())
    }
}

impl CacheBackend for MockBackend {
    fn read_entry(&self, key: &str, _options: &CacheOptions) -> Result<Option<CacheEntry>, BackendError> {
        self.record(BackendOp::Read(key.to_owned()))?;
        Ok(self.data.lock().get(key).cloned())
    }

    fn write_entry(&self, key: &str, entry: CacheEntry, options: &CacheOptions) -> Result<bool, BackendError> {
        self.record(BackendOp::Write(key.to_owned()))?;
        let mut data = self.data.lock();
        if options.unless_exist_enabled() && data.contains_key(key) {
            return Ok(false);
        }
        data.insert(key.to_owned(), entry);
        Ok(true)
    }

    fn delete_entry(&self, key: &str, _options: &CacheOptions) -> Result<bool, BackendError> {
        self.record(BackendOp::Delete(key.to_owned()))?;
        Ok(self.data.lock().remove(key).is_some())
    }

    fn read_multi_entries(
        &self,
        keys: &[String],
        _options: &CacheOptions,
    ) -> Result<HashMap<String, CacheEntry>, BackendError> {
        self.record(BackendOp::ReadMulti(keys.to_vec()))?;
        let data = self.data.lock();
        Ok(keys
            .iter()
            .filter_map(|key| data.get(key).map(|entry| (key.clone(), entry.clone())))
            .collect())
    }

    fn write_multi_entries(
        &self,
        entries: Vec<(String, CacheEntry)>,
        options: &CacheOptions,
    ) -> Result<bool, BackendError> {
        self.record(BackendOp::WriteMulti(entries.iter().map(|(k, _)| k.clone()).collect()))?;
        let mut data = self.data.lock();
        let mut all_written = true;
        for (key, entry) in entries {
            if options.unless_exist_enabled() && data.contains_key(&key) {
                all_written = false;
                continue;
            }
            data.insert(key, entry);
        }
        Ok(all_written)
    }

    fn clear(&self) -> Result<bool, BackendError> {
        self.record(BackendOp::Clear)?;
        self.data.lock().clear();
        Ok(true)
    }
}
