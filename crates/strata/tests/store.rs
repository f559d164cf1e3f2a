// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Public API tests for the store protocol over a mock backend.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;

use strata::{CacheStore, CacheValue, Clock};
use strata_backend::testing::{BackendOp, MockBackend};
use strata_backend::{CacheBackend, CacheEntry, CacheOptions, DeserializationError};

fn store_over(backend: MockBackend, clock: Clock) -> CacheStore<MockBackend> {
    CacheStore::builder(clock).backend(backend).build()
}

#[test]
fn fetch_computes_once_then_hits() {
    let store = store_over(MockBackend::new(), Clock::new_frozen());
    let options = CacheOptions::new();

    let first = store.fetch("k", &options, || CacheValue::from("computed")).unwrap();
    assert_eq!(first, CacheValue::from("computed"));

    let second = store.fetch("k", &options, || unreachable!()).unwrap();
    assert_eq!(second, CacheValue::from("computed"));
}

#[test]
fn force_bypasses_the_cached_entry() {
    let store = store_over(MockBackend::new(), Clock::new_frozen());
    let options = CacheOptions::new();

    store.write("k", CacheValue::from("old"), &options);
    let forced = CacheOptions::new().force(true);
    let value = store.fetch("k", &forced, || CacheValue::from("new")).unwrap();
    assert_eq!(value, CacheValue::from("new"));
    assert_eq!(store.read("k", &options).unwrap(), Some(CacheValue::from("new")));
}

#[test]
fn skip_nil_leaves_null_results_uncached() {
    let store = store_over(MockBackend::new(), Clock::new_frozen());

    let skipping = CacheOptions::new().skip_nil(true);
    let value = store.fetch("absent", &skipping, CacheValue::null).unwrap();
    assert!(value.is_null());
    assert!(!store.exist("absent", &CacheOptions::new()).unwrap());

    // Without skip_nil a null result is cached like any other value.
    let options = CacheOptions::new();
    store.fetch("present", &options, CacheValue::null).unwrap();
    assert!(store.exist("present", &options).unwrap());
}

#[test]
fn expired_entries_read_as_misses_and_fetch_recomputes() {
    let clock = Clock::new_frozen_at(1_000.0);
    let store = store_over(MockBackend::new(), clock.clone());
    let options = CacheOptions::new().expires_in(Duration::from_secs(60));

    store.write("k", CacheValue::from("short-lived"), &options);
    clock.advance(Duration::from_secs(61));

    assert_eq!(store.read("k", &options).unwrap(), None);
    let value = store.fetch("k", &options, || CacheValue::from("recomputed")).unwrap();
    assert_eq!(value, CacheValue::from("recomputed"));
}

#[test]
fn fetch_deletes_an_expired_entry_without_a_grace_window() {
    let clock = Clock::new_frozen_at(1_000.0);
    let backend = MockBackend::new();
    let store = store_over(backend.clone(), clock.clone());
    let options = CacheOptions::new().expires_in(Duration::from_secs(60));

    store.write("k", CacheValue::from("old"), &options);
    clock.advance(Duration::from_secs(61));
    store.fetch("k", &options, || CacheValue::from("new")).unwrap();

    assert!(store.backend().operations().contains(&BackendOp::Delete("k".into())));
}

#[test]
fn grace_window_serves_the_stale_value_to_concurrent_readers() {
    let clock = Clock::new_frozen_at(1_000.0);
    let backend = MockBackend::new();
    let store = store_over(backend, clock.clone());
    let options = CacheOptions::new()
        .expires_in(Duration::from_secs(60))
        .race_condition_ttl(Duration::from_secs(10));

    store.write("k", CacheValue::from("stale"), &options);
    clock.advance(Duration::from_secs(61));

    // The fetch that observes the expiry first extends the stored entry, so
    // a reader arriving while the closure runs still gets the stale value.
    let value = store
        .fetch("k", &options, || {
            let seen = store.read("k", &options).unwrap();
            assert_eq!(seen, Some(CacheValue::from("stale")));
            CacheValue::from("fresh")
        })
        .unwrap();
    assert_eq!(value, CacheValue::from("fresh"));
    assert_eq!(store.read("k", &options).unwrap(), Some(CacheValue::from("fresh")));
}

#[test]
fn grace_window_does_not_apply_long_after_expiry() {
    let clock = Clock::new_frozen_at(1_000.0);
    let store = store_over(MockBackend::new(), clock.clone());
    let options = CacheOptions::new()
        .expires_in(Duration::from_secs(60))
        .race_condition_ttl(Duration::from_secs(10));

    store.write("k", CacheValue::from("stale"), &options);
    clock.advance(Duration::from_secs(120));

    store
        .fetch("k", &options, || {
            // Way past the grace window the dead entry is gone, not extended.
            assert_eq!(store.read("k", &options).unwrap(), None);
            CacheValue::from("fresh")
        })
        .unwrap();
}

#[test]
fn version_mismatch_reads_as_a_miss() {
    let store = store_over(MockBackend::new(), Clock::new_frozen());

    let v1 = CacheOptions::new().version("v1");
    store.write("k", CacheValue::from("value"), &v1);

    assert_eq!(store.read("k", &v1).unwrap(), Some(CacheValue::from("value")));
    let v2 = CacheOptions::new().version("v2");
    assert_eq!(store.read("k", &v2).unwrap(), None);
    assert!(!store.exist("k", &v2).unwrap());

    // An unversioned read matches a versioned entry.
    assert_eq!(store.read("k", &CacheOptions::new()).unwrap(), Some(CacheValue::from("value")));
}

#[test]
fn namespaces_isolate_stores_sharing_a_backend() {
    let backend = MockBackend::new();
    let clock = Clock::new_frozen();
    let left = CacheStore::builder(clock.clone())
        .backend(backend.clone())
        .defaults(CacheOptions::new().namespace("left"))
        .build();
    let right = CacheStore::builder(clock)
        .backend(backend.clone())
        .defaults(CacheOptions::new().namespace("right"))
        .build();

    let options = CacheOptions::new();
    left.write("k", CacheValue::from("ours"), &options);
    assert_eq!(right.read("k", &options).unwrap(), None);
    assert!(backend.peek("left:k").is_some());
    assert!(backend.peek("right:k").is_none());
}

#[test]
fn unavailable_backend_reads_as_miss_and_writes_as_false() {
    let backend = MockBackend::new();
    let store = store_over(backend.clone(), Clock::new_frozen());
    let options = CacheOptions::new();
    store.write("k", CacheValue::from("v"), &options);

    backend.fail_when(|_| true);
    assert_eq!(store.read("k", &options).unwrap(), None);
    assert!(!store.write("k", CacheValue::from("w"), &options));
    assert!(!store.delete("k", &options));
    assert!(!store.exist("k", &options).unwrap());
    assert!(store.read_multi(&["k"], &options).unwrap().is_empty());
    assert!(!store.clear());

    backend.fail_never();
    assert_eq!(store.read("k", &options).unwrap(), Some(CacheValue::from("v")));
}

#[test]
fn failed_reads_make_fetch_recompute_without_erroring() {
    let backend = MockBackend::new();
    let store = store_over(backend.clone(), Clock::new_frozen());
    let options = CacheOptions::new();
    store.write("k", CacheValue::from("cached"), &options);

    backend.fail_when(|op| matches!(op, BackendOp::Read(_)));
    let value = store.fetch("k", &options, || CacheValue::from("recomputed")).unwrap();
    assert_eq!(value, CacheValue::from("recomputed"));
}

#[test]
fn corrupt_payloads_propagate_from_read() {
    let backend = MockBackend::new();
    let store = store_over(backend.clone(), Clock::new_frozen());
    let options = CacheOptions::new();

    let corrupt = CacheEntry::lazy(
        bytes::Bytes::from_static(b"garbage"),
        Arc::new(|_: &[u8]| Err(DeserializationError::CorruptPayload("bad bytes".into()))),
        None,
        None,
        None,
    );
    backend.write_entry("k", corrupt, &options).unwrap();

    assert!(store.read("k", &options).is_err());
    assert!(store.fetch("k", &options, || CacheValue::from("new")).is_err());
}

#[test]
fn corrupt_stored_bytes_propagate_from_exist() {
    // A backend whose stored bytes fail to decode at the header level, the
    // way a bounded memory store reports a mangled encoded payload.
    struct CorruptBackend;

    impl CacheBackend for CorruptBackend {
        fn read_entry(
            &self,
            _: &str,
            _: &CacheOptions,
        ) -> Result<Option<CacheEntry>, strata_backend::BackendError> {
            Err(DeserializationError::CorruptHeader("truncated header".into()).into())
        }

        fn write_entry(
            &self,
            _: &str,
            _: CacheEntry,
            _: &CacheOptions,
        ) -> Result<bool, strata_backend::BackendError> {
            Ok(true)
        }

        fn delete_entry(&self, _: &str, _: &CacheOptions) -> Result<bool, strata_backend::BackendError> {
            Ok(false)
        }

        fn clear(&self) -> Result<bool, strata_backend::BackendError> {
            Ok(true)
        }
    }

    let store = CacheStore::builder(Clock::new_frozen()).backend(CorruptBackend).build();
    let options = CacheOptions::new();

    // Corruption is never degraded to "absent": exist errors like read does.
    assert!(store.exist("k", &options).is_err());
    assert!(store.read("k", &options).is_err());
}

#[test]
fn read_multi_maps_results_back_to_caller_keys() {
    let store = CacheStore::builder(Clock::new_frozen())
        .backend(MockBackend::new())
        .defaults(CacheOptions::new().namespace("app"))
        .build();
    let options = CacheOptions::new();

    store.write("a", CacheValue::from("1"), &options);
    store.write("b", CacheValue::from("2"), &options);

    let found = store.read_multi(&["a", "missing", "b"], &options).unwrap();
    assert_eq!(found.len(), 2);
    assert_eq!(found["a"], CacheValue::from("1"));
    assert_eq!(found["b"], CacheValue::from("2"));
}

#[test]
fn read_multi_skips_expired_and_mismatched_entries() {
    let clock = Clock::new_frozen_at(1_000.0);
    let store = store_over(MockBackend::new(), clock.clone());

    let mortal = CacheOptions::new().expires_in(Duration::from_secs(30));
    store.write("mortal", CacheValue::from("old"), &mortal);
    store.write("keeper", CacheValue::from("kept"), &CacheOptions::new());
    store.write("tagged", CacheValue::from("v1"), &CacheOptions::new().version("v1"));

    clock.advance(Duration::from_secs(31));
    let versioned = CacheOptions::new().version("v2");
    let found = store.read_multi(&["mortal", "keeper", "tagged"], &versioned).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found["keeper"], CacheValue::from("kept"));
}

#[test]
fn write_multi_writes_every_pair_in_one_batch() {
    let backend = MockBackend::new();
    let store = store_over(backend.clone(), Clock::new_frozen());
    let options = CacheOptions::new();

    let pairs = vec![
        ("a".to_owned(), CacheValue::from("1")),
        ("b".to_owned(), CacheValue::from("2")),
    ];
    assert!(store.write_multi(pairs, &options));
    assert_eq!(
        backend.operations(),
        vec![BackendOp::WriteMulti(vec!["a".into(), "b".into()])],
    );
    assert_eq!(store.read("a", &options).unwrap(), Some(CacheValue::from("1")));
}

#[test]
fn increment_initializes_adjusts_and_rejects_non_numeric() {
    let store = store_over(MockBackend::new(), Clock::new_frozen());
    let options = CacheOptions::new();

    assert_eq!(store.increment("hits", 1, &options), Some(1));
    assert_eq!(store.increment("hits", 4, &options), Some(5));
    assert_eq!(store.decrement("hits", 2, &options), Some(3));
    assert_eq!(store.read("hits", &options).unwrap(), Some(CacheValue::from("3")));

    store.write("label", CacheValue::from("not a number"), &options);
    assert_eq!(store.increment("label", 1, &options), None);
    assert_eq!(store.read("label", &options).unwrap(), Some(CacheValue::from("not a number")));
}

#[test]
fn incrementing_an_expired_counter_reinitializes_it() {
    let clock = Clock::new_frozen_at(1_000.0);
    let store = store_over(MockBackend::new(), clock.clone());
    let options = CacheOptions::new().expires_in(Duration::from_secs(60));

    assert_eq!(store.increment("hits", 7, &options), Some(7));
    clock.advance(Duration::from_secs(61));
    assert_eq!(store.increment("hits", 1, &options), Some(1));
}

#[test]
fn delete_reports_whether_an_entry_was_present() {
    let store = store_over(MockBackend::new(), Clock::new_frozen());
    let options = CacheOptions::new();

    store.write("k", CacheValue::from("v"), &options);
    assert!(store.delete("k", &options));
    assert!(!store.delete("k", &options));
}

#[test]
fn clear_empties_the_backend() {
    let backend = MockBackend::new();
    let store = store_over(backend.clone(), Clock::new_frozen());
    let options = CacheOptions::new();

    store.write("a", CacheValue::from("1"), &options);
    store.write("b", CacheValue::from("2"), &options);
    assert!(store.clear());
    assert!(backend.is_empty());
}

#[test]
fn call_site_options_win_over_store_defaults() {
    let clock = Clock::new_frozen_at(1_000.0);
    let store = CacheStore::builder(clock.clone())
        .backend(MockBackend::new())
        .defaults(CacheOptions::new().expires_in(Duration::from_secs(3600)))
        .build();

    let short = CacheOptions::new().expires_in(Duration::from_secs(10));
    store.write("short", CacheValue::from("v"), &short);
    store.write("long", CacheValue::from("v"), &CacheOptions::new());

    clock.advance(Duration::from_secs(11));
    assert_eq!(store.read("short", &CacheOptions::new()).unwrap(), None);
    assert_eq!(store.read("long", &CacheOptions::new()).unwrap(), Some(CacheValue::from("v")));
}
