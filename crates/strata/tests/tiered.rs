// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Public API tests for the multi-tier backend.

use std::time::Duration;

use pretty_assertions::assert_eq;

use strata::{CacheStore, CacheValue, Clock, Tier, TieredStore};
use strata_backend::testing::{BackendOp, MockBackend};
use strata_backend::{CacheBackend, CacheEntry, CacheOptions};

fn two_tiers() -> (MockBackend, MockBackend, TieredStore) {
    let fast = MockBackend::new();
    let slow = MockBackend::new();
    let store = TieredStore::new(
        vec![Tier::new(fast.clone()), Tier::new(slow.clone())],
        Clock::new_frozen(),
    );
    (fast, slow, store)
}

#[test]
fn writes_broadcast_to_every_tier() {
    let (fast, slow, store) = two_tiers();
    let options = CacheOptions::new();

    assert!(store.write_entry("k", CacheEntry::new(CacheValue::from("v")), &options).unwrap());
    assert!(fast.peek("k").is_some());
    assert!(slow.peek("k").is_some());
}

#[test]
fn slow_tier_hits_are_promoted_to_the_fast_tier() {
    let (fast, slow, store) = two_tiers();
    let options = CacheOptions::new();

    slow.write_entry("k", CacheEntry::new(CacheValue::from("v")), &options).unwrap();
    let entry = store.read_entry("k", &options).unwrap().unwrap();
    assert_eq!(entry.value().unwrap(), &CacheValue::from("v"));

    // The promotion means the slow tier is never consulted again.
    slow.fail_when(|op| matches!(op, BackendOp::Read(_)));
    let entry = store.read_entry("k", &options).unwrap().unwrap();
    assert_eq!(entry.value().unwrap(), &CacheValue::from("v"));
    assert!(fast.peek("k").is_some());
}

#[test]
fn an_unavailable_fast_tier_falls_through_to_the_slow_tier() {
    let (fast, slow, store) = two_tiers();
    let options = CacheOptions::new();

    slow.write_entry("k", CacheEntry::new(CacheValue::from("v")), &options).unwrap();
    fast.fail_when(|_| true);

    let entry = store.read_entry("k", &options).unwrap().unwrap();
    assert_eq!(entry.value().unwrap(), &CacheValue::from("v"));
}

#[test]
fn delete_succeeds_when_any_tier_held_the_entry() {
    let (fast, slow, store) = two_tiers();
    let options = CacheOptions::new();

    slow.write_entry("k", CacheEntry::new(CacheValue::from("v")), &options).unwrap();
    assert!(store.delete_entry("k", &options).unwrap());
    assert!(!store.delete_entry("k", &options).unwrap());
    assert!(fast.is_empty());
    assert!(slow.is_empty());
}

#[test]
fn write_reports_false_when_any_tier_fails() {
    let (fast, slow, store) = two_tiers();
    let options = CacheOptions::new();

    slow.fail_when(|op| matches!(op, BackendOp::Write(_)));
    assert!(!store.write_entry("k", CacheEntry::new(CacheValue::from("v")), &options).unwrap());
    // The healthy tier still took the write.
    assert!(fast.peek("k").is_some());
}

#[test]
fn read_multi_collects_across_tiers_and_promotes() {
    let (fast, slow, store) = two_tiers();
    let options = CacheOptions::new();

    fast.write_entry("front", CacheEntry::new(CacheValue::from("1")), &options).unwrap();
    slow.write_entry("back", CacheEntry::new(CacheValue::from("2")), &options).unwrap();

    let keys = vec!["front".to_owned(), "back".to_owned(), "missing".to_owned()];
    let found = store.read_multi_entries(&keys, &options).unwrap();
    assert_eq!(found.len(), 2);
    assert_eq!(found["front"].value().unwrap(), &CacheValue::from("1"));
    assert_eq!(found["back"].value().unwrap(), &CacheValue::from("2"));
    assert!(fast.peek("back").is_some());
}

#[test]
fn clear_broadcasts_to_every_tier() {
    let (fast, slow, store) = two_tiers();
    let options = CacheOptions::new();

    store.write_entry("k", CacheEntry::new(CacheValue::from("v")), &options).unwrap();
    assert!(store.clear().unwrap());
    assert!(fast.is_empty());
    assert!(slow.is_empty());
}

#[test]
fn a_store_over_tiers_inherits_their_defaults() {
    let fast = Tier::with_defaults(
        MockBackend::new(),
        CacheOptions::new().expires_in(Duration::from_secs(60)),
    );
    let slow = Tier::with_defaults(
        MockBackend::new(),
        CacheOptions::new().expires_in(Duration::from_secs(3600)).namespace("shared"),
    );

    let store = CacheStore::builder(Clock::new_frozen()).tiered(vec![fast, slow]).build();
    assert_eq!(store.defaults().expires_in, Some(Duration::from_secs(60)));
    assert_eq!(store.defaults().namespace.as_deref(), Some("shared"));
}

#[test]
fn builder_defaults_win_over_tier_defaults() {
    let tier = Tier::with_defaults(
        MockBackend::new(),
        CacheOptions::new().expires_in(Duration::from_secs(60)),
    );

    let store = CacheStore::builder(Clock::new_frozen())
        .tiered(vec![tier])
        .defaults(CacheOptions::new().expires_in(Duration::from_secs(5)))
        .build();
    assert_eq!(store.defaults().expires_in, Some(Duration::from_secs(5)));
}

#[test]
fn fetch_through_tiers_repopulates_a_cold_fast_tier() {
    let fast = MockBackend::new();
    let slow = MockBackend::new();
    let clock = Clock::new_frozen();
    let store = CacheStore::builder(clock)
        .tiered(vec![Tier::new(fast.clone()), Tier::new(slow.clone())])
        .build();
    let options = CacheOptions::new();

    store.write("k", CacheValue::from("v"), &options);
    // Simulate the fast tier restarting empty.
    fast.clear().unwrap();
    assert!(fast.is_empty());

    let value = store.fetch("k", &options, || unreachable!()).unwrap();
    assert_eq!(value, CacheValue::from("v"));
    assert!(fast.peek("k").is_some());
}
