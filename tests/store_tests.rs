//! Tests for Store
//!
//! These tests verify:
//! - get/set/delete round trips and NotFound semantics
//! - Prefix ordering for list and find
//! - Persistence across reopen and the single-handle file lock
//! - Concurrent access from several threads
//! - Operations after close

use std::fs;
use std::sync::Arc;
use std::thread;

use kvshell::{Config, KeyValue, Lifecycle, OpenFailure, Store, StoreError};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn test_config(temp_dir: &TempDir) -> Config {
    Config::builder()
        .path(temp_dir.path().join("test.redb"))
        .index_cache_size(1024 * 1024)
        .build()
}

fn setup_temp_store() -> (TempDir, Store) {
    let temp_dir = TempDir::new().unwrap();
    let store = Store::open(test_config(&temp_dir)).unwrap();
    (temp_dir, store)
}

fn kv(key: &str, value: &str) -> KeyValue {
    KeyValue::new(key, value)
}

fn keys(names: &[&str]) -> Vec<Vec<u8>> {
    names.iter().map(|name| name.as_bytes().to_vec()).collect()
}

// =============================================================================
// Basic Operations Tests
// =============================================================================

#[test]
fn test_set_get_roundtrip() {
    let (_temp, store) = setup_temp_store();

    store.set("hello", "world").unwrap();

    assert_eq!(store.get("hello").unwrap(), b"world");
}

#[test]
fn test_set_overwrites_existing() {
    let (_temp, store) = setup_temp_store();

    store.set("key", "v1").unwrap();
    store.set("key", "v2").unwrap();

    assert_eq!(store.get("key").unwrap(), b"v2");
    assert_eq!(store.list("").unwrap(), keys(&["key"]));
}

#[test]
fn test_get_nonexistent_key() {
    let (_temp, store) = setup_temp_store();

    let result = store.get("nonexistent");

    assert!(matches!(result, Err(StoreError::NotFound)));
}

#[test]
fn test_empty_value_is_not_absence() {
    let (_temp, store) = setup_temp_store();

    store.set("empty", "").unwrap();

    assert!(store.get("empty").unwrap().is_empty());
    assert_eq!(store.list("").unwrap(), keys(&["empty"]));
}

#[test]
fn test_keys_with_control_characters() {
    let (_temp, store) = setup_temp_store();

    let key = "tab\there\u{1}\u{7f}/new\nline";
    store.set(key, "odd").unwrap();

    assert_eq!(store.get(key).unwrap(), b"odd");
    assert_eq!(store.list("tab\t").unwrap(), keys(&[key]));
}

#[test]
fn test_values_with_spaces_and_unicode() {
    let (_temp, store) = setup_temp_store();

    store.set("greeting", "héllo wörld ✓").unwrap();

    assert_eq!(store.get("greeting").unwrap(), "héllo wörld ✓".as_bytes());
}

#[test]
fn test_non_utf8_key_is_reachable_from_its_listing() {
    let (_temp, store) = setup_temp_store();

    store.set(b"k\xff", b"v\xfe").unwrap();

    let listed = store.list("k").unwrap();
    assert_eq!(listed, vec![b"k\xff".to_vec()]);

    assert_eq!(store.get(&listed[0]).unwrap(), b"v\xfe");
    assert_eq!(store.find("k").unwrap(), vec![KeyValue::new(&b"k\xff"[..], &b"v\xfe"[..])]);

    store.delete(&listed[0]).unwrap();
    assert!(store.list("").unwrap().is_empty());
}

// =============================================================================
// Delete Tests
// =============================================================================

#[test]
fn test_delete_then_get() {
    let (_temp, store) = setup_temp_store();

    store.set("key", "value").unwrap();
    store.delete("key").unwrap();

    assert!(matches!(store.get("key"), Err(StoreError::NotFound)));
}

#[test]
fn test_delete_missing_key() {
    let (_temp, store) = setup_temp_store();

    store.set("other", "value").unwrap();

    let result = store.delete("missing");

    assert!(matches!(result, Err(StoreError::NotFound)));
    assert_eq!(
        store.find("").unwrap(),
        vec![kv("other", "value")],
        "a failed delete must leave the store unchanged"
    );
}

#[test]
fn test_delete_twice() {
    let (_temp, store) = setup_temp_store();

    store.set("key", "value").unwrap();
    store.delete("key").unwrap();

    assert!(store.delete("key").unwrap_err().is_not_found());
}

// =============================================================================
// Prefix Iteration Tests
// =============================================================================

#[test]
fn test_list_prefix_ordering() {
    let (_temp, store) = setup_temp_store();

    for key in ["b/2", "a/3", "ab", "a/1", "b/1", "a/2", "a", "c"] {
        store.set(key, key).unwrap();
    }

    assert_eq!(store.list("a/").unwrap(), keys(&["a/1", "a/2", "a/3"]));
    assert_eq!(store.list("a").unwrap(), keys(&["a", "a/1", "a/2", "a/3", "ab"]));
    assert_eq!(store.list("b/").unwrap(), keys(&["b/1", "b/2"]));
    assert!(store.list("z").unwrap().is_empty());
}

#[test]
fn test_list_empty_prefix_returns_all_sorted() {
    let (_temp, store) = setup_temp_store();

    for key in ["zeta", "Alpha", "alpha", "10", "9"] {
        store.set(key, "").unwrap();
    }

    // Byte order: digits < uppercase < lowercase
    assert_eq!(
        store.list("").unwrap(),
        keys(&["10", "9", "Alpha", "alpha", "zeta"])
    );
}

#[test]
fn test_list_on_empty_store() {
    let (_temp, store) = setup_temp_store();

    assert!(store.list("").unwrap().is_empty());
    assert!(store.find("").unwrap().is_empty());
}

#[test]
fn test_find_matches_list() {
    let (_temp, store) = setup_temp_store();

    for i in 0..20 {
        store.set(&format!("user/{:02}", i), &format!("name-{}", i)).unwrap();
    }
    store.set("group/1", "admins").unwrap();

    let keys = store.list("user/").unwrap();
    let entries = store.find("user/").unwrap();

    assert_eq!(keys.len(), 20);
    assert_eq!(
        entries.iter().map(|e| e.key.clone()).collect::<Vec<_>>(),
        keys
    );
    for entry in &entries {
        assert_eq!(entry.value, store.get(&entry.key).unwrap());
    }
}

#[test]
fn test_concrete_scenario() {
    let (_temp, store) = setup_temp_store();

    store.set("a/1", "x").unwrap();
    store.set("a/2", "y").unwrap();
    store.set("b/1", "z").unwrap();

    assert_eq!(store.list("a/").unwrap(), keys(&["a/1", "a/2"]));
    assert_eq!(store.find("a/").unwrap(), vec![kv("a/1", "x"), kv("a/2", "y")]);

    store.delete("a/1").unwrap();

    assert!(matches!(store.get("a/1"), Err(StoreError::NotFound)));
    assert_eq!(store.list("a/").unwrap(), keys(&["a/2"]));
}

// =============================================================================
// Persistence & Locking Tests
// =============================================================================

#[test]
fn test_open_creates_parent_directories() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("dir").join("store.redb");

    let store = Store::open_path(&path).unwrap();
    store.close().unwrap();

    assert!(path.exists());
}

#[test]
fn test_data_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();

    {
        let store = Store::open(test_config(&temp_dir)).unwrap();
        store.set("persist", "me").unwrap();
        store.close().unwrap();
    }

    let store = Store::open(test_config(&temp_dir)).unwrap();
    assert_eq!(store.get("persist").unwrap(), b"me");
}

#[test]
fn test_second_handle_is_locked_out() {
    let temp_dir = TempDir::new().unwrap();
    let first = Store::open(test_config(&temp_dir)).unwrap();

    let second = Store::open(test_config(&temp_dir));

    match second {
        Err(StoreError::Open {
            reason: OpenFailure::Locked,
            ..
        }) => {}
        Err(other) => panic!("expected Locked, got {:?}", other),
        Ok(_) => panic!("second open of the same file must fail"),
    }

    first.close().unwrap();
    let reopened = Store::open(test_config(&temp_dir)).unwrap();
    reopened.close().unwrap();
}

#[test]
fn test_invalid_config_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .path(temp_dir.path().join("test.redb"))
        .discard_ratio(1.5)
        .build();

    assert!(matches!(Store::open(config), Err(StoreError::Config(_))));
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[test]
fn test_operations_after_close_fail() {
    let (_temp, store) = setup_temp_store();
    store.set("key", "value").unwrap();

    store.close().unwrap();

    assert_eq!(store.state(), Lifecycle::Closed);
    assert!(matches!(store.get("key"), Err(StoreError::Closed)));
    assert!(matches!(store.set("key", "v"), Err(StoreError::Closed)));
    assert!(matches!(store.delete("key"), Err(StoreError::Closed)));
    assert!(matches!(store.list(""), Err(StoreError::Closed)));
    assert!(matches!(store.find(""), Err(StoreError::Closed)));
    assert!(matches!(store.run_maintenance(), Err(StoreError::Closed)));
}

#[test]
fn test_close_twice_is_ok() {
    let (_temp, store) = setup_temp_store();

    store.close().unwrap();
    store.close().unwrap();

    assert_eq!(store.state(), Lifecycle::Closed);
}

#[test]
fn test_run_maintenance_after_churn() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("test.redb");
    let config = Config::builder()
        .path(&path)
        .value_log_file_size(64 * 1024)
        .build();
    let store = Store::open(config).unwrap();

    let payload = "x".repeat(4096);
    for i in 0..200 {
        store.set(format!("blob/{:03}", i), &payload).unwrap();
    }
    for i in 0..190 {
        store.delete(format!("blob/{:03}", i)).unwrap();
    }
    let before = fs::metadata(&path).unwrap().len();

    let report = store.run_maintenance().unwrap();
    assert!(report.fault.is_none(), "unexpected fault: {:?}", report.fault);
    assert!(report.compactions >= 1, "churned file was not compacted: {:?}", report);

    let after = fs::metadata(&path).unwrap().len();
    assert!(after < before, "file did not shrink: {} -> {} bytes", before, after);

    // A second pass right after finds nothing more to do
    let again = store.run_maintenance().unwrap();
    assert!(again.fault.is_none());
    assert_eq!(again.compactions, 0);

    assert_eq!(store.list("blob/").unwrap().len(), 10);
    assert_eq!(store.get("blob/195").unwrap(), payload.as_bytes());
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_writers_and_readers() {
    let (_temp, store) = setup_temp_store();
    let store = Arc::new(store);

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..50 {
                    let key = format!("t{}/{:02}", t, i);
                    store.set(&key, &key).unwrap();
                    assert_eq!(store.get(&key).unwrap(), key.as_bytes());
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.list("").unwrap().len(), 200);
    assert_eq!(store.list("t2/").unwrap().len(), 50);
}
