//! Concurrency tests for the vault.
//!
//! All vault operations are synchronous and safe under concurrent callers;
//! these tests race real threads against one shared store and assert the
//! atomicity contracts: a burn wins exactly once, and counters move exactly
//! once per winning mutation.

use std::thread;

use aqm_core::{AqmConfig, SystemClock, Tier};
use aqm_device::{MemoryVault, VaultError, VaultStore};
use bytes::Bytes;

fn vault() -> MemoryVault<SystemClock> {
    MemoryVault::new(&AqmConfig::default(), SystemClock)
}

#[test]
fn concurrent_burns_win_exactly_once() {
    let vault = vault();
    vault
        .store_key("k1", Tier::Gold, Bytes::from_static(b"blob"), Bytes::new(), Bytes::new(), "v1")
        .unwrap();

    let results: Vec<Result<(), VaultError>> = thread::scope(|scope| {
        let handles: Vec<_> =
            (0..5).map(|_| scope.spawn(|| vault.burn_key("k1"))).collect();
        handles.into_iter().map(|h| h.join().expect("thread panicked")).collect()
    });

    let wins = results.iter().filter(|r| r.is_ok()).count();
    let already_burned = results
        .iter()
        .filter(|r| matches!(r, Err(VaultError::AlreadyBurned { .. })))
        .count();

    assert_eq!(wins, 1);
    assert_eq!(already_burned, 4);

    // Counters moved exactly once, and the key is gone for everyone.
    let stats = vault.stats().unwrap();
    assert_eq!(stats.active_gold, 0);
    assert_eq!(stats.total_burned, 1);
    assert_eq!(vault.fetch_key("k1").unwrap(), None);
}

#[test]
fn concurrent_duplicate_stores_win_exactly_once() {
    let vault = vault();

    let results: Vec<Result<(), VaultError>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                scope.spawn(|| {
                    vault.store_key(
                        "dup",
                        Tier::Silver,
                        Bytes::from_static(b"blob"),
                        Bytes::new(),
                        Bytes::new(),
                        "v1",
                    )
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().expect("thread panicked")).collect()
    });

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(
        results.iter().filter(|r| matches!(r, Err(VaultError::AlreadyExists { .. }))).count(),
        7
    );
    assert_eq!(vault.count_active(Some(Tier::Silver)).unwrap(), 1);
}

#[test]
fn disjoint_stores_and_burns_keep_counters_consistent() {
    let vault = vault();

    thread::scope(|scope| {
        for t in 0..4 {
            let vault = vault.clone();
            scope.spawn(move || {
                for i in 0..25 {
                    let key = format!("t{t}-k{i}");
                    vault
                        .store_key(
                            &key,
                            Tier::Bronze,
                            Bytes::from_static(b"blob"),
                            Bytes::new(),
                            Bytes::new(),
                            "v1",
                        )
                        .expect("store failed");
                    if i % 2 == 0 {
                        vault.burn_key(&key).expect("burn failed");
                    }
                }
            });
        }
    });

    // 4 threads x 25 stores, 13 burns each.
    let stats = vault.stats().unwrap();
    assert_eq!(stats.active_bronze, 4 * 12);
    assert_eq!(stats.total_burned, 4 * 13);
    assert_eq!(vault.active_key_ids(Some(Tier::Bronze)).unwrap().len(), 48);
}
