#![allow(clippy::disallowed_types, reason = "Synchronous in-memory operations only")]
#![allow(clippy::expect_used, reason = "Mutex poisoning should cause a panic")]

use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex},
};

use aqm_core::{Clock, CoinRecord, CoinUpload, Tier, TierCounts};

use crate::{CoinDirectory, DirectoryError, DirectoryRow};

/// In-memory directory implementation for tests and simulation.
///
/// Rows live in a `BTreeMap` keyed by record id, so "oldest unclaimed
/// first" is a key-order scan. The whole claim runs inside one critical
/// section, which is the process-local equivalent of the
/// lock-rows-and-skip-contended claim a SQL backend would use: concurrent
/// fetchers serialize and therefore receive disjoint row sets. Clone shares
/// the same underlying storage.
#[derive(Clone)]
pub struct MemoryDirectory<C: Clock> {
    inner: Arc<Mutex<MemoryDirectoryInner>>,
    clock: C,
}

struct MemoryDirectoryInner {
    /// Rows by record id (insert order = upload order).
    rows: BTreeMap<u64, DirectoryRow>,

    /// Uniqueness index: `(owner_id, key_id)` -> record id.
    by_owner_key: HashMap<(String, String), u64>,

    /// Next record id to assign.
    next_record_id: u64,
}

impl<C: Clock> MemoryDirectory<C> {
    /// Create an empty directory.
    pub fn new(clock: C) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryDirectoryInner {
                rows: BTreeMap::new(),
                by_owner_key: HashMap::new(),
                next_record_id: 1,
            })),
            clock,
        }
    }

    /// Number of physically present rows, claimed ones included. Useful for
    /// debugging and testing the two-stage deletion.
    pub fn row_count(&self) -> usize {
        self.inner.lock().expect("MemoryDirectory mutex poisoned").rows.len()
    }
}

impl<C: Clock> CoinDirectory for MemoryDirectory<C> {
    fn upload_coins(&self, owner_id: &str, coins: &[CoinUpload]) -> Result<u64, DirectoryError> {
        let now = self.clock.now_millis();
        let mut inner = self.inner.lock().expect("MemoryDirectory mutex poisoned");

        let mut inserted = 0u64;
        for coin in coins {
            let index_key = (owner_id.to_string(), coin.key_id.clone());
            if inner.by_owner_key.contains_key(&index_key) {
                // Idempotent retry: the row is already there.
                continue;
            }

            let record_id = inner.next_record_id;
            inner.next_record_id += 1;

            inner.rows.insert(
                record_id,
                DirectoryRow {
                    record_id,
                    owner_id: owner_id.to_string(),
                    key_id: coin.key_id.clone(),
                    tier: coin.tier,
                    public_key: coin.public_key.clone(),
                    signature: coin.signature.clone(),
                    uploaded_at: now,
                    claimed_by: None,
                    claimed_at: None,
                },
            );
            inner.by_owner_key.insert(index_key, record_id);
            inserted += 1;
        }

        Ok(inserted)
    }

    fn fetch_coins(
        &self,
        target_owner: &str,
        requester_id: &str,
        tier: Tier,
        count: u64,
    ) -> Result<Vec<CoinRecord>, DirectoryError> {
        let now = self.clock.now_millis();
        let mut inner = self.inner.lock().expect("MemoryDirectory mutex poisoned");

        let mut claimed = Vec::new();
        for row in inner.rows.values_mut() {
            if claimed.len() as u64 >= count {
                break;
            }
            if row.owner_id != target_owner || row.tier != tier || row.claimed_by.is_some() {
                continue;
            }

            row.claimed_by = Some(requester_id.to_string());
            row.claimed_at = Some(now);
            claimed.push(CoinRecord {
                key_id: row.key_id.clone(),
                tier: row.tier,
                public_key: row.public_key.clone(),
                signature: row.signature.clone(),
            });
        }

        Ok(claimed)
    }

    fn inventory_count(&self, owner_id: &str) -> Result<TierCounts, DirectoryError> {
        let inner = self.inner.lock().expect("MemoryDirectory mutex poisoned");

        let mut counts = TierCounts::default();
        for row in inner.rows.values() {
            if row.owner_id == owner_id && row.claimed_by.is_none() {
                counts.set(row.tier, counts.get(row.tier) + 1);
            }
        }
        Ok(counts)
    }

    fn purge_stale(&self, max_age_days: u32) -> Result<u64, DirectoryError> {
        let cutoff =
            self.clock.now_millis().saturating_sub(u64::from(max_age_days) * 86_400_000);
        let mut inner = self.inner.lock().expect("MemoryDirectory mutex poisoned");

        let doomed: Vec<u64> = inner
            .rows
            .values()
            .filter(|row| row.claimed_by.is_none() && row.uploaded_at < cutoff)
            .map(|row| row.record_id)
            .collect();

        for record_id in &doomed {
            if let Some(row) = inner.rows.remove(record_id) {
                inner.by_owner_key.remove(&(row.owner_id, row.key_id));
            }
        }

        let deleted = doomed.len() as u64;
        tracing::info!(deleted, max_age_days, "stale row purge finished");
        Ok(deleted)
    }

    fn hard_delete_claimed(&self, grace_hours: u32) -> Result<u64, DirectoryError> {
        let cutoff = self.clock.now_millis().saturating_sub(u64::from(grace_hours) * 3_600_000);
        let mut inner = self.inner.lock().expect("MemoryDirectory mutex poisoned");

        let doomed: Vec<u64> = inner
            .rows
            .values()
            .filter(|row| matches!(row.claimed_at, Some(at) if at < cutoff))
            .map(|row| row.record_id)
            .collect();

        for record_id in &doomed {
            if let Some(row) = inner.rows.remove(record_id) {
                inner.by_owner_key.remove(&(row.owner_id, row.key_id));
            }
        }

        let deleted = doomed.len() as u64;
        tracing::info!(deleted, grace_hours, "claimed row hard-delete finished");
        Ok(deleted)
    }
}
