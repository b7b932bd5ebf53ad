//! Redb-backed durable directory implementation.
//!
//! The pool is authoritative server state, so rows are persisted with Redb's
//! ACID transactions. Redb is single-writer: every claim runs inside one
//! write transaction, so concurrent claims serialize and return disjoint row
//! sets — the same observable contract a SQL backend provides with
//! row-level locks and a skip-locked scan.

use std::{path::Path, sync::Arc};

use aqm_core::{Clock, CoinRecord, CoinUpload, Tier, TierCounts};
use redb::{Database, ReadableTable, TableDefinition};

use crate::{CoinDirectory, DirectoryError, DirectoryRow};

/// Table: pool rows.
/// Key: record id (monotonic; key order is upload order).
/// Value: CBOR-encoded [`DirectoryRow`].
const COINS: TableDefinition<u64, &[u8]> = TableDefinition::new("coins_v1");

/// Table: uniqueness index.
/// Key: `owner_id \0 key_id`. Value: record id.
const OWNER_INDEX: TableDefinition<&str, u64> = TableDefinition::new("coin_owner_index_v1");

/// Durable directory backed by Redb.
///
/// Thread-safe through Redb's internal locking. Clone is cheap (`Arc`).
#[derive(Clone)]
pub struct RedbDirectory<C: Clock> {
    db: Arc<Database>,
    clock: C,
}

fn unavailable(err: impl std::fmt::Display) -> DirectoryError {
    DirectoryError::Unavailable(err.to_string())
}

fn decode_row(bytes: &[u8]) -> Result<DirectoryRow, DirectoryError> {
    ciborium::from_reader(bytes).map_err(|e| DirectoryError::Corrupted(e.to_string()))
}

fn encode_row(row: &DirectoryRow) -> Result<Vec<u8>, DirectoryError> {
    let mut bytes = Vec::new();
    ciborium::into_writer(row, &mut bytes)
        .map_err(|e| DirectoryError::Corrupted(e.to_string()))?;
    Ok(bytes)
}

fn index_key(owner_id: &str, key_id: &str) -> String {
    format!("{owner_id}\0{key_id}")
}

impl<C: Clock> RedbDirectory<C> {
    /// Open or create a directory database at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::Unavailable`] if the database cannot be
    /// opened or created.
    pub fn open(path: impl AsRef<Path>, clock: C) -> Result<Self, DirectoryError> {
        let db = Database::create(path.as_ref()).map_err(unavailable)?;

        let txn = db.begin_write().map_err(unavailable)?;
        {
            let _ = txn.open_table(COINS).map_err(unavailable)?;
            let _ = txn.open_table(OWNER_INDEX).map_err(unavailable)?;
        }
        txn.commit().map_err(unavailable)?;

        Ok(Self { db: Arc::new(db), clock })
    }
}

impl<C: Clock> CoinDirectory for RedbDirectory<C> {
    fn upload_coins(&self, owner_id: &str, coins: &[CoinUpload]) -> Result<u64, DirectoryError> {
        if coins.is_empty() {
            return Ok(0);
        }

        let now = self.clock.now_millis();
        let txn = self.db.begin_write().map_err(unavailable)?;

        let inserted;
        {
            let mut rows = txn.open_table(COINS).map_err(unavailable)?;
            let mut index = txn.open_table(OWNER_INDEX).map_err(unavailable)?;

            let mut next_record_id = match rows.last().map_err(unavailable)? {
                Some((key, _)) => key.value() + 1,
                None => 1,
            };

            let mut count = 0u64;
            for coin in coins {
                let idx_key = index_key(owner_id, &coin.key_id);
                if index.get(idx_key.as_str()).map_err(unavailable)?.is_some() {
                    // Idempotent retry: the row is already there.
                    continue;
                }

                let record_id = next_record_id;
                next_record_id += 1;

                let row = DirectoryRow {
                    record_id,
                    owner_id: owner_id.to_string(),
                    key_id: coin.key_id.clone(),
                    tier: coin.tier,
                    public_key: coin.public_key.clone(),
                    signature: coin.signature.clone(),
                    uploaded_at: now,
                    claimed_by: None,
                    claimed_at: None,
                };
                rows.insert(record_id, encode_row(&row)?.as_slice()).map_err(unavailable)?;
                index.insert(idx_key.as_str(), record_id).map_err(unavailable)?;
                count += 1;
            }
            inserted = count;
        }

        txn.commit().map_err(unavailable)?;
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
        let txn = self.db.begin_write().map_err(unavailable)?;

        let claimed;
        {
            let mut rows = txn.open_table(COINS).map_err(unavailable)?;

            // Select phase: oldest unclaimed rows for (owner, tier).
            let mut selected = Vec::new();
            for result in rows.iter().map_err(unavailable)? {
                if selected.len() as u64 >= count {
                    break;
                }
                let (_, value) = result.map_err(unavailable)?;
                let row = decode_row(value.value())?;
                if row.owner_id == target_owner && row.tier == tier && row.claimed_by.is_none() {
                    selected.push(row);
                }
            }

            // Mark phase, inside the same transaction.
            let mut records = Vec::with_capacity(selected.len());
            for mut row in selected {
                row.claimed_by = Some(requester_id.to_string());
                row.claimed_at = Some(now);
                rows.insert(row.record_id, encode_row(&row)?.as_slice())
                    .map_err(unavailable)?;
                records.push(CoinRecord {
                    key_id: row.key_id,
                    tier: row.tier,
                    public_key: row.public_key,
                    signature: row.signature,
                });
            }
            claimed = records;
        }

        txn.commit().map_err(unavailable)?;
        Ok(claimed)
    }

    fn inventory_count(&self, owner_id: &str) -> Result<TierCounts, DirectoryError> {
        let txn = self.db.begin_read().map_err(unavailable)?;
        let rows = txn.open_table(COINS).map_err(unavailable)?;

        let mut counts = TierCounts::default();
        for result in rows.iter().map_err(unavailable)? {
            let (_, value) = result.map_err(unavailable)?;
            let row = decode_row(value.value())?;
            if row.owner_id == owner_id && row.claimed_by.is_none() {
                counts.set(row.tier, counts.get(row.tier) + 1);
            }
        }
        Ok(counts)
    }

    fn purge_stale(&self, max_age_days: u32) -> Result<u64, DirectoryError> {
        let cutoff =
            self.clock.now_millis().saturating_sub(u64::from(max_age_days) * 86_400_000);
        let deleted =
            self.delete_matching(|row| row.claimed_by.is_none() && row.uploaded_at < cutoff)?;

        tracing::info!(deleted, max_age_days, "stale row purge finished");
        Ok(deleted)
    }

    fn hard_delete_claimed(&self, grace_hours: u32) -> Result<u64, DirectoryError> {
        let cutoff = self.clock.now_millis().saturating_sub(u64::from(grace_hours) * 3_600_000);
        let deleted =
            self.delete_matching(|row| matches!(row.claimed_at, Some(at) if at < cutoff))?;

        tracing::info!(deleted, grace_hours, "claimed row hard-delete finished");
        Ok(deleted)
    }
}

impl<C: Clock> RedbDirectory<C> {
    fn delete_matching(
        &self,
        predicate: impl Fn(&DirectoryRow) -> bool,
    ) -> Result<u64, DirectoryError> {
        let txn = self.db.begin_write().map_err(unavailable)?;

        let deleted;
        {
            let mut rows = txn.open_table(COINS).map_err(unavailable)?;
            let mut index = txn.open_table(OWNER_INDEX).map_err(unavailable)?;

            let mut doomed = Vec::new();
            for result in rows.iter().map_err(unavailable)? {
                let (_, value) = result.map_err(unavailable)?;
                let row = decode_row(value.value())?;
                if predicate(&row) {
                    doomed.push(row);
                }
            }

            for row in &doomed {
                rows.remove(row.record_id).map_err(unavailable)?;
                index
                    .remove(index_key(&row.owner_id, &row.key_id).as_str())
                    .map_err(unavailable)?;
            }
            deleted = doomed.len() as u64;
        }

        txn.commit().map_err(unavailable)?;
        Ok(deleted)
    }
}
