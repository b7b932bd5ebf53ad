//! Redb-backed durable vault implementation.
//!
//! Private halves are irreplaceable, so the production vault persists them
//! with Redb's ACID transactions. Each mutation opens one write transaction
//! covering both the entry table and the counter row, which is exactly the
//! entry-plus-counter atomicity the contract requires.

use std::{path::Path, sync::Arc};

use aqm_core::{AqmConfig, Clock, KeyStatus, Tier, VaultEntry, VaultStats};
use bytes::Bytes;
use redb::{Database, ReadableTable, TableDefinition};

use super::{StoredKey, VaultStore};
use crate::error::VaultError;

/// Table: private key entries.
/// Key: key id. Value: CBOR-encoded [`StoredKey`].
const VAULT_KEYS: TableDefinition<&str, &[u8]> = TableDefinition::new("vault_keys_v1");

/// Table: aggregate counters.
/// Single row under [`STATS_ROW`]. Value: CBOR-encoded [`VaultStats`].
const VAULT_STATS: TableDefinition<&str, &[u8]> = TableDefinition::new("vault_stats_v1");

const STATS_ROW: &str = "stats";

/// Durable vault backed by Redb.
///
/// Thread-safe through Redb's internal locking; write transactions
/// serialize, so entry and counter always commit together. Clone is cheap
/// (`Arc`).
#[derive(Clone)]
pub struct RedbVault<C: Clock> {
    db: Arc<Database>,
    clock: C,
    ttl_millis: u64,
    burn_grace_millis: u64,
}

impl<C: Clock> RedbVault<C> {
    /// Open or create a vault database at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Unavailable`] if the database cannot be opened
    /// or created.
    pub fn open(path: impl AsRef<Path>, config: &AqmConfig, clock: C) -> Result<Self, VaultError> {
        let db = Database::create(path.as_ref()).map_err(unavailable)?;

        let txn = db.begin_write().map_err(unavailable)?;
        {
            let _ = txn.open_table(VAULT_KEYS).map_err(unavailable)?;
            let _ = txn.open_table(VAULT_STATS).map_err(unavailable)?;
        }
        txn.commit().map_err(unavailable)?;

        Ok(Self {
            db: Arc::new(db),
            clock,
            ttl_millis: config.vault_key_ttl_seconds * 1_000,
            burn_grace_millis: config.vault_burn_grace_seconds * 1_000,
        })
    }
}

fn unavailable(err: impl std::fmt::Display) -> VaultError {
    VaultError::Unavailable(err.to_string())
}

fn decode_stored(bytes: &[u8]) -> Result<StoredKey, VaultError> {
    ciborium::from_reader(bytes).map_err(|e| VaultError::Corrupted(e.to_string()))
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, VaultError> {
    let mut bytes = Vec::new();
    ciborium::into_writer(value, &mut bytes).map_err(|e| VaultError::Corrupted(e.to_string()))?;
    Ok(bytes)
}

fn read_stats<T: ReadableTable<&'static str, &'static [u8]>>(
    table: &T,
) -> Result<VaultStats, VaultError> {
    match table.get(STATS_ROW).map_err(unavailable)? {
        Some(value) => {
            ciborium::from_reader(value.value()).map_err(|e| VaultError::Corrupted(e.to_string()))
        },
        None => Ok(VaultStats::default()),
    }
}

fn apply_expiry_accounting(stats: &mut VaultStats, stored: &StoredKey) {
    if stored.entry.status == KeyStatus::Active {
        match stored.entry.tier {
            Tier::Gold => stats.active_gold -= 1,
            Tier::Silver => stats.active_silver -= 1,
            Tier::Bronze => stats.active_bronze -= 1,
        }
        stats.total_expired += 1;
    }
}

impl<C: Clock> VaultStore for RedbVault<C> {
    fn store_key(
        &self,
        key_id: &str,
        tier: Tier,
        encrypted_blob: Bytes,
        iv: Bytes,
        auth_tag: Bytes,
        coin_version: &str,
    ) -> Result<(), VaultError> {
        let now = self.clock.now_millis();
        let txn = self.db.begin_write().map_err(unavailable)?;

        {
            let mut keys = txn.open_table(VAULT_KEYS).map_err(unavailable)?;
            let mut stats_table = txn.open_table(VAULT_STATS).map_err(unavailable)?;
            let mut stats = read_stats(&stats_table)?;

            let lapsed = match keys.get(key_id).map_err(unavailable)? {
                Some(value) => {
                    let existing = decode_stored(value.value())?;
                    if now < existing.expires_at {
                        return Err(VaultError::AlreadyExists { key_id: key_id.to_string() });
                    }
                    Some(existing)
                },
                None => None,
            };
            if let Some(existing) = lapsed {
                keys.remove(key_id).map_err(unavailable)?;
                apply_expiry_accounting(&mut stats, &existing);
            }

            let entry = VaultEntry {
                key_id: key_id.to_string(),
                tier,
                encrypted_blob,
                iv,
                auth_tag,
                status: KeyStatus::Active,
                created_at: now,
                coin_version: coin_version.to_string(),
            };
            let stored = StoredKey { entry, expires_at: now + self.ttl_millis };
            keys.insert(key_id, encode(&stored)?.as_slice()).map_err(unavailable)?;

            match tier {
                Tier::Gold => stats.active_gold += 1,
                Tier::Silver => stats.active_silver += 1,
                Tier::Bronze => stats.active_bronze += 1,
            }
            stats_table.insert(STATS_ROW, encode(&stats)?.as_slice()).map_err(unavailable)?;
        }

        txn.commit().map_err(unavailable)?;
        Ok(())
    }

    fn fetch_key(&self, key_id: &str) -> Result<Option<VaultEntry>, VaultError> {
        let now = self.clock.now_millis();
        let txn = self.db.begin_read().map_err(unavailable)?;
        let keys = txn.open_table(VAULT_KEYS).map_err(unavailable)?;

        match keys.get(key_id).map_err(unavailable)? {
            Some(value) => {
                let stored = decode_stored(value.value())?;
                if now >= stored.expires_at || stored.entry.status != KeyStatus::Active {
                    return Ok(None);
                }
                Ok(Some(stored.entry))
            },
            None => Ok(None),
        }
    }

    fn burn_key(&self, key_id: &str) -> Result<(), VaultError> {
        let now = self.clock.now_millis();
        let txn = self.db.begin_write().map_err(unavailable)?;

        {
            let mut keys = txn.open_table(VAULT_KEYS).map_err(unavailable)?;

            let mut stored = match keys.get(key_id).map_err(unavailable)? {
                Some(value) => decode_stored(value.value())?,
                None => return Err(VaultError::NotFound { key_id: key_id.to_string() }),
            };
            if now >= stored.expires_at {
                return Err(VaultError::NotFound { key_id: key_id.to_string() });
            }
            if stored.entry.status == KeyStatus::Burned {
                return Err(VaultError::AlreadyBurned { key_id: key_id.to_string() });
            }

            stored.entry.status = KeyStatus::Burned;
            stored.expires_at = now + self.burn_grace_millis;
            keys.insert(key_id, encode(&stored)?.as_slice()).map_err(unavailable)?;

            let mut stats_table = txn.open_table(VAULT_STATS).map_err(unavailable)?;
            let mut stats = read_stats(&stats_table)?;
            match stored.entry.tier {
                Tier::Gold => stats.active_gold -= 1,
                Tier::Silver => stats.active_silver -= 1,
                Tier::Bronze => stats.active_bronze -= 1,
            }
            stats.total_burned += 1;
            stats_table.insert(STATS_ROW, encode(&stats)?.as_slice()).map_err(unavailable)?;
        }

        txn.commit().map_err(unavailable)?;
        Ok(())
    }

    fn exists(&self, key_id: &str) -> Result<bool, VaultError> {
        Ok(self.fetch_key(key_id)?.is_some())
    }

    fn count_active(&self, tier: Option<Tier>) -> Result<u64, VaultError> {
        let stats = self.stats()?;
        Ok(match tier {
            Some(tier) => stats.active(tier),
            None => stats.active_total(),
        })
    }

    fn active_key_ids(&self, tier: Option<Tier>) -> Result<Vec<String>, VaultError> {
        let now = self.clock.now_millis();
        let txn = self.db.begin_read().map_err(unavailable)?;
        let keys = txn.open_table(VAULT_KEYS).map_err(unavailable)?;

        let mut ids = Vec::new();
        for result in keys.iter().map_err(unavailable)? {
            let (_, value) = result.map_err(unavailable)?;
            let stored = decode_stored(value.value())?;
            if now >= stored.expires_at || stored.entry.status != KeyStatus::Active {
                continue;
            }
            if tier.map_or(true, |t| stored.entry.tier == t) {
                ids.push(stored.entry.key_id);
            }
        }
        Ok(ids)
    }

    fn purge_expired(&self, max_age_days: u32) -> Result<u64, VaultError> {
        let now = self.clock.now_millis();
        let cutoff = now.saturating_sub(u64::from(max_age_days) * 86_400_000);
        let txn = self.db.begin_write().map_err(unavailable)?;

        let purged;
        {
            let mut keys = txn.open_table(VAULT_KEYS).map_err(unavailable)?;

            let mut doomed = Vec::new();
            for result in keys.iter().map_err(unavailable)? {
                let (key, value) = result.map_err(unavailable)?;
                let stored = decode_stored(value.value())?;
                let lapsed = now >= stored.expires_at;
                let too_old =
                    stored.entry.status == KeyStatus::Active && stored.entry.created_at < cutoff;
                if lapsed || too_old {
                    doomed.push((key.value().to_string(), stored));
                }
            }

            let mut stats_table = txn.open_table(VAULT_STATS).map_err(unavailable)?;
            let mut stats = read_stats(&stats_table)?;
            for (key_id, stored) in &doomed {
                keys.remove(key_id.as_str()).map_err(unavailable)?;
                apply_expiry_accounting(&mut stats, stored);
            }
            stats_table.insert(STATS_ROW, encode(&stats)?.as_slice()).map_err(unavailable)?;

            purged = doomed.len() as u64;
        }

        txn.commit().map_err(unavailable)?;
        Ok(purged)
    }

    fn stats(&self) -> Result<VaultStats, VaultError> {
        let txn = self.db.begin_read().map_err(unavailable)?;
        let stats_table = txn.open_table(VAULT_STATS).map_err(unavailable)?;
        read_stats(&stats_table)
    }
}
