#![allow(clippy::disallowed_types, reason = "Synchronous in-memory operations only")]
#![allow(clippy::expect_used, reason = "Mutex poisoning should cause a panic")]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use aqm_core::{AqmConfig, Clock, KeyStatus, Tier, VaultEntry, VaultStats};
use bytes::Bytes;

use super::{StoredKey, VaultStore};
use crate::error::VaultError;

/// In-memory vault implementation for testing and simulation.
///
/// All state lives behind one `Arc<Mutex<_>>`, which makes every mutation
/// trivially transactional: the entry and the counters change in the same
/// critical section. Clone shares the same underlying storage. Uses
/// `lock().expect()` and will panic on a poisoned mutex — acceptable for
/// test/simulation code.
#[derive(Clone)]
pub struct MemoryVault<C: Clock> {
    inner: Arc<Mutex<MemoryVaultInner>>,
    clock: C,
    ttl_millis: u64,
    burn_grace_millis: u64,
}

struct MemoryVaultInner {
    /// Entries by key id, with their expiry deadlines.
    entries: HashMap<String, StoredKey>,

    /// Aggregate counters; only mutated together with `entries`.
    stats: VaultStats,
}

impl<C: Clock> MemoryVault<C> {
    /// Create an empty vault using the TTL and burn grace from `config`.
    pub fn new(config: &AqmConfig, clock: C) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryVaultInner {
                entries: HashMap::new(),
                stats: VaultStats::default(),
            })),
            clock,
            ttl_millis: config.vault_key_ttl_seconds * 1_000,
            burn_grace_millis: config.vault_burn_grace_seconds * 1_000,
        }
    }

    /// Number of physically present entries, including burned ones still in
    /// their grace window. Useful for debugging and testing.
    pub fn entry_count(&self) -> usize {
        self.inner.lock().expect("MemoryVault mutex poisoned").entries.len()
    }
}

/// True when `stored` should be treated as absent at time `now`.
fn is_expired(stored: &StoredKey, now: u64) -> bool {
    now >= stored.expires_at
}

impl<C: Clock> VaultStore for MemoryVault<C> {
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
        let mut inner = self.inner.lock().expect("MemoryVault mutex poisoned");

        if let Some(existing) = inner.entries.get(key_id) {
            if !is_expired(existing, now) {
                return Err(VaultError::AlreadyExists { key_id: key_id.to_string() });
            }
            // The old entry's deadline lapsed; reap it here so the id is
            // reusable without waiting for the purge sweep.
            let was_active = existing.entry.status == KeyStatus::Active;
            let old_tier = existing.entry.tier;
            inner.entries.remove(key_id);
            if was_active {
                let active = inner.stats.active(old_tier) - 1;
                set_active(&mut inner.stats, old_tier, active);
                inner.stats.total_expired += 1;
            }
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
        inner
            .entries
            .insert(key_id.to_string(), StoredKey { entry, expires_at: now + self.ttl_millis });

        let active = inner.stats.active(tier) + 1;
        set_active(&mut inner.stats, tier, active);

        Ok(())
    }

    fn fetch_key(&self, key_id: &str) -> Result<Option<VaultEntry>, VaultError> {
        let now = self.clock.now_millis();
        let inner = self.inner.lock().expect("MemoryVault mutex poisoned");

        Ok(inner
            .entries
            .get(key_id)
            .filter(|stored| !is_expired(stored, now))
            .filter(|stored| stored.entry.status == KeyStatus::Active)
            .map(|stored| stored.entry.clone()))
    }

    fn burn_key(&self, key_id: &str) -> Result<(), VaultError> {
        let now = self.clock.now_millis();
        let mut inner = self.inner.lock().expect("MemoryVault mutex poisoned");

        let stored = inner
            .entries
            .get_mut(key_id)
            .filter(|stored| now < stored.expires_at)
            .ok_or_else(|| VaultError::NotFound { key_id: key_id.to_string() })?;

        if stored.entry.status == KeyStatus::Burned {
            return Err(VaultError::AlreadyBurned { key_id: key_id.to_string() });
        }

        stored.entry.status = KeyStatus::Burned;
        stored.expires_at = now + self.burn_grace_millis;
        let tier = stored.entry.tier;

        let active = inner.stats.active(tier) - 1;
        set_active(&mut inner.stats, tier, active);
        inner.stats.total_burned += 1;

        Ok(())
    }

    fn exists(&self, key_id: &str) -> Result<bool, VaultError> {
        Ok(self.fetch_key(key_id)?.is_some())
    }

    fn count_active(&self, tier: Option<Tier>) -> Result<u64, VaultError> {
        let inner = self.inner.lock().expect("MemoryVault mutex poisoned");
        Ok(match tier {
            Some(tier) => inner.stats.active(tier),
            None => inner.stats.active_total(),
        })
    }

    fn active_key_ids(&self, tier: Option<Tier>) -> Result<Vec<String>, VaultError> {
        let now = self.clock.now_millis();
        let inner = self.inner.lock().expect("MemoryVault mutex poisoned");

        Ok(inner
            .entries
            .values()
            .filter(|stored| !is_expired(stored, now))
            .filter(|stored| stored.entry.status == KeyStatus::Active)
            .filter(|stored| tier.map_or(true, |t| stored.entry.tier == t))
            .map(|stored| stored.entry.key_id.clone())
            .collect())
    }

    fn purge_expired(&self, max_age_days: u32) -> Result<u64, VaultError> {
        let now = self.clock.now_millis();
        let cutoff = now.saturating_sub(u64::from(max_age_days) * 86_400_000);
        let mut inner = self.inner.lock().expect("MemoryVault mutex poisoned");

        let doomed: Vec<String> = inner
            .entries
            .values()
            .filter(|stored| {
                is_expired(stored, now)
                    || (stored.entry.status == KeyStatus::Active && stored.entry.created_at < cutoff)
            })
            .map(|stored| stored.entry.key_id.clone())
            .collect();

        for key_id in &doomed {
            let Some(stored) = inner.entries.remove(key_id) else { continue };
            if stored.entry.status == KeyStatus::Active {
                let active = inner.stats.active(stored.entry.tier) - 1;
                set_active(&mut inner.stats, stored.entry.tier, active);
                inner.stats.total_expired += 1;
            }
        }

        Ok(doomed.len() as u64)
    }

    fn stats(&self) -> Result<VaultStats, VaultError> {
        Ok(self.inner.lock().expect("MemoryVault mutex poisoned").stats)
    }
}

fn set_active(stats: &mut VaultStats, tier: Tier, count: u64) {
    match tier {
        Tier::Gold => stats.active_gold = count,
        Tier::Silver => stats.active_silver = count,
        Tier::Bronze => stats.active_bronze = count,
    }
}
