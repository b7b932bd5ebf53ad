#![allow(clippy::disallowed_types, reason = "Synchronous in-memory operations only")]
#![allow(clippy::expect_used, reason = "Mutex poisoning should cause a panic")]

use std::{
    collections::{BTreeSet, HashMap},
    sync::{Arc, Mutex},
};

use aqm_core::{
    budget_cap, AqmConfig, Clock, ContactMeta, InventoryEntry, InventorySummary, Priority, Tier,
};
use bytes::Bytes;

use super::InventoryStore;
use crate::error::InventoryError;

/// In-memory inventory implementation.
///
/// Per contact, each tier keeps a FIFO index of `(fetched_at, seq, key_id)`
/// triples; the monotonic `seq` breaks same-millisecond ties so selection
/// order is exactly insertion order. Each index carries a version counter
/// bumped by every mutation — the watch token for the optimistic insert.
///
/// The insert deliberately takes the lock twice: the watch phase snapshots
/// `(size, version)` and releases, the commit phase re-checks the version
/// and aborts to a retry when a concurrent mutation moved the index in the
/// gap. That is the WATCH/MULTI discipline of the budget protocol, with
/// real aborts under contention.
///
/// Clone shares the same underlying storage. Uses `lock().expect()` and will
/// panic on a poisoned mutex — acceptable for device-local state where a
/// poisoned lock means a bug already happened.
#[derive(Clone)]
pub struct MemoryInventory<C: Clock> {
    inner: Arc<Mutex<MemoryInventoryInner>>,
    clock: C,
    lock_retries: u32,
}

struct MemoryInventoryInner {
    /// Registered contacts.
    contacts: HashMap<String, ContactMeta>,

    /// Cached entries by contact, then key id.
    coins: HashMap<String, HashMap<String, StoredCoin>>,

    /// FIFO indexes by contact.
    indexes: HashMap<String, TierIndexes>,

    /// Monotonic insert sequence, shared by all indexes.
    next_seq: u64,
}

struct StoredCoin {
    entry: InventoryEntry,
    /// Position of this entry in its index triple.
    seq: u64,
}

#[derive(Default)]
struct TierIndexes {
    gold: TierIndex,
    silver: TierIndex,
    bronze: TierIndex,
}

impl TierIndexes {
    fn get(&self, tier: Tier) -> &TierIndex {
        match tier {
            Tier::Gold => &self.gold,
            Tier::Silver => &self.silver,
            Tier::Bronze => &self.bronze,
        }
    }

    fn get_mut(&mut self, tier: Tier) -> &mut TierIndex {
        match tier {
            Tier::Gold => &mut self.gold,
            Tier::Silver => &mut self.silver,
            Tier::Bronze => &mut self.bronze,
        }
    }
}

/// One `(contact, tier)` FIFO index.
#[derive(Default)]
struct TierIndex {
    /// Ordered `(fetched_at, seq, key_id)`; iteration order is selection
    /// order.
    members: BTreeSet<(u64, u64, String)>,

    /// Bumped on every mutation; watched by the optimistic insert.
    version: u64,
}

impl MemoryInventoryInner {
    /// `(size, version)` of one index; `(0, 0)` when it does not exist yet.
    fn index_state(&self, contact_id: &str, tier: Tier) -> (u64, u64) {
        match self.indexes.get(contact_id) {
            Some(tiers) => {
                let idx = tiers.get(tier);
                (idx.members.len() as u64, idx.version)
            },
            None => (0, 0),
        }
    }
}

impl<C: Clock> MemoryInventory<C> {
    /// Create an empty inventory using the optimistic retry bound from
    /// `config`.
    pub fn new(config: &AqmConfig, clock: C) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryInventoryInner {
                contacts: HashMap::new(),
                coins: HashMap::new(),
                indexes: HashMap::new(),
                next_seq: 0,
            })),
            clock,
            lock_retries: config.inventory_optimistic_lock_retries,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInventoryInner> {
        self.inner.lock().expect("MemoryInventory mutex poisoned")
    }
}

fn not_registered(contact_id: &str) -> InventoryError {
    InventoryError::NotRegistered { contact_id: contact_id.to_string() }
}

impl<C: Clock> InventoryStore for MemoryInventory<C> {
    fn register_contact(
        &self,
        contact_id: &str,
        priority: Priority,
        display_name: &str,
    ) -> Result<bool, InventoryError> {
        let now = self.clock.now_millis();
        let mut inner = self.lock();

        if inner.contacts.contains_key(contact_id) {
            return Ok(false);
        }
        inner.contacts.insert(
            contact_id.to_string(),
            ContactMeta {
                contact_id: contact_id.to_string(),
                priority,
                last_msg_at: now,
                display_name: display_name.to_string(),
            },
        );
        Ok(true)
    }

    fn set_contact_priority(
        &self,
        contact_id: &str,
        priority: Priority,
    ) -> Result<u64, InventoryError> {
        let mut guard = self.lock();
        let inner = &mut *guard;

        let meta = inner.contacts.get_mut(contact_id).ok_or_else(|| not_registered(contact_id))?;
        let old = meta.priority;
        if old == priority {
            return Ok(0);
        }
        meta.priority = priority;

        if priority.rank() <= old.rank() {
            // Upgrade: caps rose, nothing to evict.
            return Ok(0);
        }

        // Downgrade: trim each tier to the new cap, newest first.
        let mut evicted = 0u64;
        if let Some(tiers) = inner.indexes.get_mut(contact_id) {
            for tier in Tier::ALL {
                let cap = budget_cap(priority, tier) as usize;
                let idx = tiers.get_mut(tier);
                while idx.members.len() > cap {
                    let Some((_, _, key_id)) = idx.members.pop_last() else { break };
                    idx.version += 1;
                    if let Some(contact_coins) = inner.coins.get_mut(contact_id) {
                        contact_coins.remove(&key_id);
                    }
                    evicted += 1;
                }
            }
        }
        Ok(evicted)
    }

    fn contact_meta(&self, contact_id: &str) -> Result<Option<ContactMeta>, InventoryError> {
        Ok(self.lock().contacts.get(contact_id).cloned())
    }

    fn store_key(
        &self,
        contact_id: &str,
        key_id: &str,
        tier: Tier,
        public_key: Bytes,
        signature: Bytes,
    ) -> Result<(), InventoryError> {
        let cap = {
            let inner = self.lock();
            let meta =
                inner.contacts.get(contact_id).ok_or_else(|| not_registered(contact_id))?;
            budget_cap(meta.priority, tier)
        };
        if cap == 0 {
            return Err(InventoryError::BudgetExceeded {
                contact_id: contact_id.to_string(),
                tier,
                current: 0,
                cap: 0,
            });
        }

        let attempts = self.lock_retries.max(1);
        for _ in 0..attempts {
            // Watch phase: snapshot the index, then release the lock. The
            // gap before the commit is where a concurrent mutation can move
            // the index.
            let (size, watched_version) = self.lock().index_state(contact_id, tier);

            if size >= u64::from(cap) {
                return Err(InventoryError::BudgetExceeded {
                    contact_id: contact_id.to_string(),
                    tier,
                    current: size,
                    cap,
                });
            }

            let fetched_at = self.clock.now_millis();

            // Commit phase: abort to a retry if the watched index moved.
            let mut guard = self.lock();
            let inner = &mut *guard;
            if inner.index_state(contact_id, tier).1 != watched_version {
                continue;
            }

            let seq = inner.next_seq;
            inner.next_seq += 1;

            // Re-store of a cached key id replaces the previous entry.
            if let Some(old) =
                inner.coins.get_mut(contact_id).and_then(|coins| coins.remove(key_id))
            {
                if let Some(tiers) = inner.indexes.get_mut(contact_id) {
                    let idx = tiers.get_mut(old.entry.tier);
                    idx.members.remove(&(old.entry.fetched_at, old.seq, key_id.to_string()));
                    idx.version += 1;
                }
            }

            let entry = InventoryEntry {
                contact_id: contact_id.to_string(),
                key_id: key_id.to_string(),
                tier,
                public_key,
                signature,
                fetched_at,
            };
            inner
                .coins
                .entry(contact_id.to_string())
                .or_default()
                .insert(key_id.to_string(), StoredCoin { entry, seq });

            let idx = inner.indexes.entry(contact_id.to_string()).or_default().get_mut(tier);
            idx.members.insert((fetched_at, seq, key_id.to_string()));
            idx.version += 1;

            return Ok(());
        }

        Err(InventoryError::Concurrency { contact_id: contact_id.to_string(), tier, attempts })
    }

    fn select_coin(
        &self,
        contact_id: &str,
        desired_tier: Tier,
    ) -> Result<Option<InventoryEntry>, InventoryError> {
        if !self.lock().contacts.contains_key(contact_id) {
            return Err(not_registered(contact_id));
        }

        for &tier in desired_tier.fallback_chain() {
            let now = self.clock.now_millis();
            let mut guard = self.lock();
            let inner = &mut *guard;

            let popped = inner.indexes.get_mut(contact_id).and_then(|tiers| {
                let idx = tiers.get_mut(tier);
                let member = idx.members.pop_first();
                if member.is_some() {
                    idx.version += 1;
                }
                member
            });
            let Some((_, _, key_id)) = popped else { continue };

            let coin = inner.coins.get_mut(contact_id).and_then(|coins| coins.remove(&key_id));
            debug_assert!(coin.is_some(), "index member without a stored entry");

            if let Some(meta) = inner.contacts.get_mut(contact_id) {
                meta.last_msg_at = now;
            }
            if let Some(coin) = coin {
                return Ok(Some(coin.entry));
            }
        }

        Ok(None)
    }

    fn consume_key(&self, contact_id: &str, key_id: &str) -> Result<bool, InventoryError> {
        let mut guard = self.lock();
        let inner = &mut *guard;

        let Some(coin) = inner.coins.get_mut(contact_id).and_then(|coins| coins.remove(key_id))
        else {
            return Ok(false);
        };

        if let Some(tiers) = inner.indexes.get_mut(contact_id) {
            let idx = tiers.get_mut(coin.entry.tier);
            idx.members.remove(&(coin.entry.fetched_at, coin.seq, key_id.to_string()));
            idx.version += 1;
        }
        Ok(true)
    }

    fn summary(&self, contact_id: &str) -> Result<InventorySummary, InventoryError> {
        let inner = self.lock();
        let meta = inner.contacts.get(contact_id).ok_or_else(|| not_registered(contact_id))?;

        Ok(InventorySummary {
            contact_id: contact_id.to_string(),
            gold_count: inner.index_state(contact_id, Tier::Gold).0,
            silver_count: inner.index_state(contact_id, Tier::Silver).0,
            bronze_count: inner.index_state(contact_id, Tier::Bronze).0,
            priority: meta.priority,
        })
    }

    fn summaries(&self) -> Result<Vec<InventorySummary>, InventoryError> {
        let inner = self.lock();
        Ok(inner
            .contacts
            .values()
            .map(|meta| InventorySummary {
                contact_id: meta.contact_id.clone(),
                gold_count: inner.index_state(&meta.contact_id, Tier::Gold).0,
                silver_count: inner.index_state(&meta.contact_id, Tier::Silver).0,
                bronze_count: inner.index_state(&meta.contact_id, Tier::Bronze).0,
                priority: meta.priority,
            })
            .collect())
    }

    fn has_keys_for(&self, contact_id: &str) -> Result<bool, InventoryError> {
        let inner = self.lock();
        Ok(Tier::ALL.iter().any(|&tier| inner.index_state(contact_id, tier).0 > 0))
    }

    fn available_tiers(&self, contact_id: &str) -> Result<Vec<Tier>, InventoryError> {
        let inner = self.lock();
        Ok(Tier::ALL
            .into_iter()
            .filter(|&tier| inner.index_state(contact_id, tier).0 > 0)
            .collect())
    }

    fn contacts(&self) -> Result<Vec<String>, InventoryError> {
        Ok(self.lock().contacts.keys().cloned().collect())
    }

    fn purge_contact_keys(&self, contact_id: &str) -> Result<u64, InventoryError> {
        let mut guard = self.lock();
        let inner = &mut *guard;

        let deleted = inner.coins.remove(contact_id).map_or(0, |coins| coins.len() as u64);
        inner.indexes.remove(contact_id);
        Ok(deleted)
    }

    fn remove_contact(&self, contact_id: &str) -> Result<(), InventoryError> {
        self.lock().contacts.remove(contact_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use aqm_core::ManualClock;

    use super::*;

    fn inventory() -> (MemoryInventory<ManualClock>, ManualClock) {
        let clock = ManualClock::new(1_000);
        (MemoryInventory::new(&AqmConfig::default(), clock.clone()), clock)
    }

    fn store(inv: &MemoryInventory<ManualClock>, contact: &str, key: &str, tier: Tier) {
        inv.store_key(contact, key, tier, Bytes::from_static(b"pk"), Bytes::from_static(b"sig"))
            .expect("store failed");
    }

    #[test]
    fn register_is_idempotent() {
        let (inv, _) = inventory();

        assert!(inv.register_contact("bob", Priority::Bestie, "Bob").unwrap());
        assert!(!inv.register_contact("bob", Priority::Mate, "Bobby").unwrap());

        // First registration wins.
        let meta = inv.contact_meta("bob").unwrap().unwrap();
        assert_eq!(meta.priority, Priority::Bestie);
        assert_eq!(meta.display_name, "Bob");
        assert_eq!(meta.last_msg_at, 1_000);
    }

    #[test]
    fn store_requires_registration() {
        let (inv, _) = inventory();
        let result = inv.store_key("ghost", "k1", Tier::Gold, Bytes::new(), Bytes::new());
        assert_eq!(result, Err(InventoryError::NotRegistered { contact_id: "ghost".to_string() }));
    }

    #[test]
    fn zero_cap_fails_immediately() {
        let (inv, _) = inventory();
        inv.register_contact("dave", Priority::Stranger, "").unwrap();

        for tier in Tier::ALL {
            let result = inv.store_key("dave", "k1", tier, Bytes::new(), Bytes::new());
            assert!(matches!(
                result,
                Err(InventoryError::BudgetExceeded { cap: 0, current: 0, .. })
            ));
        }
    }

    #[test]
    fn budget_cap_is_enforced() {
        let (inv, _) = inventory();
        inv.register_contact("bob", Priority::Bestie, "").unwrap();

        for i in 0..5 {
            store(&inv, "bob", &format!("g{i}"), Tier::Gold);
        }

        let result = inv.store_key("bob", "g5", Tier::Gold, Bytes::new(), Bytes::new());
        assert_eq!(
            result,
            Err(InventoryError::BudgetExceeded {
                contact_id: "bob".to_string(),
                tier: Tier::Gold,
                current: 5,
                cap: 5,
            })
        );
        assert_eq!(inv.summary("bob").unwrap().gold_count, 5);
    }

    #[test]
    fn select_is_fifo_within_tier() {
        let (inv, clock) = inventory();
        inv.register_contact("bob", Priority::Mate, "").unwrap();

        store(&inv, "bob", "s1", Tier::Silver);
        clock.advance(10);
        store(&inv, "bob", "s2", Tier::Silver);
        clock.advance(10);
        store(&inv, "bob", "s3", Tier::Silver);

        let order: Vec<String> = (0..3)
            .map(|_| inv.select_coin("bob", Tier::Silver).unwrap().unwrap().key_id)
            .collect();
        assert_eq!(order, vec!["s1", "s2", "s3"]);
        assert_eq!(inv.select_coin("bob", Tier::Silver).unwrap(), None);
    }

    #[test]
    fn same_millisecond_inserts_keep_insertion_order() {
        let (inv, _) = inventory();
        inv.register_contact("bob", Priority::Mate, "").unwrap();

        // Clock never advances: fetched_at ties on every insert.
        for key in ["a", "b", "c", "d"] {
            store(&inv, "bob", key, Tier::Silver);
        }

        let order: Vec<String> = (0..4)
            .map(|_| inv.select_coin("bob", Tier::Silver).unwrap().unwrap().key_id)
            .collect();
        assert_eq!(order, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn select_falls_back_downward_only() {
        let (inv, _) = inventory();
        inv.register_contact("carol", Priority::Mate, "").unwrap();
        store(&inv, "carol", "s1", Tier::Silver);
        store(&inv, "carol", "b1", Tier::Bronze);

        // Gold is empty (cap 0 for Mate) -> falls back to silver.
        let selected = inv.select_coin("carol", Tier::Gold).unwrap().unwrap();
        assert_eq!(selected.tier, Tier::Silver);
        assert_eq!(inv.summary("carol").unwrap().silver_count, 0);

        // Bronze never reaches upward into silver stock.
        store(&inv, "carol", "s2", Tier::Silver);
        let selected = inv.select_coin("carol", Tier::Bronze).unwrap().unwrap();
        assert_eq!(selected.tier, Tier::Bronze);
        assert_eq!(inv.select_coin("carol", Tier::Bronze).unwrap(), None);
    }

    #[test]
    fn select_updates_last_msg_at() {
        let (inv, clock) = inventory();
        inv.register_contact("bob", Priority::Bestie, "").unwrap();
        store(&inv, "bob", "g1", Tier::Gold);

        clock.advance(5_000);
        inv.select_coin("bob", Tier::Gold).unwrap().unwrap();

        assert_eq!(inv.contact_meta("bob").unwrap().unwrap().last_msg_at, 6_000);
    }

    #[test]
    fn select_on_empty_inventory_returns_none() {
        let (inv, _) = inventory();
        inv.register_contact("bob", Priority::Bestie, "").unwrap();
        assert_eq!(inv.select_coin("bob", Tier::Gold).unwrap(), None);
    }

    #[test]
    fn select_unregistered_fails() {
        let (inv, _) = inventory();
        assert_eq!(
            inv.select_coin("ghost", Tier::Gold),
            Err(InventoryError::NotRegistered { contact_id: "ghost".to_string() })
        );
    }

    #[test]
    fn consume_removes_a_specific_key() {
        let (inv, _) = inventory();
        inv.register_contact("bob", Priority::Bestie, "").unwrap();
        store(&inv, "bob", "g1", Tier::Gold);
        store(&inv, "bob", "g2", Tier::Gold);

        assert!(inv.consume_key("bob", "g1").unwrap());
        assert!(!inv.consume_key("bob", "g1").unwrap()); // already gone

        // g1 no longer selectable; g2 is.
        assert_eq!(inv.select_coin("bob", Tier::Gold).unwrap().unwrap().key_id, "g2");
    }

    #[test]
    fn downgrade_trims_newest_first() {
        let (inv, clock) = inventory();
        inv.register_contact("bob", Priority::Bestie, "").unwrap();

        for i in 0..5 {
            store(&inv, "bob", &format!("g{i}"), Tier::Gold);
            clock.advance(1);
        }
        for i in 0..4 {
            store(&inv, "bob", &format!("s{i}"), Tier::Silver);
            clock.advance(1);
        }

        // Bestie -> Mate: gold cap 5 -> 0, silver cap 4 -> 6.
        let evicted = inv.set_contact_priority("bob", Priority::Mate).unwrap();
        assert_eq!(evicted, 5);

        let summary = inv.summary("bob").unwrap();
        assert_eq!(summary.gold_count, 0);
        assert_eq!(summary.silver_count, 4);

        // Untouched tiers keep their FIFO order.
        assert_eq!(inv.select_coin("bob", Tier::Silver).unwrap().unwrap().key_id, "s0");
    }

    #[test]
    fn upgrade_evicts_nothing() {
        let (inv, _) = inventory();
        inv.register_contact("carol", Priority::Mate, "").unwrap();
        for i in 0..6 {
            store(&inv, "carol", &format!("s{i}"), Tier::Silver);
        }

        // Mate -> Bestie: silver cap drops 6 -> 4 on the table, but an
        // upgrade never trims; the cap is enforced on the next insert.
        let evicted = inv.set_contact_priority("carol", Priority::Bestie).unwrap();
        assert_eq!(evicted, 0);
        assert_eq!(inv.summary("carol").unwrap().silver_count, 6);

        let result = inv.store_key("carol", "s6", Tier::Silver, Bytes::new(), Bytes::new());
        assert!(matches!(result, Err(InventoryError::BudgetExceeded { .. })));
    }

    #[test]
    fn set_priority_unregistered_fails() {
        let (inv, _) = inventory();
        assert_eq!(
            inv.set_contact_priority("ghost", Priority::Mate),
            Err(InventoryError::NotRegistered { contact_id: "ghost".to_string() })
        );
    }

    #[test]
    fn availability_queries() {
        let (inv, _) = inventory();
        inv.register_contact("bob", Priority::Bestie, "").unwrap();

        assert!(!inv.has_keys_for("bob").unwrap());
        assert_eq!(inv.available_tiers("bob").unwrap(), Vec::<Tier>::new());

        store(&inv, "bob", "s1", Tier::Silver);
        store(&inv, "bob", "b1", Tier::Bronze);

        assert!(inv.has_keys_for("bob").unwrap());
        assert_eq!(inv.available_tiers("bob").unwrap(), vec![Tier::Silver, Tier::Bronze]);
    }

    #[test]
    fn purge_contact_keys_clears_all_tiers() {
        let (inv, _) = inventory();
        inv.register_contact("bob", Priority::Bestie, "").unwrap();
        store(&inv, "bob", "g1", Tier::Gold);
        store(&inv, "bob", "s1", Tier::Silver);
        store(&inv, "bob", "b1", Tier::Bronze);

        assert_eq!(inv.purge_contact_keys("bob").unwrap(), 3);
        assert!(!inv.has_keys_for("bob").unwrap());
        // Meta survives the purge.
        assert!(inv.contact_meta("bob").unwrap().is_some());
    }

    #[test]
    fn read_your_writes() {
        let (inv, _) = inventory();
        inv.register_contact("bob", Priority::Bestie, "").unwrap();

        store(&inv, "bob", "g1", Tier::Gold);
        let selected = inv.select_coin("bob", Tier::Gold).unwrap().unwrap();
        assert_eq!(selected.key_id, "g1");
        assert_eq!(selected.public_key, Bytes::from_static(b"pk"));
        assert_eq!(selected.signature, Bytes::from_static(b"sig"));
    }

    #[test]
    fn clone_shares_state() {
        let (inv, _) = inventory();
        let other = inv.clone();

        inv.register_contact("bob", Priority::Bestie, "").unwrap();
        store(&other, "bob", "g1", Tier::Gold);

        assert_eq!(inv.summary("bob").unwrap().gold_count, 1);
    }
}
