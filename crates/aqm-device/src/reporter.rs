//! Aggregate storage and health reporting.
//!
//! Pure aggregation over vault and inventory outputs: byte usage against the
//! device budget, vault counters, and the per-contact replenishment deficits
//! that drive bridge synchronization. Nothing here mutates either store.

use std::collections::BTreeMap;

use aqm_core::{
    budget_cap, coin_size_bytes, AqmConfig, Dashboard, Priority, StorageReport, Tier, TierCounts,
    VaultStats,
};

use crate::{
    error::{InventoryError, ReportError, VaultError},
    inventory::InventoryStore,
    vault::VaultStore,
};

/// Read-only reporter over the device's two stores.
pub struct StorageReporter<V, I> {
    vault: V,
    inventory: I,
    budget_bytes: u64,
}

impl<V: VaultStore, I: InventoryStore> StorageReporter<V, I> {
    /// Create a reporter using the storage budget from `config`.
    pub fn new(vault: V, inventory: I, config: &AqmConfig) -> Self {
        Self { vault, inventory, budget_bytes: config.inventory_max_storage_bytes }
    }

    /// Estimated inventory usage against the storage budget.
    pub fn storage_usage(&self) -> Result<StorageReport, InventoryError> {
        let mut per_contact = BTreeMap::new();
        let mut total_bytes = 0u64;

        for summary in self.inventory.summaries()? {
            let contact_bytes: u64 =
                Tier::ALL.iter().map(|&tier| summary.count(tier) * coin_size_bytes(tier)).sum();
            total_bytes += contact_bytes;
            per_contact.insert(summary.contact_id, contact_bytes);
        }

        let utilization_pct = if self.budget_bytes > 0 {
            let raw = total_bytes as f64 / self.budget_bytes as f64 * 100.0;
            (raw * 100.0).round() / 100.0
        } else {
            0.0
        };

        Ok(StorageReport {
            total_bytes,
            per_contact,
            budget_bytes: self.budget_bytes,
            utilization_pct,
        })
    }

    /// Vault counter passthrough.
    pub fn vault_report(&self) -> Result<VaultStats, VaultError> {
        self.vault.stats()
    }

    /// Per-contact replenishment deficits: `max(0, cap - count)` per tier
    /// for every non-Stranger contact, omitting contacts already at their
    /// caps. This is the work list for bridge synchronization.
    pub fn replenish_needs(&self) -> Result<BTreeMap<String, TierCounts>, InventoryError> {
        let mut needs = BTreeMap::new();

        for summary in self.inventory.summaries()? {
            if summary.priority == Priority::Stranger {
                continue;
            }

            let mut deficit = TierCounts::default();
            for tier in Tier::ALL {
                let cap = u64::from(budget_cap(summary.priority, tier));
                deficit.set(tier, cap.saturating_sub(summary.count(tier)));
            }

            if !deficit.is_zero() {
                needs.insert(summary.contact_id, deficit);
            }
        }

        Ok(needs)
    }

    /// Everything at once: vault counters, storage usage, replenishment
    /// needs, and per-contact summaries.
    pub fn dashboard(&self) -> Result<Dashboard, ReportError> {
        Ok(Dashboard {
            vault: self.vault.stats()?,
            storage: self.storage_usage()?,
            replenish_needs: self.replenish_needs()?,
            contacts: self.inventory.summaries()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use aqm_core::ManualClock;
    use bytes::Bytes;

    use super::*;
    use crate::{inventory::MemoryInventory, vault::MemoryVault};

    fn setup() -> (
        StorageReporter<MemoryVault<ManualClock>, MemoryInventory<ManualClock>>,
        MemoryVault<ManualClock>,
        MemoryInventory<ManualClock>,
    ) {
        let config = AqmConfig::default();
        let clock = ManualClock::new(0);
        let vault = MemoryVault::new(&config, clock.clone());
        let inventory = MemoryInventory::new(&config, clock);
        let reporter = StorageReporter::new(vault.clone(), inventory.clone(), &config);
        (reporter, vault, inventory)
    }

    fn cache(inventory: &MemoryInventory<ManualClock>, contact: &str, key: &str, tier: Tier) {
        inventory
            .store_key(contact, key, tier, Bytes::new(), Bytes::new())
            .expect("store failed");
    }

    #[test]
    fn storage_usage_sums_tier_sizes() {
        let (reporter, _, inventory) = setup();
        inventory.register_contact("bob", Priority::Bestie, "").unwrap();
        cache(&inventory, "bob", "g1", Tier::Gold);
        cache(&inventory, "bob", "s1", Tier::Silver);
        cache(&inventory, "bob", "b1", Tier::Bronze);

        let report = reporter.storage_usage().unwrap();
        let expected = coin_size_bytes(Tier::Gold)
            + coin_size_bytes(Tier::Silver)
            + coin_size_bytes(Tier::Bronze);
        assert_eq!(report.total_bytes, expected);
        assert_eq!(report.per_contact.get("bob"), Some(&expected));
        assert_eq!(report.budget_bytes, 65_536);
        // 4948 / 65536 = 7.5501... -> 7.55
        assert_eq!(report.utilization_pct, 7.55);
    }

    #[test]
    fn replenish_needs_reports_deficits() {
        let (reporter, _, inventory) = setup();
        inventory.register_contact("bob", Priority::Bestie, "").unwrap();
        inventory.register_contact("dave", Priority::Stranger, "").unwrap();
        cache(&inventory, "bob", "g1", Tier::Gold);
        cache(&inventory, "bob", "g2", Tier::Gold);

        let needs = reporter.replenish_needs().unwrap();

        // Strangers never appear.
        assert!(!needs.contains_key("dave"));

        let bob = needs.get("bob").expect("bob has deficits");
        assert_eq!(bob.gold, 3); // cap 5, have 2
        assert_eq!(bob.silver, 4);
        assert_eq!(bob.bronze, 1);
    }

    #[test]
    fn contact_at_cap_is_omitted() {
        let (reporter, _, inventory) = setup();
        inventory.register_contact("bob", Priority::Bestie, "").unwrap();
        for i in 0..5 {
            cache(&inventory, "bob", &format!("g{i}"), Tier::Gold);
        }
        for i in 0..4 {
            cache(&inventory, "bob", &format!("s{i}"), Tier::Silver);
        }
        cache(&inventory, "bob", "b0", Tier::Bronze);

        assert!(reporter.replenish_needs().unwrap().is_empty());
    }

    #[test]
    fn dashboard_combines_both_stores() {
        let (reporter, vault, inventory) = setup();
        inventory.register_contact("bob", Priority::Mate, "").unwrap();
        cache(&inventory, "bob", "s1", Tier::Silver);
        vault
            .store_key("k1", Tier::Gold, Bytes::new(), Bytes::new(), Bytes::new(), "v1")
            .unwrap();

        let dashboard = reporter.dashboard().unwrap();
        assert_eq!(dashboard.vault.active_gold, 1);
        assert_eq!(dashboard.storage.total_bytes, coin_size_bytes(Tier::Silver));
        assert_eq!(dashboard.contacts.len(), 1);
        assert_eq!(dashboard.replenish_needs.get("bob").unwrap().silver, 5);
    }
}
