//! Inventory garbage collection.
//!
//! Contacts that have not been messaged for the configured window get their
//! cached keys deleted; the contact itself is either downgraded to Stranger
//! (caps all drop to zero, so nothing is re-cached) or removed entirely,
//! per [`GcMode`]. A dry run computes the same report without mutating
//! anything, for UI preview.

use aqm_core::{coin_size_bytes, Clock, GcMode, GcReport, InventorySummary, Priority, Tier};

use crate::{error::InventoryError, inventory::InventoryStore};

/// Background collector over an inventory store.
///
/// Holds capabilities only; scheduling of the sweep is the integrator's
/// concern.
pub struct InventoryGc<I, C> {
    inventory: I,
    clock: C,
    mode: GcMode,
}

/// Estimated bytes held for a contact, from the per-tier size constants.
fn estimated_bytes(summary: &InventorySummary) -> u64 {
    Tier::ALL.iter().map(|&tier| summary.count(tier) * coin_size_bytes(tier)).sum()
}

impl<I: InventoryStore, C: Clock> InventoryGc<I, C> {
    /// Create a collector with the given disposition for inactive contacts.
    pub fn new(inventory: I, clock: C, mode: GcMode) -> Self {
        Self { inventory, clock, mode }
    }

    fn is_inactive(&self, last_msg_at: u64, inactive_days: u32) -> bool {
        let cutoff = self.clock.now_millis().saturating_sub(u64::from(inactive_days) * 86_400_000);
        last_msg_at < cutoff
    }

    /// Clear one contact's keys and apply the configured disposition.
    fn collect_contact(&self, contact_id: &str) -> Result<GcReport, InventoryError> {
        let summary = self.inventory.summary(contact_id)?;
        let bytes_freed = estimated_bytes(&summary);

        let keys_deleted = self.inventory.purge_contact_keys(contact_id)?;
        match self.mode {
            GcMode::DowngradeToStranger => {
                self.inventory.set_contact_priority(contact_id, Priority::Stranger)?;
            },
            GcMode::DeleteMeta => {
                self.inventory.remove_contact(contact_id)?;
            },
        }

        Ok(GcReport { contacts_cleaned: 1, keys_deleted, bytes_freed })
    }

    /// Sweep every registered contact and collect the inactive ones.
    pub fn garbage_collect(&self, inactive_days: u32) -> Result<GcReport, InventoryError> {
        let mut report = GcReport::default();

        for contact_id in self.inventory.contacts()? {
            let Some(meta) = self.inventory.contact_meta(&contact_id)? else { continue };
            if !self.is_inactive(meta.last_msg_at, inactive_days) {
                continue;
            }

            let cleaned = self.collect_contact(&contact_id)?;
            report.contacts_cleaned += cleaned.contacts_cleaned;
            report.keys_deleted += cleaned.keys_deleted;
            report.bytes_freed += cleaned.bytes_freed;
        }

        tracing::info!(
            contacts_cleaned = report.contacts_cleaned,
            keys_deleted = report.keys_deleted,
            bytes_freed = report.bytes_freed,
            "inventory gc sweep finished"
        );
        Ok(report)
    }

    /// Collect one contact regardless of activity (e.g. the user blocked
    /// them).
    ///
    /// # Errors
    ///
    /// - [`InventoryError::NotRegistered`] if the contact has no meta
    pub fn collect_single_contact(&self, contact_id: &str) -> Result<GcReport, InventoryError> {
        if self.inventory.contact_meta(contact_id)?.is_none() {
            return Err(InventoryError::NotRegistered { contact_id: contact_id.to_string() });
        }
        self.collect_contact(contact_id)
    }

    /// Compute what [`garbage_collect`](Self::garbage_collect) would do
    /// without mutating anything.
    pub fn dry_run(&self, inactive_days: u32) -> Result<GcReport, InventoryError> {
        let mut report = GcReport::default();

        for contact_id in self.inventory.contacts()? {
            let Some(meta) = self.inventory.contact_meta(&contact_id)? else { continue };
            if !self.is_inactive(meta.last_msg_at, inactive_days) {
                continue;
            }

            let summary = self.inventory.summary(&contact_id)?;
            report.contacts_cleaned += 1;
            report.keys_deleted += summary.total();
            report.bytes_freed += estimated_bytes(&summary);
        }

        Ok(report)
    }
}
