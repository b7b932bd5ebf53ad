//! Public key inventory with budget caps and FIFO selection.
//!
//! Per contact and per tier, the inventory caches pre-fetched public halves
//! under a fixed `(priority, tier)` budget matrix. Inserts go through an
//! optimistic-locked budget check so the cap holds even when refills race;
//! selection pops the oldest key of the desired tier, falling back down
//! (never up) when a tier is empty.

mod memory;

use aqm_core::{ContactMeta, InventoryEntry, InventorySummary, Priority, Tier};
use bytes::Bytes;
pub use memory::MemoryInventory;

use crate::error::InventoryError;

/// Device-local cache of contacts' public key halves.
///
/// Must be `Clone` (handles shared across tasks), `Send + Sync`, and
/// synchronous. Implementations typically share internal state via `Arc`.
///
/// # Concurrency
///
/// There is no store-wide lock. `store_key` is an optimistic
/// watch/check/commit loop on the `(contact, tier)` index; `select_coin`'s
/// pop is its only serialization point — a losing racer simply observes the
/// index as empty and falls back or returns `None`.
pub trait InventoryStore: Clone + Send + Sync + 'static {
    /// Register a contact. Idempotent: the first call creates the meta and
    /// returns `true`; subsequent calls are no-ops returning `false`.
    fn register_contact(
        &self,
        contact_id: &str,
        priority: Priority,
        display_name: &str,
    ) -> Result<bool, InventoryError>;

    /// Change a contact's priority, returning the number of evicted keys.
    ///
    /// On a downgrade, each tier's index is synchronously trimmed to the new
    /// cap by evicting the **newest** entries. On an upgrade the caps rise
    /// immediately and nothing is evicted; the bridge fills the gap
    /// asynchronously.
    ///
    /// # Errors
    ///
    /// - [`InventoryError::NotRegistered`] if the contact has no meta
    fn set_contact_priority(
        &self,
        contact_id: &str,
        priority: Priority,
    ) -> Result<u64, InventoryError>;

    /// Contact meta, or `None` if unregistered.
    fn contact_meta(&self, contact_id: &str) -> Result<Option<ContactMeta>, InventoryError>;

    /// Budget-respecting insert of one public key.
    ///
    /// Protocol: read the contact's priority (`NotRegistered` if absent);
    /// a cap of zero fails immediately; otherwise watch the `(contact,
    /// tier)` index, check its size against the cap, and commit the entry
    /// plus index member atomically — aborting to a bounded retry when the
    /// watched index moved underneath the check.
    ///
    /// # Errors
    ///
    /// - [`InventoryError::NotRegistered`] if the contact has no meta
    /// - [`InventoryError::BudgetExceeded`] when the index is at cap
    /// - [`InventoryError::Concurrency`] when the retry bound is exhausted
    fn store_key(
        &self,
        contact_id: &str,
        key_id: &str,
        tier: Tier,
        public_key: Bytes,
        signature: Bytes,
    ) -> Result<(), InventoryError>;

    /// Pop the oldest key of the desired tier, walking the downward-only
    /// fallback chain when a tier is empty. Returns `None` when every
    /// attempted tier is empty. Bumps the contact's `last_msg_at` on any
    /// success.
    ///
    /// Within one `(contact, tier)` stream, successive calls return keys in
    /// strictly ascending `fetched_at` order (insertion order breaks ties).
    ///
    /// # Errors
    ///
    /// - [`InventoryError::NotRegistered`] if the contact has no meta
    fn select_coin(
        &self,
        contact_id: &str,
        desired_tier: Tier,
    ) -> Result<Option<InventoryEntry>, InventoryError>;

    /// Explicitly remove one key (used when a selected key is later rejected
    /// by the caller). Returns `false` if the key is absent — a positive
    /// absence, not an error.
    fn consume_key(&self, contact_id: &str, key_id: &str) -> Result<bool, InventoryError>;

    /// Per-tier counts for one contact, from index sizes.
    ///
    /// # Errors
    ///
    /// - [`InventoryError::NotRegistered`] if the contact has no meta
    fn summary(&self, contact_id: &str) -> Result<InventorySummary, InventoryError>;

    /// Summaries for every registered contact.
    fn summaries(&self) -> Result<Vec<InventorySummary>, InventoryError>;

    /// True if any tier holds at least one key for the contact.
    fn has_keys_for(&self, contact_id: &str) -> Result<bool, InventoryError>;

    /// Tiers holding at least one key for the contact, strongest first.
    fn available_tiers(&self, contact_id: &str) -> Result<Vec<Tier>, InventoryError>;

    /// Ids of all registered contacts. Maintenance scan for GC and
    /// reporting.
    fn contacts(&self) -> Result<Vec<String>, InventoryError>;

    /// Delete every cached key (all tiers) for a contact in one atomic
    /// step, returning the number deleted. Maintenance operation for GC;
    /// the contact's meta is left untouched.
    fn purge_contact_keys(&self, contact_id: &str) -> Result<u64, InventoryError>;

    /// Remove a contact's meta. Maintenance operation for GC's delete-meta
    /// mode; call [`purge_contact_keys`](Self::purge_contact_keys) first.
    fn remove_contact(&self, contact_id: &str) -> Result<(), InventoryError>;
}
