//! Private key vault with burn-after-use semantics.
//!
//! Trait-based abstraction over the device's encrypted private-key store.
//! The trait is synchronous; implementations supply their own atomicity
//! (memory: one mutex critical section, redb: one write transaction) so that
//! every entry mutation and its counter delta commit together.
//!
//! Expiry is modeled as a per-entry deadline checked lazily on reads and
//! reaped by [`VaultStore::purge_expired`]; counters only move inside
//! committed mutations, so an entry whose deadline has lapsed but which has
//! not been reaped yet is invisible to fetches while still counted — the
//! purge settles the difference atomically.

mod chaotic;
mod memory;
mod redb;

use aqm_core::{Tier, VaultEntry, VaultStats};
use bytes::Bytes;
pub use chaotic::ChaoticVault;
pub use memory::MemoryVault;
use serde::{Deserialize, Serialize};

pub use self::redb::RedbVault;
use crate::error::VaultError;

/// A vault entry as persisted, with its expiry deadline.
///
/// The deadline starts at `created_at + ttl` and is shortened to a small
/// grace window when the entry is burned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct StoredKey {
    /// The entry itself.
    pub entry: VaultEntry,
    /// Expiry deadline, milliseconds since the Unix epoch.
    pub expires_at: u64,
}

/// Device-local store for private key halves.
///
/// Must be `Clone` (handles shared across tasks), `Send + Sync`, and
/// synchronous. Implementations typically share internal state via `Arc`, so
/// clones access the same underlying storage.
///
/// # Atomicity
///
/// `store_key`, `burn_key`, and `purge_expired` mutate the entry and the
/// aggregate counters within a single transaction: a concurrent `fetch_key`
/// observes either the before-state or the after-state, never a partial
/// state. Counters are never derived by scanning on the hot path.
pub trait VaultStore: Clone + Send + Sync + 'static {
    /// Store a freshly minted private key as `Active`, set its expiry TTL,
    /// and increment the tier's active counter, all atomically.
    ///
    /// # Errors
    ///
    /// - [`VaultError::AlreadyExists`] if the key id is present (active or
    ///   burned-but-not-yet-dropped)
    fn store_key(
        &self,
        key_id: &str,
        tier: Tier,
        encrypted_blob: Bytes,
        iv: Bytes,
        auth_tag: Bytes,
        coin_version: &str,
    ) -> Result<(), VaultError>;

    /// Fetch an entry. Pure read.
    ///
    /// Returns `None` for missing, burned, or expired entries — a positive
    /// absence, not an error. Once a burn commits, every fetcher sees
    /// `None`.
    fn fetch_key(&self, key_id: &str) -> Result<Option<VaultEntry>, VaultError>;

    /// Irreversibly consume a key: flip `Active` → `Burned`, shorten the
    /// expiry to the burn grace window, decrement the tier's active counter,
    /// and increment `total_burned`, all atomically.
    ///
    /// The entry lingers (invisible to fetches) until the grace elapses so
    /// a post-mortem can distinguish "never stored" from "stored then
    /// burned".
    ///
    /// # Errors
    ///
    /// - [`VaultError::NotFound`] if the key is absent or expired
    /// - [`VaultError::AlreadyBurned`] if the key was already burned
    fn burn_key(&self, key_id: &str) -> Result<(), VaultError>;

    /// Fast existence check for an active, unexpired entry.
    fn exists(&self, key_id: &str) -> Result<bool, VaultError>;

    /// Active count for one tier, or across all tiers when `tier` is `None`.
    ///
    /// Reads the counter hash; never scans.
    fn count_active(&self, tier: Option<Tier>) -> Result<u64, VaultError>;

    /// Ids of all active, unexpired entries, optionally filtered by tier.
    ///
    /// O(n) scan; background/maintenance use only.
    fn active_key_ids(&self, tier: Option<Tier>) -> Result<Vec<String>, VaultError>;

    /// Reap entries whose expiry deadline has lapsed, plus active entries
    /// created before `now - max_age_days` (the safety net for lost TTLs).
    ///
    /// Reaping an active entry decrements its tier counter and increments
    /// `total_expired`; reaping a burned entry past its grace window moves
    /// no counters (they moved at burn time). Returns the number of entries
    /// removed.
    fn purge_expired(&self, max_age_days: u32) -> Result<u64, VaultError>;

    /// Aggregate counters.
    fn stats(&self) -> Result<VaultStats, VaultError>;
}
