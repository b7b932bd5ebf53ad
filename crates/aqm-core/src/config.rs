//! Frozen configuration record.
//!
//! Every tunable in the system is enumerated here, constructed once, and
//! passed by reference; there is no runtime mutation and no global state.
//! Budget caps and tier sizes are protocol constants (see [`crate::tier`]),
//! not configuration.

use serde::{Deserialize, Serialize};

/// Active vault entries expire after 30 days.
pub const DEFAULT_VAULT_KEY_TTL_SECONDS: u64 = 2_592_000;

/// Burned vault entries are retained for 60 seconds before hard deletion.
pub const DEFAULT_VAULT_BURN_GRACE_SECONDS: u64 = 60;

/// Contacts idle for 30 days are eligible for inventory GC.
pub const DEFAULT_INVENTORY_GC_INACTIVE_DAYS: u32 = 30;

/// Optimistic inventory inserts retry up to 3 times before surfacing a
/// concurrency error.
pub const DEFAULT_OPTIMISTIC_LOCK_RETRIES: u32 = 3;

/// Unclaimed directory rows older than 30 days are purged.
pub const DEFAULT_DIRECTORY_PURGE_STALE_DAYS: u32 = 30;

/// Claimed directory rows are hard-deleted 1 hour after the claim.
pub const DEFAULT_DIRECTORY_HARD_DELETE_GRACE_HOURS: u32 = 1;

/// 64 KB total budget for all cached public keys, for utilization reports.
pub const DEFAULT_INVENTORY_MAX_STORAGE_BYTES: u64 = 65_536;

/// What inventory GC does with an inactive contact after clearing its keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GcMode {
    /// Keep the contact registered but drop it to `Stranger` (caps all go to
    /// zero, so nothing is re-cached until the user re-prioritizes).
    DowngradeToStranger,
    /// Remove the contact meta entirely.
    DeleteMeta,
}

/// All tunables, with the documented defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AqmConfig {
    /// TTL for active vault entries, in seconds.
    pub vault_key_ttl_seconds: u64,
    /// Retention of burned vault entries, in seconds.
    pub vault_burn_grace_seconds: u64,
    /// Inactivity cutoff for inventory GC, in days.
    pub inventory_gc_inactive_days: u32,
    /// Bound on the optimistic-lock retry loop in inventory inserts.
    pub inventory_optimistic_lock_retries: u32,
    /// Age cutoff for purging unclaimed directory rows, in days.
    pub directory_purge_stale_days: u32,
    /// Grace window before claimed directory rows are hard-deleted, in hours.
    pub directory_hard_delete_grace_hours: u32,
    /// Storage budget for utilization reporting, in bytes.
    pub inventory_max_storage_bytes: u64,
    /// Disposition of inactive contacts after GC.
    pub gc_mode: GcMode,
}

impl Default for AqmConfig {
    fn default() -> Self {
        Self {
            vault_key_ttl_seconds: DEFAULT_VAULT_KEY_TTL_SECONDS,
            vault_burn_grace_seconds: DEFAULT_VAULT_BURN_GRACE_SECONDS,
            inventory_gc_inactive_days: DEFAULT_INVENTORY_GC_INACTIVE_DAYS,
            inventory_optimistic_lock_retries: DEFAULT_OPTIMISTIC_LOCK_RETRIES,
            directory_purge_stale_days: DEFAULT_DIRECTORY_PURGE_STALE_DAYS,
            directory_hard_delete_grace_hours: DEFAULT_DIRECTORY_HARD_DELETE_GRACE_HOURS,
            inventory_max_storage_bytes: DEFAULT_INVENTORY_MAX_STORAGE_BYTES,
            gc_mode: GcMode::DowngradeToStranger,
        }
    }
}
