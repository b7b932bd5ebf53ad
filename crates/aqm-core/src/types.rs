//! Entity types shared across the vault, inventory, and directory stores.
//!
//! All binary material (encrypted blobs, public keys, signatures) is opaque
//! [`Bytes`]: the core moves it byte-exactly and never inspects it. Persisted
//! types derive `serde` so durable backends can encode them as CBOR.

use std::collections::BTreeMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::tier::{Priority, Tier};

/// Lifecycle state of a private key in the vault.
///
/// Transitions are strictly `Active` → `Burned` → gone. A burned entry is
/// invisible to fetches and is physically dropped after a short grace window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyStatus {
    /// Usable exactly once.
    Active,
    /// Consumed; retained briefly for audit, then purged.
    Burned,
}

/// One minted private key as held by the vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultEntry {
    /// Opaque key identifier, unique within the vault.
    pub key_id: String,
    /// Strength tier of the pair this key belongs to.
    pub tier: Tier,
    /// Hardware-encrypted private key material.
    pub encrypted_blob: Bytes,
    /// IV used by the hardware encryption.
    pub iv: Bytes,
    /// Authentication tag over the encrypted blob.
    pub auth_tag: Bytes,
    /// Lifecycle state.
    pub status: KeyStatus,
    /// Creation time, milliseconds since the Unix epoch.
    pub created_at: u64,
    /// Algorithm label (e.g. `kyber768_v1`).
    pub coin_version: String,
}

/// Aggregate vault counters.
///
/// Maintained transactionally with every entry mutation, never derived by
/// scanning on the hot path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultStats {
    /// Active gold entries.
    pub active_gold: u64,
    /// Active silver entries.
    pub active_silver: u64,
    /// Active bronze entries.
    pub active_bronze: u64,
    /// Entries ever burned.
    pub total_burned: u64,
    /// Entries ever reaped by expiry purge.
    pub total_expired: u64,
}

impl VaultStats {
    /// Active count for one tier.
    pub fn active(&self, tier: Tier) -> u64 {
        match tier {
            Tier::Gold => self.active_gold,
            Tier::Silver => self.active_silver,
            Tier::Bronze => self.active_bronze,
        }
    }

    /// Active count across all tiers.
    pub fn active_total(&self) -> u64 {
        self.active_gold + self.active_silver + self.active_bronze
    }
}

/// One cached public key in a sender's inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryEntry {
    /// Contact the key was fetched for.
    pub contact_id: String,
    /// Opaque key identifier (unique per contact).
    pub key_id: String,
    /// Strength tier.
    pub tier: Tier,
    /// Public key material.
    pub public_key: Bytes,
    /// Mint signature over the public key.
    pub signature: Bytes,
    /// When the key entered this inventory, milliseconds since the Unix
    /// epoch. FIFO selection consumes ascending `fetched_at`.
    pub fetched_at: u64,
}

/// Registered contact metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactMeta {
    /// Contact identifier.
    pub contact_id: String,
    /// Budget class.
    pub priority: Priority,
    /// Last successful coin selection for this contact, milliseconds since
    /// the Unix epoch. Drives inactivity GC.
    pub last_msg_at: u64,
    /// Human-readable name; may be empty.
    pub display_name: String,
}

/// Per-tier counts for one contact's inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventorySummary {
    /// Contact these counts belong to.
    pub contact_id: String,
    /// Cached gold keys.
    pub gold_count: u64,
    /// Cached silver keys.
    pub silver_count: u64,
    /// Cached bronze keys.
    pub bronze_count: u64,
    /// Contact priority at the time of the query.
    pub priority: Priority,
}

impl InventorySummary {
    /// Count for one tier.
    pub fn count(&self, tier: Tier) -> u64 {
        match tier {
            Tier::Gold => self.gold_count,
            Tier::Silver => self.silver_count,
            Tier::Bronze => self.bronze_count,
        }
    }

    /// Total cached keys across tiers.
    pub fn total(&self) -> u64 {
        self.gold_count + self.silver_count + self.bronze_count
    }
}

/// Per-tier totals, used for directory stock counts and replenishment
/// deficits alike.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierCounts {
    /// Gold count.
    pub gold: u64,
    /// Silver count.
    pub silver: u64,
    /// Bronze count.
    pub bronze: u64,
}

impl TierCounts {
    /// Count for one tier.
    pub fn get(&self, tier: Tier) -> u64 {
        match tier {
            Tier::Gold => self.gold,
            Tier::Silver => self.silver,
            Tier::Bronze => self.bronze,
        }
    }

    /// Set the count for one tier.
    pub fn set(&mut self, tier: Tier, count: u64) {
        match tier {
            Tier::Gold => self.gold = count,
            Tier::Silver => self.silver = count,
            Tier::Bronze => self.bronze = count,
        }
    }

    /// Sum across tiers.
    pub fn total(&self) -> u64 {
        self.gold + self.silver + self.bronze
    }

    /// True when every tier is zero.
    pub fn is_zero(&self) -> bool {
        self.total() == 0
    }
}

/// Public half of a coin as sent to the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinUpload {
    /// Opaque key identifier; unique per uploading owner.
    pub key_id: String,
    /// Strength tier.
    pub tier: Tier,
    /// Public key material.
    pub public_key: Bytes,
    /// Mint signature over the public key.
    pub signature: Bytes,
}

/// A claimed directory row as returned to a fetcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinRecord {
    /// Opaque key identifier.
    pub key_id: String,
    /// Strength tier.
    pub tier: Tier,
    /// Public key material.
    pub public_key: Bytes,
    /// Mint signature over the public key.
    pub signature: Bytes,
}

/// A freshly minted coin pair plus metadata, as handed to the bridge.
///
/// Minting itself is out of scope; this is the boundary type the bridge
/// splits into a vault entry (private half) and a [`CoinUpload`] (public
/// half).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintedCoin {
    /// Opaque key identifier shared by both halves.
    pub key_id: String,
    /// Strength tier.
    pub tier: Tier,
    /// Algorithm label.
    pub coin_version: String,
    /// Hardware-encrypted private half.
    pub encrypted_blob: Bytes,
    /// IV for the private half.
    pub iv: Bytes,
    /// Authentication tag for the private half.
    pub auth_tag: Bytes,
    /// Public half.
    pub public_key: Bytes,
    /// Mint signature over the public half.
    pub signature: Bytes,
}

impl MintedCoin {
    /// The public half, ready for upload.
    pub fn public_half(&self) -> CoinUpload {
        CoinUpload {
            key_id: self.key_id.clone(),
            tier: self.tier,
            public_key: self.public_key.clone(),
            signature: self.signature.clone(),
        }
    }
}

/// Result of an inventory GC sweep (or dry run).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcReport {
    /// Contacts whose inventory was cleared.
    pub contacts_cleaned: u64,
    /// Cached keys deleted.
    pub keys_deleted: u64,
    /// Estimated bytes freed (per-tier size constants).
    pub bytes_freed: u64,
}

/// Inventory storage usage against the device budget.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageReport {
    /// Estimated bytes used by all cached keys.
    pub total_bytes: u64,
    /// Estimated bytes per contact.
    pub per_contact: BTreeMap<String, u64>,
    /// Configured storage budget in bytes.
    pub budget_bytes: u64,
    /// `total_bytes` as a percentage of the budget, rounded to 2 decimals.
    pub utilization_pct: f64,
}

/// Aggregate health view across the vault and inventory.
#[derive(Debug, Clone, PartialEq)]
pub struct Dashboard {
    /// Vault counters.
    pub vault: VaultStats,
    /// Inventory storage usage.
    pub storage: StorageReport,
    /// Per-contact replenishment deficits (non-Stranger contacts with at
    /// least one tier below cap).
    pub replenish_needs: BTreeMap<String, TierCounts>,
    /// Per-contact inventory summaries.
    pub contacts: Vec<InventorySummary>,
}
