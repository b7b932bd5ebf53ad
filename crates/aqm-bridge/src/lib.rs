//! Bridge protocol between device stores and the server directory.
//!
//! Cross-store consistency without distributed transactions: each flow is
//! unidirectional and idempotent, so a crash between steps is recovered by
//! retrying.
//!
//! - **Mint**: private halves into the vault first, then one directory
//!   upload of the public halves. A vault failure aborts the batch before
//!   anything is uploaded; a retry after an ambiguous upload failure is
//!   absorbed by the directory's `(owner, key_id)` uniqueness.
//! - **Fetch**: claim a batch from the directory, then cache row by row —
//!   the inventory re-validates its budget on every insert, so a surplus
//!   claim is discarded rather than overfilling the cache.
//! - **Sync**: compute per-tier deficits from the live summary and fetch
//!   only what is missing.

#![deny(missing_docs)]

use aqm_core::{budget_cap, MintedCoin, Tier, TierCounts};
use aqm_device::{InventoryError, InventoryStore, VaultError, VaultStore};
use aqm_directory::{CoinDirectory, DirectoryError};
use thiserror::Error;

/// Errors from bridge flows, wrapping whichever store failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// The vault side of a flow failed.
    #[error(transparent)]
    Vault(#[from] VaultError),

    /// The inventory side of a flow failed.
    #[error(transparent)]
    Inventory(#[from] InventoryError),

    /// The directory side of a flow failed.
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

/// Glue between the device stores and the directory.
///
/// Holds capabilities only (no I/O of its own) plus this device's requester
/// identity for directory claims.
pub struct Bridge<D, I, V> {
    directory: D,
    inventory: I,
    vault: V,
    /// Identity recorded as `claimed_by` on every claim this device makes.
    self_id: String,
}

impl<D, I, V> Bridge<D, I, V>
where
    D: CoinDirectory,
    I: InventoryStore,
    V: VaultStore,
{
    /// Create a bridge claiming under `self_id`.
    pub fn new(directory: D, inventory: I, vault: V, self_id: impl Into<String>) -> Self {
        Self { directory, inventory, vault, self_id: self_id.into() }
    }

    /// Claim up to `count` coins of one tier for `contact` from the
    /// directory and cache them locally. Returns the number actually
    /// cached, which may be less than claimed: once the inventory reports
    /// its budget full, the remaining claims are discarded (an accepted
    /// lost claim — the caps are already satisfied).
    pub fn fetch_and_cache(
        &self,
        contact_id: &str,
        target_owner: &str,
        tier: Tier,
        count: u64,
    ) -> Result<u64, BridgeError> {
        let claimed = self.directory.fetch_coins(target_owner, &self.self_id, tier, count)?;

        let mut cached = 0u64;
        for record in claimed {
            match self.inventory.store_key(
                contact_id,
                &record.key_id,
                record.tier,
                record.public_key,
                record.signature,
            ) {
                Ok(()) => cached += 1,
                Err(InventoryError::BudgetExceeded { .. }) => {
                    tracing::debug!(
                        contact_id,
                        tier = %tier,
                        cached,
                        "budget reached mid-refill, discarding surplus claims"
                    );
                    break;
                },
                Err(err) => return Err(err.into()),
            }
        }

        Ok(cached)
    }

    /// Store a freshly minted batch: every private half into the vault,
    /// then one upload of the public halves. Returns the number of coins
    /// the directory actually inserted (zero on a pure retry).
    ///
    /// Any vault failure aborts the whole batch before the upload; the
    /// caller retries the full batch, and both stores absorb the overlap
    /// (the vault reports duplicates, which are skipped; the directory
    /// dedupes on `(owner, key_id)`).
    pub fn upload_minted(
        &self,
        owner_id: &str,
        minted: &[MintedCoin],
    ) -> Result<u64, BridgeError> {
        for coin in minted {
            match self.vault.store_key(
                &coin.key_id,
                coin.tier,
                coin.encrypted_blob.clone(),
                coin.iv.clone(),
                coin.auth_tag.clone(),
                &coin.coin_version,
            ) {
                // A duplicate means a previous attempt already stored this
                // private half; keep going so the retry can finish the
                // upload side.
                Ok(()) | Err(VaultError::AlreadyExists { .. }) => {},
                Err(err) => return Err(err.into()),
            }
        }

        let uploads: Vec<_> = minted.iter().map(MintedCoin::public_half).collect();
        let inserted = self.directory.upload_coins(owner_id, &uploads)?;

        tracing::debug!(owner_id, minted = minted.len(), inserted, "minted batch uploaded");
        Ok(inserted)
    }

    /// Top up the local cache for one contact to its budget caps. Computes
    /// the per-tier deficit from the live summary and claims only what is
    /// missing. Returns the count fetched per tier.
    ///
    /// An unregistered contact yields an all-zero result — sync is a
    /// background reconciliation and tolerates contacts disappearing
    /// underneath it.
    pub fn sync_inventory(
        &self,
        contact_id: &str,
        target_owner: &str,
    ) -> Result<TierCounts, BridgeError> {
        let Some(meta) = self.inventory.contact_meta(contact_id)? else {
            return Ok(TierCounts::default());
        };
        let summary = self.inventory.summary(contact_id)?;

        let mut fetched = TierCounts::default();
        for tier in Tier::ALL {
            let cap = u64::from(budget_cap(meta.priority, tier));
            let deficit = cap.saturating_sub(summary.count(tier));
            if deficit == 0 {
                continue;
            }
            fetched.set(tier, self.fetch_and_cache(contact_id, target_owner, tier, deficit)?);
        }

        Ok(fetched)
    }
}
