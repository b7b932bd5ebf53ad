//! Server-side coin directory for the AQM key lifecycle.
//!
//! The directory is the authoritative pool of uploaded public key halves.
//! Its one hard job is fork immunity: a coin handed to one fetcher must
//! never be handed to another. Fetch is therefore Delete-on-Fetch — a single
//! atomic claim that marks rows with the requester's identity — and uploads
//! are idempotent on `(owner, key_id)` so device retries after ambiguous
//! network failures neither duplicate nor fail.
//!
//! Claimed rows are soft-deleted (the claim column is set, never cleared)
//! and linger until a periodic job hard-deletes them past a grace window, so
//! a post-mortem can distinguish "never uploaded" from "uploaded then
//! claimed".
//!
//! # Components
//!
//! - [`CoinDirectory`]: the store trait
//! - [`MemoryDirectory`]: in-memory backend for tests and simulation
//! - [`RedbDirectory`]: durable backend (single-writer transactions make
//!   concurrent claims serialize, which is what keeps them disjoint)

#![deny(missing_docs)]

mod error;
mod memory;
mod redb;

use aqm_core::{CoinRecord, CoinUpload, Tier, TierCounts};
pub use error::DirectoryError;
pub use memory::MemoryDirectory;

pub use self::redb::RedbDirectory;

/// One row of the directory pool.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DirectoryRow {
    /// Monotonic record id; assigned at insert, defines "oldest first".
    pub record_id: u64,
    /// Device that minted and uploaded the coin.
    pub owner_id: String,
    /// Opaque key identifier; unique per owner.
    pub key_id: String,
    /// Strength tier.
    pub tier: Tier,
    /// Public key material.
    pub public_key: bytes::Bytes,
    /// Mint signature over the public key.
    pub signature: bytes::Bytes,
    /// Upload time, milliseconds since the Unix epoch (server clock).
    pub uploaded_at: u64,
    /// Requester that claimed this row; set exactly once, never cleared.
    pub claimed_by: Option<String>,
    /// Claim time, milliseconds since the Unix epoch (server clock).
    pub claimed_at: Option<u64>,
}

/// Authoritative server-side pool of public coin halves.
///
/// Must be `Clone` (handles shared across request handlers), `Send + Sync`,
/// and synchronous.
///
/// # Linearizability
///
/// `fetch_coins` executes its whole select-oldest/mark-claimed step as one
/// atomic unit, so the row sets returned to concurrent callers for the same
/// `(owner, tier)` are disjoint. Combined with `(owner, key_id)` uniqueness
/// this means no key id is ever delivered to two requesters.
pub trait CoinDirectory: Clone + Send + Sync + 'static {
    /// Batch-insert uploaded coins, silently dropping duplicates on
    /// `(owner_id, key_id)`. Returns the number actually inserted, so an
    /// idempotent retry of the same batch reports zero.
    fn upload_coins(&self, owner_id: &str, coins: &[CoinUpload]) -> Result<u64, DirectoryError>;

    /// Atomically claim up to `count` oldest unclaimed rows for
    /// `(target_owner, tier)`: set `claimed_by`/`claimed_at` and return
    /// them. Returning fewer than `count` (including zero) is not an error.
    fn fetch_coins(
        &self,
        target_owner: &str,
        requester_id: &str,
        tier: Tier,
        count: u64,
    ) -> Result<Vec<CoinRecord>, DirectoryError>;

    /// Unclaimed stock per tier for one owner.
    fn inventory_count(&self, owner_id: &str) -> Result<TierCounts, DirectoryError>;

    /// Hard-delete unclaimed rows uploaded more than `max_age_days` ago.
    /// Returns the number deleted.
    fn purge_stale(&self, max_age_days: u32) -> Result<u64, DirectoryError>;

    /// Hard-delete claimed rows whose claim is older than `grace_hours`.
    /// Returns the number deleted.
    fn hard_delete_claimed(&self, grace_hours: u32) -> Result<u64, DirectoryError>;
}
