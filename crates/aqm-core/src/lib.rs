//! Shared domain model for the AQM key lifecycle core.
//!
//! Single-use key pairs ("coins") move through three coordinated stores: a
//! device-local vault holds private halves with burn-after-use semantics, a
//! device-local inventory caches contacts' public halves under per-priority
//! budget caps, and a server-side directory hands out uploaded public halves
//! with at-most-one-reader claim semantics. This crate defines the vocabulary
//! those stores share; the stores themselves live in `aqm-device` and
//! `aqm-directory`, glued together by `aqm-bridge`.
//!
//! # Components
//!
//! - [`Tier`] / [`Priority`]: coin strength tiers and contact classes, plus
//!   the fixed [`budget_cap`] matrix and downward-only fallback chains
//! - Entity types ([`VaultEntry`], [`InventoryEntry`], [`ContactMeta`], ...)
//! - [`AqmConfig`]: the frozen configuration record
//! - [`Clock`]: wall-clock capability with system and manual implementations
//! - [`DeviceContext`] / [`select_tier`]: device-state tier policy

#![deny(missing_docs)]

mod clock;
mod config;
mod context;
mod tier;
mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AqmConfig, GcMode};
pub use context::{is_maintenance_window, select_tier, DeviceContext};
pub use tier::{budget_cap, coin_size_bytes, ParsePriorityError, ParseTierError, Priority, Tier};
pub use types::{
    CoinRecord, CoinUpload, ContactMeta, Dashboard, GcReport, InventoryEntry, InventorySummary,
    KeyStatus, MintedCoin, StorageReport, TierCounts, VaultEntry, VaultStats,
};
