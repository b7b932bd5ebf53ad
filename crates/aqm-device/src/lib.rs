//! Device-local stores for the AQM key lifecycle.
//!
//! A recipient device keeps the private halves of its minted coins in the
//! [`VaultStore`] (burn-after-use, TTL-bounded); a sender device caches
//! contacts' public halves in the [`InventoryStore`] (per-contact,
//! per-tier budget caps, FIFO consumption). Background maintenance is
//! [`InventoryGc`] (inactive-contact sweeps) and [`StorageReporter`]
//! (usage and replenishment reporting).
//!
//! # Architecture
//!
//! Stores are capability traits with interchangeable backends: an
//! `Arc<Mutex<_>>` memory implementation for tests and simulation, a `redb`
//! durable implementation where state must survive restarts, and a chaotic
//! fault-injecting wrapper for failure testing. All operations are
//! synchronous; thread safety comes from each backend's own atomic
//! primitives, never from a global lock.
//!
//! # Components
//!
//! - [`VaultStore`]: [`MemoryVault`], [`RedbVault`], [`ChaoticVault`]
//! - [`InventoryStore`]: [`MemoryInventory`]
//! - [`InventoryGc`]: inactivity sweeps, manual purges, dry runs
//! - [`StorageReporter`]: storage usage, vault counters, deficits

#![deny(missing_docs)]

mod error;
mod gc;
mod inventory;
mod reporter;
mod vault;

pub use error::{InventoryError, ReportError, VaultError};
pub use gc::InventoryGc;
pub use inventory::{InventoryStore, MemoryInventory};
pub use reporter::StorageReporter;
pub use vault::{ChaoticVault, MemoryVault, RedbVault, VaultStore};
