//! Error types for the device-local stores.
//!
//! Logical errors (duplicate key, unknown contact, exhausted budget) are
//! distinct variants carrying the context a caller needs to react; backend
//! failures surface as `Unavailable` with the underlying message and the
//! caller owns the retry policy. Positive absences — fetching a missing or
//! burned key, consuming an absent inventory entry — are `Ok(None)` /
//! `Ok(false)` results, not errors.

use aqm_core::Tier;
use thiserror::Error;

/// Errors from [`VaultStore`](crate::VaultStore) operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VaultError {
    /// The backing store is unreachable or failed mid-operation.
    #[error("vault backend unavailable: {0}")]
    Unavailable(String),

    /// A persisted entry failed to decode.
    #[error("vault entry corrupted: {0}")]
    Corrupted(String),

    /// Create attempted for a key id that is already present (active or
    /// burned-but-not-yet-dropped).
    #[error("vault key {key_id} already exists")]
    AlreadyExists {
        /// The conflicting key id.
        key_id: String,
    },

    /// Burn attempted for a key id that is absent or expired.
    #[error("vault key {key_id} not found")]
    NotFound {
        /// The missing key id.
        key_id: String,
    },

    /// Burn attempted for a key that was already burned.
    #[error("vault key {key_id} already burned")]
    AlreadyBurned {
        /// The burned key id.
        key_id: String,
    },
}

/// Errors from [`InventoryStore`](crate::InventoryStore) operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InventoryError {
    /// The backing store is unreachable or failed mid-operation.
    #[error("inventory backend unavailable: {0}")]
    Unavailable(String),

    /// Operation on a contact with no registered meta.
    #[error("contact {contact_id} not registered")]
    NotRegistered {
        /// The unknown contact.
        contact_id: String,
    },

    /// Insert would exceed the `(priority, tier)` budget cap.
    #[error("budget exceeded for {contact_id}/{tier}: {current} of {cap} slots used")]
    BudgetExceeded {
        /// Contact whose budget is full.
        contact_id: String,
        /// Tier that is at capacity.
        tier: Tier,
        /// Index size observed at the failing check.
        current: u64,
        /// The cap for this `(priority, tier)` cell.
        cap: u32,
    },

    /// The optimistic insert lost the watched-index race on every attempt.
    ///
    /// The caller may retry at a higher level; the store itself never loops
    /// beyond the configured bound.
    #[error("optimistic insert for {contact_id}/{tier} aborted after {attempts} attempts")]
    Concurrency {
        /// Contact being inserted for.
        contact_id: String,
        /// Tier being inserted into.
        tier: Tier,
        /// Number of attempts made before giving up.
        attempts: u32,
    },
}

/// Errors from aggregate reporting, which reads both stores.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReportError {
    /// The vault side of the report failed.
    #[error(transparent)]
    Vault(#[from] VaultError),

    /// The inventory side of the report failed.
    #[error(transparent)]
    Inventory(#[from] InventoryError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_exceeded_message_carries_context() {
        let err = InventoryError::BudgetExceeded {
            contact_id: "bob".to_string(),
            tier: Tier::Gold,
            current: 5,
            cap: 5,
        };
        assert_eq!(err.to_string(), "budget exceeded for bob/GOLD: 5 of 5 slots used");
    }

    #[test]
    fn report_error_wraps_both_sides() {
        let from_vault: ReportError =
            VaultError::Unavailable("connection refused".to_string()).into();
        assert!(matches!(from_vault, ReportError::Vault(_)));

        let from_inventory: ReportError =
            InventoryError::Unavailable("connection refused".to_string()).into();
        assert!(matches!(from_inventory, ReportError::Inventory(_)));
    }
}
