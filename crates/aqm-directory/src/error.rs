//! Error types for the directory store.

use thiserror::Error;

/// Errors from [`CoinDirectory`](crate::CoinDirectory) operations.
///
/// Everything here is a backend failure; logical outcomes (duplicate
/// uploads, short fetches) are absorbed into successful results by design.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    /// The backing store is unreachable or failed mid-operation.
    #[error("directory backend unavailable: {0}")]
    Unavailable(String),

    /// A persisted row failed to decode.
    #[error("directory row corrupted: {0}")]
    Corrupted(String),
}
