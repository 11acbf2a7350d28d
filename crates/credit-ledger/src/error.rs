//! Ledger error types.

use thiserror::Error;

/// Errors that can occur in the credit ledger.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Storage I/O error.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<std::io::Error> for LedgerError {
    fn from(e: std::io::Error) -> Self {
        LedgerError::Storage(e.to_string())
    }
}
