//! Error types for the wallet ledger
//!
//! Every outcome a caller can branch on is a distinct variant; nothing
//! generic escapes the engine boundary. A duplicate idempotency key is not
//! an error (the prior result is replayed, see `OperationReceipt::replayed`).

use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Storage error (RocksDB); the failed write was all-or-nothing, so
    /// nothing became visible and the operation is safely retryable
    #[error("storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// No wallet exists for the queried account or wallet id
    #[error("wallet not found: {0}")]
    WalletNotFound(String),

    /// No record exists for the queried transaction id
    #[error("transaction not found: {0}")]
    TransactionNotFound(String),

    /// A debit (or the debit leg of a transfer) would take the balance
    /// negative; no record was created
    #[error("insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds {
        /// Balance at the time the operation was applied
        available: u64,
        /// Amount the operation asked for
        requested: u64,
    },

    /// Non-positive or out-of-range amount; rejected before any storage access
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Request rejected before any storage access (self-transfer, reserved
    /// kind, empty account id, ...)
    #[error("validation error: {0}")]
    Validation(String),

    /// The ledger writer could not take or answer the request; the outcome
    /// may be unknown, so retry only through the idempotency-key path
    #[error("concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    /// A committed state failed an audit check (balance drift, broken
    /// transfer linkage)
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

impl Error {
    /// True when the failure happened before anything became visible, so the
    /// whole operation can be re-issued without risking a double effect
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Storage(_))
    }
}
