//! Token wallet ledger
//!
//! Per-account token balances with atomic, auditable mutations and a strict
//! non-negative-balance invariant under concurrent access.
//!
//! # Architecture
//!
//! - **Single Writer**: every mutation flows through one writer task, making
//!   operations on the same wallet linearizable without row locks
//! - **Atomic Commits**: each operation is one `WriteBatch`; both legs of a
//!   transfer become visible together or not at all
//! - **Append-Only Audit**: records are never modified or deleted; reversal
//!   is a new compensating entry
//! - **Snapshot Reads**: balance lookups, history, and aggregates never
//!   enter the writer mailbox
//!
//! # Invariants
//!
//! - Non-negativity: no committed state leaves any balance below zero
//! - Conservation: a transfer moves tokens, it never creates or destroys them
//! - Reconciliation: replaying a wallet's records in commit order reproduces
//!   its stored balance exactly

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod actor;
pub mod config;
pub mod directory;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod query;
pub mod storage;
pub mod types;

// Re-exports
pub use config::Config;
pub use directory::WalletDirectory;
pub use error::{Error, Result};
pub use ledger::Ledger;
pub use metrics::Metrics;
pub use query::{
    AggregateCriteria, AggregateReport, Pagination, TransactionFilter, TransactionPage,
};
pub use storage::{Storage, StorageStats};
pub use types::{
    AccountId, EntryRequest, OperationReceipt, ReverseRequest, TransactionKind, TransactionRecord,
    TransactionStatus, TransferReceipt, TransferRequest, Wallet, WalletId,
};
