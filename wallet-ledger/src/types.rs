//! Core types for the wallet ledger
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Exact arithmetic (integer amounts in the smallest token unit)
//! - Append-only audit history (records are never mutated)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Account identifier (platform user id, service account, etc.)
///
/// Each account owns at most one wallet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(String);

impl AccountId {
    /// Create new account ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if the identifier is usable as a wallet owner
    pub fn is_valid(&self) -> bool {
        !self.0.trim().is_empty()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Wallet identifier (UUIDv7 for time-ordering)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct WalletId(Uuid);

impl WalletId {
    /// Generate a fresh wallet ID
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }

    /// Wrap an existing UUID
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Get the underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Raw bytes, used as a storage key prefix
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl fmt::Display for WalletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transaction kind (documented vocabulary)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Token purchase fulfilled by a payment provider
    Purchase,
    /// Compensating entry for an earlier transaction
    Refund,
    /// Admin-initiated balance correction
    Adjustment,
    /// Payment for a mentorship session
    SessionPayment,
    /// Receiving leg of a transfer
    TransferIn,
    /// Sending leg of a transfer
    TransferOut,
    /// Promotional or signup bonus
    Bonus,
    /// Paid content unlock
    Content,
}

impl TransactionKind {
    /// Canonical name
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Purchase => "purchase",
            TransactionKind::Refund => "refund",
            TransactionKind::Adjustment => "adjustment",
            TransactionKind::SessionPayment => "session_payment",
            TransactionKind::TransferIn => "transfer_in",
            TransactionKind::TransferOut => "transfer_out",
            TransactionKind::Bonus => "bonus",
            TransactionKind::Content => "content",
        }
    }

    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "purchase" => Some(TransactionKind::Purchase),
            "refund" => Some(TransactionKind::Refund),
            "adjustment" => Some(TransactionKind::Adjustment),
            "session_payment" => Some(TransactionKind::SessionPayment),
            "transfer_in" => Some(TransactionKind::TransferIn),
            "transfer_out" => Some(TransactionKind::TransferOut),
            "bonus" => Some(TransactionKind::Bonus),
            "content" => Some(TransactionKind::Content),
            _ => None,
        }
    }

    /// The two kinds written exclusively by the transfer operation
    pub fn is_transfer_leg(&self) -> bool {
        matches!(self, TransactionKind::TransferIn | TransactionKind::TransferOut)
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Transaction status
///
/// The engine only ever writes `Completed` entries (a mutation that cannot
/// complete produces no record at all) and `Reversed` compensating entries.
/// `Failed` is part of the documented vocabulary for external tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum TransactionStatus {
    /// Committed balance change (terminal)
    Completed = 1,
    /// Recorded failure (terminal, reserved for external tooling)
    Failed = 2,
    /// Compensating entry reversing an earlier record (terminal)
    Reversed = 3,
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Reversed => "reversed",
        };
        write!(f, "{}", s)
    }
}

/// Balance-bearing record owned by one account
///
/// Balance is mutated only by the transaction engine, inside the same atomic
/// commit as the record describing the change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    /// Unique wallet ID
    pub wallet_id: WalletId,

    /// Owning account
    pub account_id: AccountId,

    /// Current balance in the smallest token unit (never negative)
    pub balance: u64,

    /// Number of committed entries for this wallet; keys the per-wallet log
    pub seq: u64,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    /// Fresh zero-balance wallet for an account
    pub fn new(account_id: AccountId) -> Self {
        let now = Utc::now();
        Self {
            wallet_id: WalletId::generate(),
            account_id,
            balance: 0,
            seq: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Append-only record describing one signed balance change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Unique transaction ID (UUIDv7 for time-ordering)
    pub transaction_id: Uuid,

    /// Wallet this entry belongs to
    pub wallet_id: WalletId,

    /// Signed amount: positive = credit, negative = debit
    pub amount: i64,

    /// Transaction kind
    pub kind: TransactionKind,

    /// Status (terminal on creation; records are never mutated)
    pub status: TransactionStatus,

    /// Free-text description
    pub description: String,

    /// Caller-defined metadata, opaque to the ledger
    #[serde(default)]
    pub metadata: HashMap<String, String>,

    /// Shared ID linking the two legs of a transfer
    pub correlation_id: Option<Uuid>,

    /// The other wallet of a transfer
    pub counterparty: Option<WalletId>,

    /// Original transaction this entry compensates
    pub reverses: Option<Uuid>,

    /// Caller-supplied deduplication key
    pub idempotency_key: Option<String>,

    /// Wallet balance immediately after this entry committed
    pub balance_after: u64,

    /// Position in the per-wallet log (1-based, commit order)
    pub seq: u64,

    /// Commit timestamp
    pub created_at: DateTime<Utc>,
}

impl TransactionRecord {
    /// True if this entry increased the balance
    pub fn is_credit(&self) -> bool {
        self.amount > 0
    }

    /// True if this entry decreased the balance
    pub fn is_debit(&self) -> bool {
        self.amount < 0
    }

    /// Magnitude of the balance change
    pub fn volume(&self) -> u64 {
        self.amount.unsigned_abs()
    }
}

/// Parameters for a credit or debit against one wallet
#[derive(Debug, Clone)]
pub struct EntryRequest {
    /// Target wallet
    pub wallet_id: WalletId,

    /// Amount in the smallest token unit (must be > 0)
    pub amount: u64,

    /// Transaction kind
    pub kind: TransactionKind,

    /// Free-text description
    pub description: String,

    /// Caller-defined metadata
    pub metadata: HashMap<String, String>,

    /// Optional deduplication key (scoped to the wallet)
    pub idempotency_key: Option<String>,
}

impl EntryRequest {
    /// Minimal request with empty description and metadata
    pub fn new(wallet_id: WalletId, amount: u64, kind: TransactionKind) -> Self {
        Self {
            wallet_id,
            amount,
            kind,
            description: String::new(),
            metadata: HashMap::new(),
            idempotency_key: None,
        }
    }

    /// Attach a description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Attach metadata
    pub fn with_metadata(mut self, metadata: HashMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Attach an idempotency key
    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

/// Parameters for a transfer between two wallets
#[derive(Debug, Clone)]
pub struct TransferRequest {
    /// Source wallet (debited)
    pub from: WalletId,

    /// Destination wallet (credited)
    pub to: WalletId,

    /// Amount in the smallest token unit (must be > 0)
    pub amount: u64,

    /// Free-text description, copied onto both legs
    pub description: String,

    /// Caller-defined metadata, copied onto both legs
    pub metadata: HashMap<String, String>,

    /// Optional deduplication key (scoped to each wallet)
    pub idempotency_key: Option<String>,
}

impl TransferRequest {
    /// Minimal request with empty description and metadata
    pub fn new(from: WalletId, to: WalletId, amount: u64) -> Self {
        Self {
            from,
            to,
            amount,
            description: String::new(),
            metadata: HashMap::new(),
            idempotency_key: None,
        }
    }

    /// Attach a description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Attach metadata
    pub fn with_metadata(mut self, metadata: HashMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Attach an idempotency key
    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

/// Parameters for a compensating entry reversing an earlier record
#[derive(Debug, Clone)]
pub struct ReverseRequest {
    /// The committed transaction to compensate
    pub transaction_id: Uuid,

    /// Free-text description
    pub description: String,

    /// Caller-defined metadata (actor provenance, support ticket, ...)
    pub metadata: HashMap<String, String>,

    /// Optional deduplication key (scoped to the original record's wallet)
    pub idempotency_key: Option<String>,
}

impl ReverseRequest {
    /// Minimal request with empty description and metadata
    pub fn new(transaction_id: Uuid) -> Self {
        Self {
            transaction_id,
            description: String::new(),
            metadata: HashMap::new(),
            idempotency_key: None,
        }
    }

    /// Attach a description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Attach an idempotency key
    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

/// Outcome of a committed credit, debit, or compensating entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationReceipt {
    /// Record written for this operation
    pub transaction_id: Uuid,

    /// Wallet that was mutated
    pub wallet_id: WalletId,

    /// Balance after the commit
    pub balance: u64,

    /// True when an idempotency key matched a prior commit and the original
    /// result was returned instead of applying a second effect
    pub replayed: bool,
}

/// Outcome of a committed transfer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferReceipt {
    /// Shared ID linking both legs
    pub correlation_id: Uuid,

    /// Debit leg (source wallet)
    pub debit: OperationReceipt,

    /// Credit leg (destination wallet)
    pub credit: OperationReceipt,
}
