//! Main ledger orchestration layer
//!
//! This module ties together storage, the wallet directory, and the
//! single-writer actor into a high-level API for balance mutation and audit
//! queries.
//!
//! # Example
//!
//! ```no_run
//! use wallet_ledger::{AccountId, Config, EntryRequest, Ledger, TransactionKind};
//!
//! #[tokio::main]
//! async fn main() -> wallet_ledger::Result<()> {
//!     let config = Config::default();
//!     let ledger = Ledger::open(config).await?;
//!
//!     let wallet = ledger.get_or_create_wallet(&AccountId::new("u1")).await?;
//!     let receipt = ledger
//!         .credit(EntryRequest::new(wallet.wallet_id, 100, TransactionKind::Bonus))
//!         .await?;
//!     assert_eq!(receipt.balance, 100);
//!
//!     Ok(())
//! }
//! ```

use crate::{
    actor::{spawn_wallet_actor, WalletHandle},
    directory::WalletDirectory,
    metrics::Metrics,
    query::{self, AggregateCriteria, AggregateReport, Pagination, TransactionFilter, TransactionPage},
    storage::StorageStats,
    types::{
        AccountId, EntryRequest, OperationReceipt, ReverseRequest, TransactionRecord,
        TransferReceipt, TransferRequest, Wallet, WalletId,
    },
    Config, Error, Result, Storage,
};
use std::future::Future;
use std::sync::Arc;
use tokio::time::Duration;
use uuid::Uuid;

/// Main ledger interface
pub struct Ledger {
    /// Actor handle for mutations
    handle: WalletHandle,

    /// Direct storage access (for reads)
    storage: Arc<Storage>,

    /// Account → wallet resolution
    directory: WalletDirectory,

    /// Metrics collector
    metrics: Metrics,

    /// Configuration
    config: Config,
}

impl Ledger {
    /// Open ledger with configuration
    pub async fn open(config: Config) -> Result<Self> {
        let storage = Arc::new(Storage::open(&config)?);

        let metrics = Metrics::new()
            .map_err(|e| Error::Config(format!("failed to build metrics registry: {}", e)))?;

        let handle = spawn_wallet_actor(storage.clone(), metrics.clone(), config.mailbox.capacity);
        let directory = WalletDirectory::new(handle.clone(), storage.clone());

        tracing::info!(service = %config.service_name, "Ledger opened");

        Ok(Self {
            handle,
            storage,
            directory,
            metrics,
            config,
        })
    }

    /// Account → wallet resolution
    pub fn directory(&self) -> &WalletDirectory {
        &self.directory
    }

    /// Return the wallet for `account_id`, creating one lazily if needed
    pub async fn get_or_create_wallet(&self, account_id: &AccountId) -> Result<Wallet> {
        self.directory.get_or_create(account_id).await
    }

    /// Pure lookup of the wallet owned by `account_id`
    pub fn get_wallet(&self, account_id: &AccountId) -> Result<Wallet> {
        self.directory.get(account_id)
    }

    /// Wallet state by wallet id
    pub fn wallet(&self, wallet_id: WalletId) -> Result<Wallet> {
        self.storage.get_wallet(wallet_id)
    }

    /// Increase a wallet balance
    ///
    /// Credits never violate the non-negativity invariant; failures are
    /// storage-level only and the operation is retried within the configured
    /// budget before surfacing.
    pub async fn credit(&self, request: EntryRequest) -> Result<OperationReceipt> {
        validate_entry(&request)?;
        self.with_retry(request.idempotency_key.is_some(), || {
            self.handle.credit(request.clone())
        })
        .await
    }

    /// Decrease a wallet balance
    ///
    /// Aborts with [`Error::InsufficientFunds`] when the wallet cannot cover
    /// the amount; no record is written in that case.
    pub async fn debit(&self, request: EntryRequest) -> Result<OperationReceipt> {
        validate_entry(&request)?;
        self.with_retry(request.idempotency_key.is_some(), || {
            self.handle.debit(request.clone())
        })
        .await
    }

    /// Move tokens between two wallets
    ///
    /// Both legs commit together or not at all; the receipt carries the
    /// correlation id shared by the two records.
    pub async fn transfer(&self, request: TransferRequest) -> Result<TransferReceipt> {
        validate_transfer(&request)?;
        self.with_retry(request.idempotency_key.is_some(), || {
            self.handle.transfer(request.clone())
        })
        .await
    }

    /// Append a compensating entry reversing an earlier record
    ///
    /// The original record is never modified; history stays append-only.
    pub async fn reverse(&self, request: ReverseRequest) -> Result<OperationReceipt> {
        self.with_retry(request.idempotency_key.is_some(), || {
            self.handle.reverse(request.clone())
        })
        .await
    }

    /// Current balance, consistent with the latest committed record
    pub fn balance(&self, wallet_id: WalletId) -> Result<u64> {
        Ok(self.storage.get_wallet(wallet_id)?.balance)
    }

    /// Record by transaction id
    pub fn transaction(&self, transaction_id: Uuid) -> Result<TransactionRecord> {
        self.storage.get_transaction(transaction_id)
    }

    /// Paginated, filtered transaction history in commit order
    pub fn list_transactions(
        &self,
        wallet_id: WalletId,
        filter: &TransactionFilter,
        page: Pagination,
    ) -> Result<TransactionPage> {
        // Distinguish "unknown wallet" from "no history yet"
        self.storage.get_wallet(wallet_id)?;

        let records = self.storage.wallet_transactions(wallet_id)?;
        Ok(query::paginate(records, filter, page))
    }

    /// Aggregate report computed from committed records
    pub fn aggregate(&self, criteria: &AggregateCriteria) -> Result<AggregateReport> {
        let records = match criteria.wallet_id {
            Some(wallet_id) => {
                self.storage.get_wallet(wallet_id)?;
                self.storage.wallet_transactions(wallet_id)?
            }
            None => self.storage.all_transactions()?,
        };

        Ok(query::aggregate(&records, criteria))
    }

    /// Reconciliation check: replay the wallet's committed records in commit
    /// order and verify the stored balance matches the signed sum exactly
    ///
    /// Returns the verified balance. This is the canonical audit check; any
    /// mismatch surfaces as [`Error::InvariantViolation`].
    pub fn verify_balance(&self, wallet_id: WalletId) -> Result<u64> {
        let wallet = self.storage.get_wallet(wallet_id)?;
        let records = self.storage.wallet_transactions(wallet_id)?;

        let mut running: i128 = 0;
        for record in &records {
            running += record.amount as i128;
            if running < 0 {
                return Err(Error::InvariantViolation(format!(
                    "wallet {} history goes negative at {}",
                    wallet_id, record.transaction_id
                )));
            }
            if running != record.balance_after as i128 {
                return Err(Error::InvariantViolation(format!(
                    "wallet {} checkpoint mismatch at {}: replayed {}, recorded {}",
                    wallet_id, record.transaction_id, running, record.balance_after
                )));
            }
        }

        if running != wallet.balance as i128 {
            return Err(Error::InvariantViolation(format!(
                "wallet {} stored balance {} does not equal replayed sum {}",
                wallet_id, wallet.balance, running
            )));
        }

        Ok(wallet.balance)
    }

    /// Storage statistics
    pub fn stats(&self) -> Result<StorageStats> {
        self.storage.get_stats()
    }

    /// Metrics collector (for scraping/export)
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Shutdown ledger
    pub async fn shutdown(self) -> Result<()> {
        self.handle.shutdown().await
    }

    /// Bounded retry for mutations
    ///
    /// Retries storage failures (all-or-nothing, nothing became visible) for
    /// every request; ambiguous writer failures are retried only for keyed
    /// requests, where the idempotency path makes re-issuing safe.
    async fn with_retry<T, F, Fut>(&self, keyed: bool, op: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let retry = &self.config.retry;
        let mut attempt: u32 = 0;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    let replay_safe = keyed && matches!(err, Error::ConcurrencyConflict(_));
                    if (err.is_retryable() || replay_safe) && attempt + 1 < retry.max_attempts {
                        attempt += 1;
                        tracing::warn!(error = %err, attempt, "Retrying ledger mutation");
                        tokio::time::sleep(Duration::from_millis(
                            retry.backoff_ms * attempt as u64,
                        ))
                        .await;
                    } else {
                        return Err(err);
                    }
                }
            }
        }
    }
}

/// Validate a credit/debit request before any storage access
fn validate_entry(request: &EntryRequest) -> Result<()> {
    validate_amount(request.amount)?;

    if request.kind.is_transfer_leg() {
        return Err(Error::Validation(format!(
            "kind {} is written only by the transfer operation",
            request.kind
        )));
    }

    Ok(())
}

/// Validate a transfer request before any storage access
fn validate_transfer(request: &TransferRequest) -> Result<()> {
    validate_amount(request.amount)?;

    if request.from == request.to {
        return Err(Error::Validation(
            "cannot transfer a wallet to itself".to_string(),
        ));
    }

    Ok(())
}

fn validate_amount(amount: u64) -> Result<()> {
    if amount == 0 {
        return Err(Error::InvalidAmount("amount must be positive".to_string()));
    }
    // Record amounts are signed
    if amount > i64::MAX as u64 {
        return Err(Error::InvalidAmount("amount out of range".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TransactionKind;

    async fn create_test_ledger() -> (Ledger, tempfile::TempDir) {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();

        let ledger = Ledger::open(config).await.unwrap();
        (ledger, temp_dir)
    }

    #[tokio::test]
    async fn test_ledger_open_and_shutdown() {
        let (ledger, _temp) = create_test_ledger().await;
        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_zero_amount_rejected_before_storage() {
        let (ledger, _temp) = create_test_ledger().await;

        // The wallet does not exist; validation must fire first
        let result = ledger
            .credit(EntryRequest::new(
                WalletId::generate(),
                0,
                TransactionKind::Bonus,
            ))
            .await;
        assert!(matches!(result, Err(Error::InvalidAmount(_))));

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_transfer_kinds_reserved() {
        let (ledger, _temp) = create_test_ledger().await;
        let wallet = ledger
            .get_or_create_wallet(&AccountId::new("u1"))
            .await
            .unwrap();

        for kind in [TransactionKind::TransferIn, TransactionKind::TransferOut] {
            let result = ledger
                .credit(EntryRequest::new(wallet.wallet_id, 10, kind))
                .await;
            assert!(matches!(result, Err(Error::Validation(_))));
        }

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_self_transfer_rejected() {
        let (ledger, _temp) = create_test_ledger().await;
        let wallet = ledger
            .get_or_create_wallet(&AccountId::new("u1"))
            .await
            .unwrap();

        let result = ledger
            .transfer(TransferRequest::new(wallet.wallet_id, wallet.wallet_id, 10))
            .await;
        assert!(matches!(result, Err(Error::Validation(_))));

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_reverse_restores_balance() {
        let (ledger, _temp) = create_test_ledger().await;
        let wallet = ledger
            .get_or_create_wallet(&AccountId::new("u1"))
            .await
            .unwrap();

        let credited = ledger
            .credit(
                EntryRequest::new(wallet.wallet_id, 100, TransactionKind::Purchase)
                    .with_description("100 token pack"),
            )
            .await
            .unwrap();

        let reversed = ledger
            .reverse(
                ReverseRequest::new(credited.transaction_id)
                    .with_description("chargeback"),
            )
            .await
            .unwrap();
        assert_eq!(reversed.balance, 0);

        // Original record is untouched; the compensating entry references it
        let original = ledger.transaction(credited.transaction_id).unwrap();
        assert_eq!(original.amount, 100);
        assert_eq!(original.status, crate::types::TransactionStatus::Completed);

        let compensating = ledger.transaction(reversed.transaction_id).unwrap();
        assert_eq!(compensating.amount, -100);
        assert_eq!(compensating.status, crate::types::TransactionStatus::Reversed);
        assert_eq!(compensating.reverses, Some(credited.transaction_id));

        assert_eq!(ledger.verify_balance(wallet.wallet_id).unwrap(), 0);

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_reverse_of_debit_needs_no_funds() {
        let (ledger, _temp) = create_test_ledger().await;
        let wallet = ledger
            .get_or_create_wallet(&AccountId::new("u1"))
            .await
            .unwrap();

        ledger
            .credit(EntryRequest::new(wallet.wallet_id, 50, TransactionKind::Bonus))
            .await
            .unwrap();
        let debited = ledger
            .debit(EntryRequest::new(
                wallet.wallet_id,
                50,
                TransactionKind::SessionPayment,
            ))
            .await
            .unwrap();
        assert_eq!(debited.balance, 0);

        // Reversing a debit credits the wallet back
        let reversed = ledger.reverse(ReverseRequest::new(debited.transaction_id)).await.unwrap();
        assert_eq!(reversed.balance, 50);

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_reverse_a_reversal_rejected() {
        let (ledger, _temp) = create_test_ledger().await;
        let wallet = ledger
            .get_or_create_wallet(&AccountId::new("u1"))
            .await
            .unwrap();

        let credited = ledger
            .credit(EntryRequest::new(wallet.wallet_id, 10, TransactionKind::Bonus))
            .await
            .unwrap();
        let reversed = ledger.reverse(ReverseRequest::new(credited.transaction_id)).await.unwrap();

        let result = ledger.reverse(ReverseRequest::new(reversed.transaction_id)).await;
        assert!(matches!(result, Err(Error::Validation(_))));

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_metrics_reflect_operations() {
        let (ledger, _temp) = create_test_ledger().await;
        let wallet = ledger
            .get_or_create_wallet(&AccountId::new("u1"))
            .await
            .unwrap();

        ledger
            .credit(EntryRequest::new(wallet.wallet_id, 100, TransactionKind::Bonus))
            .await
            .unwrap();
        let _ = ledger
            .debit(EntryRequest::new(
                wallet.wallet_id,
                500,
                TransactionKind::SessionPayment,
            ))
            .await;

        assert_eq!(ledger.metrics().credits_total.get(), 1);
        assert_eq!(ledger.metrics().insufficient_funds_total.get(), 1);
        assert_eq!(ledger.metrics().wallets_created_total.get(), 1);

        ledger.shutdown().await.unwrap();
    }
}
