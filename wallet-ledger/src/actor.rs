//! Actor-based concurrency for the transaction engine
//!
//! This module implements the single-writer pattern using Tokio actors:
//! - One logical writer task applies every mutation sequentially, so
//!   operations on the same wallet are linearizable and lost updates are
//!   impossible without row locks or a compare-and-swap retry loop
//! - Each mutation commits as one atomic `WriteBatch`; both legs of a
//!   transfer land in the same batch, so partial transfers cannot exist
//! - Reads never enter the mailbox; they go straight to storage snapshots
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │          Callers (web requests, admin, jobs)          │
//! └─────────────────────┬────────────────────────────────┘
//!                       │
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │               WalletHandle (Clone)                    │
//! │         Sends messages to the writer mailbox          │
//! └─────────────────────┬────────────────────────────────┘
//!                       │
//!                       │ mpsc::channel (bounded)
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │              WalletActor (Single Task)                │
//! │   read wallet → check invariants → WriteBatch commit  │
//! └──────────────────────────────────────────────────────┘
//! ```

use crate::metrics::Metrics;
use crate::types::{
    AccountId, EntryRequest, OperationReceipt, ReverseRequest, TransactionKind, TransactionRecord,
    TransactionStatus, TransferReceipt, TransferRequest, Wallet,
};
use crate::{Error, Result, Storage};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

/// Message sent to the wallet actor
pub enum WalletMessage {
    /// Resolve or lazily create the wallet for an account
    GetOrCreateWallet {
        /// Owning account
        account_id: AccountId,
        /// Response channel
        response: oneshot::Sender<Result<Wallet>>,
    },

    /// Increase a wallet balance
    Credit {
        /// Operation parameters
        request: EntryRequest,
        /// Response channel
        response: oneshot::Sender<Result<OperationReceipt>>,
    },

    /// Decrease a wallet balance
    Debit {
        /// Operation parameters
        request: EntryRequest,
        /// Response channel
        response: oneshot::Sender<Result<OperationReceipt>>,
    },

    /// Move tokens between two wallets
    Transfer {
        /// Operation parameters
        request: TransferRequest,
        /// Response channel
        response: oneshot::Sender<Result<TransferReceipt>>,
    },

    /// Append a compensating entry for an earlier record
    Reverse {
        /// Operation parameters
        request: ReverseRequest,
        /// Response channel
        response: oneshot::Sender<Result<OperationReceipt>>,
    },

    /// Shutdown actor
    Shutdown,
}

/// Actor that processes wallet mutations
pub struct WalletActor {
    /// Storage backend
    storage: Arc<Storage>,

    /// Mailbox for incoming messages
    mailbox: mpsc::Receiver<WalletMessage>,

    /// Metrics collector
    metrics: Metrics,
}

impl WalletActor {
    /// Create new actor
    pub fn new(
        storage: Arc<Storage>,
        mailbox: mpsc::Receiver<WalletMessage>,
        metrics: Metrics,
    ) -> Self {
        Self {
            storage,
            mailbox,
            metrics,
        }
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        while let Some(msg) = self.mailbox.recv().await {
            match msg {
                WalletMessage::Shutdown => break,
                _ => self.handle_message(msg),
            }
        }

        tracing::info!("Wallet writer stopped");
    }

    /// Handle a single message
    fn handle_message(&mut self, msg: WalletMessage) {
        match msg {
            WalletMessage::GetOrCreateWallet {
                account_id,
                response,
            } => {
                let _ = response.send(self.handle_get_or_create(account_id));
            }

            WalletMessage::Credit { request, response } => {
                let _ = response.send(self.handle_credit(request));
            }

            WalletMessage::Debit { request, response } => {
                let _ = response.send(self.handle_debit(request));
            }

            WalletMessage::Transfer { request, response } => {
                let _ = response.send(self.handle_transfer(request));
            }

            WalletMessage::Reverse { request, response } => {
                let _ = response.send(self.handle_reverse(request));
            }

            WalletMessage::Shutdown => {
                // Handled in main loop
            }
        }
    }

    fn handle_get_or_create(&self, account_id: AccountId) -> Result<Wallet> {
        if let Some(wallet) = self.storage.wallet_for_account(&account_id)? {
            return Ok(wallet);
        }

        // Messages are applied sequentially, so a concurrent first-use of the
        // same account resolves to exactly one creation
        let wallet = Wallet::new(account_id);
        self.storage.create_wallet(&wallet)?;
        self.metrics.record_wallet_created();

        Ok(wallet)
    }

    fn handle_credit(&self, request: EntryRequest) -> Result<OperationReceipt> {
        if let Some(ref key) = request.idempotency_key {
            if let Some(prior) = self.storage.idempotent_result(request.wallet_id, key)? {
                self.metrics.record_replay();
                return Ok(replay_receipt(&prior));
            }
        }

        let mut wallet = self.storage.get_wallet(request.wallet_id)?;

        let new_balance = wallet
            .balance
            .checked_add(request.amount)
            .ok_or_else(|| Error::InvariantViolation("balance overflow".to_string()))?;

        let record = apply_entry(
            &mut wallet,
            new_balance,
            request.amount as i64,
            request.kind,
            TransactionStatus::Completed,
            request.description,
            request.metadata,
            request.idempotency_key,
        );

        self.commit(&[&wallet], &[&record])?;
        self.metrics.record_credit();

        Ok(receipt(&record))
    }

    fn handle_debit(&self, request: EntryRequest) -> Result<OperationReceipt> {
        if let Some(ref key) = request.idempotency_key {
            if let Some(prior) = self.storage.idempotent_result(request.wallet_id, key)? {
                self.metrics.record_replay();
                return Ok(replay_receipt(&prior));
            }
        }

        let mut wallet = self.storage.get_wallet(request.wallet_id)?;

        // Balance check and mutation happen inside the same atomic unit; a
        // rejected debit leaves no trace in the audit trail
        if request.amount > wallet.balance {
            self.metrics.record_insufficient_funds();
            return Err(Error::InsufficientFunds {
                available: wallet.balance,
                requested: request.amount,
            });
        }
        let new_balance = wallet.balance - request.amount;

        let record = apply_entry(
            &mut wallet,
            new_balance,
            -(request.amount as i64),
            request.kind,
            TransactionStatus::Completed,
            request.description,
            request.metadata,
            request.idempotency_key,
        );

        self.commit(&[&wallet], &[&record])?;
        self.metrics.record_debit();

        Ok(receipt(&record))
    }

    fn handle_transfer(&self, request: TransferRequest) -> Result<TransferReceipt> {
        if let Some(ref key) = request.idempotency_key {
            if let Some(prior_debit) = self.storage.idempotent_result(request.from, key)? {
                let prior_credit = self
                    .storage
                    .idempotent_result(request.to, key)?
                    .ok_or_else(|| {
                        Error::InvariantViolation(
                            "transfer replay found debit leg without credit leg".to_string(),
                        )
                    })?;
                let correlation_id = prior_debit.correlation_id.ok_or_else(|| {
                    Error::InvariantViolation("transfer leg without correlation id".to_string())
                })?;

                self.metrics.record_replay();
                return Ok(TransferReceipt {
                    correlation_id,
                    debit: replay_receipt(&prior_debit),
                    credit: replay_receipt(&prior_credit),
                });
            }
        }

        let mut from = self.storage.get_wallet(request.from)?;
        let mut to = self.storage.get_wallet(request.to)?;

        if request.amount > from.balance {
            self.metrics.record_insufficient_funds();
            return Err(Error::InsufficientFunds {
                available: from.balance,
                requested: request.amount,
            });
        }
        let from_balance = from.balance - request.amount;
        let to_balance = to
            .balance
            .checked_add(request.amount)
            .ok_or_else(|| Error::InvariantViolation("balance overflow".to_string()))?;

        let correlation_id = Uuid::now_v7();

        let mut debit_record = apply_entry(
            &mut from,
            from_balance,
            -(request.amount as i64),
            TransactionKind::TransferOut,
            TransactionStatus::Completed,
            request.description.clone(),
            request.metadata.clone(),
            request.idempotency_key.clone(),
        );
        debit_record.correlation_id = Some(correlation_id);
        debit_record.counterparty = Some(request.to);

        let mut credit_record = apply_entry(
            &mut to,
            to_balance,
            request.amount as i64,
            TransactionKind::TransferIn,
            TransactionStatus::Completed,
            request.description,
            request.metadata,
            request.idempotency_key,
        );
        credit_record.correlation_id = Some(correlation_id);
        credit_record.counterparty = Some(request.from);

        // Both wallets and both legs commit in one batch or not at all
        self.commit(&[&from, &to], &[&debit_record, &credit_record])?;
        self.metrics.record_transfer();

        Ok(TransferReceipt {
            correlation_id,
            debit: receipt(&debit_record),
            credit: receipt(&credit_record),
        })
    }

    fn handle_reverse(&self, request: ReverseRequest) -> Result<OperationReceipt> {
        let original = self.storage.get_transaction(request.transaction_id)?;

        if original.status != TransactionStatus::Completed {
            return Err(Error::Validation(format!(
                "only completed entries can be reversed, {} is {}",
                original.transaction_id, original.status
            )));
        }

        if let Some(ref key) = request.idempotency_key {
            if let Some(prior) = self.storage.idempotent_result(original.wallet_id, key)? {
                self.metrics.record_replay();
                return Ok(replay_receipt(&prior));
            }
        }

        let mut wallet = self.storage.get_wallet(original.wallet_id)?;

        // Compensating amount is the opposite sign; reversing a credit is a
        // debit and honors the non-negativity invariant
        let amount = original
            .amount
            .checked_neg()
            .ok_or_else(|| Error::InvariantViolation("amount out of range".to_string()))?;

        let new_balance = if amount >= 0 {
            wallet
                .balance
                .checked_add(amount as u64)
                .ok_or_else(|| Error::InvariantViolation("balance overflow".to_string()))?
        } else {
            let magnitude = amount.unsigned_abs();
            if magnitude > wallet.balance {
                self.metrics.record_insufficient_funds();
                return Err(Error::InsufficientFunds {
                    available: wallet.balance,
                    requested: magnitude,
                });
            }
            wallet.balance - magnitude
        };

        let mut record = apply_entry(
            &mut wallet,
            new_balance,
            amount,
            TransactionKind::Refund,
            TransactionStatus::Reversed,
            request.description,
            request.metadata,
            request.idempotency_key,
        );
        record.reverses = Some(original.transaction_id);
        record.correlation_id = original.correlation_id;

        self.commit(&[&wallet], &[&record])?;
        self.metrics.record_reversal();

        Ok(receipt(&record))
    }

    fn commit(&self, wallets: &[&Wallet], records: &[&TransactionRecord]) -> Result<()> {
        let started = Instant::now();
        self.storage.commit_entries(wallets, records)?;
        self.metrics
            .record_commit_duration(started.elapsed().as_secs_f64());
        Ok(())
    }
}

/// Mutate the wallet in place and build the record describing the change
#[allow(clippy::too_many_arguments)]
fn apply_entry(
    wallet: &mut Wallet,
    new_balance: u64,
    amount: i64,
    kind: TransactionKind,
    status: TransactionStatus,
    description: String,
    metadata: std::collections::HashMap<String, String>,
    idempotency_key: Option<String>,
) -> TransactionRecord {
    let now = Utc::now();
    wallet.balance = new_balance;
    wallet.seq += 1;
    wallet.updated_at = now;

    TransactionRecord {
        transaction_id: Uuid::now_v7(),
        wallet_id: wallet.wallet_id,
        amount,
        kind,
        status,
        description,
        metadata,
        correlation_id: None,
        counterparty: None,
        reverses: None,
        idempotency_key,
        balance_after: new_balance,
        seq: wallet.seq,
        created_at: now,
    }
}

fn receipt(record: &TransactionRecord) -> OperationReceipt {
    OperationReceipt {
        transaction_id: record.transaction_id,
        wallet_id: record.wallet_id,
        balance: record.balance_after,
        replayed: false,
    }
}

fn replay_receipt(record: &TransactionRecord) -> OperationReceipt {
    OperationReceipt {
        transaction_id: record.transaction_id,
        wallet_id: record.wallet_id,
        balance: record.balance_after,
        replayed: true,
    }
}

/// Handle for sending messages to the actor
#[derive(Clone)]
pub struct WalletHandle {
    sender: mpsc::Sender<WalletMessage>,
}

impl WalletHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<WalletMessage>) -> Self {
        Self { sender }
    }

    async fn call<T>(
        &self,
        msg: WalletMessage,
        rx: oneshot::Receiver<Result<T>>,
    ) -> Result<T> {
        // A failed send means the request never reached the writer; a lost
        // response means the outcome is unknown and only the idempotency-key
        // path may re-issue it
        self.sender
            .send(msg)
            .await
            .map_err(|_| Error::ConcurrencyConflict("ledger writer unavailable".to_string()))?;

        rx.await.map_err(|_| {
            Error::ConcurrencyConflict("ledger writer dropped the request".to_string())
        })?
    }

    /// Resolve or lazily create the wallet for an account
    pub async fn get_or_create_wallet(&self, account_id: AccountId) -> Result<Wallet> {
        let (tx, rx) = oneshot::channel();
        self.call(
            WalletMessage::GetOrCreateWallet {
                account_id,
                response: tx,
            },
            rx,
        )
        .await
    }

    /// Apply a credit
    pub async fn credit(&self, request: EntryRequest) -> Result<OperationReceipt> {
        let (tx, rx) = oneshot::channel();
        self.call(
            WalletMessage::Credit {
                request,
                response: tx,
            },
            rx,
        )
        .await
    }

    /// Apply a debit
    pub async fn debit(&self, request: EntryRequest) -> Result<OperationReceipt> {
        let (tx, rx) = oneshot::channel();
        self.call(
            WalletMessage::Debit {
                request,
                response: tx,
            },
            rx,
        )
        .await
    }

    /// Apply a transfer
    pub async fn transfer(&self, request: TransferRequest) -> Result<TransferReceipt> {
        let (tx, rx) = oneshot::channel();
        self.call(
            WalletMessage::Transfer {
                request,
                response: tx,
            },
            rx,
        )
        .await
    }

    /// Append a compensating entry
    pub async fn reverse(&self, request: ReverseRequest) -> Result<OperationReceipt> {
        let (tx, rx) = oneshot::channel();
        self.call(
            WalletMessage::Reverse {
                request,
                response: tx,
            },
            rx,
        )
        .await
    }

    /// Shutdown actor
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(WalletMessage::Shutdown)
            .await
            .map_err(|_| Error::ConcurrencyConflict("ledger writer unavailable".to_string()))?;
        Ok(())
    }
}

/// Spawn the wallet actor
pub fn spawn_wallet_actor(
    storage: Arc<Storage>,
    metrics: Metrics,
    mailbox_capacity: usize,
) -> WalletHandle {
    let (tx, rx) = mpsc::channel(mailbox_capacity); // Bounded channel for backpressure
    let actor = WalletActor::new(storage, rx, metrics);

    tokio::spawn(async move {
        actor.run().await;
    });

    WalletHandle::new(tx)
}
