//! Metrics collection for observability
//!
//! This module provides Prometheus metrics for monitoring the ledger.
//!
//! # Metrics
//!
//! - `ledger_credits_total` - Committed credit entries
//! - `ledger_debits_total` - Committed debit entries
//! - `ledger_transfers_total` - Committed transfers (two legs each)
//! - `ledger_reversals_total` - Committed compensating entries
//! - `ledger_insufficient_funds_total` - Debits rejected for lack of balance
//! - `ledger_idempotent_replays_total` - Requests answered from a prior commit
//! - `ledger_commit_duration_seconds` - Histogram of commit latencies
//! - `ledger_wallets_created_total` - Wallets lazily created

use prometheus::{Histogram, HistogramOpts, IntCounter, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Committed credit entries
    pub credits_total: IntCounter,

    /// Committed debit entries
    pub debits_total: IntCounter,

    /// Committed transfers
    pub transfers_total: IntCounter,

    /// Committed compensating entries
    pub reversals_total: IntCounter,

    /// Debits rejected for lack of balance
    pub insufficient_funds_total: IntCounter,

    /// Requests answered from a prior commit via idempotency key
    pub idempotent_replays_total: IntCounter,

    /// Commit latency histogram
    pub commit_duration: Histogram,

    /// Wallets lazily created
    pub wallets_created_total: IntCounter,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector with its own registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let credits_total =
            IntCounter::new("ledger_credits_total", "Committed credit entries")?;
        registry.register(Box::new(credits_total.clone()))?;

        let debits_total = IntCounter::new("ledger_debits_total", "Committed debit entries")?;
        registry.register(Box::new(debits_total.clone()))?;

        let transfers_total =
            IntCounter::new("ledger_transfers_total", "Committed transfers")?;
        registry.register(Box::new(transfers_total.clone()))?;

        let reversals_total =
            IntCounter::new("ledger_reversals_total", "Committed compensating entries")?;
        registry.register(Box::new(reversals_total.clone()))?;

        let insufficient_funds_total = IntCounter::new(
            "ledger_insufficient_funds_total",
            "Debits rejected for lack of balance",
        )?;
        registry.register(Box::new(insufficient_funds_total.clone()))?;

        let idempotent_replays_total = IntCounter::new(
            "ledger_idempotent_replays_total",
            "Requests answered from a prior commit",
        )?;
        registry.register(Box::new(idempotent_replays_total.clone()))?;

        let commit_duration = Histogram::with_opts(
            HistogramOpts::new(
                "ledger_commit_duration_seconds",
                "Histogram of commit latencies",
            )
            .buckets(vec![0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0]),
        )?;
        registry.register(Box::new(commit_duration.clone()))?;

        let wallets_created_total =
            IntCounter::new("ledger_wallets_created_total", "Wallets lazily created")?;
        registry.register(Box::new(wallets_created_total.clone()))?;

        Ok(Self {
            credits_total,
            debits_total,
            transfers_total,
            reversals_total,
            insufficient_funds_total,
            idempotent_replays_total,
            commit_duration,
            wallets_created_total,
            registry,
        })
    }

    /// Record a committed credit
    pub fn record_credit(&self) {
        self.credits_total.inc();
    }

    /// Record a committed debit
    pub fn record_debit(&self) {
        self.debits_total.inc();
    }

    /// Record a committed transfer
    pub fn record_transfer(&self) {
        self.transfers_total.inc();
    }

    /// Record a committed compensating entry
    pub fn record_reversal(&self) {
        self.reversals_total.inc();
    }

    /// Record a debit rejected for lack of balance
    pub fn record_insufficient_funds(&self) {
        self.insufficient_funds_total.inc();
    }

    /// Record a request answered from a prior commit
    pub fn record_replay(&self) {
        self.idempotent_replays_total.inc();
    }

    /// Record commit duration
    pub fn record_commit_duration(&self, duration_seconds: f64) {
        self.commit_duration.observe(duration_seconds);
    }

    /// Record a lazily created wallet
    pub fn record_wallet_created(&self) {
        self.wallets_created_total.inc();
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
