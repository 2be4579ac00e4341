//! Audit/query layer: history listing and aggregate reporting
//!
//! All results are computed from committed records, never from separately
//! maintained counters. Reads go against storage snapshots and take no
//! writer locks.

use crate::types::{TransactionKind, TransactionRecord, TransactionStatus, WalletId};
use chrono::{DateTime, Utc};

/// Filter for transaction history
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    /// Only records of this kind
    pub kind: Option<TransactionKind>,

    /// Only records with this status
    pub status: Option<TransactionStatus>,

    /// Only records committed at or after this instant
    pub since: Option<DateTime<Utc>>,

    /// Only records committed before this instant
    pub until: Option<DateTime<Utc>>,
}

impl TransactionFilter {
    /// True when the record passes every set criterion
    pub fn matches(&self, record: &TransactionRecord) -> bool {
        if let Some(kind) = self.kind {
            if record.kind != kind {
                return false;
            }
        }
        if let Some(status) = self.status {
            if record.status != status {
                return false;
            }
        }
        if let Some(since) = self.since {
            if record.created_at < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if record.created_at >= until {
                return false;
            }
        }
        true
    }
}

/// Offset/limit pagination
#[derive(Debug, Clone, Copy)]
pub struct Pagination {
    /// Records to skip
    pub offset: usize,

    /// Maximum records per page
    pub limit: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// One page of transaction history
#[derive(Debug, Clone)]
pub struct TransactionPage {
    /// Records in commit order (oldest first)
    pub records: Vec<TransactionRecord>,

    /// Offset this page started at
    pub offset: usize,

    /// True when more matching records follow this page
    pub has_more: bool,
}

/// Criteria for aggregate reporting
#[derive(Debug, Clone, Default)]
pub struct AggregateCriteria {
    /// Restrict to one wallet; `None` spans the whole ledger
    pub wallet_id: Option<WalletId>,

    /// Restrict to one kind
    pub kind: Option<TransactionKind>,

    /// Only records committed at or after this instant
    pub since: Option<DateTime<Utc>>,

    /// Only records committed before this instant
    pub until: Option<DateTime<Utc>>,
}

impl AggregateCriteria {
    fn matches(&self, record: &TransactionRecord) -> bool {
        if let Some(kind) = self.kind {
            if record.kind != kind {
                return false;
            }
        }
        if let Some(since) = self.since {
            if record.created_at < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if record.created_at >= until {
                return false;
            }
        }
        true
    }
}

/// Aggregate report over committed records
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateReport {
    /// Matching records
    pub total_count: u64,

    /// Sum of unsigned amounts
    pub total_volume: u64,

    /// Sum of signed amounts
    pub net_amount: i64,

    /// Matching credit entries
    pub credit_count: u64,

    /// Matching debit entries
    pub debit_count: u64,

    /// Matching compensating entries
    pub reversed_count: u64,

    /// Share of records with `completed` status (1.0 when nothing matched)
    pub success_rate: f64,
}

/// Apply filter and pagination to a wallet's history
pub(crate) fn paginate(
    records: Vec<TransactionRecord>,
    filter: &TransactionFilter,
    page: Pagination,
) -> TransactionPage {
    let matching: Vec<TransactionRecord> =
        records.into_iter().filter(|r| filter.matches(r)).collect();

    let has_more = matching.len() > page.offset.saturating_add(page.limit);
    let records: Vec<TransactionRecord> = matching
        .into_iter()
        .skip(page.offset)
        .take(page.limit)
        .collect();

    TransactionPage {
        records,
        offset: page.offset,
        has_more,
    }
}

/// Fold committed records into an aggregate report
pub(crate) fn aggregate(
    records: &[TransactionRecord],
    criteria: &AggregateCriteria,
) -> AggregateReport {
    let mut report = AggregateReport {
        total_count: 0,
        total_volume: 0,
        net_amount: 0,
        credit_count: 0,
        debit_count: 0,
        reversed_count: 0,
        success_rate: 1.0,
    };

    let mut completed: u64 = 0;
    for record in records.iter().filter(|r| criteria.matches(r)) {
        report.total_count += 1;
        report.total_volume += record.volume();
        report.net_amount += record.amount;
        if record.is_credit() {
            report.credit_count += 1;
        } else {
            report.debit_count += 1;
        }
        match record.status {
            TransactionStatus::Completed => completed += 1,
            TransactionStatus::Reversed => report.reversed_count += 1,
            TransactionStatus::Failed => {}
        }
    }

    if report.total_count > 0 {
        report.success_rate = completed as f64 / report.total_count as f64;
    }

    report
}
