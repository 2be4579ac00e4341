//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `wallets` - Wallet state (key: wallet_id)
//! - `accounts` - Account directory (key: account_id, value: wallet_id)
//! - `transactions` - Append-only audit records (key: transaction_id)
//! - `wallet_log` - Per-wallet commit order (key: wallet_id || seq)
//! - `idempotency` - Dedup index (key: wallet_id || idempotency key)
//!
//! Every mutating operation commits through a single `WriteBatch`, so either
//! all of its wallet updates, records, log entries, and idempotency entries
//! become visible or none do.

use crate::{
    error::{Error, Result},
    types::{AccountId, TransactionRecord, Wallet, WalletId},
    Config,
};
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, DBCompactionStyle, IteratorMode, Options, WriteBatch, DB,
};
use std::sync::Arc;
use uuid::Uuid;

/// Column family names
const CF_WALLETS: &str = "wallets";
const CF_ACCOUNTS: &str = "accounts";
const CF_TRANSACTIONS: &str = "transactions";
const CF_WALLET_LOG: &str = "wallet_log";
const CF_IDEMPOTENCY: &str = "idempotency";

/// Storage wrapper for RocksDB
pub struct Storage {
    db: Arc<DB>,
    // Column family handles are stored in DB, accessed by name
}

impl Storage {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        // Create directory if not exists
        std::fs::create_dir_all(path)?;

        // Database options
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        // Tuning from config
        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_target_file_size_base(config.rocksdb.target_file_size_mb * 1024 * 1024);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);
        db_opts.set_level_zero_file_num_compaction_trigger(
            config.rocksdb.level0_file_num_compaction_trigger,
        );

        // Universal compaction for write-heavy workload
        db_opts.set_compaction_style(DBCompactionStyle::Universal);

        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        // Column family descriptors
        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_WALLETS, Self::cf_options_wallets()),
            ColumnFamilyDescriptor::new(CF_ACCOUNTS, Self::cf_options_accounts()),
            ColumnFamilyDescriptor::new(CF_TRANSACTIONS, Self::cf_options_transactions()),
            ColumnFamilyDescriptor::new(CF_WALLET_LOG, Self::cf_options_wallet_log()),
            ColumnFamilyDescriptor::new(CF_IDEMPOTENCY, Self::cf_options_idempotency()),
        ];

        // Open database
        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!(path = ?path, "Opened RocksDB for wallet ledger");

        Ok(Self { db: Arc::new(db) })
    }

    // Column family options

    fn cf_options_wallets() -> Options {
        let mut opts = Options::default();
        // Hot point lookups, use LZ4 for speed
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_options_accounts() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        // Directory lookups benefit from bloom filters
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false); // 10 bits per key
        opts.set_block_based_table_factory(&block_opts);
        opts
    }

    fn cf_options_transactions() -> Options {
        let mut opts = Options::default();
        // Append-only, cold after commit
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts.set_bottommost_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn cf_options_wallet_log() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_options_idempotency() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        opts.set_block_based_table_factory(&block_opts);
        opts
    }

    // Helper: get column family handle

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    // Key helpers

    fn log_key(wallet_id: &WalletId, seq: u64) -> [u8; 24] {
        let mut key = [0u8; 24];
        key[..16].copy_from_slice(wallet_id.as_bytes());
        key[16..].copy_from_slice(&seq.to_be_bytes());
        key
    }

    fn idempotency_key(wallet_id: &WalletId, key: &str) -> Vec<u8> {
        // Wallet id is fixed 16 bytes, so no separator is needed
        let mut bytes = wallet_id.as_bytes().to_vec();
        bytes.extend_from_slice(key.as_bytes());
        bytes
    }

    // Wallet operations

    /// Get wallet by ID
    pub fn get_wallet(&self, wallet_id: WalletId) -> Result<Wallet> {
        let cf = self.cf_handle(CF_WALLETS)?;

        let value = self
            .db
            .get_cf(cf, wallet_id.as_bytes())?
            .ok_or_else(|| Error::WalletNotFound(wallet_id.to_string()))?;

        let wallet: Wallet = bincode::deserialize(&value)?;
        Ok(wallet)
    }

    /// Look up the wallet owned by an account, if one exists
    pub fn wallet_for_account(&self, account_id: &AccountId) -> Result<Option<Wallet>> {
        let cf_accounts = self.cf_handle(CF_ACCOUNTS)?;

        let mapping = self.db.get_cf(cf_accounts, account_id.as_str().as_bytes())?;
        let wallet_id_bytes = match mapping {
            Some(bytes) => bytes,
            None => return Ok(None),
        };

        let raw: [u8; 16] = wallet_id_bytes
            .as_slice()
            .try_into()
            .map_err(|_| Error::Storage("corrupt account mapping".to_string()))?;
        let wallet = self.get_wallet(WalletId::from_uuid(Uuid::from_bytes(raw)))?;

        Ok(Some(wallet))
    }

    /// Create a wallet and its account mapping (atomic)
    ///
    /// Fails if the account already owns a wallet; the caller is expected to
    /// have checked with [`wallet_for_account`](Self::wallet_for_account)
    /// under the single-writer task.
    pub fn create_wallet(&self, wallet: &Wallet) -> Result<()> {
        let cf_accounts = self.cf_handle(CF_ACCOUNTS)?;
        let cf_wallets = self.cf_handle(CF_WALLETS)?;

        let account_key = wallet.account_id.as_str().as_bytes();
        if self.db.get_cf(cf_accounts, account_key)?.is_some() {
            return Err(Error::Validation(format!(
                "account {} already owns a wallet",
                wallet.account_id
            )));
        }

        let mut batch = WriteBatch::default();
        batch.put_cf(cf_accounts, account_key, wallet.wallet_id.as_bytes());
        batch.put_cf(
            cf_wallets,
            wallet.wallet_id.as_bytes(),
            bincode::serialize(wallet)?,
        );
        self.db.write(batch)?;

        tracing::info!(
            wallet_id = %wallet.wallet_id,
            account_id = %wallet.account_id,
            "Wallet created"
        );

        Ok(())
    }

    // Transaction operations

    /// Get record by transaction ID
    pub fn get_transaction(&self, transaction_id: Uuid) -> Result<TransactionRecord> {
        let cf = self.cf_handle(CF_TRANSACTIONS)?;

        let value = self
            .db
            .get_cf(cf, transaction_id.as_bytes())?
            .ok_or_else(|| Error::TransactionNotFound(transaction_id.to_string()))?;

        let record: TransactionRecord = bincode::deserialize(&value)?;
        Ok(record)
    }

    /// Look up a prior commit under (wallet, idempotency key)
    pub fn idempotent_result(
        &self,
        wallet_id: WalletId,
        key: &str,
    ) -> Result<Option<TransactionRecord>> {
        let cf = self.cf_handle(CF_IDEMPOTENCY)?;

        let value = self.db.get_cf(cf, Self::idempotency_key(&wallet_id, key))?;
        let tx_id_bytes = match value {
            Some(bytes) => bytes,
            None => return Ok(None),
        };

        let raw: [u8; 16] = tx_id_bytes
            .as_slice()
            .try_into()
            .map_err(|_| Error::Storage("corrupt idempotency entry".to_string()))?;

        Ok(Some(self.get_transaction(Uuid::from_bytes(raw))?))
    }

    /// Commit one mutating operation (atomic)
    ///
    /// Writes every updated wallet, every new record, the per-wallet log
    /// entries, and any idempotency entries in a single `WriteBatch`. For a
    /// transfer this covers both wallets and both legs.
    pub fn commit_entries(&self, wallets: &[&Wallet], records: &[&TransactionRecord]) -> Result<()> {
        let cf_wallets = self.cf_handle(CF_WALLETS)?;
        let cf_transactions = self.cf_handle(CF_TRANSACTIONS)?;
        let cf_wallet_log = self.cf_handle(CF_WALLET_LOG)?;
        let cf_idempotency = self.cf_handle(CF_IDEMPOTENCY)?;

        let mut batch = WriteBatch::default();

        for wallet in wallets {
            batch.put_cf(
                cf_wallets,
                wallet.wallet_id.as_bytes(),
                bincode::serialize(*wallet)?,
            );
        }

        for record in records {
            batch.put_cf(
                cf_transactions,
                record.transaction_id.as_bytes(),
                bincode::serialize(*record)?,
            );

            batch.put_cf(
                cf_wallet_log,
                Self::log_key(&record.wallet_id, record.seq),
                record.transaction_id.as_bytes(),
            );

            if let Some(ref key) = record.idempotency_key {
                batch.put_cf(
                    cf_idempotency,
                    Self::idempotency_key(&record.wallet_id, key),
                    record.transaction_id.as_bytes(),
                );
            }
        }

        self.db.write(batch)?;

        for record in records {
            tracing::debug!(
                transaction_id = %record.transaction_id,
                wallet_id = %record.wallet_id,
                amount = record.amount,
                kind = %record.kind,
                "Entry committed"
            );
        }

        Ok(())
    }

    /// All records for a wallet in commit order (oldest first)
    pub fn wallet_transactions(&self, wallet_id: WalletId) -> Result<Vec<TransactionRecord>> {
        let cf_log = self.cf_handle(CF_WALLET_LOG)?;
        let prefix = wallet_id.as_bytes();

        let iter = self.db.prefix_iterator_cf(cf_log, prefix);

        let mut records = Vec::new();
        for item in iter {
            let (key, value) = item?;

            // The iterator can run past the prefix; stop at the first
            // foreign key
            if !key.starts_with(prefix) {
                break;
            }

            let raw: [u8; 16] = value
                .as_ref()
                .try_into()
                .map_err(|_| Error::Storage("corrupt wallet log entry".to_string()))?;
            records.push(self.get_transaction(Uuid::from_bytes(raw))?);
        }

        Ok(records)
    }

    /// Scan every record in the ledger (admin reporting path)
    pub fn all_transactions(&self) -> Result<Vec<TransactionRecord>> {
        let cf = self.cf_handle(CF_TRANSACTIONS)?;

        let iter = self.db.iterator_cf(cf, IteratorMode::Start);

        let mut records = Vec::new();
        for item in iter {
            let (_, value) = item?;
            records.push(bincode::deserialize(&value)?);
        }

        Ok(records)
    }

    // Statistics

    /// Get storage statistics
    pub fn get_stats(&self) -> Result<StorageStats> {
        let cf_wallets = self.cf_handle(CF_WALLETS)?;
        let cf_transactions = self.cf_handle(CF_TRANSACTIONS)?;

        Ok(StorageStats {
            total_wallets: self.approximate_count(cf_wallets)?,
            total_transactions: self.approximate_count(cf_transactions)?,
        })
    }

    fn approximate_count(&self, cf: &ColumnFamily) -> Result<u64> {
        // RocksDB property for approximate count
        let prop = self
            .db
            .property_int_value_cf(cf, "rocksdb.estimate-num-keys")?
            .unwrap_or(0);

        Ok(prop)
    }

    /// Close database (graceful shutdown)
    pub fn close(self) -> Result<()> {
        drop(self.db);
        tracing::info!("RocksDB closed gracefully");
        Ok(())
    }
}

/// Storage statistics
#[derive(Debug, Clone)]
pub struct StorageStats {
    /// Approximate number of wallets
    pub total_wallets: u64,
    /// Approximate number of transaction records
    pub total_transactions: u64,
}
