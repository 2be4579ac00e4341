//! Wallet directory: account → wallet resolution
//!
//! Wallets are created lazily on first use. Creation goes through the
//! single-writer task, so concurrent first-use by the same account resolves
//! to exactly one wallet; lookups read storage directly.

use crate::actor::WalletHandle;
use crate::types::{AccountId, Wallet};
use crate::{Error, Result, Storage};
use std::sync::Arc;

/// Resolves account identifiers to wallets
#[derive(Clone)]
pub struct WalletDirectory {
    handle: WalletHandle,
    storage: Arc<Storage>,
}

impl WalletDirectory {
    pub(crate) fn new(handle: WalletHandle, storage: Arc<Storage>) -> Self {
        Self { handle, storage }
    }

    /// Return the wallet for `account_id`, creating a zero-balance one if
    /// none exists yet
    pub async fn get_or_create(&self, account_id: &AccountId) -> Result<Wallet> {
        if !account_id.is_valid() {
            return Err(Error::Validation("account id must not be empty".to_string()));
        }

        // Fast path: an existing wallet never needs the writer
        if let Some(wallet) = self.storage.wallet_for_account(account_id)? {
            return Ok(wallet);
        }

        self.handle.get_or_create_wallet(account_id.clone()).await
    }

    /// Pure lookup with no side effects
    pub fn get(&self, account_id: &AccountId) -> Result<Wallet> {
        self.storage
            .wallet_for_account(account_id)?
            .ok_or_else(|| Error::WalletNotFound(account_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::spawn_wallet_actor;
    use crate::metrics::Metrics;
    use crate::Config;

    async fn test_directory() -> (WalletDirectory, tempfile::TempDir) {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();

        let storage = Arc::new(Storage::open(&config).unwrap());
        let handle = spawn_wallet_actor(storage.clone(), Metrics::new().unwrap(), 64);
        (WalletDirectory::new(handle, storage), temp_dir)
    }

    #[tokio::test]
    async fn test_lazy_creation() {
        let (directory, _temp) = test_directory().await;
        let account = AccountId::new("u1");

        assert!(matches!(
            directory.get(&account),
            Err(Error::WalletNotFound(_))
        ));

        let created = directory.get_or_create(&account).await.unwrap();
        assert_eq!(created.balance, 0);

        let found = directory.get(&account).unwrap();
        assert_eq!(found.wallet_id, created.wallet_id);
    }

    #[tokio::test]
    async fn test_repeat_resolution_is_stable() {
        let (directory, _temp) = test_directory().await;
        let account = AccountId::new("u1");

        let first = directory.get_or_create(&account).await.unwrap();
        let second = directory.get_or_create(&account).await.unwrap();
        assert_eq!(first.wallet_id, second.wallet_id);
    }

    #[tokio::test]
    async fn test_concurrent_first_use() {
        let (directory, _temp) = test_directory().await;
        let account = AccountId::new("u1");

        let mut handles = Vec::new();
        for _ in 0..8 {
            let directory = directory.clone();
            let account = account.clone();
            handles.push(tokio::spawn(async move {
                directory.get_or_create(&account).await.unwrap().wallet_id
            }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_account_rejected() {
        let (directory, _temp) = test_directory().await;

        let result = directory.get_or_create(&AccountId::new("  ")).await;
        assert!(matches!(result, Err(Error::Validation(_))));
    }
}
