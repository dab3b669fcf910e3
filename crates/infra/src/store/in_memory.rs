use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use tracing::instrument;

use tally_core::WalletId;
use tally_ledger::{Transaction, Wallet};

use super::query::{Page, TransactionPage};
use super::r#trait::{Committed, Decide, LedgerStore};
use crate::error::StoreError;

/// A wallet and its append-only log (insertion order).
#[derive(Debug)]
struct WalletRow {
    wallet: Wallet,
    log: Vec<Transaction>,
}

impl WalletRow {
    fn newest_first(&self) -> Vec<Transaction> {
        let mut rows: Vec<Transaction> = self.log.iter().rev().cloned().collect();
        // Stable sort: equal timestamps keep reverse insertion order.
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows
    }
}

/// In-memory ledger store.
///
/// Intended for tests/dev. Each wallet sits behind its own mutex, which plays
/// the role of the row lock; the outer map lock is only held to look rows up.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    wallets: RwLock<HashMap<WalletId, Arc<Mutex<WalletRow>>>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn row(&self, wallet_id: WalletId) -> Result<Option<Arc<Mutex<WalletRow>>>, StoreError> {
        let wallets = self
            .wallets
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;
        Ok(wallets.get(&wallet_id).cloned())
    }

    fn with_row<T>(
        &self,
        wallet_id: WalletId,
        f: impl FnOnce(&mut WalletRow) -> Result<T, StoreError>,
    ) -> Result<Option<T>, StoreError> {
        let Some(row) = self.row(wallet_id)? else {
            return Ok(None);
        };
        let mut guard = row
            .lock()
            .map_err(|_| StoreError::Backend("wallet lock poisoned".to_string()))?;
        f(&mut guard).map(Some)
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    #[instrument(skip_all, fields(wallet_id = %wallet.id), err)]
    async fn create_wallet(&self, wallet: &Wallet, setup: &Transaction) -> Result<(), StoreError> {
        if setup.wallet_id != wallet.id {
            return Err(StoreError::Backend(format!(
                "setup transaction {} does not belong to wallet {}",
                setup.id, wallet.id
            )));
        }

        let mut wallets = self
            .wallets
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;

        if wallets.contains_key(&wallet.id) {
            return Err(StoreError::Conflict(format!("wallet {} already exists", wallet.id)));
        }

        wallets.insert(
            wallet.id,
            Arc::new(Mutex::new(WalletRow {
                wallet: wallet.clone(),
                log: vec![setup.clone()],
            })),
        );
        Ok(())
    }

    async fn get_wallet(&self, wallet_id: WalletId) -> Result<Option<Wallet>, StoreError> {
        self.with_row(wallet_id, |row| Ok(row.wallet.clone()))
    }

    #[instrument(skip(self, decide), fields(wallet_id = %wallet_id), err)]
    async fn transact(&self, wallet_id: WalletId, decide: Decide<'_>) -> Result<Committed, StoreError> {
        // No await point while the wallet mutex is held: the unit either runs
        // to completion or never starts.
        self.with_row(wallet_id, |row| {
            let transaction = decide(&row.wallet).map_err(StoreError::Rejected)?;

            let mut wallet = row.wallet.clone();
            wallet.apply(&transaction).map_err(StoreError::Rejected)?;

            row.log.push(transaction.clone());
            row.wallet = wallet.clone();
            Ok(Committed { wallet, transaction })
        })?
        .ok_or(StoreError::NotFound)
    }

    async fn page_transactions(
        &self,
        wallet_id: WalletId,
        page: Page,
    ) -> Result<Option<TransactionPage>, StoreError> {
        self.with_row(wallet_id, |row| {
            let total = row.log.len() as u64;
            let skip = usize::try_from(page.skip()).unwrap_or(usize::MAX);
            let items = row
                .newest_first()
                .into_iter()
                .skip(skip)
                .take(page.limit() as usize)
                .collect();
            Ok(TransactionPage { items, total })
        })
    }

    async fn all_transactions(&self, wallet_id: WalletId) -> Result<Option<Vec<Transaction>>, StoreError> {
        self.with_row(wallet_id, |row| Ok(row.newest_first()))
    }
}
