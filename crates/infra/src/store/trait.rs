use std::sync::Arc;

use async_trait::async_trait;

use tally_core::{DomainResult, WalletId};
use tally_ledger::{Transaction, Wallet};

use super::query::{Page, TransactionPage};
use crate::error::StoreError;

/// Decision taken against the locked wallet row inside a scoped atomic unit.
///
/// It must be pure: it may run more than once when the unit is retried.
pub type Decide<'a> = &'a (dyn Fn(&Wallet) -> DomainResult<Transaction> + Send + Sync);

/// Result of a committed atomic unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Committed {
    pub wallet: Wallet,
    pub transaction: Transaction,
}

/// Durable wallet + transaction storage.
///
/// ## Atomic units
///
/// `transact` is the only way to change a balance. Implementations must:
/// - hold an exclusive lock on the wallet row from the read until commit,
///   so concurrent units on the same wallet serialize
/// - never block units on different wallets
/// - write the new balance and the transaction row together or not at all
/// - report serialization failures and deadlocks as `StoreError::Conflict`
///   (the caller may retry) and leave no partial state behind
///
/// ## Reads
///
/// History is returned newest first: `created_at` descending, ties broken by
/// reverse insertion order. Page reads and the total count come from one
/// consistent snapshot. `None` means the wallet does not exist.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Persist a new wallet together with its setup transaction.
    async fn create_wallet(&self, wallet: &Wallet, setup: &Transaction) -> Result<(), StoreError>;

    async fn get_wallet(&self, wallet_id: WalletId) -> Result<Option<Wallet>, StoreError>;

    /// Lock the wallet, run `decide` against it and commit the returned row.
    ///
    /// A `decide` error rolls the unit back and is returned as `Rejected`.
    async fn transact(&self, wallet_id: WalletId, decide: Decide<'_>) -> Result<Committed, StoreError>;

    async fn page_transactions(
        &self,
        wallet_id: WalletId,
        page: Page,
    ) -> Result<Option<TransactionPage>, StoreError>;

    /// Every transaction of the wallet, newest first.
    async fn all_transactions(&self, wallet_id: WalletId) -> Result<Option<Vec<Transaction>>, StoreError>;
}

#[async_trait]
impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    async fn create_wallet(&self, wallet: &Wallet, setup: &Transaction) -> Result<(), StoreError> {
        (**self).create_wallet(wallet, setup).await
    }

    async fn get_wallet(&self, wallet_id: WalletId) -> Result<Option<Wallet>, StoreError> {
        (**self).get_wallet(wallet_id).await
    }

    async fn transact(&self, wallet_id: WalletId, decide: Decide<'_>) -> Result<Committed, StoreError> {
        (**self).transact(wallet_id, decide).await
    }

    async fn page_transactions(
        &self,
        wallet_id: WalletId,
        page: Page,
    ) -> Result<Option<TransactionPage>, StoreError> {
        (**self).page_transactions(wallet_id, page).await
    }

    async fn all_transactions(&self, wallet_id: WalletId) -> Result<Option<Vec<Transaction>>, StoreError> {
        (**self).all_transactions(wallet_id).await
    }
}
