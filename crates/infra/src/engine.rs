//! Write side of the ledger: wallet creation and balance changes.
//!
//! Every request is validated before storage is touched. A balance change is
//! one scoped atomic unit; when the store reports a serialization conflict the
//! whole unit is re-run (fresh read, fresh decision) a bounded number of times.

use std::time::Duration;

use chrono::{DateTime, SubsecRound, Utc};
use tracing::{Span, debug, error, info, instrument, warn};

use tally_core::{Money, TransactionId, WalletId};
use tally_ledger::{Description, Posting, Transaction, Wallet, WalletName};

use crate::error::{LedgerError, StoreError};
use crate::store::LedgerStore;

/// Bounded retry for atomic units that hit a serialization conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Always at least 1.
    pub max_attempts: u32,
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_backoff: Duration::from_millis(20),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_backoff,
        }
    }

    /// Delay before attempt `failed + 1`: `base * 2^(failed - 1)`, capped at 32x.
    pub fn backoff(&self, failed: u32) -> Duration {
        let exponent = failed.saturating_sub(1).min(5);
        self.base_backoff.saturating_mul(1 << exponent)
    }
}

/// Create-wallet request as received from a caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateWallet {
    pub name: String,
    /// Defaults to zero.
    pub initial_balance: Option<Money>,
}

/// Balance-change request. `amount` is signed: positive credits, negative debits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyTransaction {
    pub wallet_id: WalletId,
    pub amount: Money,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletCreated {
    pub wallet: Wallet,
    pub setup_transaction: Transaction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionApplied {
    pub new_balance: Money,
    pub transaction_id: TransactionId,
    pub transaction: Transaction,
}

/// Orchestrates validated writes against a [`LedgerStore`].
#[derive(Debug, Clone)]
pub struct LedgerEngine<S> {
    store: S,
    retry: RetryPolicy,
}

impl<S> LedgerEngine<S>
where
    S: LedgerStore,
{
    pub fn new(store: S) -> Self {
        Self::with_retry(store, RetryPolicy::default())
    }

    pub fn with_retry(store: S, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Create a wallet and its "Setup" credit in one atomic write.
    #[instrument(skip_all, fields(wallet_id = tracing::field::Empty), err)]
    pub async fn create_wallet(&self, request: CreateWallet) -> Result<WalletCreated, LedgerError> {
        let name = WalletName::parse(&request.name)?;
        let initial = request.initial_balance.unwrap_or_else(Money::zero);

        let (wallet, setup_transaction) =
            Wallet::open(WalletId::new(), name, initial, TransactionId::new(), now())?;
        Span::current().record("wallet_id", tracing::field::display(wallet.id));

        self.store.create_wallet(&wallet, &setup_transaction).await?;

        info!(
            wallet_id = %wallet.id,
            balance = %wallet.balance,
            "wallet created"
        );
        Ok(WalletCreated {
            wallet,
            setup_transaction,
        })
    }

    /// Credit or debit a wallet.
    ///
    /// The transaction id is fixed before the first attempt, so a retried
    /// unit can never produce two different rows.
    #[instrument(
        skip_all,
        fields(wallet_id = %request.wallet_id, amount = %request.amount),
        err
    )]
    pub async fn apply_transaction(&self, request: ApplyTransaction) -> Result<TransactionApplied, LedgerError> {
        let description = Description::parse(&request.description)?;
        let posting = Posting::new(TransactionId::new(), request.amount, description)?;

        let decide = |wallet: &Wallet| wallet.post(&posting, now());

        let mut attempt = 0;
        let committed = loop {
            attempt += 1;
            match self.store.transact(request.wallet_id, &decide).await {
                Ok(committed) => break committed,
                Err(err) if err.is_retryable() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.backoff(attempt);
                    warn!(attempt, ?delay, reason = %err, "atomic unit conflicted, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(StoreError::Conflict(reason)) => {
                    warn!(attempt, %reason, "atomic unit conflicted, giving up");
                    return Err(LedgerError::Conflict(reason));
                }
                Err(StoreError::Rejected(reason)) => {
                    debug!(%reason, "transaction rejected");
                    return Err(reason.into());
                }
                Err(StoreError::NotFound) => return Err(LedgerError::NotFound),
                Err(other) => {
                    error!(error = %other, "atomic unit failed");
                    return Err(other.into());
                }
            }
        };

        info!(
            transaction_id = %committed.transaction.id,
            kind = %committed.transaction.kind,
            balance = %committed.wallet.balance,
            attempt,
            "transaction applied"
        );
        Ok(TransactionApplied {
            new_balance: committed.wallet.balance,
            transaction_id: committed.transaction.id,
            transaction: committed.transaction,
        })
    }

    #[instrument(skip(self), fields(wallet_id = %wallet_id), err)]
    pub async fn get_wallet(&self, wallet_id: WalletId) -> Result<Wallet, LedgerError> {
        self.store.get_wallet(wallet_id).await?.ok_or(LedgerError::NotFound)
    }
}

/// Postgres keeps microseconds; truncating here keeps freshly returned rows
/// identical to what a later read yields.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}
