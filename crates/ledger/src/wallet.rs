use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tally_core::{DomainError, DomainResult, Money, TransactionId, WalletId};

use crate::transaction::{Transaction, TransactionType};
use crate::validation::{Description, WalletName};

/// Description stamped on the synthetic transaction created with every wallet.
pub const SETUP_DESCRIPTION: &str = "Setup";

/// Current snapshot of a wallet row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub id: WalletId,
    pub name: String,
    pub balance: Money,
    pub created_at: DateTime<Utc>,
    /// Timestamp of the newest ledger row. New rows are never stamped earlier.
    pub updated_at: DateTime<Utc>,
}

/// A validated request to move a wallet's balance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posting {
    pub transaction_id: TransactionId,
    /// Signed: positive credits, negative debits. Never zero.
    pub amount: Money,
    pub description: Description,
}

impl Posting {
    pub fn new(transaction_id: TransactionId, amount: Money, description: Description) -> DomainResult<Self> {
        if amount.is_zero() {
            return Err(DomainError::invalid_field("amount", "amount cannot be zero"));
        }
        Ok(Self {
            transaction_id,
            amount,
            description,
        })
    }

    pub fn kind(&self) -> TransactionType {
        if self.amount.is_negative() {
            TransactionType::Debit
        } else {
            TransactionType::Credit
        }
    }
}

impl Wallet {
    /// Create a wallet together with its "Setup" credit, which seeds the
    /// running sum so that `balance == replay(log)` holds from the first row.
    pub fn open(
        id: WalletId,
        name: WalletName,
        initial_balance: Money,
        setup_transaction_id: TransactionId,
        now: DateTime<Utc>,
    ) -> DomainResult<(Wallet, Transaction)> {
        if initial_balance.is_negative() {
            return Err(DomainError::invalid_field("balance", "balance cannot be negative"));
        }

        let wallet = Wallet {
            id,
            name: name.into_inner(),
            balance: initial_balance,
            created_at: now,
            updated_at: now,
        };
        let setup = Transaction {
            id: setup_transaction_id,
            wallet_id: id,
            amount: initial_balance,
            kind: TransactionType::Credit,
            balance_after: initial_balance,
            description: SETUP_DESCRIPTION.to_string(),
            created_at: now,
        };
        Ok((wallet, setup))
    }

    /// Decide the ledger row for `posting` against the current balance.
    ///
    /// Pure: the wallet is not modified. The caller must hold the wallet's
    /// exclusive lock and persist the returned row together with
    /// `balance = row.balance_after`.
    ///
    /// The row is stamped `max(now, updated_at)` so history ordered by time
    /// stays in commit order even if the clock steps back.
    pub fn post(&self, posting: &Posting, now: DateTime<Utc>) -> DomainResult<Transaction> {
        let kind = posting.kind();
        let new_balance = self
            .balance
            .checked_add(posting.amount)
            .map_err(|e| e.on_field("amount"))?;

        if kind == TransactionType::Debit && new_balance.is_negative() {
            return Err(DomainError::insufficient_balance(self.balance, posting.amount.abs()));
        }

        Ok(Transaction {
            id: posting.transaction_id,
            wallet_id: self.id,
            amount: posting.amount.abs(),
            kind,
            balance_after: new_balance,
            description: posting.description.as_str().to_string(),
            created_at: now.max(self.updated_at),
        })
    }

    /// Move the in-memory snapshot forward to the state recorded by `row`.
    pub fn apply(&mut self, row: &Transaction) -> DomainResult<()> {
        if row.wallet_id != self.id {
            return Err(DomainError::conflict(format!(
                "transaction {} belongs to wallet {}, not {}",
                row.id, row.wallet_id, self.id
            )));
        }
        if row.balance_after.is_negative() {
            return Err(DomainError::conflict("balance cannot go negative"));
        }
        self.balance = row.balance_after;
        self.updated_at = self.updated_at.max(row.created_at);
        Ok(())
    }
}
