use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tally_core::{DomainError, DomainResult, Money, TransactionId, WalletId};

/// Direction of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    Credit,
    Debit,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Credit => "CREDIT",
            TransactionType::Debit => "DEBIT",
        }
    }

    pub fn parse(s: &str) -> DomainResult<Self> {
        match s {
            "CREDIT" => Ok(TransactionType::Credit),
            "DEBIT" => Ok(TransactionType::Debit),
            other => Err(DomainError::validation(format!("unknown transaction type '{other}'"))),
        }
    }
}

impl core::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable, balance-stamped ledger row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub wallet_id: WalletId,
    /// Magnitude as stored; the sign lives in `kind`.
    pub amount: Money,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    /// Wallet balance immediately after this row was applied.
    pub balance_after: Money,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Amount with its direction applied (+ credit, − debit).
    pub fn signed_amount(&self) -> Money {
        match self.kind {
            TransactionType::Credit => self.amount,
            TransactionType::Debit => self.amount.negate(),
        }
    }
}

/// Recompute a wallet's balance from its log (oldest first) and check that
/// every `balance_after` stamp equals the running sum.
///
/// Returns the final balance, which must equal the wallet's stored balance.
pub fn replay<'a>(transactions: impl IntoIterator<Item = &'a Transaction>) -> DomainResult<Money> {
    let mut running = Money::zero();
    for tx in transactions {
        running = running.checked_add(tx.signed_amount())?;
        if running.is_negative() {
            return Err(DomainError::conflict(format!(
                "ledger goes negative at transaction {}",
                tx.id
            )));
        }
        if running != tx.balance_after {
            return Err(DomainError::conflict(format!(
                "transaction {} is stamped {} but the running balance is {}",
                tx.id, tx.balance_after, running
            )));
        }
    }
    Ok(running)
}
