use thiserror::Error;

use tally_core::{DomainError, Money};

/// Ledger store operation error.
///
/// These are the errors a storage backend can report. Business rejections
/// raised by the decision closure travel through unchanged as `Rejected`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("wallet not found")]
    NotFound,

    #[error("rejected: {0}")]
    Rejected(DomainError),

    /// Serialization failure or deadlock; the whole unit may be retried.
    #[error("concurrent modification: {0}")]
    Conflict(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Only contention is worth re-running a unit for.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

/// Error surfaced by the ledger engine and query layer.
///
/// Exactly one variant per outcome kind a caller has to distinguish.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("{message}")]
    Validation {
        field: Option<&'static str>,
        message: String,
    },

    #[error("wallet not found")]
    NotFound,

    #[error("insufficient balance for debit transaction (balance {balance}, debit {requested})")]
    InsufficientBalance { balance: Money, requested: Money },

    #[error("concurrent modification could not be resolved: {0}")]
    Conflict(String),

    #[error("storage failure: {0}")]
    Storage(String),
}

impl LedgerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        LedgerError::Validation {
            field: None,
            message: msg.into(),
        }
    }

    pub fn invalid_field(field: &'static str, msg: impl Into<String>) -> Self {
        LedgerError::Validation {
            field: Some(field),
            message: msg.into(),
        }
    }
}

impl From<DomainError> for LedgerError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation { field, message } => LedgerError::Validation { field, message },
            DomainError::InvalidId(msg) => LedgerError::validation(msg),
            DomainError::InsufficientBalance { balance, requested } => {
                LedgerError::InsufficientBalance { balance, requested }
            }
            // A row that does not fit the wallet means the store handed back
            // inconsistent state.
            DomainError::Conflict(msg) => LedgerError::Storage(msg),
        }
    }
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => LedgerError::NotFound,
            StoreError::Rejected(domain) => domain.into(),
            StoreError::Conflict(msg) => LedgerError::Conflict(msg),
            StoreError::Backend(msg) => LedgerError::Storage(msg),
        }
    }
}
