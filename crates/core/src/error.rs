//! Domain error model.

use thiserror::Error;

use crate::money::Money;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants, conflicts). Infrastructure concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input). `field` names the
    /// offending input when the check is tied to one.
    #[error("validation failed: {message}")]
    Validation {
        field: Option<&'static str>,
        message: String,
    },

    /// A debit would take the wallet balance below zero.
    #[error("insufficient balance for debit transaction (balance {balance}, debit {requested})")]
    InsufficientBalance { balance: Money, requested: Money },

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A conflict occurred (e.g. concurrent modification detected).
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            field: None,
            message: msg.into(),
        }
    }

    pub fn invalid_field(field: &'static str, msg: impl Into<String>) -> Self {
        Self::Validation {
            field: Some(field),
            message: msg.into(),
        }
    }

    /// Attach `field` to a validation error that does not name one yet.
    pub fn on_field(self, field: &'static str) -> Self {
        match self {
            Self::Validation { field: None, message } => Self::invalid_field(field, message),
            other => other,
        }
    }

    pub fn insufficient_balance(balance: Money, requested: Money) -> Self {
        Self::InsufficientBalance { balance, requested }
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
}
