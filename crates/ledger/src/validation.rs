//! Validated text inputs.

use serde::{Deserialize, Serialize};

use tally_core::{DomainError, DomainResult};

pub const WALLET_NAME_MAX_CHARS: usize = 255;
pub const DESCRIPTION_MAX_CHARS: usize = 500;

/// Length is counted in characters; whitespace is content and is kept as sent.
fn bounded_text(field: &'static str, raw: &str, max: usize) -> DomainResult<String> {
    if raw.is_empty() {
        return Err(DomainError::invalid_field(field, format!("{field} is required")));
    }
    if raw.chars().count() > max {
        return Err(DomainError::invalid_field(field, format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(raw.to_string())
}

/// Wallet display label (1–255 characters).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WalletName(String);

impl WalletName {
    pub fn parse(raw: &str) -> DomainResult<Self> {
        bounded_text("name", raw, WALLET_NAME_MAX_CHARS).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

/// Free-text transaction description (1–500 characters).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Description(String);

impl Description {
    pub fn parse(raw: &str) -> DomainResult<Self> {
        bounded_text("description", raw, DESCRIPTION_MAX_CHARS).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
