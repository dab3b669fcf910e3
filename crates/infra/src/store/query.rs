//! Pagination types for transaction history reads.

use serde::{Deserialize, Serialize};

use tally_ledger::Transaction;

use crate::error::LedgerError;

pub const DEFAULT_LIMIT: u32 = 10;
pub const MAX_LIMIT: u32 = 100;

/// Offset pagination over a wallet's history (newest first).
///
/// Out-of-range values are rejected rather than clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    skip: u64,
    limit: u32,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl Page {
    pub fn new(skip: Option<u64>, limit: Option<u32>) -> Result<Self, LedgerError> {
        let limit = limit.unwrap_or(DEFAULT_LIMIT);
        if !(1..=MAX_LIMIT).contains(&limit) {
            return Err(LedgerError::invalid_field(
                "limit",
                format!("limit must be between 1 and {MAX_LIMIT}"),
            ));
        }
        Ok(Self {
            skip: skip.unwrap_or(0),
            limit,
        })
    }

    /// Build a page from raw query-string values.
    pub fn parse(skip: Option<&str>, limit: Option<&str>) -> Result<Self, LedgerError> {
        let skip = skip
            .map(|raw| {
                raw.trim()
                    .parse::<u64>()
                    .map_err(|_| LedgerError::invalid_field("skip", "skip must be a non-negative integer"))
            })
            .transpose()?;
        let limit = limit
            .map(|raw| {
                raw.trim().parse::<u32>().map_err(|_| {
                    LedgerError::invalid_field("limit", format!("limit must be an integer between 1 and {MAX_LIMIT}"))
                })
            })
            .transpose()?;
        Self::new(skip, limit)
    }

    pub fn skip(&self) -> u64 {
        self.skip
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }
}

/// One page of history plus the wallet's full transaction count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionPage {
    pub items: Vec<Transaction>,
    pub total: u64,
}
