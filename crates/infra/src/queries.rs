//! Read side of the ledger: paginated history and CSV export.
//!
//! Reads never take wallet locks; each one sees a single consistent snapshot.

use tracing::{debug, instrument};

use tally_core::WalletId;
use tally_ledger::Transaction;

use crate::error::LedgerError;
use crate::export::render_csv;
use crate::store::{LedgerStore, Page, TransactionPage};

/// A rendered CSV document ready to be served as a download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvExport {
    pub filename: String,
    pub body: String,
    pub rows: usize,
}

/// Query layer over a [`LedgerStore`].
///
/// Holds its own store handle; it shares nothing else with the engine.
#[derive(Debug, Clone)]
pub struct LedgerQueries<S> {
    store: S,
}

impl<S> LedgerQueries<S>
where
    S: LedgerStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// One page of history, newest first, plus the wallet's total row count.
    #[instrument(skip(self), fields(wallet_id = %wallet_id), err)]
    pub async fn list_transactions(&self, wallet_id: WalletId, page: Page) -> Result<TransactionPage, LedgerError> {
        let result = self
            .store
            .page_transactions(wallet_id, page)
            .await?
            .ok_or(LedgerError::NotFound)?;
        debug!(returned = result.items.len(), total = result.total, "history page read");
        Ok(result)
    }

    /// Full history, newest first.
    pub async fn history(&self, wallet_id: WalletId) -> Result<Vec<Transaction>, LedgerError> {
        self.store
            .all_transactions(wallet_id)
            .await?
            .ok_or(LedgerError::NotFound)
    }

    /// Entire history rendered as CSV, in the same order as `list_transactions`.
    #[instrument(skip(self), fields(wallet_id = %wallet_id), err)]
    pub async fn export_transactions(&self, wallet_id: WalletId) -> Result<CsvExport, LedgerError> {
        let rows = self.history(wallet_id).await?;
        let body = render_csv(&rows)?;
        debug!(rows = rows.len(), "history exported");
        Ok(CsvExport {
            filename: format!("transactions-{wallet_id}.csv"),
            body,
            rows: rows.len(),
        })
    }
}
