//! CSV rendering of a wallet's transaction history.

use chrono::{DateTime, SecondsFormat, Utc};

use tally_ledger::Transaction;

use crate::error::LedgerError;

pub const CSV_HEADERS: [&str; 7] = [
    "Transaction ID",
    "Wallet ID",
    "Amount",
    "Balance After",
    "Description",
    "Type",
    "Date",
];

/// `2024-01-01T00:00:00.000Z`
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Render `rows` (already in output order) as an RFC 4180 document.
///
/// Amounts are unsigned magnitudes; direction is in the Type column.
pub fn render_csv(rows: &[Transaction]) -> Result<String, LedgerError> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(Vec::new());

    writer.write_record(CSV_HEADERS).map_err(csv_error)?;
    for tx in rows {
        writer
            .write_record([
                tx.id.to_string(),
                tx.wallet_id.to_string(),
                tx.amount.to_string(),
                tx.balance_after.to_string(),
                tx.description.clone(),
                tx.kind.as_str().to_string(),
                format_timestamp(tx.created_at),
            ])
            .map_err(csv_error)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| LedgerError::Storage(format!("failed to flush csv: {e}")))?;
    String::from_utf8(bytes).map_err(|e| LedgerError::Storage(format!("csv is not utf-8: {e}")))
}

fn csv_error(err: csv::Error) -> LedgerError {
    LedgerError::Storage(format!("failed to write csv: {err}"))
}
