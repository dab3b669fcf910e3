use serde::Deserialize;
use serde_json::{Value, json};

use tally_core::Money;
use tally_infra::LedgerError;
use tally_infra::export::format_timestamp;
use tally_ledger::{Transaction, Wallet};

// -------------------------
// Request DTOs
// -------------------------

// Fields are taken loosely (missing text is empty, amounts stay raw JSON) so
// that each bad field is reported by name instead of as a body rejection.

#[derive(Debug, Deserialize)]
pub struct SetupWalletRequest {
    #[serde(default)]
    pub name: String,
    /// Initial balance; absent or null means zero.
    #[serde(default)]
    pub balance: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct TransactRequest {
    /// Signed: positive credits, negative debits.
    #[serde(default)]
    pub amount: Option<Value>,
    #[serde(default)]
    pub description: String,
}

/// Read a JSON number or decimal string as `Money`, blaming `field` on failure.
pub fn money_field(field: &'static str, value: Value) -> Result<Money, LedgerError> {
    let parsed = match value {
        Value::String(text) => text.parse::<Money>(),
        // Exact source text, courtesy of `arbitrary_precision`.
        Value::Number(number) => number.to_string().parse::<Money>(),
        _ => return Err(LedgerError::invalid_field(field, format!("{field} must be a number"))),
    };
    parsed.map_err(|e| LedgerError::from(e.on_field(field)))
}

pub fn required_money_field(field: &'static str, value: Option<Value>) -> Result<Money, LedgerError> {
    match value {
        Some(value) => money_field(field, value),
        None => Err(LedgerError::invalid_field(field, format!("{field} is required"))),
    }
}

/// Raw query string; values are validated by the handler so that bad input
/// surfaces as a `validation_error` instead of a framework rejection.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTransactionsQuery {
    pub wallet_id: Option<String>,
    pub skip: Option<String>,
    pub limit: Option<String>,
}

// -------------------------
// Response mapping
// -------------------------

pub fn wallet_to_json(wallet: &Wallet) -> Value {
    json!({
        "id": wallet.id.to_string(),
        "name": wallet.name,
        "balance": wallet.balance.to_string(),
        "date": format_timestamp(wallet.created_at),
    })
}

pub fn created_wallet_to_json(wallet: &Wallet, setup: &Transaction) -> Value {
    let mut body = wallet_to_json(wallet);
    body["transactionId"] = json!(setup.id.to_string());
    body
}

/// `amount` carries the direction: positive for credits, negative for debits.
pub fn transaction_to_json(tx: &Transaction) -> Value {
    json!({
        "id": tx.id.to_string(),
        "walletId": tx.wallet_id.to_string(),
        "amount": tx.signed_amount().to_string(),
        "balance": tx.balance_after.to_string(),
        "description": tx.description,
        "date": format_timestamp(tx.created_at),
        "type": tx.kind.as_str(),
    })
}
