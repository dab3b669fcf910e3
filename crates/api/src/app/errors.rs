use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use tracing::{error, warn};

use tally_core::WalletId;
use tally_infra::LedgerError;

pub fn ledger_error_to_response(err: LedgerError, expose_internal: bool) -> axum::response::Response {
    match err {
        LedgerError::Validation { field, message } => validation_error(field, message),
        LedgerError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "wallet not found"),
        e @ LedgerError::InsufficientBalance { .. } => {
            json_error(StatusCode::BAD_REQUEST, "insufficient_balance", e.to_string())
        }
        LedgerError::Conflict(msg) => {
            warn!(error = %msg, "ledger write conflicted");
            let message = if expose_internal {
                msg
            } else {
                "concurrent modification, please retry".to_string()
            };
            json_error(StatusCode::CONFLICT, "conflict", message)
        }
        LedgerError::Storage(msg) => {
            error!(error = %msg, "ledger storage failure");
            let message = if expose_internal {
                msg
            } else {
                "internal server error".to_string()
            };
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
        }
    }
}

pub fn json_rejection(rejection: JsonRejection) -> axum::response::Response {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return json_error(StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large", rejection.body_text());
    }
    validation_error(None, rejection.body_text())
}

pub fn query_rejection(rejection: QueryRejection) -> axum::response::Response {
    validation_error(None, rejection.body_text())
}

/// Parse a wallet id taken from request input named `field`.
pub fn parse_wallet_id(field: &'static str, raw: &str) -> Result<WalletId, axum::response::Response> {
    raw.parse()
        .map_err(|e: tally_core::DomainError| validation_error(Some(field), e.to_string()))
}

/// 400 `validation_error`; `errors` lists the offending field when known.
pub fn validation_error(field: Option<&str>, message: impl Into<String>) -> axum::response::Response {
    let message = message.into();
    let errors = match field {
        Some(field) => json!([{ "field": field, "message": message }]),
        None => json!([]),
    };
    (
        StatusCode::BAD_REQUEST,
        axum::Json(json!({
            "error": "validation_error",
            "message": message,
            "errors": errors,
        })),
    )
        .into_response()
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
