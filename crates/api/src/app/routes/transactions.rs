use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Extension, Path, Query,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::json;

use tally_infra::{ApplyTransaction, Page};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/transact/:wallet_id", post(transact))
        .route("/transactions", get(list_transactions))
        .route("/transactions/export/:wallet_id", get(export_transactions))
}

pub async fn transact(
    Extension(services): Extension<Arc<AppServices>>,
    Path(wallet_id): Path<String>,
    body: Result<Json<dto::TransactRequest>, JsonRejection>,
) -> axum::response::Response {
    let wallet_id = match errors::parse_wallet_id("walletId", &wallet_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::json_rejection(rejection),
    };

    let amount = match dto::required_money_field("amount", body.amount) {
        Ok(amount) => amount,
        Err(e) => return errors::ledger_error_to_response(e, services.expose_internal_errors),
    };

    let applied = match services
        .engine
        .apply_transaction(ApplyTransaction {
            wallet_id,
            amount,
            description: body.description,
        })
        .await
    {
        Ok(a) => a,
        Err(e) => return errors::ledger_error_to_response(e, services.expose_internal_errors),
    };

    (
        StatusCode::OK,
        Json(json!({
            "balance": applied.new_balance.to_string(),
            "transactionId": applied.transaction_id.to_string(),
        })),
    )
        .into_response()
}

pub async fn list_transactions(
    Extension(services): Extension<Arc<AppServices>>,
    query: Result<Query<dto::ListTransactionsQuery>, QueryRejection>,
) -> axum::response::Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(rejection) => return errors::query_rejection(rejection),
    };

    let Some(raw_id) = query.wallet_id.as_deref() else {
        return errors::validation_error(Some("walletId"), "walletId is required");
    };
    let wallet_id = match errors::parse_wallet_id("walletId", raw_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let page = match Page::parse(query.skip.as_deref(), query.limit.as_deref()) {
        Ok(p) => p,
        Err(e) => return errors::ledger_error_to_response(e, services.expose_internal_errors),
    };

    match services.queries.list_transactions(wallet_id, page).await {
        Ok(result) => {
            let data = result.items.iter().map(dto::transaction_to_json).collect::<Vec<_>>();
            (StatusCode::OK, Json(json!({ "data": data, "total": result.total }))).into_response()
        }
        Err(e) => errors::ledger_error_to_response(e, services.expose_internal_errors),
    }
}

pub async fn export_transactions(
    Extension(services): Extension<Arc<AppServices>>,
    Path(wallet_id): Path<String>,
) -> axum::response::Response {
    let wallet_id = match errors::parse_wallet_id("walletId", &wallet_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.queries.export_transactions(wallet_id).await {
        Ok(export) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", export.filename),
                ),
            ],
            export.body,
        )
            .into_response(),
        Err(e) => errors::ledger_error_to_response(e, services.expose_internal_errors),
    }
}
