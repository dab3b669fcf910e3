use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use tally_infra::CreateWallet;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/setup", post(setup_wallet))
        .route("/wallet/:id", get(get_wallet))
}

pub async fn setup_wallet(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::SetupWalletRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::json_rejection(rejection),
    };

    let initial_balance = match body.balance.map(|raw| dto::money_field("balance", raw)).transpose() {
        Ok(balance) => balance,
        Err(e) => return errors::ledger_error_to_response(e, services.expose_internal_errors),
    };

    let created = match services
        .engine
        .create_wallet(CreateWallet {
            name: body.name,
            initial_balance,
        })
        .await
    {
        Ok(c) => c,
        Err(e) => return errors::ledger_error_to_response(e, services.expose_internal_errors),
    };

    (
        StatusCode::CREATED,
        Json(dto::created_wallet_to_json(&created.wallet, &created.setup_transaction)),
    )
        .into_response()
}

pub async fn get_wallet(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let wallet_id = match errors::parse_wallet_id("id", &id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.engine.get_wallet(wallet_id).await {
        Ok(wallet) => (StatusCode::OK, Json(dto::wallet_to_json(&wallet))).into_response(),
        Err(e) => errors::ledger_error_to_response(e, services.expose_internal_errors),
    }
}
