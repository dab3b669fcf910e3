use axum::Router;

pub mod system;
pub mod transactions;
pub mod wallets;

/// Router for all ledger endpoints (mounted under `/api`).
pub fn router() -> Router {
    Router::new()
        .merge(wallets::router())
        .merge(transactions::router())
}
