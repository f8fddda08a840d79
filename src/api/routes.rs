//! API route configuration.
//!
//! Every route here sits behind the middleware chain installed by
//! [`crate::routes::app_router`]; handlers can rely on a
//! [`MiddlewareContext`](crate::api::middleware::MiddlewareContext) in the
//! request extensions.

use crate::api::handlers::{
    batch_transfer_handler, get_account_handler, list_transfers_handler, open_account_handler,
    transfer_handler,
};
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, post},
};

/// All ledger routes.
///
/// # Endpoints
///
/// - `POST /accounts`                - Open an account (`ledger:write`)
/// - `GET  /accounts/{id}`           - Account with balance (`ledger:read`)
/// - `GET  /accounts/{id}/transfers` - Recent transfers (`ledger:read`)
/// - `POST /transfers`               - Single transfer (`ledger:write`)
/// - `POST /transfers/batch`         - All-or-nothing batch (`ledger:write`)
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/accounts", post(open_account_handler))
        .route("/accounts/{id}", get(get_account_handler))
        .route("/accounts/{id}/transfers", get(list_transfers_handler))
        .route("/transfers", post(transfer_handler))
        .route("/transfers/batch", post(batch_transfer_handler))
}
