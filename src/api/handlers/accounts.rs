//! Handlers for account endpoints.

use axum::{
    Extension, Json,
    extract::{Path, Query, State, rejection::JsonRejection, rejection::QueryRejection},
    http::StatusCode,
};
use validator::Validate;

use super::authorize;
use crate::api::dispatcher::{Dispatched, dispatch, dispatch_with_status};
use crate::api::dto::accounts::OpenAccountRequest;
use crate::api::dto::transfers::{TransferListParams, TransferListResponse};
use crate::api::middleware::MiddlewareContext;
use crate::domain::entities::{Account, LEDGER_READ_ROLE, LEDGER_WRITE_ROLE};
use crate::error::AppError;
use crate::state::AppState;

/// Opens a new account.
///
/// # Endpoint
///
/// `POST /api/accounts` (role `ledger:write`)
///
/// # Request Body
///
/// ```json
/// { "id": "acc-alice", "owner": "Alice", "initial_balance": 1000 }
/// ```
///
/// # Responses
///
/// - **201 Created**: the new account
/// - **400**: validation failure
/// - **409**: id already taken
pub async fn open_account_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<MiddlewareContext>,
    payload: Result<Json<OpenAccountRequest>, JsonRejection>,
) -> Dispatched {
    let result = open_account(&state, &ctx, payload).await;
    dispatch_with_status(&ctx, StatusCode::CREATED, result)
}

async fn open_account(
    state: &AppState,
    ctx: &MiddlewareContext,
    payload: Result<Json<OpenAccountRequest>, JsonRejection>,
) -> Result<Account, AppError> {
    authorize(ctx, LEDGER_WRITE_ROLE)?;
    let Json(payload) = payload?;
    payload.validate()?;
    state.ledger.open_account(payload.into()).await
}

/// Returns one account with its current balance.
///
/// # Endpoint
///
/// `GET /api/accounts/{id}` (role `ledger:read`)
pub async fn get_account_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<MiddlewareContext>,
    Path(id): Path<String>,
) -> Dispatched {
    let result = match authorize(&ctx, LEDGER_READ_ROLE) {
        Ok(_) => state.ledger.get_account(&id).await,
        Err(e) => Err(e),
    };
    dispatch(&ctx, result)
}

/// Lists the most recent transfers touching an account, newest first.
///
/// # Endpoint
///
/// `GET /api/accounts/{id}/transfers?limit=20` (role `ledger:read`)
///
/// `limit` defaults to 20 and must be between 1 and 100.
pub async fn list_transfers_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<MiddlewareContext>,
    Path(id): Path<String>,
    params: Result<Query<TransferListParams>, QueryRejection>,
) -> Dispatched {
    let result = list_transfers(&state, &ctx, id, params).await;
    dispatch(&ctx, result)
}

async fn list_transfers(
    state: &AppState,
    ctx: &MiddlewareContext,
    account_id: String,
    params: Result<Query<TransferListParams>, QueryRejection>,
) -> Result<TransferListResponse, AppError> {
    authorize(ctx, LEDGER_READ_ROLE)?;
    let Query(params) = params?;
    let transfers = state
        .ledger
        .list_transfers(&account_id, params.limit())
        .await?;

    Ok(TransferListResponse {
        account_id,
        transfers,
    })
}
