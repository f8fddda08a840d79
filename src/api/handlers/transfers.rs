//! Handlers for transfer endpoints.

use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use validator::Validate;

use super::authorize;
use crate::api::dispatcher::{Dispatched, dispatch_with_status};
use crate::api::dto::transfers::{BatchTransferRequest, BatchTransferResponse, TransferRequest};
use crate::api::middleware::MiddlewareContext;
use crate::domain::entities::{LEDGER_WRITE_ROLE, NewTransfer, TransferReceipt};
use crate::error::AppError;
use crate::state::AppState;

/// Moves funds between two accounts atomically.
///
/// # Endpoint
///
/// `POST /api/transfers` (role `ledger:write`)
///
/// # Request Body
///
/// ```json
/// { "from_account": "acc-a", "to_account": "acc-b", "amount": 250, "memo": "rent" }
/// ```
///
/// # Responses
///
/// - **201 Created**: transfer record plus both resulting balances
/// - **404**: either account missing (nothing is applied)
/// - **409**: `InsufficientFunds`, or `CommitFailed` after retries
pub async fn transfer_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<MiddlewareContext>,
    payload: Result<Json<TransferRequest>, JsonRejection>,
) -> Dispatched {
    let result = transfer(&state, &ctx, payload).await;
    dispatch_with_status(&ctx, StatusCode::CREATED, result)
}

async fn transfer(
    state: &AppState,
    ctx: &MiddlewareContext,
    payload: Result<Json<TransferRequest>, JsonRejection>,
) -> Result<TransferReceipt, AppError> {
    authorize(ctx, LEDGER_WRITE_ROLE)?;
    let Json(payload) = payload?;
    payload.validate()?;
    state.ledger.transfer(payload.into()).await
}

/// Applies a list of transfers all-or-nothing.
///
/// # Endpoint
///
/// `POST /api/transfers/batch` (role `ledger:write`)
///
/// # Batch Processing
///
/// Unlike independent batch endpoints, a single failing leg rolls back every
/// leg; the error details carry the zero-based `leg` index.
pub async fn batch_transfer_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<MiddlewareContext>,
    payload: Result<Json<BatchTransferRequest>, JsonRejection>,
) -> Dispatched {
    let result = batch_transfer(&state, &ctx, payload).await;
    dispatch_with_status(&ctx, StatusCode::CREATED, result)
}

async fn batch_transfer(
    state: &AppState,
    ctx: &MiddlewareContext,
    payload: Result<Json<BatchTransferRequest>, JsonRejection>,
) -> Result<BatchTransferResponse, AppError> {
    authorize(ctx, LEDGER_WRITE_ROLE)?;
    let Json(payload) = payload?;
    payload.validate()?;

    let legs: Vec<NewTransfer> = payload.transfers.into_iter().map(Into::into).collect();
    let receipts = state.ledger.batch_transfer(legs).await?;

    Ok(BatchTransferResponse {
        count: receipts.len(),
        receipts,
    })
}
