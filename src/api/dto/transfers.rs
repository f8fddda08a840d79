//! DTOs for transfer endpoints.

use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use validator::Validate;

use super::ACCOUNT_ID_REGEX;
use crate::domain::entities::{NewTransfer, Transfer, TransferReceipt};

/// Transfers returned when `limit` is omitted.
pub const DEFAULT_LIST_LIMIT: i64 = 20;

/// Request to move funds between two accounts.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TransferRequest {
    #[validate(length(min = 1, max = 64))]
    #[validate(regex(path = "*ACCOUNT_ID_REGEX", message = "Invalid account id"))]
    pub from_account: String,

    #[validate(length(min = 1, max = 64))]
    #[validate(regex(path = "*ACCOUNT_ID_REGEX", message = "Invalid account id"))]
    pub to_account: String,

    /// Amount in minor units.
    #[validate(range(min = 1))]
    pub amount: i64,

    #[validate(length(max = 256))]
    pub memo: Option<String>,
}

impl From<TransferRequest> for NewTransfer {
    fn from(request: TransferRequest) -> Self {
        NewTransfer {
            from_account: request.from_account,
            to_account: request.to_account,
            amount: request.amount,
            memo: request.memo,
        }
    }
}

/// Several transfers applied all-or-nothing.
///
/// ```json
/// { "transfers": [ { "from_account": "a", "to_account": "b", "amount": 5 } ] }
/// ```
#[derive(Debug, Deserialize, Validate)]
pub struct BatchTransferRequest {
    #[validate(length(min = 1, max = 100))]
    #[validate(nested)]
    pub transfers: Vec<TransferRequest>,
}

#[derive(Debug, Serialize)]
pub struct BatchTransferResponse {
    pub count: usize,
    pub receipts: Vec<TransferReceipt>,
}

/// Query parameters for transfer listings.
#[serde_as]
#[derive(Debug, Default, Deserialize)]
pub struct TransferListParams {
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub limit: Option<i64>,
}

impl TransferListParams {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIST_LIMIT)
    }
}

#[derive(Debug, Serialize)]
pub struct TransferListResponse {
    pub account_id: String,
    pub transfers: Vec<Transfer>,
}
