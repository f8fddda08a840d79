//! DTOs for account endpoints.

use serde::Deserialize;
use validator::Validate;

use super::ACCOUNT_ID_REGEX;
use crate::application::services::OpenAccount;

/// Request to open an account.
///
/// ```json
/// { "id": "acc-alice", "owner": "Alice", "initial_balance": 1000 }
/// ```
#[derive(Debug, Deserialize, Validate)]
pub struct OpenAccountRequest {
    /// Optional explicit id; generated when omitted.
    #[validate(length(min = 3, max = 64))]
    #[validate(regex(path = "*ACCOUNT_ID_REGEX", message = "Invalid account id"))]
    pub id: Option<String>,

    #[validate(length(min = 1, max = 128))]
    pub owner: String,

    /// Opening balance in minor units.
    #[validate(range(min = 0))]
    #[serde(default)]
    pub initial_balance: i64,
}

impl From<OpenAccountRequest> for OpenAccount {
    fn from(request: OpenAccountRequest) -> Self {
        OpenAccount {
            id: request.id,
            owner: request.owner,
            initial_balance: request.initial_balance,
        }
    }
}
