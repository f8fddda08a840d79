//! Transfer entity recording a completed movement between two accounts.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A committed transfer. Only ever created inside the same unit of work as
/// the balance changes it describes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transfer {
    pub id: i64,
    pub from_account: String,
    pub to_account: String,
    pub amount: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input data for recording a transfer.
#[derive(Debug, Clone)]
pub struct NewTransfer {
    pub from_account: String,
    pub to_account: String,
    pub amount: i64,
    pub memo: Option<String>,
}

/// Result of a successful transfer: the record plus both resulting balances.
#[derive(Debug, Clone, Serialize)]
pub struct TransferReceipt {
    pub transfer: Transfer,
    pub from_balance: i64,
    pub to_balance: i64,
}
