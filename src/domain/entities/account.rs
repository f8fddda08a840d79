//! Ledger account entity.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// An account holding an integer balance in minor units.
///
/// Balances are never negative; both storage backends reject such writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    pub id: String,
    pub owner: String,
    pub balance: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn can_cover(&self, amount: i64) -> bool {
        self.balance >= amount
    }
}

/// Input data for opening an account.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub id: String,
    pub owner: String,
    pub initial_balance: i64,
}
