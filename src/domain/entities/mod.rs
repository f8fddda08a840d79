//! Core domain entities representing the business data model.
//!
//! # Entity Types
//!
//! - [`Identity`] - A verified caller, produced from a bearer token
//! - [`Account`] - A ledger account with a non-negative balance
//! - [`Transfer`] - A committed movement between two accounts
//!
//! Creation inputs live next to their entity (`NewAccount`, `NewTransfer`).

pub mod account;
pub mod identity;
pub mod transfer;

pub use account::{Account, NewAccount};
pub use identity::{ADMIN_ROLE, Identity, LEDGER_READ_ROLE, LEDGER_WRITE_ROLE};
pub use transfer::{NewTransfer, Transfer, TransferReceipt};
