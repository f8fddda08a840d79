//! Repository trait for transfer records.

use async_trait::async_trait;

use crate::domain::entities::{NewTransfer, Transfer};
use crate::error::RepositoryError;

/// Transfer history, written in the same transaction as the balance changes.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::PgTransferRepository`] - PostgreSQL implementation
/// - [`crate::infrastructure::persistence::MemoryTransferRepository`] - In-memory implementation
#[async_trait]
pub trait TransferRepository<Tx: Send>: Send + Sync {
    /// Records a transfer.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Constraint`] if either account is missing.
    async fn record(&self, tx: &mut Tx, transfer: &NewTransfer)
    -> Result<Transfer, RepositoryError>;

    /// Lists transfers touching `account_id`, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Backend`] on database errors.
    async fn list_for_account(
        &self,
        tx: &mut Tx,
        account_id: &str,
        limit: i64,
    ) -> Result<Vec<Transfer>, RepositoryError>;
}
