//! Repository trait for ledger accounts.

use async_trait::async_trait;

use crate::domain::entities::{Account, NewAccount};
use crate::error::RepositoryError;

/// Account storage, operating inside a caller-supplied transaction `Tx`.
///
/// Every method takes the transaction explicitly, so a sequence of calls
/// made with the same handle commits or rolls back together.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::PgAccountRepository`] - PostgreSQL implementation
/// - [`crate::infrastructure::persistence::MemoryAccountRepository`] - In-memory implementation
///
/// # Examples
///
/// See integration tests: `tests/repository_ledger.rs`
#[async_trait]
pub trait AccountRepository<Tx: Send>: Send + Sync {
    /// Finds an account by id.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Backend`] on database errors.
    async fn find(&self, tx: &mut Tx, id: &str) -> Result<Option<Account>, RepositoryError>;

    /// Creates an account.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Constraint`] if the id is taken or the
    /// initial balance is negative.
    async fn create(&self, tx: &mut Tx, new_account: &NewAccount)
    -> Result<Account, RepositoryError>;

    /// Adds `delta` (which may be negative) to the balance and returns the
    /// updated account.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::NotFound`] if the account does not exist.
    /// Returns [`RepositoryError::Constraint`] if the balance would go negative.
    async fn adjust_balance(
        &self,
        tx: &mut Tx,
        id: &str,
        delta: i64,
    ) -> Result<Account, RepositoryError>;
}
