//! PostgreSQL transaction manager.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::domain::unit_of_work::TransactionManager;
use crate::error::RepositoryError;

/// Isolation level applied at the start of every transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationLevel {
    #[default]
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    fn set_statement(&self) -> &'static str {
        match self {
            IsolationLevel::ReadCommitted => "SET TRANSACTION ISOLATION LEVEL READ COMMITTED",
            IsolationLevel::RepeatableRead => "SET TRANSACTION ISOLATION LEVEL REPEATABLE READ",
            IsolationLevel::Serializable => "SET TRANSACTION ISOLATION LEVEL SERIALIZABLE",
        }
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IsolationLevel::ReadCommitted => "read_committed",
            IsolationLevel::RepeatableRead => "repeatable_read",
            IsolationLevel::Serializable => "serializable",
        })
    }
}

impl FromStr for IsolationLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace([' ', '-'], "_").as_str() {
            "read_committed" => Ok(IsolationLevel::ReadCommitted),
            "repeatable_read" => Ok(IsolationLevel::RepeatableRead),
            "serializable" => Ok(IsolationLevel::Serializable),
            other => Err(format!(
                "unknown isolation level '{other}', expected read_committed, repeatable_read or serializable"
            )),
        }
    }
}

/// Opens SQLx transactions on a shared pool.
///
/// Dropping a [`Transaction`] without committing issues a rollback and
/// returns the connection to the pool.
pub struct PgTransactionManager {
    pool: Arc<PgPool>,
    isolation: IsolationLevel,
}

impl PgTransactionManager {
    pub fn new(pool: Arc<PgPool>, isolation: IsolationLevel) -> Self {
        Self { pool, isolation }
    }

    pub fn pool(&self) -> &Arc<PgPool> {
        &self.pool
    }
}

#[async_trait]
impl TransactionManager for PgTransactionManager {
    type Tx = Transaction<'static, Postgres>;

    async fn begin(&self) -> Result<Self::Tx, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(self.isolation.set_statement())
            .execute(&mut *tx)
            .await?;

        Ok(tx)
    }

    async fn commit(&self, tx: Self::Tx) -> Result<(), RepositoryError> {
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(&self, tx: Self::Tx) -> Result<(), RepositoryError> {
        tx.rollback().await?;
        Ok(())
    }

    async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1")
            .execute(self.pool.as_ref())
            .await
            .is_ok()
    }
}
