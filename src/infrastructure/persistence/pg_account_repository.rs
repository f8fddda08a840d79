//! PostgreSQL implementation of account repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Postgres, Transaction};

use crate::domain::entities::{Account, NewAccount};
use crate::domain::repositories::AccountRepository;
use crate::error::RepositoryError;

#[derive(sqlx::FromRow)]
struct AccountRow {
    id: String,
    owner: String,
    balance: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Account {
            id: row.id,
            owner: row.owner,
            balance: row.balance,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// PostgreSQL repository for ledger accounts.
///
/// The `accounts_balance_check` constraint keeps balances non-negative; a
/// violating update surfaces as [`RepositoryError::Constraint`].
#[derive(Debug, Default, Clone, Copy)]
pub struct PgAccountRepository;

impl PgAccountRepository {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AccountRepository<Transaction<'static, Postgres>> for PgAccountRepository {
    async fn find(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        id: &str,
    ) -> Result<Option<Account>, RepositoryError> {
        let row = sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT id, owner, balance, created_at, updated_at
            FROM accounts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(row.map(Account::from))
    }

    async fn create(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        new_account: &NewAccount,
    ) -> Result<Account, RepositoryError> {
        let row = sqlx::query_as::<_, AccountRow>(
            r#"
            INSERT INTO accounts (id, owner, balance)
            VALUES ($1, $2, $3)
            RETURNING id, owner, balance, created_at, updated_at
            "#,
        )
        .bind(&new_account.id)
        .bind(&new_account.owner)
        .bind(new_account.initial_balance)
        .fetch_one(&mut **tx)
        .await?;

        Ok(row.into())
    }

    async fn adjust_balance(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        id: &str,
        delta: i64,
    ) -> Result<Account, RepositoryError> {
        let row = sqlx::query_as::<_, AccountRow>(
            r#"
            UPDATE accounts
            SET balance = balance + $2,
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, owner, balance, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(delta)
        .fetch_optional(&mut **tx)
        .await?;

        row.map(Account::from)
            .ok_or_else(|| RepositoryError::not_found("account", id))
    }
}
