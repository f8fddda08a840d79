//! PostgreSQL implementation of transfer repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Postgres, Transaction};

use crate::domain::entities::{NewTransfer, Transfer};
use crate::domain::repositories::TransferRepository;
use crate::error::RepositoryError;

#[derive(sqlx::FromRow)]
struct TransferRow {
    id: i64,
    from_account: String,
    to_account: String,
    amount: i64,
    memo: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<TransferRow> for Transfer {
    fn from(row: TransferRow) -> Self {
        Transfer {
            id: row.id,
            from_account: row.from_account,
            to_account: row.to_account,
            amount: row.amount,
            memo: row.memo,
            created_at: row.created_at,
        }
    }
}

/// PostgreSQL repository for the transfer journal.
#[derive(Debug, Default, Clone, Copy)]
pub struct PgTransferRepository;

impl PgTransferRepository {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TransferRepository<Transaction<'static, Postgres>> for PgTransferRepository {
    async fn record(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        transfer: &NewTransfer,
    ) -> Result<Transfer, RepositoryError> {
        let row = sqlx::query_as::<_, TransferRow>(
            r#"
            INSERT INTO transfers (from_account, to_account, amount, memo)
            VALUES ($1, $2, $3, $4)
            RETURNING id, from_account, to_account, amount, memo, created_at
            "#,
        )
        .bind(&transfer.from_account)
        .bind(&transfer.to_account)
        .bind(transfer.amount)
        .bind(transfer.memo.as_deref())
        .fetch_one(&mut **tx)
        .await?;

        Ok(row.into())
    }

    async fn list_for_account(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        account_id: &str,
        limit: i64,
    ) -> Result<Vec<Transfer>, RepositoryError> {
        let rows = sqlx::query_as::<_, TransferRow>(
            r#"
            SELECT id, from_account, to_account, amount, memo, created_at
            FROM transfers
            WHERE from_account = $1 OR to_account = $1
            ORDER BY id DESC
            LIMIT $2
            "#,
        )
        .bind(account_id)
        .bind(limit)
        .fetch_all(&mut **tx)
        .await?;

        Ok(rows.into_iter().map(Transfer::from).collect())
    }
}
