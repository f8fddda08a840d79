//! In-memory implementation of account repository.

use async_trait::async_trait;
use std::sync::Arc;

use super::memory_store::{MemoryStore, MemoryTx};
use crate::domain::entities::{Account, NewAccount};
use crate::domain::repositories::AccountRepository;
use crate::error::RepositoryError;

/// Mirrors the PostgreSQL `accounts_pkey` and `accounts_balance_check` constraints.
const PK_CONSTRAINT: &str = "accounts_pkey";
const BALANCE_CONSTRAINT: &str = "accounts_balance_check";

pub struct MemoryAccountRepository {
    store: Arc<MemoryStore>,
}

impl MemoryAccountRepository {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }

    /// Reads through the transaction's staged writes, then committed state.
    fn load(&self, tx: &mut MemoryTx, id: &str) -> Option<Account> {
        if let Some(staged) = tx.writes.get(id) {
            return Some(staged.clone());
        }

        let tables = self.store.tables.read();
        let committed = tables.accounts.get(id);
        tx.observe(id, committed.map(|v| v.version));
        committed.map(|v| v.account.clone())
    }
}

#[async_trait]
impl AccountRepository<MemoryTx> for MemoryAccountRepository {
    async fn find(&self, tx: &mut MemoryTx, id: &str) -> Result<Option<Account>, RepositoryError> {
        Ok(self.load(tx, id))
    }

    async fn create(
        &self,
        tx: &mut MemoryTx,
        new_account: &NewAccount,
    ) -> Result<Account, RepositoryError> {
        if self.load(tx, &new_account.id).is_some() {
            return Err(RepositoryError::Constraint(PK_CONSTRAINT.to_string()));
        }
        if new_account.initial_balance < 0 {
            return Err(RepositoryError::Constraint(BALANCE_CONSTRAINT.to_string()));
        }

        let now = self.store.clock.now();
        let account = Account {
            id: new_account.id.clone(),
            owner: new_account.owner.clone(),
            balance: new_account.initial_balance,
            created_at: now,
            updated_at: now,
        };
        tx.writes.insert(account.id.clone(), account.clone());

        Ok(account)
    }

    async fn adjust_balance(
        &self,
        tx: &mut MemoryTx,
        id: &str,
        delta: i64,
    ) -> Result<Account, RepositoryError> {
        let mut account = self
            .load(tx, id)
            .ok_or_else(|| RepositoryError::not_found("account", id))?;

        let balance = account
            .balance
            .checked_add(delta)
            .filter(|b| *b >= 0)
            .ok_or_else(|| RepositoryError::Constraint(BALANCE_CONSTRAINT.to_string()))?;

        account.balance = balance;
        account.updated_at = self.store.clock.now();
        tx.writes.insert(account.id.clone(), account.clone());

        Ok(account)
    }
}
