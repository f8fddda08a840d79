//! In-memory implementation of transfer repository.

use async_trait::async_trait;
use std::sync::Arc;

use super::memory_store::{MemoryStore, MemoryTx};
use crate::domain::entities::{NewTransfer, Transfer};
use crate::domain::repositories::TransferRepository;
use crate::error::RepositoryError;

pub struct MemoryTransferRepository {
    store: Arc<MemoryStore>,
}

impl MemoryTransferRepository {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl TransferRepository<MemoryTx> for MemoryTransferRepository {
    async fn record(
        &self,
        tx: &mut MemoryTx,
        transfer: &NewTransfer,
    ) -> Result<Transfer, RepositoryError> {
        let recorded = Transfer {
            id: self.store.next_transfer_id(),
            from_account: transfer.from_account.clone(),
            to_account: transfer.to_account.clone(),
            amount: transfer.amount,
            memo: transfer.memo.clone(),
            created_at: self.store.clock.now(),
        };
        tx.transfers.push(recorded.clone());

        Ok(recorded)
    }

    async fn list_for_account(
        &self,
        tx: &mut MemoryTx,
        account_id: &str,
        limit: i64,
    ) -> Result<Vec<Transfer>, RepositoryError> {
        let involves = |t: &&Transfer| t.from_account == account_id || t.to_account == account_id;

        let mut found: Vec<Transfer> = {
            let tables = self.store.tables.read();
            tables
                .transfers
                .iter()
                .chain(tx.transfers.iter())
                .filter(involves)
                .cloned()
                .collect()
        };

        found.sort_by(|a, b| b.id.cmp(&a.id));
        found.truncate(limit.max(0) as usize);

        Ok(found)
    }
}
