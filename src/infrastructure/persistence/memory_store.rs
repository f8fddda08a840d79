//! In-process transactional store.
//!
//! Transactions stage their writes privately and record the version of every
//! account they read. Commit takes the table write lock, checks that none of
//! those versions moved, and applies the staged writes in one step. A version
//! mismatch fails the commit with [`RepositoryError::Conflict`], which the
//! unit of work treats as transient and replays.
//!
//! A bounded semaphore plays the role of the connection pool: each open
//! transaction holds one permit until it is committed, rolled back or dropped.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::domain::entities::{Account, Transfer};
use crate::domain::unit_of_work::TransactionManager;
use crate::error::RepositoryError;
use crate::utils::clock::Clock;

#[derive(Debug, Clone)]
pub(super) struct Versioned {
    pub(super) version: u64,
    pub(super) account: Account,
}

#[derive(Debug, Default)]
pub(super) struct Tables {
    pub(super) accounts: HashMap<String, Versioned>,
    pub(super) transfers: Vec<Transfer>,
}

/// Shared in-memory tables plus a bounded "connection" pool.
pub struct MemoryStore {
    pub(super) tables: RwLock<Tables>,
    pub(super) clock: Arc<dyn Clock>,
    next_transfer_id: AtomicI64,
    permits: Arc<Semaphore>,
    acquire_timeout: Duration,
    injected_conflicts: AtomicU32,
}

/// An open in-memory transaction.
///
/// Dropping it discards the staged writes and frees its pool permit.
#[derive(Debug)]
pub struct MemoryTx {
    /// Version observed per account id; `None` means the id was absent.
    pub(super) reads: HashMap<String, Option<u64>>,
    pub(super) writes: HashMap<String, Account>,
    pub(super) transfers: Vec<Transfer>,
    _permit: OwnedSemaphorePermit,
}

impl MemoryTx {
    /// Records the first version seen for `id`. Later reads keep the original.
    pub(super) fn observe(&mut self, id: &str, version: Option<u64>) {
        self.reads.entry(id.to_string()).or_insert(version);
    }
}

impl MemoryStore {
    pub fn new(max_connections: u32, acquire_timeout: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            clock,
            next_transfer_id: AtomicI64::new(1),
            permits: Arc::new(Semaphore::new(max_connections.max(1) as usize)),
            acquire_timeout,
            injected_conflicts: AtomicU32::new(0),
        }
    }

    /// Makes the next `count` commits fail with a serialization conflict.
    ///
    /// Lets callers exercise the retry path without real contention.
    pub fn inject_commit_conflicts(&self, count: u32) {
        self.injected_conflicts.store(count, Ordering::SeqCst);
    }

    /// Committed balance of `id`, read outside any transaction.
    pub fn committed_balance(&self, id: &str) -> Option<i64> {
        self.tables
            .read()
            .accounts
            .get(id)
            .map(|v| v.account.balance)
    }

    /// Number of committed accounts.
    pub fn committed_accounts(&self) -> usize {
        self.tables.read().accounts.len()
    }

    /// Number of committed transfers.
    pub fn committed_transfers(&self) -> usize {
        self.tables.read().transfers.len()
    }

    /// Connections not currently held by an open transaction.
    pub fn available_connections(&self) -> usize {
        self.permits.available_permits()
    }

    pub(super) fn next_transfer_id(&self) -> i64 {
        self.next_transfer_id.fetch_add(1, Ordering::Relaxed)
    }

    fn take_injected_conflict(&self) -> bool {
        self.injected_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl TransactionManager for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx, RepositoryError> {
        let permit = tokio::time::timeout(self.acquire_timeout, self.permits.clone().acquire_owned())
            .await
            .map_err(|_| RepositoryError::PoolExhausted)?
            .map_err(|e| RepositoryError::Backend(e.to_string()))?;

        Ok(MemoryTx {
            reads: HashMap::new(),
            writes: HashMap::new(),
            transfers: Vec::new(),
            _permit: permit,
        })
    }

    async fn commit(&self, tx: MemoryTx) -> Result<(), RepositoryError> {
        if self.take_injected_conflict() {
            return Err(RepositoryError::Conflict(
                "could not serialize access due to concurrent update".to_string(),
            ));
        }

        let mut tables = self.tables.write();

        for (id, seen) in &tx.reads {
            let current = tables.accounts.get(id).map(|v| v.version);
            if current != *seen {
                return Err(RepositoryError::Conflict(format!(
                    "account {id} changed since it was read"
                )));
            }
        }

        for (id, account) in tx.writes {
            let version = tables.accounts.get(&id).map_or(1, |v| v.version + 1);
            tables.accounts.insert(id, Versioned { version, account });
        }
        tables.transfers.extend(tx.transfers);

        Ok(())
    }

    async fn rollback(&self, tx: MemoryTx) -> Result<(), RepositoryError> {
        drop(tx);
        Ok(())
    }

    async fn health_check(&self) -> bool {
        !self.permits.is_closed()
    }
}
