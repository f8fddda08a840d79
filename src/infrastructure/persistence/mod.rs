//! Storage backends for the ledger.
//!
//! Each backend supplies a [`crate::domain::unit_of_work::TransactionManager`]
//! plus repository implementations typed by that manager's transaction.
//!
//! # Backends
//!
//! - PostgreSQL via SQLx: [`PgTransactionManager`], [`PgAccountRepository`],
//!   [`PgTransferRepository`]
//! - In-process: [`MemoryStore`], [`MemoryAccountRepository`],
//!   [`MemoryTransferRepository`]

pub mod memory_account_repository;
pub mod memory_store;
pub mod memory_transfer_repository;
pub mod pg_account_repository;
pub mod pg_transaction_manager;
pub mod pg_transfer_repository;

pub use memory_account_repository::MemoryAccountRepository;
pub use memory_store::{MemoryStore, MemoryTx};
pub use memory_transfer_repository::MemoryTransferRepository;
pub use pg_account_repository::PgAccountRepository;
pub use pg_transaction_manager::{IsolationLevel, PgTransactionManager};
pub use pg_transfer_repository::PgTransferRepository;
