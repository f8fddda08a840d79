//! Repository trait definitions for the domain layer.
//!
//! Traits are generic over the backend transaction type, so the same
//! business logic runs against PostgreSQL and the in-memory store. Concrete
//! implementations live in `crate::infrastructure::persistence`.
//!
//! # Available Repositories
//!
//! - [`AccountRepository`] - Account lookup, creation and balance changes
//! - [`TransferRepository`] - Transfer history
//!
//! # Testing
//!
//! See integration tests in `tests/repository_ledger.rs` for usage examples.

pub mod account_repository;
pub mod transfer_repository;

pub use account_repository::AccountRepository;
pub use transfer_repository::TransferRepository;
