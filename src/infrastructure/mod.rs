//! Infrastructure layer for external integrations.
//!
//! This layer implements interfaces defined by the domain layer, providing
//! concrete storage backends for the unit of work and the ledger repositories.
//!
//! # Modules
//!
//! - [`persistence`] - PostgreSQL and in-memory backends

pub mod persistence;
