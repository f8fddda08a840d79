//! Application layer services implementing business logic.
//!
//! This layer decides who may call, how often, and what a ledger operation
//! does. Services consume domain traits and provide a clean API for the
//! middleware stages and HTTP handlers.
//!
//! # Available Services
//!
//! - [`services::credential_verifier::CredentialVerifier`] - Bearer token verification
//! - [`services::credential_verifier::TokenIssuer`] - Token minting for the admin CLI and tests
//! - [`services::rate_limiter::RateLimiter`] - Fixed-window request admission
//! - [`services::ledger_service::LedgerService`] - Accounts and transfers over the unit of work

pub mod services;
