//! Business logic services for the application layer.

pub mod credential_verifier;
pub mod ledger_service;
pub mod rate_limiter;

pub use credential_verifier::{CredentialVerifier, TokenIssuer};
pub use ledger_service::{LedgerOperations, LedgerService, OpenAccount};
pub use rate_limiter::{
    Admission, EndpointClass, RateLimitKey, RateLimiter, RateLimits, Subject, WindowCounter,
    WindowLimit,
};
