//! Shared application state injected into the chain adapter and handlers.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::api::middleware::auth::AuthStage;
use crate::api::middleware::cors::CorsStage;
use crate::api::middleware::rate_limit::RateLimitStage;
use crate::api::middleware::request_log::RequestLogStage;
use crate::api::middleware::{MiddlewareChain, Stage};
use crate::application::services::{CredentialVerifier, LedgerOperations, RateLimiter};
use crate::utils::clock::Clock;

#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<dyn LedgerOperations>,
    pub chain: MiddlewareChain,
    pub rate_limiter: Arc<RateLimiter>,
    pub clock: Arc<dyn Clock>,
    /// Process start, reported as uptime by `/health`.
    pub started_at: DateTime<Utc>,
    /// When true, client IPs are read from `X-Forwarded-For` / `X-Real-IP`.
    pub behind_proxy: bool,
}

impl AppState {
    pub fn new(
        ledger: Arc<dyn LedgerOperations>,
        chain: MiddlewareChain,
        rate_limiter: Arc<RateLimiter>,
        clock: Arc<dyn Clock>,
        behind_proxy: bool,
    ) -> Self {
        let started_at = clock.now();
        Self {
            ledger,
            chain,
            rate_limiter,
            clock,
            started_at,
            behind_proxy,
        }
    }
}

/// Builds the production chain: CORS, authentication, rate limiting, request log.
///
/// Authentication runs before rate limiting so that counters are keyed by
/// subject and never created for unauthenticated callers.
pub fn standard_chain(
    cors: CorsStage,
    verifier: Arc<CredentialVerifier>,
    limiter: Arc<RateLimiter>,
) -> MiddlewareChain {
    let stages: Vec<Arc<dyn Stage>> = vec![
        Arc::new(cors),
        Arc::new(AuthStage::new(verifier)),
        Arc::new(RateLimitStage::new(limiter)),
        Arc::new(RequestLogStage),
    ];
    MiddlewareChain::new(stages)
}
