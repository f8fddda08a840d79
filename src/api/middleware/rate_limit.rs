//! Rate limiting stage using fixed-window counters.

use async_trait::async_trait;
use std::sync::Arc;

use super::chain::{Stage, StageOutcome};
use super::context::{InboundRequest, MiddlewareContext};
use crate::application::services::{Admission, EndpointClass, RateLimitKey, RateLimiter, Subject};
use crate::error::AppError;

/// Metadata key for the limit of the window that admitted the request.
pub const LIMIT_KEY: &str = "rate_limit_limit";
/// Metadata key for the slots left in that window.
pub const REMAINING_KEY: &str = "rate_limit_remaining";

/// Admits or denies requests through a shared [`RateLimiter`].
///
/// # Key Extraction
///
/// Requests are counted against the authenticated subject when the auth stage
/// ran first, otherwise against the client IP. The endpoint class comes from
/// the HTTP method, so reads and writes have separate budgets.
///
/// Requests over the limit are rejected with `429 Too Many Requests` and a
/// `Retry-After` header. Admitted and denied requests both record the window
/// limit and remaining slots for the `X-RateLimit-*` headers.
pub struct RateLimitStage {
    limiter: Arc<RateLimiter>,
}

impl RateLimitStage {
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self { limiter }
    }

    fn key_for(ctx: &MiddlewareContext, request: &InboundRequest) -> RateLimitKey {
        let subject = match (ctx.identity(), ctx.client_ip()) {
            (Some(identity), _) => Subject::Identity(identity.subject().to_string()),
            (None, Some(ip)) => Subject::Ip(ip),
            (None, None) => Subject::Anonymous,
        };
        RateLimitKey::new(subject, EndpointClass::from_method(&request.method))
    }
}

#[async_trait]
impl Stage for RateLimitStage {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    async fn process(&self, mut ctx: MiddlewareContext, request: &InboundRequest) -> StageOutcome {
        let key = Self::key_for(&ctx, request);

        let limit = self.limiter.limits().for_class(key.class).limit;
        ctx.insert_metadata(LIMIT_KEY, limit.to_string());

        match self.limiter.admit(&key) {
            Admission::Allowed { remaining } => {
                ctx.insert_metadata(REMAINING_KEY, remaining.to_string());
                StageOutcome::Continue(ctx)
            }
            Admission::Denied { retry_after } => {
                tracing::info!(
                    trace_id = %ctx.trace_id(),
                    subject = %key.subject,
                    class = key.class.as_str(),
                    "Request rate limited"
                );
                ctx.insert_metadata(REMAINING_KEY, "0");
                StageOutcome::reject_with(ctx, AppError::RateLimited { retry_after })
            }
        }
    }
}
