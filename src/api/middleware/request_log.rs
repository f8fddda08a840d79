//! Structured log line for every admitted request.

use async_trait::async_trait;

use super::chain::{Stage, StageOutcome};
use super::context::{InboundRequest, MiddlewareContext};
use crate::application::services::EndpointClass;

/// Emits one `info` event per request that made it past the gating stages.
///
/// # Example Logs
///
/// ```text
/// INFO Request admitted trace_id=3f1c... method=POST path=/api/transfers subject=alice class=write
/// ```
pub struct RequestLogStage;

#[async_trait]
impl Stage for RequestLogStage {
    fn name(&self) -> &'static str {
        "request_log"
    }

    async fn process(&self, ctx: MiddlewareContext, request: &InboundRequest) -> StageOutcome {
        let class = EndpointClass::from_method(&request.method);

        tracing::info!(
            trace_id = %ctx.trace_id(),
            method = %request.method,
            path = %request.path,
            subject = ctx.identity().map(|i| i.subject()).unwrap_or("-"),
            client_ip = ?ctx.client_ip(),
            class = class.as_str(),
            "Request admitted"
        );

        StageOutcome::Continue(ctx)
    }
}
