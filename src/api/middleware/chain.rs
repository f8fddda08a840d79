//! Ordered request-gating stages.
//!
//! A [`MiddlewareChain`] is assembled once at startup. For every request it
//! runs its stages strictly in order; the first stage that short-circuits ends
//! the run, and neither later stages nor the handler see the request.

use async_trait::async_trait;
use axum::http::{HeaderMap, StatusCode};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::context::{InboundRequest, MiddlewareContext};
use crate::error::AppError;

/// How a stage ends the request early.
#[derive(Debug)]
pub enum ShortCircuit {
    /// Render as an error envelope.
    Reject(AppError),
    /// Answer directly with an empty body, e.g. a CORS preflight.
    Respond { status: StatusCode, headers: HeaderMap },
}

/// Result of one stage.
#[derive(Debug)]
pub enum StageOutcome {
    Continue(MiddlewareContext),
    ShortCircuit(ShortCircuit),
    /// Short-circuit that keeps the metadata this stage recorded on `ctx`.
    Halt {
        ctx: MiddlewareContext,
        outcome: ShortCircuit,
    },
}

impl StageOutcome {
    pub fn reject(error: impl Into<AppError>) -> Self {
        StageOutcome::ShortCircuit(ShortCircuit::Reject(error.into()))
    }

    pub fn reject_with(ctx: MiddlewareContext, error: impl Into<AppError>) -> Self {
        StageOutcome::Halt {
            ctx,
            outcome: ShortCircuit::Reject(error.into()),
        }
    }
}

/// One request-gating step.
///
/// Stages receive the request by shared reference and the context by value;
/// they hand the context back on [`StageOutcome::Continue`].
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    async fn process(&self, ctx: MiddlewareContext, request: &InboundRequest) -> StageOutcome;
}

/// Result of running the whole chain.
#[derive(Debug)]
pub enum ChainResult {
    /// Every stage continued; the handler may run.
    Completed(MiddlewareContext),
    /// Stage `stage` ended the request. `metadata` is what earlier stages had
    /// recorded when it did, plus its own entries when it halted with a context.
    Halted {
        stage: &'static str,
        trace_id: String,
        metadata: BTreeMap<&'static str, String>,
        outcome: ShortCircuit,
    },
}

/// Immutable, ordered list of stages.
#[derive(Clone)]
pub struct MiddlewareChain {
    stages: Arc<[Arc<dyn Stage>]>,
}

impl MiddlewareChain {
    pub fn new(stages: Vec<Arc<dyn Stage>>) -> Self {
        Self {
            stages: stages.into(),
        }
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub async fn run(&self, mut ctx: MiddlewareContext, request: &InboundRequest) -> ChainResult {
        for stage in self.stages.iter() {
            let trace_id = ctx.trace_id().to_string();
            let metadata = ctx.metadata_snapshot();

            let (metadata, outcome) = match stage.process(ctx, request).await {
                StageOutcome::Continue(next) => {
                    ctx = next;
                    continue;
                }
                StageOutcome::ShortCircuit(outcome) => (metadata, outcome),
                StageOutcome::Halt { ctx, outcome } => (ctx.metadata_snapshot(), outcome),
            };

            tracing::debug!(
                trace_id = %trace_id,
                stage = stage.name(),
                "Request short-circuited"
            );
            return ChainResult::Halted {
                stage: stage.name(),
                trace_id,
                metadata,
                outcome,
            };
        }

        ChainResult::Completed(ctx)
    }
}

impl std::fmt::Debug for MiddlewareChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiddlewareChain")
            .field("stages", &self.stage_names())
            .finish()
    }
}
