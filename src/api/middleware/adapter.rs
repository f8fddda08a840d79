//! Runs the [`MiddlewareChain`] as an axum middleware.

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::collections::BTreeMap;
use std::net::SocketAddr;

use super::chain::{ChainResult, ShortCircuit};
use super::context::{InboundRequest, MiddlewareContext};
use super::{cors, rate_limit};
use crate::api::dispatcher::dispatch_error_at;
use crate::state::AppState;
use crate::utils::client_ip::resolve_client_ip;
use crate::utils::trace_id::{accept_inbound, generate_trace_id};

pub static REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");
static RATE_LIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
static RATE_LIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

/// Gates every request through the chain before the handler runs.
///
/// # Flow
///
/// 1. Resolve the client IP (peer address, or proxy headers when `BEHIND_PROXY`)
/// 2. Adopt a well-formed inbound `X-Request-Id` as trace id, or generate one
/// 3. Run the chain; a short-circuit is answered here and the handler never runs
/// 4. Otherwise insert the [`MiddlewareContext`] into request extensions and
///    call the handler
/// 5. Echo `X-Request-Id`, CORS and rate-limit headers on the response
///
/// # Integration
///
/// ```rust,ignore
/// let api = api::routes::api_routes()
///     .layer(middleware::from_fn_with_state(state.clone(), chain_layer));
/// ```
pub async fn chain_layer(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client_ip = resolve_client_ip(request.headers(), peer, state.behind_proxy);

    let trace_id = request
        .headers()
        .get(&REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .and_then(accept_inbound)
        .unwrap_or_else(generate_trace_id);

    let inbound = InboundRequest {
        method: request.method().clone(),
        path: request.uri().path().to_string(),
        headers: request.headers().clone(),
        client_ip,
    };
    let received_at = state.clock.now();
    let ctx = MiddlewareContext::new(trace_id, received_at, client_ip);

    let (mut response, trace_id, metadata) = match state.chain.run(ctx, &inbound).await {
        ChainResult::Completed(ctx) => {
            let trace_id = ctx.trace_id().to_string();
            let metadata = ctx.metadata_snapshot();

            let mut request = request;
            request.extensions_mut().insert(ctx);
            (next.run(request).await, trace_id, metadata)
        }
        ChainResult::Halted {
            trace_id,
            metadata,
            outcome,
            ..
        } => {
            let response = match outcome {
                ShortCircuit::Reject(error) => {
                    dispatch_error_at(&trace_id, received_at, error).into_response()
                }
                ShortCircuit::Respond { status, headers } => (status, headers).into_response(),
            };
            (response, trace_id, metadata)
        }
    };

    decorate(response.headers_mut(), &trace_id, &metadata);
    response
}

fn decorate(headers: &mut HeaderMap, trace_id: &str, metadata: &BTreeMap<&'static str, String>) {
    if let Ok(value) = HeaderValue::from_str(trace_id) {
        headers.insert(REQUEST_ID.clone(), value);
    }

    if let Some(origin) = metadata
        .get(cors::ORIGIN_KEY)
        .and_then(|o| HeaderValue::from_str(o).ok())
    {
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
        headers.append(header::VARY, HeaderValue::from_static("Origin"));
        headers.insert(
            header::ACCESS_CONTROL_EXPOSE_HEADERS,
            HeaderValue::from_static(cors::EXPOSED_HEADERS),
        );
    }

    for (key, name) in [
        (rate_limit::LIMIT_KEY, &RATE_LIMIT_LIMIT),
        (rate_limit::REMAINING_KEY, &RATE_LIMIT_REMAINING),
    ] {
        if let Some(value) = metadata.get(key).and_then(|v| HeaderValue::from_str(v).ok()) {
            headers.insert(name.clone(), value);
        }
    }
}
