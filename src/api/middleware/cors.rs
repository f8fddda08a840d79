//! Cross-origin policy stage.

use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, header};
use std::collections::BTreeSet;
use std::time::Duration;

use super::chain::{ShortCircuit, Stage, StageOutcome};
use super::context::{InboundRequest, MiddlewareContext};
use crate::error::AppError;

/// Metadata key holding the allowed origin of a cross-origin request.
pub const ORIGIN_KEY: &str = "cors_origin";

const ALLOWED_METHODS: &str = "GET, POST, OPTIONS";
const ALLOWED_HEADERS: &str = "authorization, content-type, x-request-id";
/// Response headers browsers may read on cross-origin responses.
pub const EXPOSED_HEADERS: &str =
    "x-request-id, retry-after, x-ratelimit-limit, x-ratelimit-remaining";

/// Normalizes an origin to `scheme://host[:port]`. Only http(s) qualifies.
pub fn normalize_origin(raw: &str) -> Option<String> {
    let url = url::Url::parse(raw.trim()).ok()?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return None;
    }
    Some(url.origin().ascii_serialization())
}

/// Checks the `Origin` header against an allow-list and answers preflights.
///
/// | Request | Outcome |
/// |---|---|
/// | no `Origin` | continue |
/// | origin not allowed | `CorsRejected` (403) |
/// | allowed, `OPTIONS` + `Access-Control-Request-Method` | 204 with allow headers |
/// | allowed, anything else | continue, origin recorded in context |
pub struct CorsStage {
    allowed: BTreeSet<String>,
    max_age: Duration,
}

impl CorsStage {
    pub fn new(origins: impl IntoIterator<Item = String>, max_age: Duration) -> Self {
        let allowed = origins
            .into_iter()
            .filter_map(|raw| {
                let normalized = normalize_origin(&raw);
                if normalized.is_none() {
                    tracing::warn!(origin = %raw, "Ignoring unparsable CORS origin");
                }
                normalized
            })
            .collect();

        Self { allowed, max_age }
    }

    pub fn allows(&self, origin: &str) -> bool {
        normalize_origin(origin).is_some_and(|o| self.allowed.contains(&o))
    }

    fn preflight_headers(&self, origin: &str, request: &InboundRequest) -> HeaderMap {
        let mut headers = HeaderMap::new();

        if let Ok(value) = HeaderValue::from_str(origin) {
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
        }
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOWED_METHODS),
        );

        let requested = request
            .header(header::ACCESS_CONTROL_REQUEST_HEADERS.as_str())
            .and_then(|v| HeaderValue::from_str(v).ok())
            .unwrap_or_else(|| HeaderValue::from_static(ALLOWED_HEADERS));
        headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, requested);

        headers.insert(
            header::ACCESS_CONTROL_MAX_AGE,
            HeaderValue::from(self.max_age.as_secs()),
        );
        headers.insert(header::VARY, HeaderValue::from_static("Origin"));

        headers
    }
}

#[async_trait]
impl Stage for CorsStage {
    fn name(&self) -> &'static str {
        "cors"
    }

    async fn process(&self, mut ctx: MiddlewareContext, request: &InboundRequest) -> StageOutcome {
        let Some(raw_origin) = request.header(header::ORIGIN.as_str()) else {
            return StageOutcome::Continue(ctx);
        };

        let Some(origin) = normalize_origin(raw_origin).filter(|o| self.allowed.contains(o))
        else {
            tracing::info!(
                trace_id = %ctx.trace_id(),
                origin = %raw_origin,
                "Cross-origin request rejected"
            );
            return StageOutcome::reject(AppError::CorsRejected {
                origin: raw_origin.to_string(),
            });
        };

        let is_preflight = request.method == Method::OPTIONS
            && request
                .headers
                .contains_key(header::ACCESS_CONTROL_REQUEST_METHOD);

        if is_preflight {
            return StageOutcome::ShortCircuit(ShortCircuit::Respond {
                status: StatusCode::NO_CONTENT,
                headers: self.preflight_headers(&origin, request),
            });
        }

        ctx.insert_metadata(ORIGIN_KEY, origin);
        StageOutcome::Continue(ctx)
    }
}
