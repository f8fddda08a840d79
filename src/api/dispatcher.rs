//! Single exit point turning handler results into response envelopes.
//!
//! Every response body leaving `/api` is a [`ResponseEnvelope`]:
//!
//! ```json
//! { "status": "success", "data": { ... }, "metadata": { "trace_id": "...", "timestamp": "..." } }
//! { "status": "error", "error": { "code": "NotFound", "message": "..." }, "metadata": { ... } }
//! ```
//!
//! Internal failures are logged here with their full detail and surfaced to
//! the client as a generic `InternalError`.

use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use serde_with::skip_serializing_none;

use crate::api::middleware::context::MiddlewareContext;
use crate::error::{AppError, ErrorInfo};
use crate::utils::trace_id::generate_trace_id;

#[derive(Debug, Clone, Serialize)]
pub struct EnvelopeMetadata {
    pub trace_id: String,
    pub timestamp: DateTime<Utc>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
pub struct ResponseEnvelope {
    pub status: &'static str,
    pub data: Option<Value>,
    pub error: Option<ErrorInfo>,
    pub metadata: EnvelopeMetadata,
}

/// Status code, extra headers and envelope for one response.
#[derive(Debug)]
pub struct Dispatched {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub envelope: ResponseEnvelope,
}

impl IntoResponse for Dispatched {
    fn into_response(self) -> Response {
        (self.status, self.headers, Json(self.envelope)).into_response()
    }
}

/// Renders a handler result with status 200 on success.
pub fn dispatch<T: Serialize>(ctx: &MiddlewareContext, result: Result<T, AppError>) -> Dispatched {
    dispatch_with_status(ctx, StatusCode::OK, result)
}

/// Renders a handler result with `status` on success.
pub fn dispatch_with_status<T: Serialize>(
    ctx: &MiddlewareContext,
    status: StatusCode,
    result: Result<T, AppError>,
) -> Dispatched {
    let trace_id = ctx.trace_id();
    let timestamp = ctx.received_at();

    let value = match result {
        Ok(value) => value,
        Err(e) => return dispatch_error_at(trace_id, timestamp, e),
    };

    match serde_json::to_value(&value) {
        Ok(data) => Dispatched {
            status,
            headers: HeaderMap::new(),
            envelope: ResponseEnvelope {
                status: "success",
                data: Some(data),
                error: None,
                metadata: EnvelopeMetadata {
                    trace_id: trace_id.to_string(),
                    timestamp,
                },
            },
        },
        Err(e) => dispatch_error_at(
            trace_id,
            timestamp,
            AppError::internal(
                "Response serialization failed",
                serde_json::json!({ "reason": e.to_string() }),
            ),
        ),
    }
}

/// Renders an error outside any request context. A fresh trace id is
/// generated when none is given.
pub fn dispatch_error(trace_id: Option<&str>, error: AppError) -> Dispatched {
    let trace_id = trace_id.map_or_else(generate_trace_id, str::to_string);
    dispatch_error_at(&trace_id, Utc::now(), error)
}

/// Renders an error for a request that arrived at `timestamp`.
pub fn dispatch_error_at(trace_id: &str, timestamp: DateTime<Utc>, error: AppError) -> Dispatched {
    let status = error.status();

    if error.is_internal() {
        tracing::error!(
            trace_id = %trace_id,
            code = error.code(),
            error = %error,
            details = ?error,
            "Request failed"
        );
    } else {
        tracing::debug!(
            trace_id = %trace_id,
            code = error.code(),
            error = %error,
            "Request rejected"
        );
    }

    let mut headers = HeaderMap::new();
    if let Some(secs) = error.retry_after_secs() {
        headers.insert(header::RETRY_AFTER, HeaderValue::from(secs));
    }
    if status == StatusCode::UNAUTHORIZED {
        headers.insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    }

    Dispatched {
        status,
        headers,
        envelope: ResponseEnvelope {
            status: "error",
            data: None,
            error: Some(error.to_error_info()),
            metadata: EnvelopeMetadata {
                trace_id: trace_id.to_string(),
                timestamp,
            },
        },
    }
}
