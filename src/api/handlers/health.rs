//! Handler for health check endpoint.

use axum::{Json, extract::State, http::StatusCode};

use crate::api::dto::health::{
    CheckStatus, ComponentStatus, HealthChecks, HealthResponse, HealthStatus,
};
use crate::state::AppState;

/// Returns service health status with component checks.
///
/// # Endpoint
///
/// `GET /health` (outside the middleware chain, no token required)
///
/// # Response Codes
///
/// - **200 OK**: All components healthy
/// - **503 Service Unavailable**: Storage backend not answering
///
/// # Response
///
/// ```json
/// {
///   "status": "healthy",
///   "timestamp": "2024-05-01T09:00:00Z",
///   "uptime": 3600,
///   "version": "0.1.0",
///   "checks": {
///     "storage": { "status": "ok" }
///   }
/// }
/// ```
pub async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let storage = if state.ledger.health_check().await {
        CheckStatus::ok()
    } else {
        tracing::warn!("Storage health check failed");
        CheckStatus::failed("Storage backend unavailable")
    };

    let healthy = storage.status == ComponentStatus::Ok;
    let now = state.clock.now();

    let response = HealthResponse {
        status: if healthy {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        },
        timestamp: now,
        uptime: (now - state.started_at).num_seconds().max(0),
        version: env!("CARGO_PKG_VERSION"),
        checks: HealthChecks { storage },
    };

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(response))
}
