//! Top-level router configuration.
//!
//! # Route Structure
//!
//! - `GET  /health` - Storage liveness and uptime (public, outside the chain)
//! - `/api/*`       - Ledger API behind the middleware chain
//!
//! # Middleware
//!
//! - **Tracing** - Structured request/response logging
//! - **Chain** - CORS, bearer authentication, rate limiting, admission log
//! - **Path normalization** - Trailing slash handling

use crate::api;
use crate::api::handlers::health_handler;
use crate::api::middleware::{chain_layer, tracing};
use crate::state::AppState;
use axum::routing::get;
use axum::{Router, middleware};
use tower::Layer;
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};

/// Constructs the application router with all routes and middleware.
///
/// # Arguments
///
/// - `state` - shared application state; its chain gates every `/api` request
pub fn app_router(state: AppState) -> NormalizePath<Router> {
    NormalizePathLayer::trim_trailing_slash().layer(router(state))
}

/// The routed application without path normalization.
pub fn router(state: AppState) -> Router {
    let api_router = api::routes::api_routes()
        .layer(middleware::from_fn_with_state(state.clone(), chain_layer));

    Router::new()
        .route("/health", get(health_handler))
        .nest("/api", api_router)
        .with_state(state)
        .layer(tracing::layer())
}
