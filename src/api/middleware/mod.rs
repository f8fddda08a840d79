//! HTTP middleware for request processing and protection.
//!
//! Request gating runs as an ordered [`chain::MiddlewareChain`] of stages:
//!
//! 1. [`cors::CorsStage`] - origin allow-list and preflight answers
//! 2. [`auth::AuthStage`] - bearer token verification
//! 3. [`rate_limit::RateLimitStage`] - per-subject fixed-window limits
//! 4. [`request_log::RequestLogStage`] - structured admission log
//!
//! [`adapter::chain_layer`] plugs the chain into axum; [`tracing`] provides
//! the `tower-http` request span layer.

pub mod adapter;
pub mod auth;
pub mod chain;
pub mod context;
pub mod cors;
pub mod rate_limit;
pub mod request_log;
pub mod tracing;

pub use adapter::chain_layer;
pub use chain::{ChainResult, MiddlewareChain, ShortCircuit, Stage, StageOutcome};
pub use context::{InboundRequest, MiddlewareContext};
