//! REST API layer for HTTP request/response handling.
//!
//! This layer translates HTTP requests into ledger operations and renders
//! every outcome as a response envelope.
//!
//! # Modules
//!
//! - [`dispatcher`] - Result to envelope rendering, the single response exit
//! - [`dto`] - Data Transfer Objects for request/response serialization
//! - [`handlers`] - HTTP request handlers
//! - [`middleware`] - Request-gating chain and its axum adapter
//! - [`routes`] - Route configuration and composition

pub mod dispatcher;
pub mod dto;
pub mod handlers;
pub mod middleware;
pub mod routes;
