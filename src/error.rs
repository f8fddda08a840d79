//! Error types shared across layers.
//!
//! - [`AuthError`] - credential verification and authorization failures
//! - [`RepositoryError`] - persistence failures, classified transient or not
//! - [`AppError`] - everything a request can fail with; carries the stable
//!   client-facing code and HTTP status
//!
//! The dispatcher ([`crate::api::dispatcher`]) is the only place an [`AppError`]
//! is turned into a response body.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Value, json};
use std::time::Duration;
use thiserror::Error;

/// Client-facing error payload inside the response envelope.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorInfo {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    /// Seconds until the caller may retry (throttling only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

/// Why a bearer token was refused, or an identity lacked a role.
///
/// Verification is deterministic, so none of these are ever retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Missing header, wrong segment count, bad base64, bad JSON or missing claims.
    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("invalid token signature")]
    InvalidSignature,

    #[error("token expired at {expired_at}")]
    Expired { expired_at: DateTime<Utc> },

    #[error("missing required role: {required}")]
    Forbidden { required: String },
}

impl AuthError {
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::Malformed(_) => "MalformedToken",
            AuthError::InvalidSignature => "InvalidSignature",
            AuthError::Expired { .. } => "Expired",
            AuthError::Forbidden { .. } => "Forbidden",
        }
    }

    pub fn public_message(&self) -> &'static str {
        match self {
            AuthError::Malformed(_) => "Bearer token is missing or malformed",
            AuthError::InvalidSignature => "Bearer token signature is invalid",
            AuthError::Expired { .. } => "Bearer token has expired",
            AuthError::Forbidden { .. } => "Insufficient permissions",
        }
    }

    /// Malformation reasons stay in the logs.
    pub fn public_details(&self) -> Option<Value> {
        match self {
            AuthError::Expired { expired_at } => Some(json!({ "expired_at": expired_at })),
            AuthError::Forbidden { required } => Some(json!({ "required_role": required })),
            _ => None,
        }
    }
}

/// Errors for which a bounded local retry may succeed.
pub trait TransientError {
    fn is_transient(&self) -> bool;
}

/// Failures reported by the persistence layer.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("constraint violation: {0}")]
    Constraint(String),

    /// Serialization failure or deadlock; the unit may succeed if replayed.
    #[error("transaction conflict: {0}")]
    Conflict(String),

    #[error("connection pool exhausted")]
    PoolExhausted,

    #[error("commit failed after {attempts} attempt(s): {reason}")]
    CommitFailed { attempts: u32, reason: String },

    #[error("persistence backend error: {0}")]
    Backend(String),
}

impl RepositoryError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Conflict(_) | Self::PoolExhausted)
    }
}

impl TransientError for RepositoryError {
    fn is_transient(&self) -> bool {
        RepositoryError::is_transient(self)
    }
}

/// Every way a request can fail.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("origin not allowed: {origin}")]
    CorsRejected { origin: String },

    #[error("{message}")]
    Validation { message: String, details: Value },

    #[error("{message}")]
    NotFound { message: String, details: Value },

    #[error("{message}")]
    Conflict { message: String, details: Value },

    #[error("{message}")]
    InsufficientFunds { message: String, details: Value },

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("{message}")]
    Internal { message: String, details: Value },
}

impl AppError {
    pub fn bad_request(message: impl Into<String>, details: Value) -> Self {
        Self::Validation {
            message: message.into(),
            details,
        }
    }

    pub fn not_found(message: impl Into<String>, details: Value) -> Self {
        Self::NotFound {
            message: message.into(),
            details,
        }
    }

    pub fn conflict(message: impl Into<String>, details: Value) -> Self {
        Self::Conflict {
            message: message.into(),
            details,
        }
    }

    pub fn insufficient_funds(message: impl Into<String>, details: Value) -> Self {
        Self::InsufficientFunds {
            message: message.into(),
            details,
        }
    }

    pub fn internal(message: impl Into<String>, details: Value) -> Self {
        Self::Internal {
            message: message.into(),
            details,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Auth(e) => e.code(),
            AppError::RateLimited { .. } => "RateLimited",
            AppError::CorsRejected { .. } => "CorsRejected",
            AppError::Validation { .. } => "ValidationError",
            AppError::NotFound { .. } => "NotFound",
            AppError::Conflict { .. } => "Conflict",
            AppError::InsufficientFunds { .. } => "InsufficientFunds",
            AppError::Repository(e) => match e {
                RepositoryError::NotFound { .. } => "NotFound",
                RepositoryError::Constraint(_) => "Conflict",
                RepositoryError::Conflict(_) | RepositoryError::CommitFailed { .. } => {
                    "CommitFailed"
                }
                RepositoryError::PoolExhausted | RepositoryError::Backend(_) => "InternalError",
            },
            AppError::Internal { .. } => "InternalError",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Auth(AuthError::Forbidden { .. }) => StatusCode::FORBIDDEN,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::CorsRejected { .. } => StatusCode::FORBIDDEN,
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Conflict { .. } | AppError::InsufficientFunds { .. } => StatusCode::CONFLICT,
            AppError::Repository(e) => match e {
                RepositoryError::NotFound { .. } => StatusCode::NOT_FOUND,
                RepositoryError::Constraint(_)
                | RepositoryError::Conflict(_)
                | RepositoryError::CommitFailed { .. } => StatusCode::CONFLICT,
                RepositoryError::PoolExhausted => StatusCode::SERVICE_UNAVAILABLE,
                RepositoryError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// True when the error carries detail that must stay out of client responses.
    pub fn is_internal(&self) -> bool {
        self.code() == "InternalError"
    }

    /// Retry hint in whole seconds, rounded up, never below one.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            AppError::RateLimited { retry_after } => Some(ceil_secs(*retry_after)),
            _ => None,
        }
    }

    /// Builds the client-facing payload. Internal detail never appears here.
    pub fn to_error_info(&self) -> ErrorInfo {
        let (message, details) = match self {
            AppError::Auth(e) => (e.public_message().to_string(), e.public_details()),
            AppError::RateLimited { .. } => ("Too many requests".to_string(), None),
            AppError::CorsRejected { origin } => (
                "Origin is not allowed".to_string(),
                Some(json!({ "origin": origin })),
            ),
            AppError::Validation { message, details }
            | AppError::NotFound { message, details }
            | AppError::Conflict { message, details }
            | AppError::InsufficientFunds { message, details } => {
                (message.clone(), non_empty(details))
            }
            AppError::Repository(e) => match e {
                RepositoryError::NotFound { entity, id } => (
                    format!("{} not found", capitalize(entity)),
                    (!id.is_empty()).then(|| json!({ "id": id })),
                ),
                RepositoryError::Constraint(_) => {
                    ("Request conflicts with current state".to_string(), None)
                }
                RepositoryError::Conflict(_) | RepositoryError::CommitFailed { .. } => (
                    "Transaction could not be committed, retry later".to_string(),
                    None,
                ),
                RepositoryError::PoolExhausted | RepositoryError::Backend(_) => {
                    ("Internal server error".to_string(), None)
                }
            },
            AppError::Internal { .. } => ("Internal server error".to_string(), None),
        };

        ErrorInfo {
            code: self.code(),
            message,
            details,
            retry_after: self.retry_after_secs(),
        }
    }
}

impl TransientError for AppError {
    fn is_transient(&self) -> bool {
        matches!(self, AppError::Repository(e) if e.is_transient())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let details = serde_json::to_value(&errors).unwrap_or_else(|_| json!({}));
        AppError::bad_request("Request validation failed", details)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::bad_request(
            "Invalid JSON body",
            json!({ "reason": rejection.body_text() }),
        )
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::bad_request(
            "Invalid query string",
            json!({ "reason": rejection.body_text() }),
        )
    }
}

/// Renders without a request context. Handlers should prefer
/// [`crate::api::dispatcher::dispatch`], which keeps the trace id.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        crate::api::dispatcher::dispatch_error(None, self).into_response()
    }
}

fn ceil_secs(d: Duration) -> u64 {
    let secs = d.as_secs() + u64::from(d.subsec_nanos() > 0);
    secs.max(1)
}

fn non_empty(details: &Value) -> Option<Value> {
    match details {
        Value::Null => None,
        Value::Object(map) if map.is_empty() => None,
        other => Some(other.clone()),
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_and_statuses() {
        let cases: Vec<(AppError, &str, StatusCode)> = vec![
            (
                AppError::Auth(AuthError::Malformed("no dots".into())),
                "MalformedToken",
                StatusCode::UNAUTHORIZED,
            ),
            (
                AppError::Auth(AuthError::InvalidSignature),
                "InvalidSignature",
                StatusCode::UNAUTHORIZED,
            ),
            (
                AppError::RateLimited {
                    retry_after: Duration::from_secs(3),
                },
                "RateLimited",
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (
                AppError::CorsRejected {
                    origin: "https://evil.test".into(),
                },
                "CorsRejected",
                StatusCode::FORBIDDEN,
            ),
            (
                AppError::Repository(RepositoryError::CommitFailed {
                    attempts: 4,
                    reason: "conflict".into(),
                }),
                "CommitFailed",
                StatusCode::CONFLICT,
            ),
            (
                AppError::Repository(RepositoryError::Backend("relation missing".into())),
                "InternalError",
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, code, status) in cases {
            assert_eq!(err.code(), code);
            assert_eq!(err.status(), status);
        }
    }

    #[test]
    fn test_internal_detail_does_not_leak() {
        let err = AppError::Repository(RepositoryError::Backend(
            "password authentication failed for user \"ledger\"".into(),
        ));

        let info = err.to_error_info();
        assert_eq!(info.code, "InternalError");
        assert_eq!(info.message, "Internal server error");
        assert!(info.details.is_none());
        assert!(err.is_internal());
    }

    #[test]
    fn test_retry_after_rounds_up() {
        let err = AppError::RateLimited {
            retry_after: Duration::from_millis(59_001),
        };
        assert_eq!(err.retry_after_secs(), Some(60));

        let err = AppError::RateLimited {
            retry_after: Duration::from_millis(10),
        };
        assert_eq!(err.retry_after_secs(), Some(1));
    }

    #[test]
    fn test_transient_classification() {
        assert!(AppError::Repository(RepositoryError::Conflict("40001".into())).is_transient());
        assert!(AppError::Repository(RepositoryError::PoolExhausted).is_transient());
        assert!(!AppError::Repository(RepositoryError::Constraint("x".into())).is_transient());
        assert!(!AppError::conflict("nope", json!({})).is_transient());
    }

    #[test]
    fn test_repository_not_found_message() {
        let err = AppError::from(RepositoryError::not_found("account", "acc-1"));
        let info = err.to_error_info();
        assert_eq!(info.message, "Account not found");
        assert_eq!(info.details, Some(json!({ "id": "acc-1" })));
    }
}
