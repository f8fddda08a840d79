//! Bearer token authentication stage.

use async_trait::async_trait;
use axum::http::header;
use std::sync::Arc;

use super::chain::{Stage, StageOutcome};
use super::context::{InboundRequest, MiddlewareContext};
use crate::application::services::CredentialVerifier;
use crate::error::{AppError, AuthError};

/// Authenticates requests using Bearer tokens from Authorization header.
///
/// # Header Format
///
/// ```text
/// Authorization: Bearer <token>
/// ```
///
/// # Authentication Flow
///
/// 1. Extract token from `Authorization` header
/// 2. Verify structure, expiry and signature with [`CredentialVerifier`]
/// 3. Attach the resulting identity to the request context
/// 4. Continue to the next stage
///
/// # Errors
///
/// Rejects with `401 Unauthorized` if:
/// - Authorization header is missing or not a Bearer credential (`MalformedToken`)
/// - Token cannot be parsed (`MalformedToken`)
/// - Token is past its expiry (`Expired`)
/// - Signature or algorithm is wrong (`InvalidSignature`)
///
/// The dispatcher adds `WWW-Authenticate: Bearer` to 401 responses per RFC 6750.
pub struct AuthStage {
    verifier: Arc<CredentialVerifier>,
}

impl AuthStage {
    pub fn new(verifier: Arc<CredentialVerifier>) -> Self {
        Self { verifier }
    }
}

/// Extracts the token from an `Authorization` header value.
///
/// The scheme is matched case-insensitively.
pub fn bearer_token(value: &str) -> Result<&str, AuthError> {
    let (scheme, token) = value
        .trim()
        .split_once(' ')
        .ok_or_else(|| AuthError::Malformed("authorization header is not a bearer credential".into()))?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::Malformed(format!(
            "unsupported authorization scheme '{scheme}'"
        )));
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::Malformed("empty bearer token".into()));
    }

    Ok(token)
}

#[async_trait]
impl Stage for AuthStage {
    fn name(&self) -> &'static str {
        "auth"
    }

    async fn process(&self, mut ctx: MiddlewareContext, request: &InboundRequest) -> StageOutcome {
        let verified = request
            .header(header::AUTHORIZATION.as_str())
            .ok_or_else(|| AuthError::Malformed("missing authorization header".into()))
            .and_then(bearer_token)
            .and_then(|token| self.verifier.verify(token));

        let identity = match verified {
            Ok(identity) => identity,
            Err(e) => {
                tracing::info!(
                    trace_id = %ctx.trace_id(),
                    code = e.code(),
                    reason = %e,
                    "Authentication failed"
                );
                return StageOutcome::reject(e);
            }
        };

        let subject = identity.subject().to_string();
        if let Err(e) = ctx.attach_identity(identity) {
            return StageOutcome::reject(AppError::internal(
                e.to_string(),
                serde_json::json!({ "subject": subject }),
            ));
        }

        tracing::debug!(trace_id = %ctx.trace_id(), subject = %subject, "Authenticated");
        StageOutcome::Continue(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::middleware::chain::ShortCircuit;
    use crate::application::services::TokenIssuer;
    use crate::utils::clock::{Clock, ManualClock};
    use axum::http::{HeaderMap, HeaderValue, Method};
    use chrono::Duration;

    const SECRET: &str = "auth-stage-test-secret-0123456789abcdef";

    fn setup() -> (Arc<ManualClock>, AuthStage, TokenIssuer) {
        let clock = Arc::new(ManualClock::default());
        let verifier = Arc::new(CredentialVerifier::new(SECRET, clock.clone()));
        let issuer = TokenIssuer::new(SECRET, clock.clone());
        (clock, AuthStage::new(verifier), issuer)
    }

    fn request(authorization: Option<&str>) -> InboundRequest {
        let mut headers = HeaderMap::new();
        if let Some(value) = authorization {
            headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        }
        InboundRequest {
            method: Method::GET,
            path: "/api/accounts/acc-1".to_string(),
            headers,
            client_ip: None,
        }
    }

    fn ctx(clock: &ManualClock) -> MiddlewareContext {
        MiddlewareContext::new("trace", clock.now(), None)
    }

    fn rejection_code(outcome: StageOutcome) -> &'static str {
        match outcome {
            StageOutcome::ShortCircuit(ShortCircuit::Reject(e)) => e.code(),
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token("Bearer abc.def.ghi").unwrap(), "abc.def.ghi");
        assert_eq!(bearer_token("bearer   abc ").unwrap(), "abc");
        assert!(bearer_token("Basic dXNlcjpwYXNz").is_err());
        assert!(bearer_token("Bearer").is_err());
        assert!(bearer_token("Bearer    ").is_err());
    }

    #[tokio::test]
    async fn test_valid_token_attaches_identity() {
        let (clock, stage, issuer) = setup();
        let token = issuer
            .issue("alice", &["ledger:read".to_string()], Duration::hours(1))
            .unwrap();

        let outcome = stage
            .process(ctx(&clock), &request(Some(&format!("Bearer {token}"))))
            .await;

        match outcome {
            StageOutcome::Continue(ctx) => {
                let identity = ctx.identity().unwrap();
                assert_eq!(identity.subject(), "alice");
                assert!(identity.has_role("ledger:read"));
            }
            other => panic!("expected continue, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_header_is_malformed() {
        let (clock, stage, _) = setup();
        let outcome = stage.process(ctx(&clock), &request(None)).await;
        assert_eq!(rejection_code(outcome), "MalformedToken");
    }

    #[tokio::test]
    async fn test_expired_token_rejected() {
        let (clock, stage, issuer) = setup();
        let token = issuer.issue("alice", &[], Duration::hours(1)).unwrap();
        clock.advance(Duration::hours(2));

        let outcome = stage
            .process(ctx(&clock), &request(Some(&format!("Bearer {token}"))))
            .await;
        assert_eq!(rejection_code(outcome), "Expired");
    }

    #[tokio::test]
    async fn test_foreign_signature_rejected() {
        let (clock, stage, _) = setup();
        let foreign = TokenIssuer::new("another-secret-another-secret-xx", clock.clone())
            .issue("alice", &[], Duration::hours(1))
            .unwrap();

        let outcome = stage
            .process(ctx(&clock), &request(Some(&format!("Bearer {foreign}"))))
            .await;
        assert_eq!(rejection_code(outcome), "InvalidSignature");
    }
}
