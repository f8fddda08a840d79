//! Bearer token verification and issuance.
//!
//! Tokens are compact HS256 JWTs signed with the configured secret. Claims
//! carry `sub`, `exp` (Unix seconds), optional `iat`, optional `roles` (array)
//! and optional `scope` (space separated). Roles and scopes are merged into
//! [`Identity::roles`].

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::{Error as JwtError, ErrorKind};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::domain::entities::Identity;
use crate::utils::clock::Clock;

pub use crate::error::AuthError;

const ALGORITHM: Algorithm = Algorithm::HS256;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    iat: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    roles: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    scope: Option<String>,
}

/// Validates bearer tokens and turns their claims into an [`Identity`].
///
/// Verification is a pure function of the token, the signing key and the
/// clock. Checks run in a fixed order:
///
/// 1. Structure: three segments, a JOSE header, JSON claims with `sub` and
///    `exp` ([`AuthError::Malformed`])
/// 2. Expiry: `now >= exp` ([`AuthError::Expired`]), whatever the algorithm
///    or signature
/// 3. Algorithm must be `HS256` and the HMAC signature must match
///    ([`AuthError::InvalidSignature`])
///
/// Expiry is compared against the injected [`Clock`], never the system time,
/// so the library's own `exp` check is disabled.
pub struct CredentialVerifier {
    key: DecodingKey,
    unverified: Validation,
    verified: Validation,
    clock: Arc<dyn Clock>,
}

impl CredentialVerifier {
    /// Creates a verifier for tokens signed with `signing_secret`.
    pub fn new(signing_secret: impl AsRef<[u8]>, clock: Arc<dyn Clock>) -> Self {
        let mut unverified = claims_validation();
        unverified.insecure_disable_signature_validation();

        Self {
            key: DecodingKey::from_secret(signing_secret.as_ref()),
            unverified,
            verified: claims_validation(),
            clock,
        }
    }

    /// Verifies a raw token (without the `Bearer ` prefix).
    ///
    /// # Errors
    ///
    /// See the type-level docs for the check order and error mapping.
    pub fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        let token = token.trim();

        let header = jsonwebtoken::decode_header(token).map_err(malformed)?;
        let claims = jsonwebtoken::decode::<Claims>(token, &self.key, &self.unverified)
            .map_err(malformed)?
            .claims;

        if claims.sub.trim().is_empty() {
            return Err(AuthError::Malformed("empty subject".into()));
        }

        let expires_at = DateTime::<Utc>::from_timestamp(claims.exp, 0)
            .ok_or_else(|| AuthError::Malformed("exp out of range".into()))?;

        if self.clock.now() >= expires_at {
            return Err(AuthError::Expired { expired_at: expires_at });
        }

        if header.alg != ALGORITHM {
            tracing::debug!(alg = ?header.alg, "Rejected token algorithm");
            return Err(AuthError::InvalidSignature);
        }

        let claims = jsonwebtoken::decode::<Claims>(token, &self.key, &self.verified)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature
                | ErrorKind::InvalidAlgorithm
                | ErrorKind::InvalidAlgorithmName
                | ErrorKind::InvalidKeyFormat => AuthError::InvalidSignature,
                _ => malformed(e),
            })?
            .claims;

        let scopes = claims
            .scope
            .as_deref()
            .unwrap_or_default()
            .split_whitespace()
            .map(str::to_string);
        let roles = claims.roles.into_iter().chain(scopes);

        Ok(Identity::new(claims.sub, roles, expires_at))
    }
}

/// Mints tokens accepted by a [`CredentialVerifier`] sharing the same secret.
pub struct TokenIssuer {
    key: EncodingKey,
    clock: Arc<dyn Clock>,
}

impl TokenIssuer {
    pub fn new(signing_secret: impl AsRef<[u8]>, clock: Arc<dyn Clock>) -> Self {
        Self {
            key: EncodingKey::from_secret(signing_secret.as_ref()),
            clock,
        }
    }

    /// Issues a token for `subject` valid for `ttl` from now.
    ///
    /// # Errors
    ///
    /// Returns an error only if claim serialization fails.
    pub fn issue(&self, subject: &str, roles: &[String], ttl: Duration) -> Result<String, JwtError> {
        let now = self.clock.now();
        self.issue_until(subject, roles, now, now + ttl)
    }

    /// Issues a token with explicit issue and expiry instants.
    ///
    /// # Errors
    ///
    /// Returns an error only if claim serialization fails.
    pub fn issue_until(
        &self,
        subject: &str,
        roles: &[String],
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<String, JwtError> {
        let claims = Claims {
            sub: subject.to_string(),
            exp: expires_at.timestamp(),
            iat: Some(issued_at.timestamp()),
            roles: roles.to_vec(),
            scope: None,
        };

        jsonwebtoken::encode(&Header::new(ALGORITHM), &claims, &self.key)
    }
}

/// HS256 with `sub` and `exp` required. Time-based checks run against our clock.
fn claims_validation() -> Validation {
    let mut validation = Validation::new(ALGORITHM);
    validation.set_required_spec_claims(&["exp", "sub"]);
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation
}

fn malformed(e: JwtError) -> AuthError {
    AuthError::Malformed(e.to_string())
}
