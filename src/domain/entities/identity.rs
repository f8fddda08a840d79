//! Verified caller identity.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

use crate::error::AuthError;

/// Role that satisfies every role check.
pub const ADMIN_ROLE: &str = "admin";
/// Role required for read-only ledger endpoints.
pub const LEDGER_READ_ROLE: &str = "ledger:read";
/// Role required for endpoints that move money or open accounts.
pub const LEDGER_WRITE_ROLE: &str = "ledger:write";

/// The subject a bearer token was issued to, with its granted roles.
///
/// Built once by [`crate::application::services::CredentialVerifier`] and
/// attached to the request context; there are no setters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    subject: String,
    roles: BTreeSet<String>,
    expires_at: DateTime<Utc>,
}

impl Identity {
    pub fn new(
        subject: impl Into<String>,
        roles: impl IntoIterator<Item = String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            subject: subject.into(),
            roles: roles.into_iter().collect(),
            expires_at,
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn roles(&self) -> &BTreeSet<String> {
        &self.roles
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(ADMIN_ROLE) || self.roles.contains(role)
    }

    /// # Errors
    ///
    /// Returns [`AuthError::Forbidden`] naming the missing role.
    pub fn require_role(&self, role: &str) -> Result<(), AuthError> {
        if self.has_role(role) {
            Ok(())
        } else {
            Err(AuthError::Forbidden {
                required: role.to_string(),
            })
        }
    }
}
