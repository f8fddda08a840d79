//! Per-request context threaded through the middleware chain.

use axum::http::{HeaderMap, Method};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::net::IpAddr;

use crate::domain::entities::Identity;

/// Read-only view of the inbound request handed to every stage.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub client_ip: Option<IpAddr>,
}

impl InboundRequest {
    /// Header value as UTF-8, if present and valid.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Error returned when a stage tries to replace an already attached identity.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("identity already attached to this request")]
pub struct IdentityAlreadySet;

/// State accumulated for one request. Created by the adapter, moved from
/// stage to stage and finally handed to the handler through request
/// extensions. Never shared between requests.
#[derive(Debug, Clone)]
pub struct MiddlewareContext {
    trace_id: String,
    received_at: DateTime<Utc>,
    client_ip: Option<IpAddr>,
    identity: Option<Identity>,
    metadata: BTreeMap<&'static str, String>,
}

impl MiddlewareContext {
    pub fn new(
        trace_id: impl Into<String>,
        received_at: DateTime<Utc>,
        client_ip: Option<IpAddr>,
    ) -> Self {
        Self {
            trace_id: trace_id.into(),
            received_at,
            client_ip,
            identity: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    pub fn client_ip(&self) -> Option<IpAddr> {
        self.client_ip
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Attaches the verified identity. Only the first call succeeds.
    pub fn attach_identity(&mut self, identity: Identity) -> Result<(), IdentityAlreadySet> {
        if self.identity.is_some() {
            return Err(IdentityAlreadySet);
        }
        self.identity = Some(identity);
        Ok(())
    }

    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    pub fn metadata_snapshot(&self) -> BTreeMap<&'static str, String> {
        self.metadata.clone()
    }

    pub fn insert_metadata(&mut self, key: &'static str, value: impl Into<String>) {
        self.metadata.insert(key, value.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_attaches_once() {
        let mut ctx = MiddlewareContext::new("trace", Utc::now(), None);
        let first = Identity::new("alice", Vec::new(), Utc::now());
        let second = Identity::new("mallory", Vec::new(), Utc::now());

        assert!(ctx.attach_identity(first).is_ok());
        assert_eq!(ctx.attach_identity(second), Err(IdentityAlreadySet));
        assert_eq!(ctx.identity().unwrap().subject(), "alice");
    }

    #[test]
    fn test_metadata() {
        let mut ctx = MiddlewareContext::new("trace", Utc::now(), None);
        assert!(ctx.metadata("origin").is_none());

        ctx.insert_metadata("origin", "https://app.example.com");
        assert_eq!(ctx.metadata("origin"), Some("https://app.example.com"));
    }
}
