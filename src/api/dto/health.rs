//! DTOs for the health endpoint.

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Ok,
    Error,
}

/// Body of `GET /health`. Not wrapped in a response envelope.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub timestamp: DateTime<Utc>,
    /// Seconds since the service started.
    pub uptime: i64,
    pub version: &'static str,
    pub checks: HealthChecks,
}

#[derive(Debug, Serialize)]
pub struct HealthChecks {
    pub storage: CheckStatus,
}

#[derive(Debug, Serialize)]
pub struct CheckStatus {
    pub status: ComponentStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

impl CheckStatus {
    pub fn ok() -> Self {
        Self {
            status: ComponentStatus::Ok,
            message: None,
        }
    }

    pub fn failed(message: &'static str) -> Self {
        Self {
            status: ComponentStatus::Error,
            message: Some(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialized_shape() {
        let response = HealthResponse {
            status: HealthStatus::Unhealthy,
            timestamp: Utc::now(),
            uptime: 5,
            version: "0.1.0",
            checks: HealthChecks {
                storage: CheckStatus::failed("Storage backend unavailable"),
            },
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "unhealthy");
        assert_eq!(json["checks"]["storage"]["status"], "error");
        assert_eq!(json["checks"]["storage"]["message"], "Storage backend unavailable");

        let ok = serde_json::to_value(CheckStatus::ok()).unwrap();
        assert!(ok.get("message").is_none());
    }
}
