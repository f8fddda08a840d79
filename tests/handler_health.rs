mod common;

use axum::http::header;
use chrono::Duration;
use common::spawn_app;
use serde_json::Value;

#[tokio::test]
async fn test_health_endpoint_success() {
    let app = spawn_app();

    let response = app.server.get("/health").await;

    response.assert_status_ok();

    let json = response.json::<Value>();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["checks"]["storage"]["status"], "ok");
    assert!(json.get("version").is_some());
}

#[tokio::test]
async fn test_health_reports_uptime() {
    let app = spawn_app();
    app.clock.advance(Duration::seconds(90));

    let json = app.server.get("/health").await.json::<Value>();

    assert_eq!(json["uptime"], 90);
}

#[tokio::test]
async fn test_health_is_outside_the_chain() {
    let app = spawn_app();

    // No token, no rate limit counter, no request id.
    let response = app.server.get("/health").await;

    response.assert_status_ok();
    assert!(response.maybe_header("x-request-id").is_none());
    assert!(response.maybe_header(header::WWW_AUTHENTICATE).is_none());
    assert!(app.limiter.is_empty());
}
