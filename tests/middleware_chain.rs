mod common;

use axum::http::{HeaderName, HeaderValue, Method, StatusCode, header};
use chrono::Duration;
use common::{ALLOWED_ORIGIN, READ_WRITE, bearer, origin, spawn_app, spawn_app_with_limits};
use gated_ledger::application::services::{RateLimits, WindowLimit};
use serde_json::{Value, json};

fn request_id() -> HeaderName {
    HeaderName::from_static("x-request-id")
}

#[tokio::test]
async fn test_missing_token_rejected_without_counter() {
    let app = spawn_app();

    let response = app.server.get("/api/accounts/acc-alice").await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(response.header(header::WWW_AUTHENTICATE), "Bearer");

    let body = response.json::<Value>();
    assert_eq!(body["status"], "error");
    assert_eq!(body["error"]["code"], "MalformedToken");
    assert!(body["metadata"]["trace_id"].is_string());
    assert_eq!(body["metadata"]["timestamp"], "2024-05-01T09:00:00Z");

    assert!(app.limiter.is_empty());
}

#[tokio::test]
async fn test_bad_signature_rejected_without_counter() {
    let app = spawn_app();

    let token = app.token("alice", READ_WRITE);
    let (head, _) = token.rsplit_once('.').unwrap();
    let forged = format!("{head}.AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA");

    let response = app
        .server
        .get("/api/accounts/acc-alice")
        .add_header(header::AUTHORIZATION, bearer(&forged))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(response.json::<Value>()["error"]["code"], "InvalidSignature");
    assert!(app.limiter.is_empty());
}

#[tokio::test]
async fn test_token_expired_two_hours_later() {
    let app = spawn_app();
    let token = app.token("alice", READ_WRITE);

    app.clock.advance(Duration::hours(2));

    let response = app
        .server
        .get("/api/accounts/acc-alice")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    let body = response.json::<Value>();
    assert_eq!(body["error"]["code"], "Expired");
    assert!(body["error"]["details"]["expired_at"].is_string());
}

#[tokio::test]
async fn test_missing_role_is_forbidden() {
    let app = spawn_app();
    let token = app.token("reader", &["ledger:read"]);

    let response = app
        .server
        .post("/api/accounts")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "owner": "Mallory" }))
        .await;

    response.assert_status(StatusCode::FORBIDDEN);
    let body = response.json::<Value>();
    assert_eq!(body["error"]["code"], "Forbidden");
    assert_eq!(body["error"]["details"]["required_role"], "ledger:write");
}

#[tokio::test]
async fn test_sixth_write_in_window_rate_limited() {
    let app = spawn_app_with_limits(RateLimits {
        read: WindowLimit::new(100, Duration::seconds(60)),
        write: WindowLimit::new(5, Duration::seconds(60)),
    });
    let token = app.token("alice", READ_WRITE);

    for i in 0..5 {
        let response = app
            .server
            .post("/api/accounts")
            .add_header(header::AUTHORIZATION, bearer(&token))
            .json(&json!({ "owner": format!("owner-{i}") }))
            .await;
        response.assert_status(StatusCode::CREATED);
        assert_eq!(response.header("x-ratelimit-limit"), "5");
        assert_eq!(
            response.header("x-ratelimit-remaining"),
            (4 - i).to_string().as_str()
        );
    }

    let response = app
        .server
        .post("/api/accounts")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "owner": "one-too-many" }))
        .await;

    response.assert_status(StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.header(header::RETRY_AFTER), "60");
    assert_eq!(response.header("x-ratelimit-limit"), "5");
    assert_eq!(response.header("x-ratelimit-remaining"), "0");
    let body = response.json::<Value>();
    assert_eq!(body["error"]["code"], "RateLimited");
    assert_eq!(body["error"]["retry_after"], 60);

    // The denied request never reached the handler.
    assert_eq!(app.store.committed_accounts(), 5);
}

#[tokio::test]
async fn test_reads_have_their_own_budget() {
    let app = spawn_app_with_limits(RateLimits {
        read: WindowLimit::new(2, Duration::seconds(60)),
        write: WindowLimit::new(100, Duration::seconds(60)),
    });
    app.open_account("acc-alice", "Alice", 10).await;
    let token = app.token("alice", READ_WRITE);

    for _ in 0..2 {
        app.server
            .get("/api/accounts/acc-alice")
            .add_header(header::AUTHORIZATION, bearer(&token))
            .await
            .assert_status_ok();
    }

    app.server
        .get("/api/accounts/acc-alice")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await
        .assert_status(StatusCode::TOO_MANY_REQUESTS);

    // Another subject is counted separately.
    app.server
        .get("/api/accounts/acc-alice")
        .add_header(header::AUTHORIZATION, bearer(&app.token("bob", READ_WRITE)))
        .await
        .assert_status_ok();

    // Writes are unaffected.
    app.server
        .post("/api/accounts")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "owner": "Alice again" }))
        .await
        .assert_status(StatusCode::CREATED);
}

#[tokio::test]
async fn test_window_resets_after_expiry() {
    let app = spawn_app_with_limits(RateLimits {
        read: WindowLimit::new(1, Duration::seconds(60)),
        write: WindowLimit::new(100, Duration::seconds(60)),
    });
    app.open_account("acc-alice", "Alice", 10).await;
    let token = app.token("alice", READ_WRITE);

    let get = || {
        app.server
            .get("/api/accounts/acc-alice")
            .add_header(header::AUTHORIZATION, bearer(&token))
    };

    get().await.assert_status_ok();

    app.clock.advance(Duration::seconds(45));
    let response = get().await;
    response.assert_status(StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.header(header::RETRY_AFTER), "15");

    app.clock.advance(Duration::seconds(15));
    get().await.assert_status_ok();
}

#[tokio::test]
async fn test_cors_preflight_answered_before_auth() {
    let app = spawn_app();
    let (name, value) = origin(ALLOWED_ORIGIN);

    let response = app
        .server
        .method(Method::OPTIONS, "/api/transfers")
        .add_header(name, value)
        .add_header(
            header::ACCESS_CONTROL_REQUEST_METHOD,
            HeaderValue::from_static("POST"),
        )
        .await;

    response.assert_status(StatusCode::NO_CONTENT);
    assert_eq!(
        response.header(header::ACCESS_CONTROL_ALLOW_ORIGIN),
        ALLOWED_ORIGIN
    );
    assert!(
        response
            .header(header::ACCESS_CONTROL_ALLOW_METHODS)
            .to_str()
            .unwrap()
            .contains("POST")
    );
    assert!(app.limiter.is_empty());
}

#[tokio::test]
async fn test_disallowed_origin_stops_chain_first() {
    let app = spawn_app();
    let (name, value) = origin("https://evil.example.org");

    // No token either: the CORS stage must answer before auth runs.
    let response = app
        .server
        .get("/api/accounts/acc-alice")
        .add_header(name, value)
        .await;

    response.assert_status(StatusCode::FORBIDDEN);
    let body = response.json::<Value>();
    assert_eq!(body["error"]["code"], "CorsRejected");
    assert!(response.maybe_header(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    assert!(app.limiter.is_empty());
}

#[tokio::test]
async fn test_allowed_origin_echoed_on_rejection() {
    let app = spawn_app();
    let (name, value) = origin(ALLOWED_ORIGIN);

    let response = app
        .server
        .get("/api/accounts/acc-alice")
        .add_header(name, value)
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.header(header::ACCESS_CONTROL_ALLOW_ORIGIN),
        ALLOWED_ORIGIN
    );
}

#[tokio::test]
async fn test_inbound_request_id_becomes_trace_id() {
    let app = spawn_app();
    app.open_account("acc-alice", "Alice", 10).await;

    let response = app
        .server
        .get("/api/accounts/acc-alice")
        .add_header(header::AUTHORIZATION, bearer(&app.token("alice", READ_WRITE)))
        .add_header(request_id(), HeaderValue::from_static("client-trace-42"))
        .await;

    response.assert_status_ok();
    assert_eq!(response.header(request_id()), "client-trace-42");
    assert_eq!(
        response.json::<Value>()["metadata"]["trace_id"],
        "client-trace-42"
    );
}

#[tokio::test]
async fn test_trace_id_generated_when_absent() {
    let app = spawn_app();

    let response = app.server.get("/api/accounts/acc-alice").await;

    let header_id = response.header(request_id()).to_str().unwrap().to_string();
    assert_eq!(header_id.len(), 32);
    assert_eq!(response.json::<Value>()["metadata"]["trace_id"], header_id);
}
