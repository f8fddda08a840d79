mod common;

use axum::http::{StatusCode, header};
use common::{READ_WRITE, bearer, spawn_app};
use serde_json::{Value, json};

#[tokio::test]
async fn test_open_account_success() {
    let app = spawn_app();

    let response = app
        .server
        .post("/api/accounts")
        .add_header(header::AUTHORIZATION, bearer(&app.token("alice", READ_WRITE)))
        .json(&json!({ "id": "acc-alice", "owner": "Alice", "initial_balance": 500 }))
        .await;

    response.assert_status(StatusCode::CREATED);

    let json = response.json::<Value>();
    assert_eq!(json["status"], "success");
    assert_eq!(json["data"]["id"], "acc-alice");
    assert_eq!(json["data"]["owner"], "Alice");
    assert_eq!(json["data"]["balance"], 500);
    assert_eq!(json["metadata"]["timestamp"], "2024-05-01T09:00:00Z");
    assert!(json.get("error").is_none());
}

#[tokio::test]
async fn test_open_account_generates_id() {
    let app = spawn_app();

    let response = app
        .server
        .post("/api/accounts")
        .add_header(header::AUTHORIZATION, bearer(&app.token("alice", READ_WRITE)))
        .json(&json!({ "owner": "Alice" }))
        .await;

    response.assert_status(StatusCode::CREATED);
    let json = response.json::<Value>();
    let id = json["data"]["id"].as_str().unwrap();
    assert!(id.starts_with("acc-"));
    assert_eq!(json["data"]["balance"], 0);
}

#[tokio::test]
async fn test_open_account_duplicate_conflict() {
    let app = spawn_app();
    app.open_account("acc-alice", "Alice", 0).await;

    let response = app
        .server
        .post("/api/accounts")
        .add_header(header::AUTHORIZATION, bearer(&app.token("alice", READ_WRITE)))
        .json(&json!({ "id": "acc-alice", "owner": "Someone else" }))
        .await;

    response.assert_status(StatusCode::CONFLICT);
    let json = response.json::<Value>();
    assert_eq!(json["error"]["code"], "Conflict");
    assert_eq!(json["error"]["details"]["account_id"], "acc-alice");
}

#[tokio::test]
async fn test_open_account_validation() {
    let app = spawn_app();
    let token = app.token("alice", READ_WRITE);

    for body in [
        json!({ "owner": "" }),
        json!({ "owner": "Alice", "initial_balance": -1 }),
        json!({ "id": "bad id!", "owner": "Alice" }),
    ] {
        let response = app
            .server
            .post("/api/accounts")
            .add_header(header::AUTHORIZATION, bearer(&token))
            .json(&body)
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["error"]["code"], "ValidationError");
    }
}

#[tokio::test]
async fn test_malformed_json_is_enveloped() {
    let app = spawn_app();

    let response = app
        .server
        .post("/api/accounts")
        .add_header(header::AUTHORIZATION, bearer(&app.token("alice", READ_WRITE)))
        .add_header(
            header::CONTENT_TYPE,
            axum::http::HeaderValue::from_static("application/json"),
        )
        .bytes("{ not json".into())
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let json = response.json::<Value>();
    assert_eq!(json["status"], "error");
    assert_eq!(json["error"]["code"], "ValidationError");
}

#[tokio::test]
async fn test_get_account() {
    let app = spawn_app();
    app.open_account("acc-alice", "Alice", 42).await;

    let response = app
        .server
        .get("/api/accounts/acc-alice")
        .add_header(header::AUTHORIZATION, bearer(&app.token("alice", &["ledger:read"])))
        .await;

    response.assert_status_ok();
    let json = response.json::<Value>();
    assert_eq!(json["data"]["id"], "acc-alice");
    assert_eq!(json["data"]["balance"], 42);
}

#[tokio::test]
async fn test_get_account_not_found() {
    let app = spawn_app();

    let response = app
        .server
        .get("/api/accounts/acc-missing")
        .add_header(header::AUTHORIZATION, bearer(&app.token("alice", READ_WRITE)))
        .await;

    response.assert_status(StatusCode::NOT_FOUND);
    let json = response.json::<Value>();
    assert_eq!(json["error"]["code"], "NotFound");
    assert_eq!(json["error"]["details"]["account_id"], "acc-missing");
}

#[tokio::test]
async fn test_list_transfers_newest_first_with_limit() {
    let app = spawn_app();
    app.open_account("acc-alice", "Alice", 100).await;
    app.open_account("acc-bob", "Bob", 0).await;
    let token = app.token("alice", READ_WRITE);

    for amount in [1, 2, 3] {
        app.server
            .post("/api/transfers")
            .add_header(header::AUTHORIZATION, bearer(&token))
            .json(&json!({ "from_account": "acc-alice", "to_account": "acc-bob", "amount": amount }))
            .await
            .assert_status(StatusCode::CREATED);
    }

    let response = app
        .server
        .get("/api/accounts/acc-bob/transfers")
        .add_query_param("limit", 2)
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;

    response.assert_status_ok();
    let json = response.json::<Value>();
    assert_eq!(json["data"]["account_id"], "acc-bob");
    let transfers = json["data"]["transfers"].as_array().unwrap();
    assert_eq!(transfers.len(), 2);
    assert_eq!(transfers[0]["amount"], 3);
    assert_eq!(transfers[1]["amount"], 2);
}

#[tokio::test]
async fn test_list_transfers_rejects_bad_limit() {
    let app = spawn_app();
    app.open_account("acc-alice", "Alice", 0).await;
    let token = app.token("alice", READ_WRITE);

    for limit in ["0", "101", "many"] {
        let response = app
            .server
            .get("/api/accounts/acc-alice/transfers")
            .add_query_param("limit", limit)
            .add_header(header::AUTHORIZATION, bearer(&token))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["error"]["code"], "ValidationError");
    }
}
