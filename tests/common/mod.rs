#![allow(dead_code)]

use axum::http::{HeaderName, HeaderValue, header};
use axum_test::TestServer;
use chrono::{Duration, TimeZone, Utc};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use gated_ledger::api::middleware::cors::CorsStage;
use gated_ledger::application::services::{
    CredentialVerifier, LedgerService, RateLimiter, RateLimits, TokenIssuer, WindowLimit,
};
use gated_ledger::domain::unit_of_work::{RetryPolicy, UnitOfWork};
use gated_ledger::infrastructure::persistence::{
    MemoryAccountRepository, MemoryStore, MemoryTransferRepository,
};
use gated_ledger::routes::router;
use gated_ledger::state::{AppState, standard_chain};
use gated_ledger::utils::clock::{Clock, ManualClock};

pub const SECRET: &str = "integration-test-secret-0123456789abcdef";
pub const ALLOWED_ORIGIN: &str = "https://app.example.com";
pub const READ_WRITE: &[&str] = &["ledger:read", "ledger:write"];

pub struct TestApp {
    pub server: TestServer,
    pub clock: Arc<ManualClock>,
    pub store: Arc<MemoryStore>,
    pub limiter: Arc<RateLimiter>,
    pub issuer: TokenIssuer,
}

/// Generous limits so only rate-limit tests ever hit them.
pub fn relaxed_limits() -> RateLimits {
    RateLimits {
        read: WindowLimit::new(1_000, Duration::seconds(60)),
        write: WindowLimit::new(1_000, Duration::seconds(60)),
    }
}

pub fn spawn_app() -> TestApp {
    spawn_app_with_limits(relaxed_limits())
}

/// Full router over the in-memory backend with a frozen clock.
pub fn spawn_app_with_limits(limits: RateLimits) -> TestApp {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap(),
    ));
    let dyn_clock: Arc<dyn Clock> = clock.clone();

    let store = Arc::new(MemoryStore::new(
        8,
        StdDuration::from_secs(1),
        dyn_clock.clone(),
    ));
    let ledger = Arc::new(LedgerService::new(
        UnitOfWork::new(store.clone(), RetryPolicy::none()),
        Arc::new(MemoryAccountRepository::new(store.clone())),
        Arc::new(MemoryTransferRepository::new(store.clone())),
    ));

    let verifier = Arc::new(CredentialVerifier::new(SECRET, dyn_clock.clone()));
    let limiter = Arc::new(RateLimiter::new(limits, dyn_clock.clone()));
    let cors = CorsStage::new(
        vec![ALLOWED_ORIGIN.to_string()],
        StdDuration::from_secs(600),
    );
    let chain = standard_chain(cors, verifier, limiter.clone());

    let state = AppState::new(ledger, chain, limiter.clone(), dyn_clock.clone(), false);
    let server = TestServer::new(router(state)).unwrap();

    TestApp {
        server,
        clock,
        store,
        limiter,
        issuer: TokenIssuer::new(SECRET, dyn_clock),
    }
}

impl TestApp {
    /// A one-hour token for `subject` with `roles`.
    pub fn token(&self, subject: &str, roles: &[&str]) -> String {
        let roles: Vec<String> = roles.iter().map(|r| r.to_string()).collect();
        self.issuer
            .issue(subject, &roles, Duration::hours(1))
            .unwrap()
    }

    /// Opens an account through the API and returns its id.
    pub async fn open_account(&self, id: &str, owner: &str, balance: i64) -> String {
        let response = self
            .server
            .post("/api/accounts")
            .add_header(header::AUTHORIZATION, bearer(&self.token("setup", READ_WRITE)))
            .json(&json!({ "id": id, "owner": owner, "initial_balance": balance }))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);

        let body = response.json::<Value>();
        body["data"]["id"].as_str().unwrap().to_string()
    }
}

pub fn bearer(token: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("Bearer {token}")).unwrap()
}

pub fn origin(value: &str) -> (HeaderName, HeaderValue) {
    (header::ORIGIN, HeaderValue::from_str(value).unwrap())
}
