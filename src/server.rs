//! HTTP server initialization and runtime setup.
//!
//! Handles storage setup, middleware chain assembly, background sweeping and
//! the Axum server lifecycle.

use crate::api::middleware::cors::CorsStage;
use crate::application::services::{CredentialVerifier, LedgerOperations, LedgerService, RateLimiter};
use crate::config::{Config, StorageBackend};
use crate::domain::unit_of_work::UnitOfWork;
use crate::infrastructure::persistence::{
    MemoryAccountRepository, MemoryStore, MemoryTransferRepository, PgAccountRepository,
    PgTransactionManager, PgTransferRepository,
};
use crate::routes::app_router;
use crate::state::{AppState, standard_chain};
use crate::utils::clock::{Clock, SystemClock};

use anyhow::{Context, Result};
use axum::ServiceExt;
use axum::extract::Request;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

/// Runs the HTTP server with the given configuration.
///
/// Initializes:
/// - Storage backend (PostgreSQL pool with migrations, or the in-memory store)
/// - Ledger service behind a unit of work with the configured retry policy
/// - Middleware chain: CORS, credential verification, rate limiting, request log
/// - Background sweep of expired rate-limit counters
/// - Axum HTTP server
///
/// # Errors
///
/// Returns an error if:
/// - Database connection or migration fails
/// - Server bind fails
/// - Server runtime error occurs
pub async fn run(config: Config) -> Result<()> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let ledger = build_ledger(&config, clock.clone()).await?;

    let verifier = Arc::new(CredentialVerifier::new(
        &config.token_signing_secret,
        clock.clone(),
    ));
    let rate_limiter = Arc::new(RateLimiter::new(config.rate_limits(), clock.clone()));
    let cors = CorsStage::new(
        config.cors_allowed_origins.iter().cloned(),
        Duration::from_secs(config.cors_max_age_secs),
    );

    let chain = standard_chain(cors, verifier, rate_limiter.clone());
    tracing::info!(stages = ?chain.stage_names(), "Middleware chain assembled");

    tokio::spawn(run_counter_sweeper(
        rate_limiter.clone(),
        Duration::from_secs(config.rate_limit_sweep_secs),
    ));
    tracing::info!("Rate limit sweeper started");

    let state = AppState::new(ledger, chain, rate_limiter, clock, config.behind_proxy);

    let app = app_router(state);

    let addr: SocketAddr = config.listen_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{addr}");

    axum::serve(
        listener,
        ServiceExt::<Request>::into_make_service_with_connect_info::<SocketAddr>(app),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Builds the ledger over the configured storage backend.
async fn build_ledger(config: &Config, clock: Arc<dyn Clock>) -> Result<Arc<dyn LedgerOperations>> {
    let retry = config.retry_policy();

    match config.storage_backend {
        StorageBackend::Postgres => {
            let database_url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL must be set for the postgres backend")?;

            let pool = PgPoolOptions::new()
                .max_connections(config.db_max_connections)
                .acquire_timeout(Duration::from_secs(config.db_connect_timeout))
                .idle_timeout(Duration::from_secs(config.db_idle_timeout))
                .max_lifetime(Duration::from_secs(config.db_max_lifetime))
                .connect(database_url)
                .await
                .context("Failed to connect to database")?;
            tracing::info!("Connected to database");

            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .context("Failed to migrate")?;

            let manager = Arc::new(PgTransactionManager::new(
                Arc::new(pool),
                config.db_isolation_level,
            ));
            tracing::info!(isolation = %config.db_isolation_level, "Storage backend: postgres");

            Ok(Arc::new(LedgerService::new(
                UnitOfWork::new(manager, retry),
                Arc::new(PgAccountRepository::new()),
                Arc::new(PgTransferRepository::new()),
            )))
        }
        StorageBackend::Memory => {
            let store = Arc::new(MemoryStore::new(
                config.db_max_connections,
                Duration::from_secs(config.db_connect_timeout),
                clock,
            ));
            tracing::warn!("Storage backend: memory (data is lost on restart)");

            Ok(Arc::new(LedgerService::new(
                UnitOfWork::new(store.clone(), retry),
                Arc::new(MemoryAccountRepository::new(store.clone())),
                Arc::new(MemoryTransferRepository::new(store)),
            )))
        }
    }
}

/// Periodically drops rate-limit counters whose window has ended.
async fn run_counter_sweeper(limiter: Arc<RateLimiter>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        let removed = limiter.sweep_expired();
        if removed > 0 {
            tracing::debug!(removed, remaining = limiter.len(), "Swept expired rate limit counters");
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
