use gated_ledger::config;
use gated_ledger::server;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = config::load_from_env()?;
    init_tracing(&config.log_level, &config.log_format)?;
    config.print_summary();

    server::run(config).await
}

/// Installs the global subscriber. `RUST_LOG` directives take the usual
/// `EnvFilter` syntax; `LOG_FORMAT=json` switches to one JSON object per line.
fn init_tracing(log_level: &str, log_format: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(log_level)
        .map_err(|e| anyhow::anyhow!("RUST_LOG is not a valid filter: {e}"))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    if log_format == "json" {
        builder.json().with_current_span(true).init();
    } else {
        builder.init();
    }

    Ok(())
}
