//! CLI administration tool for gated-ledger.
//!
//! Issues and inspects bearer tokens, checks the database and opens
//! accounts without going through the HTTP API.
//!
//! # Usage
//!
//! ```bash
//! # Issue a token valid for one hour
//! cargo run --bin admin -- token issue --subject alice --role ledger:read --ttl 3600
//!
//! # Verify a token and show its claims
//! cargo run --bin admin -- token inspect eyJhbGciOi...
//!
//! # Check database connection
//! cargo run --bin admin -- db check
//!
//! # Open an account
//! cargo run --bin admin -- account open --owner "Alice" --balance 10000
//! ```
//!
//! # Environment Variables
//!
//! - `TOKEN_SIGNING_SECRET` (token commands): HS256 signing key
//! - `DATABASE_URL` (db and account commands): PostgreSQL connection string
//!
//! # Features
//!
//! - **Token Management**: Sign tokens with roles and expiry, inspect existing ones
//! - **Database Tools**: Connection and migration checks
//! - **Accounts**: Open accounts through the same unit of work the API uses
//! - **Interactive Prompts**: User-friendly CLI with confirmation dialogs
//! - **Colored Output**: Terminal-friendly formatting using `colored` crate

use gated_ledger::api::dto::accounts::OpenAccountRequest;
use gated_ledger::application::services::{
    CredentialVerifier, LedgerOperations, LedgerService, OpenAccount, TokenIssuer,
};
use gated_ledger::config::MIN_SIGNING_SECRET_LEN;
use gated_ledger::domain::unit_of_work::{RetryPolicy, UnitOfWork};
use gated_ledger::infrastructure::persistence::{
    IsolationLevel, PgAccountRepository, PgTransactionManager, PgTransferRepository,
};
use gated_ledger::utils::clock::{Clock, SystemClock};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use dialoguer::{Confirm, Input};
use sqlx::PgPool;
use std::sync::Arc;
use validator::Validate;

/// CLI tool for managing gated-ledger.
#[derive(Parser)]
#[command(name = "admin")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Top-level command groups.
#[derive(Subcommand)]
enum Commands {
    /// Issue and inspect bearer tokens
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },

    /// Database operations
    Db {
        #[command(subcommand)]
        action: DbAction,
    },

    /// Account operations
    Account {
        #[command(subcommand)]
        action: AccountAction,
    },
}

/// Token subcommands.
#[derive(Subcommand)]
enum TokenAction {
    /// Issue a signed token
    Issue {
        /// Token subject (prompted if omitted)
        #[arg(short, long)]
        subject: Option<String>,

        /// Role granted to the subject, repeatable (e.g. ledger:read)
        #[arg(short, long = "role")]
        roles: Vec<String>,

        /// Lifetime in seconds
        #[arg(long, default_value_t = 3600)]
        ttl: i64,
    },

    /// Verify a token and print its identity
    Inspect {
        /// Raw token, without the `Bearer ` prefix
        token: String,
    },
}

/// Database operation subcommands.
#[derive(Subcommand)]
enum DbAction {
    /// Check database connection and applied migrations
    Check,
}

/// Account subcommands.
#[derive(Subcommand)]
enum AccountAction {
    /// Open a new account
    Open {
        /// Account owner
        #[arg(short, long)]
        owner: String,

        /// Opening balance in minor units
        #[arg(short, long, default_value_t = 0)]
        balance: i64,

        /// Explicit account id (generated if omitted)
        #[arg(long)]
        id: Option<String>,

        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Token { action } => handle_token_action(action)?,
        Commands::Db { action } => handle_db_action(action, &connect().await?).await?,
        Commands::Account { action } => handle_account_action(action, connect().await?).await?,
    }

    Ok(())
}

async fn connect() -> Result<PgPool> {
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

    PgPool::connect(&database_url)
        .await
        .context("Failed to connect to database")
}

fn signing_secret() -> Result<String> {
    let secret =
        std::env::var("TOKEN_SIGNING_SECRET").context("TOKEN_SIGNING_SECRET must be set")?;
    if secret.len() < MIN_SIGNING_SECRET_LEN {
        anyhow::bail!("TOKEN_SIGNING_SECRET must be at least {MIN_SIGNING_SECRET_LEN} bytes");
    }
    Ok(secret)
}

/// Dispatches token commands.
fn handle_token_action(action: TokenAction) -> Result<()> {
    let secret = signing_secret()?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    match action {
        TokenAction::Issue {
            subject,
            roles,
            ttl,
        } => issue_token(TokenIssuer::new(&secret, clock), subject, roles, ttl),
        TokenAction::Inspect { token } => {
            inspect_token(&CredentialVerifier::new(&secret, clock), &token)
        }
    }
}

/// Issues a token and prints it with usage instructions.
///
/// # Flow
///
/// 1. Prompt for the subject (or use provided)
/// 2. Sign claims with `sub`, `roles`, `iat` and `exp = now + ttl`
/// 3. Display the token and an example request
fn issue_token(
    issuer: TokenIssuer,
    subject: Option<String>,
    roles: Vec<String>,
    ttl: i64,
) -> Result<()> {
    println!("{}", "🔑 Issue Token".bright_blue().bold());
    println!();

    if ttl <= 0 {
        anyhow::bail!("--ttl must be positive, got {ttl}");
    }

    let subject = match subject {
        Some(s) => s,
        None => Input::new().with_prompt("Subject").interact_text()?,
    };

    if roles.is_empty() {
        println!(
            "{}",
            "⚠️  No roles given: the token authenticates but cannot call ledger endpoints".yellow()
        );
    }

    let token = issuer
        .issue(&subject, &roles, chrono::Duration::seconds(ttl))
        .context("Failed to sign token")?;

    println!("{}", "Token details:".bright_white().bold());
    println!("  Subject: {}", subject.cyan());
    println!(
        "  Roles:   {}",
        if roles.is_empty() {
            "-".bright_black()
        } else {
            roles.join(", ").cyan()
        }
    );
    println!("  Expires: {}", format!("in {ttl}s").cyan());
    println!("  Token:   {}", token.bright_yellow().bold());
    println!();
    println!("{}", "Add this to your requests:".bright_white());
    println!(
        "  {}: Bearer {}",
        "Authorization".bright_cyan(),
        token.bright_yellow()
    );
    println!();
    println!("{}", "Example:".bright_white());
    println!(
        "  curl -H \"Authorization: Bearer {}\" http://localhost:3000/api/accounts/acc-1",
        token.bright_yellow()
    );
    println!();

    Ok(())
}

/// Verifies a token with the configured secret and prints its identity.
fn inspect_token(verifier: &CredentialVerifier, token: &str) -> Result<()> {
    println!("{}", "🔍 Inspect Token".bright_blue().bold());
    println!();

    match verifier.verify(token.trim()) {
        Ok(identity) => {
            println!("{}", "✅ Token is valid".green().bold());
            println!("  Subject: {}", identity.subject().cyan());
            let roles: Vec<&str> = identity.roles().iter().map(String::as_str).collect();
            println!("  Roles:   {}", roles.join(", ").cyan());
            println!(
                "  Expires: {}",
                identity
                    .expires_at()
                    .format("%Y-%m-%d %H:%M:%S UTC")
                    .to_string()
                    .cyan()
            );
        }
        Err(e) => {
            println!("{} {}", "❌ Token rejected:".red().bold(), e.code().red());
            println!("  {}", e.to_string().bright_black());
        }
    }
    println!();

    Ok(())
}

/// Handles database diagnostic commands.
async fn handle_db_action(action: DbAction, pool: &PgPool) -> Result<()> {
    match action {
        DbAction::Check => {
            println!("{}", "🔍 Checking database connection...".bright_blue());

            sqlx::query("SELECT 1").fetch_one(pool).await?;
            println!("{}", "✅ Database connection OK".green().bold());

            let applied: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM _sqlx_migrations WHERE success",
            )
            .fetch_one(pool)
            .await
            .unwrap_or(0);
            let accounts: Option<i64> = sqlx::query_scalar("SELECT COUNT(*) FROM accounts")
                .fetch_one(pool)
                .await
                .ok();

            println!(
                "  Migrations applied: {}",
                applied.to_string().bright_white().bold()
            );
            match accounts {
                Some(n) => println!("  Accounts:           {}", n.to_string().bright_green().bold()),
                None => println!(
                    "  {}",
                    "⚠️  accounts table missing: start the server once to migrate".yellow()
                ),
            }
        }
    }

    Ok(())
}

/// Handles account commands.
async fn handle_account_action(action: AccountAction, pool: PgPool) -> Result<()> {
    match action {
        AccountAction::Open {
            owner,
            balance,
            id,
            yes,
        } => open_account(pool, owner, balance, id, yes).await,
    }
}

/// Opens an account through the ledger service.
///
/// The fields are checked with the same rules as `POST /api/accounts`
/// before anything is prompted or written.
async fn open_account(
    pool: PgPool,
    owner: String,
    balance: i64,
    id: Option<String>,
    skip_confirm: bool,
) -> Result<()> {
    let request = account_request(owner, balance, id)?;

    println!("{}", "🏦 Open Account".bright_blue().bold());
    println!();
    println!("  Owner:   {}", request.owner.cyan());
    println!("  Balance: {}", request.initial_balance.to_string().cyan());
    if let Some(ref id) = request.id {
        println!("  Id:      {}", id.cyan());
    }
    println!();

    if !skip_confirm {
        let confirmed = Confirm::new()
            .with_prompt("Open this account?")
            .default(true)
            .interact()?;

        if !confirmed {
            println!("{}", "❌ Cancelled".red());
            return Ok(());
        }
    }

    let manager = Arc::new(PgTransactionManager::new(
        Arc::new(pool),
        IsolationLevel::default(),
    ));
    let ledger = LedgerService::new(
        UnitOfWork::new(manager, RetryPolicy::default()),
        Arc::new(PgAccountRepository::new()),
        Arc::new(PgTransferRepository::new()),
    );

    let account = ledger
        .open_account(request)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to open account: {}", e))?;

    println!("{}", "✅ Account opened successfully!".green().bold());
    println!("  Id: {}", account.id.bright_yellow().bold());
    println!();

    Ok(())
}

/// Validates account fields through the API request type.
fn account_request(owner: String, balance: i64, id: Option<String>) -> Result<OpenAccount> {
    let request = OpenAccountRequest {
        id,
        owner,
        initial_balance: balance,
    };
    request
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid account: {}", e))?;
    Ok(request.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_request_applies_api_rules() {
        let ok = account_request("Alice".into(), 100, Some("acc-alice".into())).unwrap();
        assert_eq!(ok.id.as_deref(), Some("acc-alice"));
        assert_eq!(ok.initial_balance, 100);

        assert!(account_request("Alice".into(), 0, None).is_ok());
        assert!(account_request("Alice".into(), 0, Some("acc alice".into())).is_err());
        assert!(account_request("Alice".into(), 0, Some("acc/../x".into())).is_err());
        assert!(account_request("Alice".into(), 0, Some("ab".into())).is_err());
        assert!(account_request(String::new(), 0, None).is_err());
        assert!(account_request("Alice".into(), -5, None).is_err());
    }
}
