//! Ledger operations built on the unit of work.
//!
//! Every operation runs inside exactly one outer transaction. A transfer is
//! the canonical multi-step write: read the source, debit it, credit the
//! destination and journal the movement. Any failing step rolls back the
//! steps before it, so callers never observe a half-applied transfer.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

use crate::domain::entities::{Account, NewAccount, NewTransfer, Transfer, TransferReceipt};
use crate::domain::repositories::{AccountRepository, TransferRepository};
use crate::domain::unit_of_work::{TransactionManager, TxHandle, UnitOfWork};
use crate::error::{AppError, RepositoryError};
use crate::utils::trace_id::random_hex;

/// Upper bound on legs in one batch transfer.
pub const MAX_BATCH_LEGS: usize = 100;
/// Upper bound on transfers returned by one listing.
pub const MAX_LIST_LIMIT: i64 = 100;

/// Request to open an account. A missing id is generated.
#[derive(Debug, Clone)]
pub struct OpenAccount {
    pub id: Option<String>,
    pub owner: String,
    pub initial_balance: i64,
}

/// Ledger operations consumed by HTTP handlers and the admin CLI.
///
/// # Implementations
///
/// - [`LedgerService`] - generic over storage backend
/// - Test mocks available with `cfg(test)`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerOperations: Send + Sync {
    /// Opens a new account.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] for an empty owner or negative balance.
    /// Returns [`AppError::Conflict`] if the id is already taken.
    async fn open_account(&self, request: OpenAccount) -> Result<Account, AppError>;

    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if no account has this id.
    async fn get_account(&self, id: &str) -> Result<Account, AppError>;

    /// Moves `amount` from one account to another as a single unit.
    ///
    /// # Errors
    ///
    /// - [`AppError::Validation`] if the amount is not positive or both sides match
    /// - [`AppError::NotFound`] if either account is missing
    /// - [`AppError::InsufficientFunds`] if the source cannot cover the amount
    /// - [`RepositoryError::CommitFailed`] if the unit could not be committed
    async fn transfer(&self, request: NewTransfer) -> Result<TransferReceipt, AppError>;

    /// Applies every leg or none of them.
    ///
    /// # Errors
    ///
    /// Any error from [`Self::transfer`] for the first failing leg; earlier
    /// legs are rolled back with it.
    async fn batch_transfer(
        &self,
        legs: Vec<NewTransfer>,
    ) -> Result<Vec<TransferReceipt>, AppError>;

    /// Most recent transfers touching `account_id`, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if the account does not exist.
    async fn list_transfers(&self, account_id: &str, limit: i64)
    -> Result<Vec<Transfer>, AppError>;

    /// Whether the storage backend answers.
    async fn health_check(&self) -> bool;
}

/// [`LedgerOperations`] over any [`TransactionManager`] and matching repositories.
pub struct LedgerService<M, A, T>
where
    M: TransactionManager,
    A: AccountRepository<M::Tx>,
    T: TransferRepository<M::Tx>,
{
    uow: UnitOfWork<M>,
    accounts: Arc<A>,
    transfers: Arc<T>,
}

impl<M, A, T> LedgerService<M, A, T>
where
    M: TransactionManager,
    A: AccountRepository<M::Tx>,
    T: TransferRepository<M::Tx>,
{
    pub fn new(uow: UnitOfWork<M>, accounts: Arc<A>, transfers: Arc<T>) -> Self {
        Self {
            uow,
            accounts,
            transfers,
        }
    }

    pub fn unit_of_work(&self) -> &UnitOfWork<M> {
        &self.uow
    }
}

#[async_trait]
impl<M, A, T> LedgerOperations for LedgerService<M, A, T>
where
    M: TransactionManager + 'static,
    A: AccountRepository<M::Tx> + 'static,
    T: TransferRepository<M::Tx> + 'static,
{
    async fn open_account(&self, request: OpenAccount) -> Result<Account, AppError> {
        let new_account = validate_open_account(request)?;
        let accounts = self.accounts.clone();

        let account = self
            .uow
            .with_transaction(move |tx| {
                let accounts = accounts.clone();
                let new_account = new_account.clone();
                Box::pin(async move {
                    accounts
                        .create(&mut **tx, &new_account)
                        .await
                        .map_err(|e| match e {
                            RepositoryError::Constraint(_) => AppError::conflict(
                                "Account already exists",
                                json!({ "account_id": new_account.id }),
                            ),
                            other => other.into(),
                        })
                })
            })
            .await?;

        tracing::info!(account_id = %account.id, owner = %account.owner, "Account opened");
        Ok(account)
    }

    async fn get_account(&self, id: &str) -> Result<Account, AppError> {
        let accounts = self.accounts.clone();
        let id = id.to_string();

        self.uow
            .with_transaction(move |tx| {
                let accounts = accounts.clone();
                let id = id.clone();
                Box::pin(async move { require_account(accounts.as_ref(), tx, &id).await })
            })
            .await
    }

    async fn transfer(&self, request: NewTransfer) -> Result<TransferReceipt, AppError> {
        validate_transfer(&request)?;
        let accounts = self.accounts.clone();
        let transfers = self.transfers.clone();

        let receipt = self
            .uow
            .with_transaction(move |tx| {
                let accounts = accounts.clone();
                let transfers = transfers.clone();
                let request = request.clone();
                Box::pin(async move {
                    execute_transfer(accounts.as_ref(), transfers.as_ref(), tx, &request).await
                })
            })
            .await?;

        tracing::info!(
            transfer_id = receipt.transfer.id,
            from = %receipt.transfer.from_account,
            to = %receipt.transfer.to_account,
            amount = receipt.transfer.amount,
            "Transfer committed"
        );
        Ok(receipt)
    }

    async fn batch_transfer(
        &self,
        legs: Vec<NewTransfer>,
    ) -> Result<Vec<TransferReceipt>, AppError> {
        if legs.is_empty() || legs.len() > MAX_BATCH_LEGS {
            return Err(AppError::bad_request(
                "Batch must contain between 1 and 100 transfers",
                json!({ "legs": legs.len(), "max": MAX_BATCH_LEGS }),
            ));
        }
        for (index, leg) in legs.iter().enumerate() {
            validate_transfer(leg).map_err(|e| with_leg_index(e, index))?;
        }

        let accounts = self.accounts.clone();
        let transfers = self.transfers.clone();
        let legs = Arc::new(legs);

        let receipts = self
            .uow
            .with_transaction(move |tx| {
                let accounts = accounts.clone();
                let transfers = transfers.clone();
                let legs = legs.clone();
                Box::pin(async move {
                    let mut receipts = Vec::with_capacity(legs.len());
                    for (index, leg) in legs.iter().enumerate() {
                        let receipt = tx
                            .with_transaction(|tx| {
                                execute_transfer(accounts.as_ref(), transfers.as_ref(), tx, leg)
                            })
                            .await
                            .map_err(|e| {
                                tracing::debug!(leg = index, error = %e, "Batch leg failed");
                                with_leg_index(e, index)
                            })?;
                        receipts.push(receipt);
                    }
                    Ok::<_, AppError>(receipts)
                })
            })
            .await?;

        tracing::info!(legs = receipts.len(), "Batch transfer committed");
        Ok(receipts)
    }

    async fn list_transfers(
        &self,
        account_id: &str,
        limit: i64,
    ) -> Result<Vec<Transfer>, AppError> {
        if !(1..=MAX_LIST_LIMIT).contains(&limit) {
            return Err(AppError::bad_request(
                "Limit must be between 1 and 100",
                json!({ "limit": limit }),
            ));
        }

        let accounts = self.accounts.clone();
        let transfers = self.transfers.clone();
        let account_id = account_id.to_string();

        self.uow
            .with_transaction(move |tx| {
                let accounts = accounts.clone();
                let transfers = transfers.clone();
                let account_id = account_id.clone();
                Box::pin(async move {
                    require_account(accounts.as_ref(), tx, &account_id).await?;
                    Ok::<_, AppError>(
                        transfers
                            .list_for_account(&mut **tx, &account_id, limit)
                            .await?,
                    )
                })
            })
            .await
    }

    async fn health_check(&self) -> bool {
        self.uow.manager().health_check().await
    }
}

async fn require_account<Tx, A>(
    accounts: &A,
    tx: &mut TxHandle<Tx>,
    id: &str,
) -> Result<Account, AppError>
where
    Tx: Send,
    A: AccountRepository<Tx> + ?Sized,
{
    accounts.find(&mut **tx, id).await?.ok_or_else(|| {
        AppError::not_found("Account not found", json!({ "account_id": id }))
    })
}

/// The four steps of a transfer, all against the caller's transaction.
async fn execute_transfer<Tx, A, T>(
    accounts: &A,
    transfers: &T,
    tx: &mut TxHandle<Tx>,
    request: &NewTransfer,
) -> Result<TransferReceipt, AppError>
where
    Tx: Send,
    A: AccountRepository<Tx> + ?Sized,
    T: TransferRepository<Tx> + ?Sized,
{
    let source = require_account(accounts, tx, &request.from_account).await?;
    if !source.can_cover(request.amount) {
        return Err(AppError::insufficient_funds(
            "Insufficient funds",
            json!({
                "account_id": source.id,
                "balance": source.balance,
                "requested": request.amount,
            }),
        ));
    }

    let debited = accounts
        .adjust_balance(&mut **tx, &request.from_account, -request.amount)
        .await?;

    let credited = accounts
        .adjust_balance(&mut **tx, &request.to_account, request.amount)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound { .. } => AppError::not_found(
                "Destination account not found",
                json!({ "account_id": request.to_account }),
            ),
            other => other.into(),
        })?;

    let transfer = transfers.record(&mut **tx, request).await?;

    Ok(TransferReceipt {
        transfer,
        from_balance: debited.balance,
        to_balance: credited.balance,
    })
}

fn validate_open_account(request: OpenAccount) -> Result<NewAccount, AppError> {
    let owner = request.owner.trim();
    if owner.is_empty() {
        return Err(AppError::bad_request(
            "Owner must not be empty",
            json!({ "field": "owner" }),
        ));
    }
    if request.initial_balance < 0 {
        return Err(AppError::bad_request(
            "Initial balance must not be negative",
            json!({ "initial_balance": request.initial_balance }),
        ));
    }

    Ok(NewAccount {
        id: request
            .id
            .unwrap_or_else(|| format!("acc-{}", random_hex(6))),
        owner: owner.to_string(),
        initial_balance: request.initial_balance,
    })
}

fn validate_transfer(request: &NewTransfer) -> Result<(), AppError> {
    if request.amount <= 0 {
        return Err(AppError::bad_request(
            "Amount must be positive",
            json!({ "amount": request.amount }),
        ));
    }
    if request.from_account == request.to_account {
        return Err(AppError::bad_request(
            "Source and destination must differ",
            json!({ "account_id": request.from_account }),
        ));
    }
    Ok(())
}

/// Tags a client-facing error with the failing batch position.
fn with_leg_index(error: AppError, index: usize) -> AppError {
    match error {
        AppError::Validation { message, details } => AppError::Validation {
            message,
            details: tag_leg(details, index),
        },
        AppError::NotFound { message, details } => AppError::NotFound {
            message,
            details: tag_leg(details, index),
        },
        AppError::InsufficientFunds { message, details } => AppError::InsufficientFunds {
            message,
            details: tag_leg(details, index),
        },
        other => other,
    }
}

fn tag_leg(details: serde_json::Value, index: usize) -> serde_json::Value {
    match details {
        serde_json::Value::Object(mut map) => {
            map.insert("leg".to_string(), json!(index));
            serde_json::Value::Object(map)
        }
        _ => json!({ "leg": index }),
    }
}
