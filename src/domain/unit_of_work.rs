//! Unit-of-work: run a sequence of persistence operations as one transaction.
//!
//! # Contract
//!
//! [`UnitOfWork::with_transaction`] begins a transaction, hands the operation
//! sequence a [`TxHandle`], and then:
//!
//! - commits if the sequence returns `Ok`; a failed commit is reported as
//!   [`RepositoryError::CommitFailed`] and nothing is applied
//! - rolls back if the sequence returns `Err`, before the error propagates
//! - replays the whole unit on transient errors (serialization conflicts, pool
//!   exhaustion) up to [`RetryPolicy::max_retries`] times with jittered
//!   exponential backoff; non-transient errors propagate immediately
//!
//! Nested units call [`TxHandle::with_transaction`] on the active handle and
//! join it: no second begin, no inner commit or rollback. The outermost unit
//! alone decides the outcome.
//!
//! # Cancellation
//!
//! The handle owns the backend transaction. If the enclosing future is dropped
//! at any await point the handle is dropped with it, and the backend rolls back
//! and releases its connection on drop.

use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::ops::{Deref, DerefMut};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;
use tokio_retry::strategy::{ExponentialBackoff, jitter};

use crate::error::{RepositoryError, TransientError};

/// Boxed future returned by a unit-of-work body.
pub type TxFuture<'t, R, E> = Pin<Box<dyn Future<Output = Result<R, E>> + Send + 't>>;

/// Transaction primitives supplied by a persistence backend.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::PgTransactionManager`] - PostgreSQL via SQLx
/// - [`crate::infrastructure::persistence::MemoryStore`] - in-process store
#[async_trait]
pub trait TransactionManager: Send + Sync {
    /// Backend transaction type. Dropping it without commit must roll back.
    type Tx: Send + 'static;

    /// Acquires a connection and opens a transaction on it.
    ///
    /// # Errors
    ///
    /// [`RepositoryError::PoolExhausted`] if no connection frees up in time.
    async fn begin(&self) -> Result<Self::Tx, RepositoryError>;

    async fn commit(&self, tx: Self::Tx) -> Result<(), RepositoryError>;

    async fn rollback(&self, tx: Self::Tx) -> Result<(), RepositoryError>;

    /// Liveness check used by the health endpoint.
    async fn health_check(&self) -> bool;
}

/// Bounded retry for transient failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Never replay a failed unit.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delays before each replay: base, 2*base, 4*base, ... capped and jittered.
    fn delays(&self) -> impl Iterator<Item = Duration> + Send + use<> {
        let factor = (self.base_delay.as_millis() as u64 / 2).max(1);

        ExponentialBackoff::from_millis(2)
            .factor(factor)
            .max_delay(self.max_delay)
            .map(jitter)
            .take(self.max_retries as usize)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(25),
            max_delay: Duration::from_secs(1),
        }
    }
}

/// An open transaction, passed explicitly to every operation that must be
/// part of it.
pub struct TxHandle<T> {
    inner: T,
    depth: Arc<AtomicU32>,
    guard: OpenGuard,
}

impl<T> TxHandle<T> {
    fn new(inner: T, id: u64) -> Self {
        Self {
            inner,
            depth: Arc::new(AtomicU32::new(0)),
            guard: OpenGuard { id, armed: true },
        }
    }

    /// Process-unique id, for log correlation.
    pub fn id(&self) -> u64 {
        self.guard.id
    }

    /// Number of nested units currently joined to this transaction. The
    /// outermost unit runs at depth 0.
    pub fn depth(&self) -> u32 {
        self.depth.load(Ordering::Relaxed)
    }

    /// Runs a nested unit inside this transaction.
    ///
    /// The nested body shares the outer transaction: it does not begin, commit
    /// or roll back anything itself. An `Err` it returns is handed back to the
    /// caller, and if that error reaches the outermost unit everything
    /// performed through this handle is rolled back.
    pub async fn with_transaction<'a, F, Fut, R, E>(&'a mut self, f: F) -> Result<R, E>
    where
        F: FnOnce(&'a mut TxHandle<T>) -> Fut,
        Fut: Future<Output = Result<R, E>> + 'a,
    {
        let depth = DepthGuard::enter(self.depth.clone());
        tracing::trace!(tx_id = self.guard.id, depth = depth.level, "Joining active transaction");
        f(self).await
    }

    fn into_inner(self) -> T {
        let TxHandle {
            inner, mut guard, ..
        } = self;
        guard.armed = false;
        inner
    }
}

impl<T> Deref for TxHandle<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T> DerefMut for TxHandle<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.inner
    }
}

impl<T> fmt::Debug for TxHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxHandle").field("id", &self.guard.id).finish()
    }
}

struct DepthGuard {
    depth: Arc<AtomicU32>,
    level: u32,
}

impl DepthGuard {
    fn enter(depth: Arc<AtomicU32>) -> Self {
        let level = depth.fetch_add(1, Ordering::Relaxed) + 1;
        Self { depth, level }
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        self.depth.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Reports handles dropped before commit or rollback (cancellation).
struct OpenGuard {
    id: u64,
    armed: bool,
}

impl Drop for OpenGuard {
    fn drop(&mut self) {
        if self.armed {
            tracing::warn!(
                tx_id = self.id,
                "Transaction dropped before completion, rolling back"
            );
            metrics::counter!("transactions_rolled_back_total", "reason" => "cancelled")
                .increment(1);
        }
    }
}

enum Failure<E> {
    /// Begin failed, or the operation sequence returned an error.
    Operation(E),
    Commit(RepositoryError),
}

impl<E> Failure<E>
where
    E: From<RepositoryError> + TransientError + fmt::Display,
{
    fn is_transient(&self) -> bool {
        match self {
            Failure::Operation(e) => e.is_transient(),
            Failure::Commit(e) => e.is_transient(),
        }
    }

    fn into_error(self, attempts: u32) -> E {
        match self {
            Failure::Operation(e) => e,
            Failure::Commit(e) => E::from(RepositoryError::CommitFailed {
                attempts,
                reason: e.to_string(),
            }),
        }
    }

    fn exhausted(self, attempts: u32) -> E {
        let reason = match self {
            Failure::Operation(e) => e.to_string(),
            Failure::Commit(e) => e.to_string(),
        };
        E::from(RepositoryError::CommitFailed { attempts, reason })
    }
}

/// Atomic execution of operation sequences against a [`TransactionManager`].
pub struct UnitOfWork<M: TransactionManager> {
    manager: Arc<M>,
    retry: RetryPolicy,
    next_id: AtomicU64,
}

impl<M: TransactionManager> UnitOfWork<M> {
    pub fn new(manager: Arc<M>, retry: RetryPolicy) -> Self {
        Self {
            manager,
            retry,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn manager(&self) -> &Arc<M> {
        &self.manager
    }

    /// Runs `f` inside a fresh transaction. See the module docs for the
    /// commit, rollback and retry rules.
    ///
    /// `f` may be invoked more than once when transient failures are retried,
    /// so it must not consume captured state.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let receipt = uow
    ///     .with_transaction(|tx| {
    ///         let accounts = accounts.clone();
    ///         Box::pin(async move {
    ///             accounts.adjust_balance(tx, "acc-a", -50).await?;
    ///             accounts.adjust_balance(tx, "acc-b", 50).await?;
    ///             Ok::<_, AppError>(())
    ///         })
    ///     })
    ///     .await?;
    /// ```
    ///
    /// # Errors
    ///
    /// - whatever `f` returned, after rollback
    /// - [`RepositoryError::CommitFailed`] when commit fails or transient
    ///   failures outlast the retry budget
    pub async fn with_transaction<F, R, E>(&self, mut f: F) -> Result<R, E>
    where
        F: for<'t> FnMut(&'t mut TxHandle<M::Tx>) -> TxFuture<'t, R, E> + Send,
        R: Send,
        E: From<RepositoryError> + TransientError + fmt::Display + Send,
    {
        let mut delays = self.retry.delays();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            let failure = match self.attempt(&mut f).await {
                Ok(value) => return Ok(value),
                Err(failure) => failure,
            };

            if !failure.is_transient() {
                return Err(failure.into_error(attempt));
            }

            match delays.next() {
                Some(delay) => {
                    tracing::warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Transient transaction failure, retrying"
                    );
                    metrics::counter!("transaction_retries_total").increment(1);
                    tokio::time::sleep(delay).await;
                }
                None => {
                    tracing::warn!(attempt, "Transaction retry budget exhausted");
                    return Err(failure.exhausted(attempt));
                }
            }
        }
    }

    async fn attempt<F, R, E>(&self, f: &mut F) -> Result<R, Failure<E>>
    where
        F: for<'t> FnMut(&'t mut TxHandle<M::Tx>) -> TxFuture<'t, R, E> + Send,
        R: Send,
        E: From<RepositoryError> + TransientError + fmt::Display + Send,
    {
        let tx = self
            .manager
            .begin()
            .await
            .map_err(|e| Failure::Operation(E::from(e)))?;

        let mut handle = TxHandle::new(tx, self.next_id.fetch_add(1, Ordering::Relaxed));
        let tx_id = handle.id();

        match f(&mut handle).await {
            Ok(value) => match self.manager.commit(handle.into_inner()).await {
                Ok(()) => {
                    tracing::debug!(tx_id, "Transaction committed");
                    metrics::counter!("transactions_committed_total").increment(1);
                    Ok(value)
                }
                Err(e) => {
                    tracing::warn!(tx_id, error = %e, "Commit failed, transaction rolled back");
                    metrics::counter!("transactions_rolled_back_total", "reason" => "commit_failed")
                        .increment(1);
                    Err(Failure::Commit(e))
                }
            },
            Err(e) => {
                if let Err(rollback_err) = self.manager.rollback(handle.into_inner()).await {
                    tracing::warn!(tx_id, error = %rollback_err, "Explicit rollback failed");
                }
                tracing::debug!(tx_id, error = %e, "Transaction rolled back");
                metrics::counter!("transactions_rolled_back_total", "reason" => "operation_failed")
                    .increment(1);
                Err(Failure::Operation(e))
            }
        }
    }
}
