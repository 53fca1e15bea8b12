//! Runs work in its own transaction, independent of any ambient one.

use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{debug, error};

use crate::error::{OutboxError, Result};
use crate::ports::TransactionContext;

/// Runs tasks in a fresh transaction, suspending the context's ambient
/// transaction for the duration and resuming it afterwards.
///
/// Outbox writes made this way commit or roll back on their own: they survive
/// a later rollback of the caller's transaction and never wait on its locks.
pub struct NestedTransactionExecutor<C> {
    context: Arc<C>,
}

impl<C> Clone for NestedTransactionExecutor<C> {
    fn clone(&self) -> Self {
        Self {
            context: Arc::clone(&self.context),
        }
    }
}

impl<C: TransactionContext> NestedTransactionExecutor<C> {
    pub fn new(context: Arc<C>) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &Arc<C> {
        &self.context
    }

    /// Run `task` in a new transaction.
    ///
    /// The transaction commits when `task` succeeds and rolls back when it or
    /// the commit fails; the failure is returned either way. A suspended
    /// ambient transaction is resumed regardless of the outcome, and failing to
    /// resume it is reported as [`OutboxError::Resume`].
    ///
    /// ```ignore
    /// let id = executor
    ///     .run_isolated(move |store| Box::pin(async move {
    ///         Ok(store.insert(&payload, "products").await?)
    ///     }))
    ///     .await?;
    /// ```
    pub async fn run_isolated<T, F>(&self, task: F) -> Result<T>
    where
        T: Send,
        F: for<'a> FnOnce(&'a mut C::Transaction) -> BoxFuture<'a, Result<T>> + Send,
    {
        let suspended = if self.context.is_active().await {
            debug!("Suspending ambient transaction");
            Some(self.context.suspend().await?)
        } else {
            None
        };

        let outcome = self.run_in_new_transaction(task).await;

        if let Some(suspended) = suspended {
            debug!("Resuming ambient transaction");
            if let Err(e) = self.context.resume(suspended).await {
                error!(error = %e, "Failed to resume ambient transaction");
                if let Err(task_error) = &outcome {
                    error!(error = %task_error, "Isolated task failed before resume");
                }
                return Err(OutboxError::Resume(e));
            }
        }

        outcome
    }

    async fn run_in_new_transaction<T, F>(&self, task: F) -> Result<T>
    where
        T: Send,
        F: for<'a> FnOnce(&'a mut C::Transaction) -> BoxFuture<'a, Result<T>> + Send,
    {
        let mut tx = self.context.begin().await?;

        match task(&mut tx).await {
            Ok(value) => match self.context.commit(tx).await {
                Ok(()) => Ok(value),
                Err(e) => {
                    // The transaction was consumed by the failed commit and is
                    // discarded by the store.
                    error!(error = %e, "Failed to commit isolated transaction");
                    Err(e.into())
                }
            },
            Err(e) => {
                error!(error = %e, "Isolated task failed, rolling back");
                if let Err(rollback_error) = self.context.rollback(tx).await {
                    error!(error = %rollback_error, "Failed to roll back isolated transaction");
                }
                Err(e)
            }
        }
    }
}
