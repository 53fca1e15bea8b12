//! Feeds operations that failed to apply back into the work queue.

use std::error::Error as StdError;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::{IndexWork, WorkItemId};
use crate::error::{OutboxError, Result};
use crate::executor::NestedTransactionExecutor;
use crate::ports::{TransactionContext, WorkQueueStore};
use crate::registry::IndexRegistry;

/// A failure reported by the indexing side.
#[derive(Debug)]
pub struct ApplyFailure<Op> {
    pub target_index: String,
    /// The operation that triggered the failure, if known.
    pub operation_at_fault: Option<Op>,
    /// Further operations that could not be applied because of it.
    pub failing_operations: Vec<Op>,
    pub error: String,
}

impl<Op> ApplyFailure<Op> {
    pub fn new(target_index: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            target_index: target_index.into(),
            operation_at_fault: None,
            failing_operations: Vec::new(),
            error: error.into(),
        }
    }

    pub fn with_operation_at_fault(mut self, operation: Op) -> Self {
        self.operation_at_fault = Some(operation);
        self
    }

    pub fn with_failing_operations(mut self, operations: Vec<Op>) -> Self {
        self.failing_operations = operations;
        self
    }

    /// Everything that should be retried: the operation at fault first.
    pub fn into_retry_operations(self) -> Vec<Op> {
        self.operation_at_fault
            .into_iter()
            .chain(self.failing_operations)
            .collect()
    }
}

/// Re-enqueues failed operations so the next drain retries them.
///
/// There is no attempt counter: an operation that never applies is retried on
/// every drain.
pub struct FailureCapture<Op: IndexWork, C> {
    registry: Arc<IndexRegistry<Op>>,
    executor: NestedTransactionExecutor<C>,
}

impl<Op, C> FailureCapture<Op, C>
where
    Op: IndexWork,
    C: TransactionContext + 'static,
{
    pub fn new(registry: Arc<IndexRegistry<Op>>, executor: NestedTransactionExecutor<C>) -> Self {
        Self { registry, executor }
    }

    /// Queue `failed_operations` for `target_index` as a new work item.
    ///
    /// Returns `None` when there was nothing to queue.
    pub async fn on_apply_failure(
        &self,
        failed_operations: Vec<Op>,
        target_index: &str,
    ) -> Result<Option<WorkItemId>> {
        if failed_operations.is_empty() {
            debug!(index = target_index, "No failed operations to re-enqueue");
            return Ok(None);
        }

        let binding = self
            .registry
            .get(target_index)
            .await
            .ok_or_else(|| OutboxError::UnknownIndex(target_index.to_string()))?;
        let payload = binding.codec().encode(&failed_operations)?;

        let index = target_index.to_string();
        let id = self
            .executor
            .run_isolated(move |store| {
                Box::pin(async move { Ok(store.insert(&payload, &index).await?) })
            })
            .await?;

        warn!(
            index = target_index,
            id = %id,
            count = failed_operations.len(),
            "Re-enqueued operations that failed to apply"
        );

        Ok(Some(id))
    }

    /// Handle a failure reported by the indexing side.
    pub async fn handle(&self, failure: ApplyFailure<Op>) -> Result<Option<WorkItemId>> {
        let index = failure.target_index.clone();
        let error = failure.error.clone();
        let operations = failure.into_retry_operations();

        warn!(
            index = %index,
            count = operations.len(),
            error = %error,
            "Indexing failed"
        );

        self.on_apply_failure(operations, &index).await
    }

    /// Handle a failure that has no operations attached. Only logged.
    pub fn handle_exception(&self, message: &str, error: &(dyn StdError + 'static)) {
        warn!(context = message, error = %error, "Indexing raised an error");
    }
}
