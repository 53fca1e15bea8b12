//! Entry point for index operation batches.

use std::sync::Arc;

use tracing::{debug, info};

use crate::domain::{IndexWork, OperationBatch, WorkItemId};
use crate::error::{OutboxError, Result};
use crate::executor::NestedTransactionExecutor;
use crate::ports::{TransactionContext, WorkQueueStore};
use crate::registry::IndexRegistry;

/// What a submission did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// The batch went straight to the index applier.
    Applied,
    /// The batch was persisted as a new work item.
    Enqueued(WorkItemId),
    /// Nothing was left to persist or apply.
    Discarded,
}

/// Routes batches either to the index or to the work queue.
///
/// Fresh batches are queued in their own transaction; replay batches, which
/// are already durable, are applied directly and never queued again.
pub struct OutboxGateway<Op: IndexWork, C> {
    registry: Arc<IndexRegistry<Op>>,
    executor: NestedTransactionExecutor<C>,
}

impl<Op, C> OutboxGateway<Op, C>
where
    Op: IndexWork,
    C: TransactionContext + 'static,
{
    pub fn new(registry: Arc<IndexRegistry<Op>>, executor: NestedTransactionExecutor<C>) -> Self {
        Self { registry, executor }
    }

    /// Submit `batch` for `target_index`.
    ///
    /// Optimisation directives are dropped from fresh batches before they are
    /// queued; a fresh batch made up only of them is a no-op.
    pub async fn submit(
        &self,
        batch: OperationBatch<Op>,
        target_index: &str,
    ) -> Result<Submission> {
        if target_index.trim().is_empty() {
            return Err(OutboxError::invalid_input("target index must not be blank"));
        }

        match batch {
            OperationBatch::Replay(operations) => self.apply(operations, target_index).await,
            OperationBatch::Fresh(operations) => self.enqueue(operations, target_index).await,
        }
    }

    async fn apply(&self, operations: Vec<Op>, target_index: &str) -> Result<Submission> {
        if operations.is_empty() {
            return Ok(Submission::Discarded);
        }

        let binding = self
            .registry
            .get(target_index)
            .await
            .ok_or_else(|| OutboxError::UnknownIndex(target_index.to_string()))?;

        debug!(
            index = target_index,
            count = operations.len(),
            "Applying replayed operations"
        );
        binding.applier().apply(&operations, target_index).await?;

        Ok(Submission::Applied)
    }

    async fn enqueue(&self, operations: Vec<Op>, target_index: &str) -> Result<Submission> {
        let total = operations.len();
        let operations: Vec<Op> = operations
            .into_iter()
            .filter(|op| !op.is_optimization())
            .collect();

        if operations.is_empty() {
            debug!(
                index = target_index,
                dropped = total,
                "Nothing left to queue after dropping optimisation directives"
            );
            return Ok(Submission::Discarded);
        }

        let binding = self
            .registry
            .get(target_index)
            .await
            .ok_or_else(|| OutboxError::UnknownIndex(target_index.to_string()))?;
        let payload = binding.codec().encode(&operations)?;

        let index = target_index.to_string();
        let id = self
            .executor
            .run_isolated(move |store| {
                Box::pin(async move { Ok(store.insert(&payload, &index).await?) })
            })
            .await?;

        info!(
            index = target_index,
            id = %id,
            count = operations.len(),
            dropped = total - operations.len(),
            "Queued index work"
        );

        Ok(Submission::Enqueued(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DocumentOperation;
    use crate::ports::WorkCodec;
    use crate::testing::{codec, Fixture, RecordingApplier};
    use serde_json::json;

    #[tokio::test]
    async fn fresh_batch_is_queued_once() {
        let fixture = Fixture::with_index("products").await;
        let operations = vec![
            DocumentOperation::add("1", json!({"name": "Keyboard"})),
            DocumentOperation::delete("2"),
        ];

        let outcome = fixture
            .gateway
            .submit(OperationBatch::fresh(operations.clone()), "products")
            .await
            .unwrap();

        let items = fixture.queue().items().await;
        assert_eq!(items.len(), 1);
        assert_eq!(outcome, Submission::Enqueued(items[0].id));
        assert_eq!(items[0].target_index, "products");
        assert_eq!(codec().decode(&items[0].payload).unwrap(), operations);
        assert_eq!(fixture.applier("products").call_count(), 0);
    }

    #[tokio::test]
    async fn optimisation_directives_are_not_queued() {
        let fixture = Fixture::with_index("products").await;
        let operations = vec![
            DocumentOperation::Optimize,
            DocumentOperation::delete("2"),
            DocumentOperation::Optimize,
        ];

        fixture
            .gateway
            .submit(OperationBatch::fresh(operations), "products")
            .await
            .unwrap();

        let items = fixture.queue().items().await;
        assert_eq!(items.len(), 1);
        assert_eq!(
            codec().decode(&items[0].payload).unwrap(),
            vec![DocumentOperation::delete("2")]
        );
    }

    #[tokio::test]
    async fn batch_of_only_optimisations_is_a_no_op() {
        let fixture = Fixture::with_index("products").await;

        let outcome = fixture
            .gateway
            .submit(
                OperationBatch::fresh(vec![DocumentOperation::Optimize, DocumentOperation::Optimize]),
                "products",
            )
            .await
            .unwrap();

        assert_eq!(outcome, Submission::Discarded);
        assert!(fixture.queue().is_empty().await);
    }

    #[tokio::test]
    async fn empty_fresh_batch_is_a_no_op() {
        let fixture = Fixture::with_index("products").await;

        let outcome = fixture
            .gateway
            .submit(OperationBatch::fresh(Vec::new()), "products")
            .await
            .unwrap();

        assert_eq!(outcome, Submission::Discarded);
        assert!(fixture.queue().is_empty().await);
    }

    #[tokio::test]
    async fn replay_batch_is_applied_not_queued() {
        let fixture = Fixture::with_index("products").await;
        let operations = vec![DocumentOperation::delete("9")];

        let outcome = fixture
            .gateway
            .submit(OperationBatch::replay(operations.clone()), "products")
            .await
            .unwrap();

        assert_eq!(outcome, Submission::Applied);
        assert_eq!(
            fixture.applier("products").calls(),
            vec![("products".to_string(), operations)]
        );
        assert!(fixture.queue().is_empty().await);
    }

    #[tokio::test]
    async fn failed_replay_is_not_queued() {
        let fixture = Fixture::new().await;
        fixture
            .register("products", RecordingApplier::failing_on_call(1))
            .await;

        let result = fixture
            .gateway
            .submit(
                OperationBatch::replay(vec![DocumentOperation::delete("9")]),
                "products",
            )
            .await;

        assert!(matches!(result, Err(OutboxError::Apply(_))));
        assert!(fixture.queue().is_empty().await);
    }

    #[tokio::test]
    async fn empty_replay_skips_the_applier() {
        let fixture = Fixture::with_index("products").await;

        let outcome = fixture
            .gateway
            .submit(OperationBatch::replay(Vec::new()), "products")
            .await
            .unwrap();

        assert_eq!(outcome, Submission::Discarded);
        assert_eq!(fixture.applier("products").call_count(), 0);
    }

    #[tokio::test]
    async fn blank_index_is_rejected() {
        let fixture = Fixture::with_index("products").await;

        let result = fixture
            .gateway
            .submit(OperationBatch::fresh(vec![DocumentOperation::delete("1")]), "  ")
            .await;

        assert!(matches!(result, Err(OutboxError::InvalidInput(_))));
        assert!(fixture.queue().is_empty().await);
    }

    #[tokio::test]
    async fn unknown_index_is_rejected() {
        let fixture = Fixture::with_index("products").await;

        let result = fixture
            .gateway
            .submit(OperationBatch::fresh(vec![DocumentOperation::delete("1")]), "orders")
            .await;

        assert!(matches!(result, Err(OutboxError::UnknownIndex(name)) if name == "orders"));
        assert!(fixture.queue().is_empty().await);
    }

    #[tokio::test]
    async fn queued_work_survives_ambient_rollback() {
        let fixture = Fixture::with_index("products").await;
        let ctx = fixture.context();
        ctx.attach(ctx.begin().await.unwrap()).await.unwrap();

        fixture
            .gateway
            .submit(OperationBatch::fresh(vec![DocumentOperation::delete("1")]), "products")
            .await
            .unwrap();

        let ambient = ctx.detach().await.unwrap();
        ctx.rollback(ambient).await.unwrap();

        assert_eq!(fixture.queue().len().await, 1);
    }
}
