//! Wires the gateway, replayer and failure capture around one context.

use std::sync::Arc;

use crate::config::OutboxConfig;
use crate::domain::{IndexWork, OperationBatch};
use crate::error::Result;
use crate::executor::NestedTransactionExecutor;
use crate::failure_capture::FailureCapture;
use crate::gateway::{OutboxGateway, Submission};
use crate::ports::TransactionContext;
use crate::registry::IndexRegistry;
use crate::replayer::BatchReplayer;

/// The outbox components, sharing one registry and one transaction context.
pub struct Outbox<Op: IndexWork, C> {
    config: OutboxConfig,
    registry: Arc<IndexRegistry<Op>>,
    gateway: Arc<OutboxGateway<Op, C>>,
    replayer: Arc<BatchReplayer<Op, C>>,
    failure_capture: Arc<FailureCapture<Op, C>>,
}

impl<Op: IndexWork, C> Clone for Outbox<Op, C> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            registry: Arc::clone(&self.registry),
            gateway: Arc::clone(&self.gateway),
            replayer: Arc::clone(&self.replayer),
            failure_capture: Arc::clone(&self.failure_capture),
        }
    }
}

impl<Op, C> Outbox<Op, C>
where
    Op: IndexWork,
    C: TransactionContext + 'static,
{
    /// Build the components over two contexts.
    ///
    /// `write_context` is the one callers attach their ambient transactions to;
    /// the gateway queues fresh work through it. `replay_context` drives the
    /// replayer and failure capture, which may run in the background and must
    /// never suspend a caller's transaction. Both must reach the same store.
    pub fn new(write_context: Arc<C>, replay_context: Arc<C>, config: OutboxConfig) -> Self {
        let registry = Arc::new(IndexRegistry::new());
        let write_executor = NestedTransactionExecutor::new(write_context);
        let replay_executor = NestedTransactionExecutor::new(replay_context);
        let gateway = Arc::new(OutboxGateway::new(Arc::clone(&registry), write_executor));
        let replayer = Arc::new(BatchReplayer::new(
            Arc::clone(&registry),
            Arc::clone(&gateway),
            replay_executor.clone(),
        ));
        let failure_capture = Arc::new(FailureCapture::new(
            Arc::clone(&registry),
            replay_executor,
        ));

        Self {
            config,
            registry,
            gateway,
            replayer,
            failure_capture,
        }
    }

    pub fn config(&self) -> &OutboxConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<IndexRegistry<Op>> {
        &self.registry
    }

    pub fn gateway(&self) -> &Arc<OutboxGateway<Op, C>> {
        &self.gateway
    }

    pub fn replayer(&self) -> &Arc<BatchReplayer<Op, C>> {
        &self.replayer
    }

    pub fn failure_capture(&self) -> &Arc<FailureCapture<Op, C>> {
        &self.failure_capture
    }

    pub async fn submit(&self, batch: OperationBatch<Op>, target_index: &str) -> Result<Submission> {
        self.gateway.submit(batch, target_index).await
    }

    /// Drain one batch of the configured size.
    pub async fn drain_once(&self) -> Result<usize> {
        self.replayer.drain_once(self.config.batch_size).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryWorkQueue, MemoryTransactionContext};
    use crate::domain::DocumentOperation;
    use crate::testing::{codec, RecordingApplier};

    #[tokio::test]
    async fn submit_then_drain_reaches_the_index() {
        let queue = InMemoryWorkQueue::new();
        let outbox = Outbox::new(
            Arc::new(MemoryTransactionContext::new(queue.clone())),
            Arc::new(MemoryTransactionContext::new(queue.clone())),
            OutboxConfig { batch_size: 1 },
        );
        let applier = RecordingApplier::new();
        outbox
            .registry()
            .register("products", Arc::new(codec()), Arc::new(applier.clone()))
            .await;

        outbox
            .submit(OperationBatch::fresh(vec![DocumentOperation::delete("1")]), "products")
            .await
            .unwrap();
        outbox
            .submit(OperationBatch::fresh(vec![DocumentOperation::delete("2")]), "products")
            .await
            .unwrap();

        assert_eq!(outbox.drain_once().await.unwrap(), 1);
        assert_eq!(queue.len().await, 1);
        assert_eq!(outbox.drain_once().await.unwrap(), 1);
        assert!(queue.is_empty().await);
        assert_eq!(applier.applied_ids(), vec!["1", "2"]);
    }

    #[tokio::test]
    async fn drain_runs_on_its_own_context() {
        let queue = InMemoryWorkQueue::new();
        let write_context = Arc::new(MemoryTransactionContext::new(queue.clone()));
        let replay_context = Arc::new(MemoryTransactionContext::new(queue.clone()));
        let outbox = Outbox::new(
            Arc::clone(&write_context),
            Arc::clone(&replay_context),
            OutboxConfig::default(),
        );
        outbox
            .registry()
            .register("products", Arc::new(codec()), Arc::new(RecordingApplier::new()))
            .await;
        outbox
            .submit(OperationBatch::fresh(vec![DocumentOperation::delete("1")]), "products")
            .await
            .unwrap();

        write_context
            .attach(write_context.begin().await.unwrap())
            .await
            .unwrap();
        assert_eq!(outbox.drain_once().await.unwrap(), 1);

        assert!(write_context.is_active().await);
        assert!(!replay_context.is_active().await);
        assert!(queue.is_empty().await);
    }
}
