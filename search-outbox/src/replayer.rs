//! Drains the work queue into the registered indexes.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::domain::{IndexWork, OperationBatch};
use crate::error::{OutboxError, Result};
use crate::executor::NestedTransactionExecutor;
use crate::gateway::OutboxGateway;
use crate::ports::{TransactionContext, WorkQueueStore};
use crate::registry::IndexRegistry;

/// Outcome of a single drain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainStats {
    /// Items applied and deleted.
    pub processed: usize,
    /// Items left in place because their index is not registered.
    pub skipped: usize,
}

impl DrainStats {
    pub fn selected(&self) -> usize {
        self.processed + self.skipped
    }
}

/// Replays queued work items, oldest first.
///
/// A drain is one transaction: an item is deleted only when the whole drain
/// commits, so a failure part-way leaves every selected item queued. Items
/// applied before the failure are applied again on the next drain.
pub struct BatchReplayer<Op: IndexWork, C> {
    registry: Arc<IndexRegistry<Op>>,
    gateway: Arc<OutboxGateway<Op, C>>,
    executor: NestedTransactionExecutor<C>,
}

impl<Op, C> BatchReplayer<Op, C>
where
    Op: IndexWork,
    C: TransactionContext + 'static,
{
    pub fn new(
        registry: Arc<IndexRegistry<Op>>,
        gateway: Arc<OutboxGateway<Op, C>>,
        executor: NestedTransactionExecutor<C>,
    ) -> Self {
        Self {
            registry,
            gateway,
            executor,
        }
    }

    /// Replay up to `max_batch_size` items and return how many were applied.
    pub async fn drain_once(&self, max_batch_size: usize) -> Result<usize> {
        self.drain(max_batch_size).await.map(|stats| stats.processed)
    }

    /// Replay up to `max_batch_size` items.
    #[instrument(name = "BatchReplayer::drain", skip(self))]
    pub async fn drain(&self, max_batch_size: usize) -> Result<DrainStats> {
        if max_batch_size == 0 {
            return Err(OutboxError::invalid_input("batch size must be at least 1"));
        }

        let registry = Arc::clone(&self.registry);
        let gateway = Arc::clone(&self.gateway);

        let stats = self
            .executor
            .run_isolated(move |store| {
                Box::pin(async move {
                    debug!("Work queue processing started");
                    let items = store.select_oldest(max_batch_size).await?;
                    debug!(count = items.len(), "Found queued work items");

                    let mut stats = DrainStats::default();
                    for item in items {
                        let Some(binding) = registry.get(&item.target_index).await else {
                            warn!(
                                index = %item.target_index,
                                id = %item.id,
                                "Work item queued for an unregistered index, leaving it queued"
                            );
                            stats.skipped += 1;
                            continue;
                        };

                        debug!(index = %item.target_index, id = %item.id, "Replaying work item");
                        let operations = binding.codec().decode(&item.payload)?;
                        gateway
                            .submit(OperationBatch::Replay(operations), &item.target_index)
                            .await?;
                        store.delete(item.id).await?;
                        stats.processed += 1;
                    }

                    debug!("Work queue processing finished");
                    Ok(stats)
                })
            })
            .await?;

        debug!(
            processed = stats.processed,
            skipped = stats.skipped,
            "Drained work queue"
        );

        Ok(stats)
    }

    /// Drain repeatedly until a drain comes back short.
    ///
    /// Stops early when a full batch contained nothing replayable, since
    /// draining again would select the same items.
    pub async fn drain_until_empty(&self, max_batch_size: usize) -> Result<DrainStats> {
        let mut total = DrainStats::default();
        loop {
            let stats = self.drain(max_batch_size).await?;
            total.processed += stats.processed;
            total.skipped = stats.skipped;

            if stats.selected() < max_batch_size || stats.processed == 0 {
                return Ok(total);
            }
        }
    }
}
