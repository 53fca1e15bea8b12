use async_trait::async_trait;

use crate::domain::{WorkItem, WorkItemId};
use crate::error::StoreError;

/// Queue operations, valid only on a handle bound to an open transaction.
#[async_trait]
pub trait WorkQueueStore: Send {
    /// Insert a new row and return the id the store assigned to it.
    async fn insert(&mut self, payload: &[u8], target_index: &str)
        -> Result<WorkItemId, StoreError>;

    /// Up to `limit` rows in ascending id order.
    async fn select_oldest(&mut self, limit: usize) -> Result<Vec<WorkItem>, StoreError>;

    async fn delete(&mut self, id: WorkItemId) -> Result<(), StoreError>;
}

/// Transaction management for one logical caller.
///
/// A context holds at most one ambient transaction. Suspending detaches it
/// without ending it; resuming puts it back. A context must not be driven by
/// more than one caller at a time.
#[async_trait]
pub trait TransactionContext: Send + Sync {
    /// An open transaction, doubling as the store handle bound to it.
    type Transaction: WorkQueueStore + Send;
    /// An ambient transaction that has been detached from the context.
    type Suspended: Send;

    /// Whether an ambient transaction is attached.
    async fn is_active(&self) -> bool;

    /// Detach the ambient transaction. Fails with
    /// [`StoreError::NoActiveTransaction`] when there is none.
    async fn suspend(&self) -> Result<Self::Suspended, StoreError>;

    /// Open a brand-new transaction, independent of any ambient one.
    async fn begin(&self) -> Result<Self::Transaction, StoreError>;

    async fn commit(&self, tx: Self::Transaction) -> Result<(), StoreError>;

    async fn rollback(&self, tx: Self::Transaction) -> Result<(), StoreError>;

    /// Re-attach a previously suspended transaction.
    async fn resume(&self, suspended: Self::Suspended) -> Result<(), StoreError>;
}
