//! In-memory work queue and transaction context.
//!
//! Transactions stage their inserts and deletes privately and publish them on
//! commit, so uncommitted work is invisible to every other transaction. Used
//! by the tests and by embedders that do not need durability.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::Mutex;

use crate::domain::{WorkItem, WorkItemId};
use crate::error::StoreError;
use crate::ports::{TransactionContext, WorkQueueStore};

#[derive(Debug, Default)]
struct QueueState {
    last_id: i64,
    rows: BTreeMap<WorkItemId, WorkItem>,
}

/// Committed queue rows shared by every transaction opened on it.
#[derive(Debug, Clone, Default)]
pub struct InMemoryWorkQueue {
    state: Arc<Mutex<QueueState>>,
}

impl InMemoryWorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed rows in id order.
    pub async fn items(&self) -> Vec<WorkItem> {
        self.state.lock().await.rows.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.rows.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.rows.is_empty()
    }

    /// Ids come from a sequence that is never rolled back, like a database
    /// sequence.
    async fn next_id(&self) -> WorkItemId {
        let mut state = self.state.lock().await;
        state.last_id += 1;
        WorkItemId::new(state.last_id)
    }
}

/// An open transaction on an [`InMemoryWorkQueue`].
#[derive(Debug)]
pub struct MemoryTransaction {
    queue: InMemoryWorkQueue,
    inserted: BTreeMap<WorkItemId, WorkItem>,
    deleted: BTreeSet<WorkItemId>,
}

impl MemoryTransaction {
    fn new(queue: InMemoryWorkQueue) -> Self {
        Self {
            queue,
            inserted: BTreeMap::new(),
            deleted: BTreeSet::new(),
        }
    }

    /// Rows inserted by this transaction and not yet committed.
    pub fn pending_inserts(&self) -> Vec<&WorkItem> {
        self.inserted.values().collect()
    }

    /// Ids deleted by this transaction and not yet committed.
    pub fn pending_deletes(&self) -> Vec<WorkItemId> {
        self.deleted.iter().copied().collect()
    }

    async fn publish(self) {
        let mut state = self.queue.state.lock().await;
        for id in &self.deleted {
            state.rows.remove(id);
        }
        state.rows.extend(self.inserted);
    }
}

#[async_trait]
impl WorkQueueStore for MemoryTransaction {
    async fn insert(
        &mut self,
        payload: &[u8],
        target_index: &str,
    ) -> Result<WorkItemId, StoreError> {
        let id = self.queue.next_id().await;
        self.inserted.insert(
            id,
            WorkItem {
                id,
                payload: payload.to_vec(),
                target_index: target_index.to_string(),
                enqueued_at: OffsetDateTime::now_utc(),
            },
        );
        Ok(id)
    }

    async fn select_oldest(&mut self, limit: usize) -> Result<Vec<WorkItem>, StoreError> {
        let state = self.queue.state.lock().await;
        let mut visible: BTreeMap<WorkItemId, &WorkItem> = state
            .rows
            .iter()
            .filter(|(id, _)| !self.deleted.contains(id))
            .map(|(id, item)| (*id, item))
            .collect();
        visible.extend(self.inserted.iter().map(|(id, item)| (*id, item)));

        Ok(visible.into_values().take(limit).cloned().collect())
    }

    async fn delete(&mut self, id: WorkItemId) -> Result<(), StoreError> {
        if self.inserted.remove(&id).is_some() {
            return Ok(());
        }

        let exists = self.queue.state.lock().await.rows.contains_key(&id);
        if !exists || !self.deleted.insert(id) {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }
}

/// Transaction context over an [`InMemoryWorkQueue`], with switches for
/// failing the next begin, commit or resume.
#[derive(Debug, Default)]
pub struct MemoryTransactionContext {
    queue: InMemoryWorkQueue,
    ambient: Mutex<Option<MemoryTransaction>>,
    fail_next_begin: AtomicBool,
    fail_next_commit: AtomicBool,
    fail_next_resume: AtomicBool,
}

impl MemoryTransactionContext {
    pub fn new(queue: InMemoryWorkQueue) -> Self {
        Self {
            queue,
            ..Default::default()
        }
    }

    pub fn queue(&self) -> &InMemoryWorkQueue {
        &self.queue
    }

    /// Make `tx` the ambient transaction of this context.
    pub async fn attach(&self, tx: MemoryTransaction) -> Result<(), StoreError> {
        let mut ambient = self.ambient.lock().await;
        if ambient.is_some() {
            return Err(StoreError::AlreadyActive);
        }
        *ambient = Some(tx);
        Ok(())
    }

    /// Take the ambient transaction off this context, if any.
    pub async fn detach(&self) -> Option<MemoryTransaction> {
        self.ambient.lock().await.take()
    }

    pub fn fail_next_begin(&self) {
        self.fail_next_begin.store(true, Ordering::SeqCst);
    }

    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    pub fn fail_next_resume(&self) {
        self.fail_next_resume.store(true, Ordering::SeqCst);
    }
}

/// A detached in-memory ambient transaction.
#[derive(Debug)]
pub struct SuspendedMemoryTransaction(MemoryTransaction);

#[async_trait]
impl TransactionContext for MemoryTransactionContext {
    type Transaction = MemoryTransaction;
    type Suspended = SuspendedMemoryTransaction;

    async fn is_active(&self) -> bool {
        self.ambient.lock().await.is_some()
    }

    async fn suspend(&self) -> Result<Self::Suspended, StoreError> {
        self.detach()
            .await
            .map(SuspendedMemoryTransaction)
            .ok_or(StoreError::NoActiveTransaction)
    }

    async fn begin(&self) -> Result<Self::Transaction, StoreError> {
        if self.fail_next_begin.swap(false, Ordering::SeqCst) {
            return Err(StoreError::other("begin failed"));
        }
        Ok(MemoryTransaction::new(self.queue.clone()))
    }

    async fn commit(&self, tx: Self::Transaction) -> Result<(), StoreError> {
        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(StoreError::other("commit failed"));
        }
        tx.publish().await;
        Ok(())
    }

    async fn rollback(&self, _tx: Self::Transaction) -> Result<(), StoreError> {
        Ok(())
    }

    async fn resume(&self, suspended: Self::Suspended) -> Result<(), StoreError> {
        if self.fail_next_resume.swap(false, Ordering::SeqCst) {
            return Err(StoreError::other("resume failed"));
        }
        self.attach(suspended.0).await
    }
}
