//! PostgreSQL work queue and transaction context.

use async_trait::async_trait;
use sqlx::migrate::Migrator;
use sqlx::{FromRow, PgConnection, PgPool, Postgres, Transaction};
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::debug;

use crate::domain::{WorkItem, WorkItemId};
use crate::error::StoreError;
use crate::ports::{TransactionContext, WorkQueueStore};

/// Migrations creating the `index_work_queue` table.
///
/// Migrations applied by other crates to the same database are tolerated.
pub fn migrator() -> Migrator {
    let mut migrator = sqlx::migrate!("./migrations");
    migrator.set_ignore_missing(true);
    migrator
}

/// Run the queue migrations against `pool`.
pub async fn run_migrations(pool: &PgPool) -> Result<(), StoreError> {
    migrator().run(pool).await?;
    Ok(())
}

/// An open Postgres transaction, usable as a work queue handle.
pub struct PgQueueTransaction {
    tx: Transaction<'static, Postgres>,
}

impl PgQueueTransaction {
    pub fn new(tx: Transaction<'static, Postgres>) -> Self {
        Self { tx }
    }

    /// The underlying connection, for the caller's own statements.
    pub fn connection(&mut self) -> &mut PgConnection {
        &mut self.tx
    }

    pub fn into_inner(self) -> Transaction<'static, Postgres> {
        self.tx
    }
}

#[derive(FromRow)]
struct WorkItemRow {
    id: i64,
    payload: Vec<u8>,
    target_index: String,
    enqueued_at: OffsetDateTime,
}

impl From<WorkItemRow> for WorkItem {
    fn from(row: WorkItemRow) -> Self {
        WorkItem {
            id: WorkItemId::new(row.id),
            payload: row.payload,
            target_index: row.target_index,
            enqueued_at: row.enqueued_at,
        }
    }
}

#[async_trait]
impl WorkQueueStore for PgQueueTransaction {
    async fn insert(
        &mut self,
        payload: &[u8],
        target_index: &str,
    ) -> Result<WorkItemId, StoreError> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO index_work_queue (payload, target_index)
            VALUES ($1, $2)
            RETURNING id
            "#,
        )
        .bind(payload)
        .bind(target_index)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(WorkItemId::new(id))
    }

    async fn select_oldest(&mut self, limit: usize) -> Result<Vec<WorkItem>, StoreError> {
        // Row locks make concurrent drains wait for each other instead of
        // replaying the same rows.
        let rows: Vec<WorkItemRow> = sqlx::query_as(
            r#"
            SELECT id, payload, target_index, enqueued_at
            FROM index_work_queue
            ORDER BY id ASC
            LIMIT $1
            FOR UPDATE
            "#,
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows.into_iter().map(WorkItem::from).collect())
    }

    async fn delete(&mut self, id: WorkItemId) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM index_work_queue
            WHERE id = $1
            "#,
        )
        .bind(id.as_i64())
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }
}

/// Transaction context backed by a connection pool.
///
/// The ambient transaction is whatever the caller attached; isolated
/// transactions run on their own pooled connection, so they neither see nor
/// wait on the ambient transaction's uncommitted writes.
///
/// A context serves one logical caller at a time. Background replay needs a
/// context of its own, separate from the one request handlers attach to.
pub struct PgTransactionContext {
    pool: PgPool,
    ambient: Mutex<Option<PgQueueTransaction>>,
}

/// A detached Postgres ambient transaction.
pub struct SuspendedPgTransaction(PgQueueTransaction);

impl PgTransactionContext {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            ambient: Mutex::new(None),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Begin a transaction and make it the ambient one.
    pub async fn begin_ambient(&self) -> Result<(), StoreError> {
        let tx = self.pool.begin().await?;
        self.attach(tx).await
    }

    /// Make `tx` the ambient transaction of this context.
    pub async fn attach(&self, tx: Transaction<'static, Postgres>) -> Result<(), StoreError> {
        let mut ambient = self.ambient.lock().await;
        if ambient.is_some() {
            return Err(StoreError::AlreadyActive);
        }
        *ambient = Some(PgQueueTransaction::new(tx));
        Ok(())
    }

    /// Take the ambient transaction off this context, if any.
    pub async fn detach(&self) -> Option<Transaction<'static, Postgres>> {
        self.ambient
            .lock()
            .await
            .take()
            .map(PgQueueTransaction::into_inner)
    }
}

#[async_trait]
impl TransactionContext for PgTransactionContext {
    type Transaction = PgQueueTransaction;
    type Suspended = SuspendedPgTransaction;

    async fn is_active(&self) -> bool {
        self.ambient.lock().await.is_some()
    }

    async fn suspend(&self) -> Result<Self::Suspended, StoreError> {
        self.ambient
            .lock()
            .await
            .take()
            .map(SuspendedPgTransaction)
            .ok_or(StoreError::NoActiveTransaction)
    }

    async fn begin(&self) -> Result<Self::Transaction, StoreError> {
        let tx = self.pool.begin().await?;
        debug!("Began isolated transaction");
        Ok(PgQueueTransaction::new(tx))
    }

    async fn commit(&self, tx: Self::Transaction) -> Result<(), StoreError> {
        tx.tx.commit().await?;
        Ok(())
    }

    async fn rollback(&self, tx: Self::Transaction) -> Result<(), StoreError> {
        tx.tx.rollback().await?;
        Ok(())
    }

    async fn resume(&self, suspended: Self::Suspended) -> Result<(), StoreError> {
        let mut ambient = self.ambient.lock().await;
        if ambient.is_some() {
            return Err(StoreError::AlreadyActive);
        }
        *ambient = Some(suspended.0);
        Ok(())
    }
}
