//! PostgreSQL-backed document index the worker replays into.

use async_trait::async_trait;
use search_outbox::{ApplyError, DocumentOperation, IndexApplier};
use sqlx::migrate::{MigrateError, Migrator};
use sqlx::{PgConnection, PgPool};
use tracing::debug;

/// Migrations creating the `indexed_documents` table.
///
/// Shares the migration history with the work queue's migrations, so entries
/// applied by those are tolerated.
pub fn migrator() -> Migrator {
    let mut migrator = sqlx::migrate!("./migrations");
    migrator.set_ignore_missing(true);
    migrator
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), MigrateError> {
    migrator().run(pool).await
}

/// Stores indexed documents as JSONB rows keyed by index and document id.
///
/// Writes are upserts and deletes keyed on `(index_name, document_id)`, so
/// applying the same batch twice leaves the table as applying it once.
#[derive(Clone)]
pub struct PgDocumentIndex {
    pool: PgPool,
}

impl PgDocumentIndex {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn apply_operation(
        conn: &mut PgConnection,
        operation: &DocumentOperation,
        index: &str,
    ) -> Result<(), sqlx::Error> {
        match operation {
            DocumentOperation::Add { id, document } | DocumentOperation::Update { id, document } => {
                sqlx::query(
                    r#"
                    INSERT INTO indexed_documents (index_name, document_id, body)
                    VALUES ($1, $2, $3)
                    ON CONFLICT (index_name, document_id) DO UPDATE SET
                        body = EXCLUDED.body,
                        indexed_at = NOW()
                    "#,
                )
                .bind(index)
                .bind(id)
                .bind(document)
                .execute(&mut *conn)
                .await?;
            }
            DocumentOperation::Delete { id } => {
                sqlx::query(
                    r#"
                    DELETE FROM indexed_documents
                    WHERE index_name = $1 AND document_id = $2
                    "#,
                )
                .bind(index)
                .bind(id)
                .execute(&mut *conn)
                .await?;
            }
            DocumentOperation::PurgeAll => {
                let rows_affected = sqlx::query("DELETE FROM indexed_documents WHERE index_name = $1")
                    .bind(index)
                    .execute(&mut *conn)
                    .await?
                    .rows_affected();
                debug!(index, rows_affected, "Purged index");
            }
            // Every batch is committed as a unit, so there is nothing to flush
            // or compact separately.
            DocumentOperation::Optimize | DocumentOperation::Flush => {
                debug!(index, ?operation, "Ignoring maintenance directive");
            }
        }

        Ok(())
    }
}

#[async_trait]
impl IndexApplier<DocumentOperation> for PgDocumentIndex {
    async fn apply(&self, operations: &[DocumentOperation], index: &str) -> Result<(), ApplyError> {
        let to_apply_error = |e: sqlx::Error| ApplyError::new(index, e.to_string());

        let mut tx = self.pool.begin().await.map_err(to_apply_error)?;
        for operation in operations {
            Self::apply_operation(&mut tx, operation, index)
                .await
                .map_err(to_apply_error)?;
        }
        tx.commit().await.map_err(to_apply_error)?;

        debug!(index, count = operations.len(), "Applied operations");
        Ok(())
    }
}
