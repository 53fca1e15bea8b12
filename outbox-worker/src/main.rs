use std::sync::Arc;
use std::time::Duration;

use search_outbox::adapters::postgres::{self, PgTransactionContext};
use search_outbox::{run_replay_worker, DocumentOperation, JsonCodec, Outbox};
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::document_index::PgDocumentIndex;

mod config;
mod document_index;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = config::read_config()?;

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&settings.application.log_filter)),
        )
        .with(fmt::layer().with_target(true))
        .init();

    info!(
        host = %settings.database.host,
        database = %settings.database.database_name,
        "Connecting to database"
    );
    let pool = PgPoolOptions::new()
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(settings.database.with_db())
        .await?;

    postgres::run_migrations(&pool).await?;
    document_index::run_migrations(&pool).await?;

    let document_index = PgDocumentIndex::new(pool.clone());

    let outbox: Outbox<DocumentOperation, _> = Outbox::new(
        Arc::new(PgTransactionContext::new(pool.clone())),
        Arc::new(PgTransactionContext::new(pool.clone())),
        settings.application.outbox_config(),
    );

    if settings.indexes.is_empty() {
        warn!("No indexes configured, queued work will not be replayed");
    }
    for name in &settings.indexes {
        outbox
            .registry()
            .register(
                name.as_str(),
                Arc::new(JsonCodec::<DocumentOperation>::new()),
                Arc::new(document_index.clone()),
            )
            .await;
    }

    let batch_size = outbox.config().batch_size;

    // Catch up on whatever was queued while the worker was down
    match outbox.replayer().drain_until_empty(batch_size).await {
        Ok(stats) => info!(
            processed = stats.processed,
            skipped = stats.skipped,
            "Startup catch-up finished"
        ),
        Err(e) => error!(error = %e, "Startup catch-up failed"),
    }

    let worker = tokio::spawn(run_replay_worker(
        Arc::clone(outbox.replayer()),
        settings.application.replay_interval(),
        batch_size,
    ));
    let abort_worker = worker.abort_handle();

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Shutting down");
            abort_worker.abort();
        }
        result = worker => {
            if let Err(e) = result {
                error!(error = %e, "Replay worker stopped unexpectedly");
            }
        }
    }

    pool.close().await;
    Ok(())
}
