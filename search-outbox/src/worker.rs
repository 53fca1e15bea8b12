//! Background worker for periodic work queue replay.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use crate::domain::IndexWork;
use crate::ports::TransactionContext;
use crate::replayer::BatchReplayer;

/// Drains the work queue every `interval`, `batch_size` items at a time.
///
/// Drain failures are logged and retried on the next tick. Runs until the
/// task is dropped.
pub async fn run_replay_worker<Op, C>(
    replayer: Arc<BatchReplayer<Op, C>>,
    interval: Duration,
    batch_size: usize,
) where
    Op: IndexWork,
    C: TransactionContext + 'static,
{
    info!(
        interval_ms = interval.as_millis() as u64,
        batch_size,
        "Work queue replay task started"
    );

    let mut ticker = tokio::time::interval(interval);

    // Skip the first immediate tick to let the app fully start
    ticker.tick().await;

    loop {
        ticker.tick().await;

        match replayer.drain(batch_size).await {
            Ok(stats) if stats.selected() == 0 => {}
            Ok(stats) => {
                info!(
                    processed = stats.processed,
                    skipped = stats.skipped,
                    "Replay cycle completed"
                );
            }
            Err(e) => {
                error!(error = %e, "Replay cycle failed, retrying on next tick");
            }
        }
    }
}
