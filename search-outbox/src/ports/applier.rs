use async_trait::async_trait;

use crate::domain::IndexWork;
use crate::error::ApplyError;

/// Applies operations to a live search index.
///
/// Replay is at-least-once: a crash between a successful apply and the commit
/// that deletes the queued row re-delivers the same operations on the next
/// drain. Implementations must therefore be idempotent.
#[async_trait]
pub trait IndexApplier<Op: IndexWork>: Send + Sync {
    async fn apply(&self, operations: &[Op], index: &str) -> Result<(), ApplyError>;
}
