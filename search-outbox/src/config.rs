use serde::Deserialize;

/// Default number of work items replayed per drain.
pub const DEFAULT_BATCH_SIZE: usize = 100;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutboxConfig {
    /// Maximum number of work items replayed in one drain transaction.
    pub batch_size: usize,
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}
