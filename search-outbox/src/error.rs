use thiserror::Error;

use crate::domain::WorkItemId;

/// Errors raised while turning operations into queue payloads and back.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Failed to encode operations: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("Failed to decode payload: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("{0}")]
    Other(String),
}

/// Errors raised by the transactional store and its transaction context.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("no active transaction on this context")]
    NoActiveTransaction,
    #[error("a transaction is already active on this context")]
    AlreadyActive,
    #[error("work item not found: {0}")]
    NotFound(WorkItemId),
    #[error("{0}")]
    Other(String),
}

impl StoreError {
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

/// An index applier could not apply one or more operations.
#[derive(Debug, Error)]
#[error("failed to apply work to index '{index}': {message}")]
pub struct ApplyError {
    pub index: String,
    pub message: String,
}

impl ApplyError {
    pub fn new(index: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            message: message.into(),
        }
    }
}

/// Everything the outbox can fail with.
#[derive(Debug, Error)]
pub enum OutboxError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("no index registered under '{0}'")]
    UnknownIndex(String),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Apply(#[from] ApplyError),

    /// The ambient transaction could not be put back on its context. The
    /// caller's transaction is in an unknown state after this.
    #[error("failed to resume ambient transaction: {0}")]
    Resume(#[source] StoreError),
}

impl OutboxError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, OutboxError>;
