//! Search Outbox - durable, ordered queue of search index work.
//!
//! Index operations produced by application writes are not applied to the
//! search index inline. They are persisted as work items in a relational
//! store, in a transaction of their own, and replayed into the index later.
//! An index that is slow or down therefore never loses an update, and a
//! replayed update is never queued a second time.
//!
//! # Architecture
//!
//! - [`OutboxGateway`] - receives batches: fresh ones are queued, replayed
//!   ones go straight to the index
//! - [`NestedTransactionExecutor`] - runs queue writes in a new transaction,
//!   suspending and resuming the caller's ambient transaction
//! - [`BatchReplayer`] - drains the queue oldest-first, deleting each item in
//!   the same transaction that applied it
//! - [`FailureCapture`] - puts operations the index failed to apply back on
//!   the queue
//!
//! The collaborators are traits, so the store and the index can be swapped
//! for in-memory doubles:
//!
//! - [`WorkCodec`] - operation sequence ⇄ payload bytes
//! - [`IndexApplier`] - applies operations to a live index
//! - [`WorkQueueStore`] / [`TransactionContext`] - the transactional store
//!
//! # Example
//!
//! ```ignore
//! use search_outbox::adapters::postgres::PgTransactionContext;
//! use search_outbox::{DocumentOperation, JsonCodec, OperationBatch, Outbox, OutboxConfig};
//!
//! // Request handlers attach their transactions to the write context; the
//! // background replay gets a context of its own.
//! let write_context = Arc::new(PgTransactionContext::new(pool.clone()));
//! let replay_context = Arc::new(PgTransactionContext::new(pool));
//! let outbox = Outbox::new(write_context, replay_context, OutboxConfig::default());
//! outbox
//!     .registry()
//!     .register("products", Arc::new(JsonCodec::new()), Arc::new(applier))
//!     .await;
//!
//! outbox
//!     .submit(OperationBatch::fresh(vec![DocumentOperation::delete("42")]), "products")
//!     .await?;
//! let replayed = outbox.drain_once().await?;
//! ```
//!
//! # Delivery
//!
//! Replay is at-least-once. Applying to the index and deleting the queued row
//! are two systems; a crash between them re-delivers the item, so appliers
//! must be idempotent. There is no retry limit or dead-letter queue: work that
//! never applies stays queued and is retried on every drain.

pub mod adapters;
mod codec;
mod config;
mod domain;
mod error;
mod executor;
mod failure_capture;
mod gateway;
mod outbox;
mod ports;
mod registry;
mod replayer;
mod worker;

#[cfg(test)]
mod testing;

pub use codec::JsonCodec;
pub use config::{OutboxConfig, DEFAULT_BATCH_SIZE};
pub use domain::{DocumentOperation, IndexWork, OperationBatch, WorkItem, WorkItemId};
pub use error::{ApplyError, CodecError, OutboxError, Result, StoreError};
pub use executor::NestedTransactionExecutor;
pub use failure_capture::{ApplyFailure, FailureCapture};
pub use gateway::{OutboxGateway, Submission};
pub use outbox::Outbox;
pub use ports::{IndexApplier, TransactionContext, WorkCodec, WorkQueueStore};
pub use registry::{IndexBinding, IndexRegistry};
pub use replayer::{BatchReplayer, DrainStats};
pub use worker::run_replay_worker;
