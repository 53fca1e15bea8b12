//! Shared test doubles.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::adapters::memory::{InMemoryWorkQueue, MemoryTransactionContext};
use crate::codec::JsonCodec;
use crate::domain::DocumentOperation;
use crate::error::ApplyError;
use crate::executor::NestedTransactionExecutor;
use crate::failure_capture::FailureCapture;
use crate::gateway::OutboxGateway;
use crate::ports::IndexApplier;
use crate::registry::IndexRegistry;
use crate::replayer::BatchReplayer;

pub fn codec() -> JsonCodec<DocumentOperation> {
    JsonCodec::new()
}

/// Applier that records every call and can fail a chosen call.
#[derive(Clone, Default)]
pub struct RecordingApplier {
    calls: Arc<Mutex<Vec<(String, Vec<DocumentOperation>)>>>,
    applied_ids: Arc<Mutex<Vec<String>>>,
    call_count: Arc<AtomicUsize>,
    fail_on_call: Option<usize>,
}

impl RecordingApplier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the `n`th call (1-based); every other call succeeds.
    pub fn failing_on_call(n: usize) -> Self {
        Self {
            fail_on_call: Some(n),
            ..Self::default()
        }
    }

    /// Every call, successful or not, in order.
    pub fn calls(&self) -> Vec<(String, Vec<DocumentOperation>)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Document ids of operations from successful calls, in order.
    pub fn applied_ids(&self) -> Vec<String> {
        self.applied_ids.lock().unwrap().clone()
    }
}

#[async_trait]
impl IndexApplier<DocumentOperation> for RecordingApplier {
    async fn apply(&self, operations: &[DocumentOperation], index: &str) -> Result<(), ApplyError> {
        let n = self.call_count.fetch_add(1, Ordering::SeqCst) + 1;
        self.calls
            .lock()
            .unwrap()
            .push((index.to_string(), operations.to_vec()));

        if self.fail_on_call == Some(n) {
            return Err(ApplyError::new(index, format!("injected failure on call {n}")));
        }

        self.applied_ids.lock().unwrap().extend(
            operations
                .iter()
                .filter_map(|op| op.document_id().map(str::to_string)),
        );
        Ok(())
    }
}

type Context = MemoryTransactionContext;

/// The outbox components over an in-memory queue.
pub struct Fixture {
    pub registry: Arc<IndexRegistry<DocumentOperation>>,
    pub gateway: Arc<OutboxGateway<DocumentOperation, Context>>,
    pub replayer: Arc<BatchReplayer<DocumentOperation, Context>>,
    pub failure_capture: FailureCapture<DocumentOperation, Context>,
    context: Arc<Context>,
    replay_context: Arc<Context>,
    appliers: Mutex<HashMap<String, RecordingApplier>>,
}

impl Fixture {
    pub async fn new() -> Self {
        let queue = InMemoryWorkQueue::new();
        let context = Arc::new(MemoryTransactionContext::new(queue.clone()));
        let replay_context = Arc::new(MemoryTransactionContext::new(queue));
        let registry = Arc::new(IndexRegistry::new());
        let replay_executor = NestedTransactionExecutor::new(Arc::clone(&replay_context));
        let gateway = Arc::new(OutboxGateway::new(
            Arc::clone(&registry),
            NestedTransactionExecutor::new(Arc::clone(&context)),
        ));
        let replayer = Arc::new(BatchReplayer::new(
            Arc::clone(&registry),
            Arc::clone(&gateway),
            replay_executor.clone(),
        ));
        let failure_capture = FailureCapture::new(Arc::clone(&registry), replay_executor);

        Self {
            registry,
            gateway,
            replayer,
            failure_capture,
            context,
            replay_context,
            appliers: Mutex::new(HashMap::new()),
        }
    }

    /// A fixture with `index` registered to a succeeding applier.
    pub async fn with_index(index: &str) -> Self {
        let fixture = Self::new().await;
        fixture.register(index, RecordingApplier::new()).await;
        fixture
    }

    pub async fn register(&self, index: &str, applier: RecordingApplier) {
        self.register_applier(index, Arc::new(applier.clone())).await;
        self.appliers
            .lock()
            .unwrap()
            .insert(index.to_string(), applier);
    }

    /// Register any applier, without keeping a handle to it.
    pub async fn register_applier(
        &self,
        index: &str,
        applier: Arc<dyn IndexApplier<DocumentOperation>>,
    ) {
        self.registry.register(index, Arc::new(codec()), applier).await;
    }

    pub fn applier(&self, index: &str) -> RecordingApplier {
        self.appliers.lock().unwrap()[index].clone()
    }

    /// The context callers attach their ambient transactions to.
    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }

    /// The context the replayer and failure capture run on.
    pub fn replay_context(&self) -> &Arc<Context> {
        &self.replay_context
    }

    pub fn queue(&self) -> &InMemoryWorkQueue {
        self.context.queue()
    }
}
