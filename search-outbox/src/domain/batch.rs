/// An in-flight batch of index operations.
///
/// `Replay` batches were decoded from the queue and are already durable; the
/// gateway applies them directly and never writes them back to the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationBatch<Op> {
    /// Produced by an application write, not yet persisted or applied.
    Fresh(Vec<Op>),
    /// Decoded from a queued work item.
    Replay(Vec<Op>),
}

impl<Op> OperationBatch<Op> {
    pub fn fresh(operations: impl Into<Vec<Op>>) -> Self {
        Self::Fresh(operations.into())
    }

    pub fn replay(operations: impl Into<Vec<Op>>) -> Self {
        Self::Replay(operations.into())
    }

    pub fn is_replay(&self) -> bool {
        matches!(self, Self::Replay(_))
    }

    pub fn operations(&self) -> &[Op] {
        match self {
            Self::Fresh(ops) | Self::Replay(ops) => ops,
        }
    }

    pub fn into_operations(self) -> Vec<Op> {
        match self {
            Self::Fresh(ops) | Self::Replay(ops) => ops,
        }
    }

    pub fn len(&self) -> usize {
        self.operations().len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations().is_empty()
    }
}
