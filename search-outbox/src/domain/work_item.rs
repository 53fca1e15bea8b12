use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;

/// Identifier of a queued work item.
///
/// Wraps i64 to match the BIGSERIAL column. Ids only ever grow, so ordering by
/// id is replay order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkItemId(i64);

impl WorkItemId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for WorkItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for WorkItemId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<WorkItemId> for i64 {
    fn from(id: WorkItemId) -> Self {
        id.0
    }
}

/// A persisted queue row: encoded operations that have not yet been applied
/// to `target_index`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub id: WorkItemId,
    /// Codec-encoded operation sequence.
    pub payload: Vec<u8>,
    pub target_index: String,
    pub enqueued_at: OffsetDateTime,
}
