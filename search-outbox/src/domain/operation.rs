//! Index operations carried through the outbox.

use serde::{Deserialize, Serialize};

/// Marker for anything the outbox can queue and replay.
///
/// Operations are otherwise opaque to the outbox; the only thing it needs to
/// know is whether an operation is an optimisation hint, which is dropped
/// instead of being persisted.
pub trait IndexWork: Send + Sync + 'static {
    fn is_optimization(&self) -> bool;
}

/// Document-level index operations.
///
/// `Optimize` is a maintenance hint for the index and is never queued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DocumentOperation {
    Add {
        id: String,
        document: serde_json::Value,
    },
    Update {
        id: String,
        document: serde_json::Value,
    },
    Delete {
        id: String,
    },
    PurgeAll,
    Optimize,
    Flush,
}

impl DocumentOperation {
    pub fn add(id: impl Into<String>, document: serde_json::Value) -> Self {
        Self::Add {
            id: id.into(),
            document,
        }
    }

    pub fn update(id: impl Into<String>, document: serde_json::Value) -> Self {
        Self::Update {
            id: id.into(),
            document,
        }
    }

    pub fn delete(id: impl Into<String>) -> Self {
        Self::Delete { id: id.into() }
    }

    /// The document this operation targets, if it targets a single one.
    pub fn document_id(&self) -> Option<&str> {
        match self {
            Self::Add { id, .. } | Self::Update { id, .. } | Self::Delete { id } => Some(id),
            Self::PurgeAll | Self::Optimize | Self::Flush => None,
        }
    }
}

impl IndexWork for DocumentOperation {
    fn is_optimization(&self) -> bool {
        matches!(self, Self::Optimize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn only_optimize_is_an_optimization() {
        assert!(DocumentOperation::Optimize.is_optimization());
        assert!(!DocumentOperation::Flush.is_optimization());
        assert!(!DocumentOperation::PurgeAll.is_optimization());
        assert!(!DocumentOperation::delete("1").is_optimization());
        assert!(!DocumentOperation::add("1", json!({})).is_optimization());
    }

    #[test]
    fn document_id() {
        assert_eq!(
            DocumentOperation::update("42", json!({"title": "x"})).document_id(),
            Some("42")
        );
        assert_eq!(DocumentOperation::PurgeAll.document_id(), None);
    }

    #[test]
    fn serializes_with_kind_tag() {
        let op = DocumentOperation::delete("7");
        let value = serde_json::to_value(&op).unwrap();
        assert_eq!(value, json!({"kind": "delete", "id": "7"}));
    }
}
