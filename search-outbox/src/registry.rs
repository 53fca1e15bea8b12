//! Index name → codec and applier bindings.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use crate::domain::IndexWork;
use crate::ports::{IndexApplier, WorkCodec};

/// The codec and applier serving one index.
pub struct IndexBinding<Op: IndexWork> {
    codec: Arc<dyn WorkCodec<Op>>,
    applier: Arc<dyn IndexApplier<Op>>,
}

impl<Op: IndexWork> IndexBinding<Op> {
    pub fn new(codec: Arc<dyn WorkCodec<Op>>, applier: Arc<dyn IndexApplier<Op>>) -> Self {
        Self { codec, applier }
    }

    pub fn codec(&self) -> &dyn WorkCodec<Op> {
        self.codec.as_ref()
    }

    pub fn applier(&self) -> &dyn IndexApplier<Op> {
        self.applier.as_ref()
    }
}

impl<Op: IndexWork> Clone for IndexBinding<Op> {
    fn clone(&self) -> Self {
        Self {
            codec: Arc::clone(&self.codec),
            applier: Arc::clone(&self.applier),
        }
    }
}

/// Registered indexes, shared by the gateway, the replayer and failure capture.
///
/// Indexes may be registered at any time; queued work for an index that is
/// not registered yet stays in the queue until it is.
pub struct IndexRegistry<Op: IndexWork> {
    bindings: RwLock<HashMap<String, IndexBinding<Op>>>,
}

impl<Op: IndexWork> IndexRegistry<Op> {
    pub fn new() -> Self {
        Self {
            bindings: RwLock::new(HashMap::new()),
        }
    }

    /// Bind `name` to a codec and applier, replacing any previous binding.
    pub async fn register(
        &self,
        name: impl Into<String>,
        codec: Arc<dyn WorkCodec<Op>>,
        applier: Arc<dyn IndexApplier<Op>>,
    ) {
        let name = name.into();
        info!(index = %name, "Registering index");
        self.bindings
            .write()
            .await
            .insert(name, IndexBinding::new(codec, applier));
    }

    pub async fn get(&self, name: &str) -> Option<IndexBinding<Op>> {
        self.bindings.read().await.get(name).cloned()
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.bindings.read().await.contains_key(name)
    }

    /// Registered index names, sorted.
    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.bindings.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn len(&self) -> usize {
        self.bindings.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.bindings.read().await.is_empty()
    }
}

impl<Op: IndexWork> Default for IndexRegistry<Op> {
    fn default() -> Self {
        Self::new()
    }
}
