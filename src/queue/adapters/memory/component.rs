//! In-memory component directory.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::queue::ports::{
    ComponentDirectory, ComponentInfo, CeQueueRepositoryError, CeQueueRepositoryResult,
};

/// Component directory backed by a map, populated by the embedding
/// application or by tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryComponentDirectory {
    components: Arc<RwLock<HashMap<String, ComponentInfo>>>,
}

impl InMemoryComponentDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a component.
    ///
    /// # Errors
    ///
    /// Returns [`CeQueueRepositoryError::Persistence`] when the lock is
    /// poisoned.
    pub fn insert(&self, component: ComponentInfo) -> CeQueueRepositoryResult<()> {
        let mut components = self.components.write().map_err(|err| {
            CeQueueRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })?;
        components.insert(component.uuid.clone(), component);
        Ok(())
    }
}

#[async_trait]
impl ComponentDirectory for InMemoryComponentDirectory {
    async fn find_by_uuid(&self, uuid: &str) -> CeQueueRepositoryResult<Option<ComponentInfo>> {
        let components = self.components.read().map_err(|err| {
            CeQueueRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })?;
        Ok(components.get(uuid).cloned())
    }
}
