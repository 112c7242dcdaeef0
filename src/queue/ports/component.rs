//! Port to the component directory that owns project and branch metadata.

use super::CeQueueRepositoryResult;
use async_trait::async_trait;

/// Metadata the directory knows about a component.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComponentInfo {
    /// Component uuid.
    pub uuid: String,
    /// Component key.
    pub key: String,
    /// Display name.
    pub name: String,
    /// Owning organization.
    pub organization_uuid: String,
}

/// Read-only lookup of components by uuid.
#[async_trait]
pub trait ComponentDirectory: Send + Sync {
    /// Finds a component by uuid.
    ///
    /// Returns `None` when the directory does not know the component.
    async fn find_by_uuid(&self, uuid: &str) -> CeQueueRepositoryResult<Option<ComponentInfo>>;
}
