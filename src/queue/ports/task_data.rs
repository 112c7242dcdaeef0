//! Port for the binary payloads attached to tasks.

use super::CeQueueRepositoryResult;
use crate::queue::domain::TaskUuid;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Storage of task-input payloads and scanner-context blobs.
#[async_trait]
pub trait CeTaskDataRepository: Send + Sync {
    /// Stores the input payload of a task, replacing any previous one.
    async fn insert_task_input(
        &self,
        uuid: &TaskUuid,
        data: Vec<u8>,
        now: DateTime<Utc>,
    ) -> CeQueueRepositoryResult<()>;

    /// Reads the input payload of a task.
    async fn find_task_input(&self, uuid: &TaskUuid) -> CeQueueRepositoryResult<Option<Vec<u8>>>;

    /// Stores the scanner context of a task, replacing any previous one.
    async fn insert_scanner_context(
        &self,
        uuid: &TaskUuid,
        data: Vec<u8>,
        now: DateTime<Utc>,
    ) -> CeQueueRepositoryResult<()>;

    /// Reads the scanner context of a task.
    async fn find_scanner_context(
        &self,
        uuid: &TaskUuid,
    ) -> CeQueueRepositoryResult<Option<Vec<u8>>>;

    /// Deletes inputs whose task has no queue row.
    ///
    /// Returns the number of payloads deleted.
    async fn delete_task_inputs_without_queue_entry(&self) -> CeQueueRepositoryResult<u64>;

    /// Deletes inputs whose task is neither queued nor archived.
    ///
    /// Returns the number of payloads deleted.
    async fn delete_orphan_task_inputs(&self) -> CeQueueRepositoryResult<u64>;

    /// Deletes the scanner contexts of the given tasks.
    async fn delete_scanner_contexts(&self, uuids: &[TaskUuid]) -> CeQueueRepositoryResult<u64>;

    /// Deletes scanner contexts created before `cutoff`.
    async fn delete_scanner_contexts_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> CeQueueRepositoryResult<u64>;
}
