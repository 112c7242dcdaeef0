//! Repository port for the queue and activity stores.

use crate::queue::domain::{
    ActivityEntry, ActivityOutcome, QueueEntry, QueueStatus, TaskUuid, WorkerUuid,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;

/// Result type for queue repository operations.
pub type CeQueueRepositoryResult<T> = Result<T, CeQueueRepositoryError>;

/// Outcome of moving a queue row into the activity store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveResult {
    /// The queue row was deleted and this activity row inserted.
    Archived(ActivityEntry),
    /// No queue row exists for the uuid.
    NotFound,
    /// The queue row exists but is not in the expected status; nothing was
    /// changed.
    StatusMismatch(QueueStatus),
}

/// Queue and activity persistence contract.
///
/// Implementations are the only synchronization point between workers, which
/// may live in different processes: every method that changes more than one
/// row must apply its changes as one committed unit.
#[async_trait]
pub trait CeQueueRepository: Send + Sync {
    /// Stores a new queue row.
    ///
    /// # Errors
    ///
    /// Returns [`CeQueueRepositoryError::DuplicateTask`] when the uuid is
    /// already queued or archived.
    async fn insert(&self, entry: &QueueEntry) -> CeQueueRepositoryResult<()>;

    /// Finds a queue row by uuid.
    async fn find_by_uuid(&self, uuid: &TaskUuid) -> CeQueueRepositoryResult<Option<QueueEntry>>;

    /// Returns every queue row ordered by `created_at`, then uuid.
    async fn select_all_in_asc_order(&self) -> CeQueueRepositoryResult<Vec<QueueEntry>>;

    /// Returns pending rows ordered by `created_at`, then uuid.
    async fn select_pending(&self) -> CeQueueRepositoryResult<Vec<QueueEntry>>;

    /// Returns pending rows that have been leased before.
    async fn select_worn_outs(&self) -> CeQueueRepositoryResult<Vec<QueueEntry>>;

    /// Counts queue rows in the given status.
    async fn count_by_status(&self, status: QueueStatus) -> CeQueueRepositoryResult<u64>;

    /// Returns `true` when a pending row targets the main component.
    async fn has_pending_for_main_component(
        &self,
        main_component_uuid: &str,
    ) -> CeQueueRepositoryResult<bool>;

    /// Returns `true` when a pending row has the task type.
    async fn has_pending_for_task_type(&self, task_type: &str) -> CeQueueRepositoryResult<bool>;

    /// Releases every in-progress row held by `worker`.
    ///
    /// Returns the number of rows reset.
    async fn reset_to_pending_for_worker(
        &self,
        worker: &WorkerUuid,
        now: DateTime<Utc>,
    ) -> CeQueueRepositoryResult<u64>;

    /// Selects the oldest pending row and leases it to `worker` in one
    /// indivisible step.
    ///
    /// Two concurrent callers never receive the same row. Returns `None`
    /// when nothing is pending.
    async fn lease_oldest_pending(
        &self,
        worker: &WorkerUuid,
        now: DateTime<Utc>,
    ) -> CeQueueRepositoryResult<Option<QueueEntry>>;

    /// Releases every in-progress row whose worker is absent or not in
    /// `known_workers`.
    ///
    /// Returns the number of rows reset.
    async fn reset_tasks_with_unknown_workers(
        &self,
        known_workers: &BTreeSet<String>,
        now: DateTime<Utc>,
    ) -> CeQueueRepositoryResult<u64>;

    /// Deletes the queue row and inserts its activity row as one unit.
    ///
    /// When `expected_status` is set the row is only archived if it is in
    /// that status. Older activity rows of the same series lose their
    /// `is_last` flag.
    async fn archive(
        &self,
        uuid: &TaskUuid,
        expected_status: Option<QueueStatus>,
        outcome: ActivityOutcome,
        now: DateTime<Utc>,
    ) -> CeQueueRepositoryResult<ArchiveResult>;

    /// Deletes every queue row and its task input.
    ///
    /// Returns the number of queue rows deleted.
    async fn clear(&self) -> CeQueueRepositoryResult<u64>;

    /// Finds an activity row by uuid.
    async fn find_activity_by_uuid(
        &self,
        uuid: &TaskUuid,
    ) -> CeQueueRepositoryResult<Option<ActivityEntry>>;

    /// Deletes activity rows created before `cutoff`.
    ///
    /// Returns the uuids of the deleted rows.
    async fn purge_activities_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> CeQueueRepositoryResult<Vec<TaskUuid>>;
}

/// Errors returned by queue repository implementations.
#[derive(Debug, Clone, Error)]
pub enum CeQueueRepositoryError {
    /// A row with the same uuid already exists.
    #[error("duplicate task uuid: {0}")]
    DuplicateTask(TaskUuid),

    /// Persisted data could not be reconstructed into domain types.
    #[error("invalid persisted queue data: {0}")]
    InvalidPersistedData(Arc<dyn std::error::Error + Send + Sync>),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl CeQueueRepositoryError {
    /// Wraps persisted-data decoding or validation failures.
    pub fn invalid_persisted_data(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::InvalidPersistedData(Arc::new(err))
    }

    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
