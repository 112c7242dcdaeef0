//! Startup reconciliation and crash recovery of the queue.

use super::error::CeQueueServiceResult;
use crate::queue::{
    domain::{ActivityOutcome, ActivityStatus, QueueStatus},
    ports::{ArchiveResult, CeQueueRepository, CeTaskDataRepository},
};
use mockable::Clock;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Counts of rows touched by [`CeQueueRecovery::start`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StartupReport {
    /// Task inputs deleted because no queue row references them.
    pub orphan_inputs_deleted: u64,
    /// Queue rows deleted because the engine was upgraded.
    pub queue_rows_cleared: u64,
}

/// Recovers queue state after restarts and worker crashes.
///
/// Never touches the queue status counters: nothing it does is a terminal
/// transition reported by a worker or an operator.
#[derive(Clone)]
pub struct CeQueueRecovery<R, T, C>
where
    R: CeQueueRepository,
    T: CeTaskDataRepository,
    C: Clock + Send + Sync,
{
    repository: Arc<R>,
    task_data: Arc<T>,
    clock: Arc<C>,
    node_name: Option<String>,
}

impl<R, T, C> CeQueueRecovery<R, T, C>
where
    R: CeQueueRepository,
    T: CeTaskDataRepository,
    C: Clock + Send + Sync,
{
    /// Creates a recovery service.
    #[must_use]
    pub const fn new(repository: Arc<R>, task_data: Arc<T>, clock: Arc<C>) -> Self {
        Self {
            repository,
            task_data,
            clock,
            node_name: None,
        }
    }

    /// Records `node_name` on activity rows written by worn-out cancellation.
    #[must_use]
    pub fn with_node_name(mut self, node_name: impl Into<String>) -> Self {
        self.node_name = Some(node_name.into());
        self
    }

    /// Reconciles storage when the engine starts.
    ///
    /// In-progress rows are left alone: their workers may live in another
    /// process. After an upgrade the whole queue is dropped without writing
    /// activity rows.
    ///
    /// # Errors
    ///
    /// Returns repository errors.
    pub async fn start(&self, upgraded: bool) -> CeQueueServiceResult<StartupReport> {
        let orphan_inputs_deleted = self
            .task_data
            .delete_task_inputs_without_queue_entry()
            .await?;
        let queue_rows_cleared = if upgraded {
            self.repository.clear().await?
        } else {
            0
        };
        info!(
            upgraded,
            orphan_inputs_deleted, queue_rows_cleared, "queue startup reconciliation done"
        );
        Ok(StartupReport {
            orphan_inputs_deleted,
            queue_rows_cleared,
        })
    }

    /// Releases every in-progress row whose worker is not in
    /// `known_worker_uuids`, or has no worker at all.
    ///
    /// An empty set releases every in-progress row. Returns the number of
    /// rows released.
    ///
    /// # Errors
    ///
    /// Returns repository errors.
    pub async fn reset_tasks_with_unknown_worker_uuids(
        &self,
        known_worker_uuids: &BTreeSet<String>,
    ) -> CeQueueServiceResult<u64> {
        let reset = self
            .repository
            .reset_tasks_with_unknown_workers(known_worker_uuids, self.clock.utc())
            .await?;
        info!(
            known_workers = known_worker_uuids.len(),
            reset, "released tasks of unknown workers"
        );
        Ok(reset)
    }

    /// Cancels pending rows that were leased before and then released.
    ///
    /// Returns the number of rows canceled.
    ///
    /// # Errors
    ///
    /// Returns repository errors.
    pub async fn cancel_worn_outs(&self) -> CeQueueServiceResult<u64> {
        let mut canceled = 0_u64;
        for entry in self.repository.select_worn_outs().await? {
            let outcome = ActivityOutcome::new(ActivityStatus::Canceled)
                .with_node_name(self.node_name.clone());
            match self
                .repository
                .archive(
                    entry.uuid(),
                    Some(QueueStatus::Pending),
                    outcome,
                    self.clock.utc(),
                )
                .await?
            {
                ArchiveResult::Archived(_) => canceled += 1,
                ArchiveResult::NotFound | ArchiveResult::StatusMismatch(_) => {
                    debug!(task_uuid = %entry.uuid(), "worn-out task changed before cancel");
                }
            }
        }
        info!(canceled, "canceled worn-out tasks");
        Ok(canceled)
    }
}
