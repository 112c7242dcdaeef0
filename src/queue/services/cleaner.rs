//! Once-per-process purge of old history and orphaned payloads.

use super::error::CeQueueServiceResult;
use crate::queue::ports::{CeQueueRepository, CeTaskDataRepository};
use chrono::Duration;
use mockable::Clock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

/// Default number of days activity rows are kept.
pub const DEFAULT_ACTIVITY_RETENTION_DAYS: u32 = 180;

/// Counts of rows deleted by [`CeCleaner::clean`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanReport {
    /// Activity rows older than the retention period.
    pub activities_purged: u64,
    /// Scanner contexts of purged activities or older than the cutoff.
    pub scanner_contexts_deleted: u64,
    /// Task inputs referenced by neither store.
    pub task_inputs_deleted: u64,
}

/// Purges activity history older than the retention period.
///
/// The purge runs on the first [`CeCleaner::clean`] call only. A hosting
/// process builds a single cleaner at startup and shares it, for instance
/// behind an `Arc`, so that the purge happens once per process lifetime.
pub struct CeCleaner<R, T, C>
where
    R: CeQueueRepository,
    T: CeTaskDataRepository,
    C: Clock + Send + Sync,
{
    repository: Arc<R>,
    task_data: Arc<T>,
    clock: Arc<C>,
    retention: Duration,
    done: AtomicBool,
}

impl<R, T, C> CeCleaner<R, T, C>
where
    R: CeQueueRepository,
    T: CeTaskDataRepository,
    C: Clock + Send + Sync,
{
    /// Creates a cleaner keeping `retention_days` of history.
    #[must_use]
    pub fn new(repository: Arc<R>, task_data: Arc<T>, clock: Arc<C>, retention_days: u32) -> Self {
        Self {
            repository,
            task_data,
            clock,
            retention: Duration::days(i64::from(retention_days)),
            done: AtomicBool::new(false),
        }
    }

    /// Runs the purge, at most once per cleaner instance.
    ///
    /// Returns `None` when the purge already ran.
    ///
    /// # Errors
    ///
    /// Returns repository errors. A failed run still counts as the single
    /// run.
    pub async fn clean(&self) -> CeQueueServiceResult<Option<CleanReport>> {
        if self.done.swap(true, Ordering::SeqCst) {
            return Ok(None);
        }

        let cutoff = self.clock.utc() - self.retention;
        let purged = self.repository.purge_activities_before(cutoff).await?;
        let contexts_of_purged = self.task_data.delete_scanner_contexts(&purged).await?;
        let stale_contexts = self.task_data.delete_scanner_contexts_before(cutoff).await?;
        let task_inputs_deleted = self.task_data.delete_orphan_task_inputs().await?;

        let report = CleanReport {
            activities_purged: u64::try_from(purged.len()).unwrap_or(u64::MAX),
            scanner_contexts_deleted: contexts_of_purged + stale_contexts,
            task_inputs_deleted,
        };
        info!(
            %cutoff,
            activities_purged = report.activities_purged,
            scanner_contexts_deleted = report.scanner_contexts_deleted,
            task_inputs_deleted = report.task_inputs_deleted,
            "compute engine history cleaned"
        );
        Ok(Some(report))
    }
}
