//! Submission, lease, completion, and cancellation of queued tasks.

use super::error::{CeQueueServiceError, CeQueueServiceResult};
use crate::queue::{
    domain::{
        ActivityEntry, ActivityOutcome, ActivityStatus, CeTaskSubmit, CeTaskSubmitBuilder,
        DEFAULT_ORGANIZATION_UUID, LifecycleGate, MAX_UUID_LENGTH, QueueEntry, QueueStatus,
        SubmitComponent, Task, TaskComponent, TaskData, TaskError, TaskResult, TaskSubmitter,
        TaskUuid, WorkerUuid, WorkersPauseStatus, ensure_max_length,
    },
    ports::{
        ArchiveResult, CeQueueRepository, ComponentDirectory, QueueCounters, QueueStatusRecorder,
    },
};
use mockable::Clock;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Deduplication rules applied by [`CeQueueService::submit_with_options`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubmitOption {
    /// Skip the submission when a pending task targets the same main
    /// component. Submissions without a component are never skipped.
    UniqueQueuePerMainComponent,
    /// Skip the submission when a pending task has the same type.
    UniqueQueuePerTaskType,
}

/// Point-in-time view of queue sizes and cumulative counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStatusSnapshot {
    /// Rows waiting for a worker.
    pub pending_count: u64,
    /// Rows held by a worker.
    pub in_progress_count: u64,
    /// Cumulative terminal-transition counters.
    pub counters: QueueCounters,
}

/// Submission target after the component directory lookup.
struct ResolvedTarget {
    component: TaskComponent,
    main_component: TaskComponent,
    organization_uuid: Option<String>,
}

/// Queue orchestration service used by producers, workers, and operators.
#[derive(Clone)]
pub struct CeQueueService<R, D, S, C>
where
    R: CeQueueRepository,
    D: ComponentDirectory,
    S: QueueStatusRecorder,
    C: Clock + Send + Sync,
{
    repository: Arc<R>,
    directory: Arc<D>,
    status: Arc<S>,
    gate: Arc<LifecycleGate>,
    clock: Arc<C>,
    node_name: Option<String>,
}

impl<R, D, S, C> CeQueueService<R, D, S, C>
where
    R: CeQueueRepository,
    D: ComponentDirectory,
    S: QueueStatusRecorder,
    C: Clock + Send + Sync,
{
    /// Creates a queue service.
    #[must_use]
    pub const fn new(
        repository: Arc<R>,
        directory: Arc<D>,
        status: Arc<S>,
        gate: Arc<LifecycleGate>,
        clock: Arc<C>,
    ) -> Self {
        Self {
            repository,
            directory,
            status,
            gate,
            clock,
            node_name: None,
        }
    }

    /// Records `node_name` on every activity row this service writes.
    #[must_use]
    pub fn with_node_name(mut self, node_name: impl Into<String>) -> Self {
        self.node_name = Some(node_name.into());
        self
    }

    /// Returns the lifecycle gate consulted by this service.
    #[must_use]
    pub fn gate(&self) -> &LifecycleGate {
        &self.gate
    }

    /// Starts a submission with a freshly generated uuid.
    #[must_use]
    pub fn prepare_submit(&self, task_type: impl Into<String>) -> CeTaskSubmitBuilder {
        CeTaskSubmit::builder(task_type).with_uuid(TaskUuid::generate().as_str())
    }

    /// Enqueues a task.
    ///
    /// # Errors
    ///
    /// Returns [`CeQueueServiceError::SubmitPaused`] while submissions are
    /// paused, or repository errors, including a duplicate uuid.
    pub async fn submit(&self, submit: &CeTaskSubmit) -> CeQueueServiceResult<Task> {
        self.ensure_submit_allowed()?;
        self.insert_submission(submit).await
    }

    /// Enqueues a task unless one of `options` finds an equivalent pending
    /// task.
    ///
    /// Returns `None` when the submission was skipped.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`Self::submit`].
    pub async fn submit_with_options(
        &self,
        submit: &CeTaskSubmit,
        options: &[SubmitOption],
    ) -> CeQueueServiceResult<Option<Task>> {
        self.ensure_submit_allowed()?;
        for option in options {
            if self.is_deduplicated(submit, *option).await? {
                debug!(
                    task_uuid = %submit.uuid(),
                    task_type = submit.task_type(),
                    ?option,
                    "submission skipped, equivalent task already pending"
                );
                return Ok(None);
            }
        }
        self.insert_submission(submit).await.map(Some)
    }

    /// Enqueues tasks one after the other.
    ///
    /// Submissions are independent: when one fails, the ones before it stay
    /// queued.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered.
    pub async fn mass_submit(&self, submits: &[CeTaskSubmit]) -> CeQueueServiceResult<Vec<Task>> {
        self.ensure_submit_allowed()?;
        let mut tasks = Vec::with_capacity(submits.len());
        for submit in submits {
            tasks.push(self.insert_submission(submit).await?);
        }
        Ok(tasks)
    }

    /// Leases the oldest pending task to `worker_uuid`.
    ///
    /// Tasks still in progress for the same worker are released first: a
    /// worker asking for work has abandoned whatever it held before.
    /// Returns `None` when workers are paused, the engine is not started, or
    /// nothing is pending.
    ///
    /// # Errors
    ///
    /// Returns a domain error for a blank worker uuid, or repository errors.
    pub async fn peek(&self, worker_uuid: &str) -> CeQueueServiceResult<Option<Task>> {
        let worker = WorkerUuid::new(worker_uuid)?;
        if !self.gate.allows_lease() {
            debug!(worker_uuid = %worker, status = ?self.gate.status(), "lease refused by gate");
            return Ok(None);
        }

        let now = self.clock.utc();
        let reclaimed = self
            .repository
            .reset_to_pending_for_worker(&worker, now)
            .await?;
        if reclaimed > 0 {
            warn!(worker_uuid = %worker, reclaimed, "released tasks abandoned by worker");
        }

        let Some(entry) = self.repository.lease_oldest_pending(&worker, now).await? else {
            return Ok(None);
        };
        info!(task_uuid = %entry.uuid(), worker_uuid = %worker, "task leased");
        self.task_view(&entry).await.map(Some)
    }

    /// Archives a task reported by its worker.
    ///
    /// Counters record the outcome even when the queue row has vanished.
    ///
    /// # Errors
    ///
    /// Returns [`CeQueueServiceError::ErrorWithNonFailedStatus`] before any
    /// change when `error` accompanies a status other than `Failed`,
    /// [`CeQueueServiceError::NotInQueue`] when the row is missing, or
    /// repository errors.
    pub async fn remove(
        &self,
        task: &Task,
        status: ActivityStatus,
        result: Option<&TaskResult>,
        error: Option<TaskError>,
    ) -> CeQueueServiceResult<()> {
        if error.is_some() && status != ActivityStatus::Failed {
            return Err(CeQueueServiceError::ErrorWithNonFailedStatus(status));
        }

        let outcome = self
            .outcome(status)
            .with_analysis_uuid(result.and_then(TaskResult::analysis_uuid).map(str::to_owned))
            .with_error(error);
        match self
            .repository
            .archive(task.uuid(), None, outcome, self.clock.utc())
            .await?
        {
            ArchiveResult::Archived(activity) => {
                self.record(status, Some(&activity));
                info!(task_uuid = %task.uuid(), %status, "task removed from queue");
                Ok(())
            }
            ArchiveResult::NotFound | ArchiveResult::StatusMismatch(_) => {
                self.record(status, None);
                warn!(task_uuid = %task.uuid(), %status, "removed task was not in queue");
                Err(CeQueueServiceError::NotInQueue(task.uuid().clone()))
            }
        }
    }

    /// Cancels a pending task.
    ///
    /// # Errors
    ///
    /// Returns [`CeQueueServiceError::TaskInProgress`] when a worker holds
    /// the task, [`CeQueueServiceError::NotInQueue`] when the row is
    /// missing, or repository errors.
    pub async fn cancel(&self, entry: &QueueEntry) -> CeQueueServiceResult<()> {
        self.cancel_by_uuid(entry.uuid()).await
    }

    /// Cancels the pending task with the given uuid.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`Self::cancel`].
    pub async fn cancel_by_uuid(&self, uuid: &TaskUuid) -> CeQueueServiceResult<()> {
        let outcome = self.outcome(ActivityStatus::Canceled);
        match self
            .repository
            .archive(uuid, Some(QueueStatus::Pending), outcome, self.clock.utc())
            .await?
        {
            ArchiveResult::Archived(activity) => {
                self.record(ActivityStatus::Canceled, Some(&activity));
                info!(task_uuid = %uuid, "task canceled");
                Ok(())
            }
            ArchiveResult::NotFound => Err(CeQueueServiceError::NotInQueue(uuid.clone())),
            ArchiveResult::StatusMismatch(_) => {
                Err(CeQueueServiceError::TaskInProgress(uuid.clone()))
            }
        }
    }

    /// Cancels every pending task, leaving in-progress tasks alone.
    ///
    /// Returns the number of tasks canceled.
    ///
    /// # Errors
    ///
    /// Returns repository errors.
    pub async fn cancel_all(&self) -> CeQueueServiceResult<u64> {
        let mut canceled = 0_u64;
        for entry in self.repository.select_pending().await? {
            match self.cancel_by_uuid(entry.uuid()).await {
                Ok(()) => canceled += 1,
                Err(
                    CeQueueServiceError::NotInQueue(_) | CeQueueServiceError::TaskInProgress(_),
                ) => {
                    debug!(task_uuid = %entry.uuid(), "task left pending state before cancel");
                }
                Err(err) => return Err(err),
            }
        }
        info!(canceled, "canceled all pending tasks");
        Ok(canceled)
    }

    /// Marks an in-progress task as failed on behalf of an operator, for
    /// instance after a timeout.
    ///
    /// # Errors
    ///
    /// Returns [`CeQueueServiceError::TaskNotInProgress`] for a pending
    /// task, [`CeQueueServiceError::NotInQueue`] when the row is missing, or
    /// repository errors.
    pub async fn fail(
        &self,
        entry: &QueueEntry,
        error_type: Option<&str>,
        error_message: Option<&str>,
    ) -> CeQueueServiceResult<()> {
        let error = error_message.map(|message| {
            error_type.map_or_else(
                || TaskError::new(message),
                |kind| TaskError::new(message).with_type(kind),
            )
        });
        let outcome = self.outcome(ActivityStatus::Failed).with_error(error);
        match self
            .repository
            .archive(
                entry.uuid(),
                Some(QueueStatus::InProgress),
                outcome,
                self.clock.utc(),
            )
            .await?
        {
            ArchiveResult::Archived(activity) => {
                self.record(ActivityStatus::Failed, Some(&activity));
                info!(task_uuid = %entry.uuid(), error_type, "task marked as failed");
                Ok(())
            }
            ArchiveResult::NotFound => Err(CeQueueServiceError::NotInQueue(entry.uuid().clone())),
            ArchiveResult::StatusMismatch(_) => {
                Err(CeQueueServiceError::TaskNotInProgress(entry.uuid().clone()))
            }
        }
    }

    /// Stops workers from leasing tasks.
    pub fn pause_workers(&self) {
        self.gate.pause_workers();
        info!("workers paused");
    }

    /// Lets workers lease tasks again.
    pub fn resume_workers(&self) {
        self.gate.resume_workers();
        info!("workers resumed");
    }

    /// Rejects new submissions.
    pub fn pause_submit(&self) {
        self.gate.pause_submit();
        info!("submissions paused");
    }

    /// Accepts new submissions again.
    pub fn resume_submit(&self) {
        self.gate.resume_submit();
        info!("submissions resumed");
    }

    /// Returns `true` while submissions are rejected.
    #[must_use]
    pub fn is_submit_paused(&self) -> bool {
        self.gate.is_submit_paused()
    }

    /// Reports whether workers are paused and whether tasks are still
    /// running.
    ///
    /// # Errors
    ///
    /// Returns repository errors.
    pub async fn workers_pause_status(&self) -> CeQueueServiceResult<WorkersPauseStatus> {
        if !self.gate.is_workers_paused() {
            return Ok(WorkersPauseStatus::Resumed);
        }
        let in_progress = self
            .repository
            .count_by_status(QueueStatus::InProgress)
            .await?;
        Ok(if in_progress > 0 {
            WorkersPauseStatus::Pausing
        } else {
            WorkersPauseStatus::Paused
        })
    }

    /// Finds a queue row by uuid.
    ///
    /// # Errors
    ///
    /// Returns repository errors.
    pub async fn select_by_uuid(&self, uuid: &TaskUuid) -> CeQueueServiceResult<Option<QueueEntry>> {
        Ok(self.repository.find_by_uuid(uuid).await?)
    }

    /// Finds an activity row by uuid.
    ///
    /// # Errors
    ///
    /// Returns repository errors.
    pub async fn select_activity_by_uuid(
        &self,
        uuid: &TaskUuid,
    ) -> CeQueueServiceResult<Option<ActivityEntry>> {
        Ok(self.repository.find_activity_by_uuid(uuid).await?)
    }

    /// Returns every queue row in lease order.
    ///
    /// # Errors
    ///
    /// Returns repository errors.
    pub async fn select_all_in_asc_order(&self) -> CeQueueServiceResult<Vec<QueueEntry>> {
        Ok(self.repository.select_all_in_asc_order().await?)
    }

    /// Returns pending rows in lease order.
    ///
    /// # Errors
    ///
    /// Returns repository errors.
    pub async fn select_pending(&self) -> CeQueueServiceResult<Vec<QueueEntry>> {
        Ok(self.repository.select_pending().await?)
    }

    /// Counts queue rows in `status`.
    ///
    /// # Errors
    ///
    /// Returns repository errors.
    pub async fn count_by_status(&self, status: QueueStatus) -> CeQueueServiceResult<u64> {
        Ok(self.repository.count_by_status(status).await?)
    }

    /// Returns queue sizes together with the cumulative counters.
    ///
    /// # Errors
    ///
    /// Returns repository errors.
    pub async fn status_snapshot(&self) -> CeQueueServiceResult<QueueStatusSnapshot> {
        Ok(QueueStatusSnapshot {
            pending_count: self.repository.count_by_status(QueueStatus::Pending).await?,
            in_progress_count: self
                .repository
                .count_by_status(QueueStatus::InProgress)
                .await?,
            counters: self.status.counters(),
        })
    }

    fn ensure_submit_allowed(&self) -> CeQueueServiceResult<()> {
        if self.gate.is_submit_paused() {
            return Err(CeQueueServiceError::SubmitPaused);
        }
        Ok(())
    }

    async fn is_deduplicated(
        &self,
        submit: &CeTaskSubmit,
        option: SubmitOption,
    ) -> CeQueueServiceResult<bool> {
        Ok(match option {
            SubmitOption::UniqueQueuePerMainComponent => match submit.component() {
                Some(component) => {
                    self.repository
                        .has_pending_for_main_component(component.main_component_uuid())
                        .await?
                }
                None => false,
            },
            SubmitOption::UniqueQueuePerTaskType => {
                self.repository
                    .has_pending_for_task_type(submit.task_type())
                    .await?
            }
        })
    }

    async fn insert_submission(&self, submit: &CeTaskSubmit) -> CeQueueServiceResult<Task> {
        let entry = self.build_entry(submit).await?;
        self.repository.insert(&entry).await?;
        info!(
            task_uuid = %entry.uuid(),
            task_type = entry.task_type(),
            component_uuid = entry.component_uuid(),
            "task submitted"
        );
        Ok(entry.to_task())
    }

    async fn build_entry(&self, submit: &CeTaskSubmit) -> CeQueueServiceResult<QueueEntry> {
        let target = match submit.component() {
            Some(component) => Some(self.resolve_target(component).await?),
            None => None,
        };
        let organization_uuid = target
            .as_ref()
            .and_then(|resolved| resolved.organization_uuid.clone())
            .or_else(|| submit.organization_uuid().map(str::to_owned))
            .unwrap_or_else(|| DEFAULT_ORGANIZATION_UUID.to_owned());
        ensure_max_length("organization uuid", &organization_uuid, MAX_UUID_LENGTH)?;
        let (component, main_component) = target.map_or((None, None), |resolved| {
            (Some(resolved.component), Some(resolved.main_component))
        });

        Ok(QueueEntry::pending_from_submit(
            submit,
            organization_uuid,
            component,
            main_component,
            &*self.clock,
        ))
    }

    async fn resolve_target(
        &self,
        target: &SubmitComponent,
    ) -> CeQueueServiceResult<ResolvedTarget> {
        let (component, component_organization) = self.resolve_component(target.uuid()).await?;
        let (main_component, main_organization) = if target.is_branch() {
            self.resolve_component(target.main_component_uuid()).await?
        } else {
            (component.clone(), None)
        };
        Ok(ResolvedTarget {
            component,
            main_component,
            organization_uuid: component_organization.or(main_organization),
        })
    }

    async fn resolve_component(
        &self,
        uuid: &str,
    ) -> CeQueueServiceResult<(TaskComponent, Option<String>)> {
        let found = self.directory.find_by_uuid(uuid).await?;
        Ok(found.map_or_else(
            || {
                debug!(component_uuid = uuid, "component unknown to directory");
                (TaskComponent::unresolved(uuid), None)
            },
            |info| {
                (
                    TaskComponent::new(info.uuid, Some(info.key), Some(info.name)),
                    Some(info.organization_uuid),
                )
            },
        ))
    }

    async fn resolve_cached(
        &self,
        component: Option<&TaskComponent>,
    ) -> CeQueueServiceResult<Option<TaskComponent>> {
        match component {
            Some(cached) if !cached.is_resolved() => {
                Ok(Some(self.resolve_component(cached.uuid()).await?.0))
            }
            other => Ok(other.cloned()),
        }
    }

    async fn task_view(&self, entry: &QueueEntry) -> CeQueueServiceResult<Task> {
        Ok(Task::from_data(TaskData {
            uuid: entry.uuid().clone(),
            task_type: entry.task_type().to_owned(),
            organization_uuid: entry.organization_uuid().to_owned(),
            component: self.resolve_cached(entry.component()).await?,
            main_component: self.resolve_cached(entry.main_component()).await?,
            submitter: entry
                .submitter_uuid()
                .map(|uuid| TaskSubmitter::new(uuid, None)),
            characteristics: entry.characteristics().clone(),
        }))
    }

    fn outcome(&self, status: ActivityStatus) -> ActivityOutcome {
        ActivityOutcome::new(status).with_node_name(self.node_name.clone())
    }

    fn record(&self, status: ActivityStatus, activity: Option<&ActivityEntry>) {
        let processing_time_ms = activity
            .and_then(ActivityEntry::execution_time_ms)
            .and_then(|value| u64::try_from(value).ok())
            .unwrap_or(0);
        match status {
            ActivityStatus::Success => self.status.add_success(processing_time_ms),
            ActivityStatus::Failed => self.status.add_error(processing_time_ms),
            ActivityStatus::Canceled => self.status.add_canceled(),
        }
    }
}
