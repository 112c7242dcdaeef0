//! Queue rows: tasks that are waiting for or held by a worker.

use super::{
    CeTaskSubmit, ParseQueueStatusError, Task, TaskComponent, TaskData, TaskSubmitter, TaskUuid,
    WorkerUuid,
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Status of an open queue row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueueStatus {
    /// Waiting for a worker.
    Pending,
    /// Leased by a worker.
    InProgress,
}

impl QueueStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::InProgress => "IN_PROGRESS",
        }
    }
}

impl TryFrom<&str> for QueueStatus {
    type Error = ParseQueueStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "IN_PROGRESS" => Ok(Self::InProgress),
            _ => Err(ParseQueueStatusError(value.to_owned())),
        }
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Open task row in the queue store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    uuid: TaskUuid,
    task_type: String,
    organization_uuid: String,
    component: Option<TaskComponent>,
    main_component: Option<TaskComponent>,
    submitter_uuid: Option<String>,
    characteristics: BTreeMap<String, String>,
    status: QueueStatus,
    worker_uuid: Option<WorkerUuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
}

/// Parameter object for reconstructing a persisted queue row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedQueueEntryData {
    /// Task identifier.
    pub uuid: TaskUuid,
    /// Task type.
    pub task_type: String,
    /// Owning organization.
    pub organization_uuid: String,
    /// Target component with cached key and name.
    pub component: Option<TaskComponent>,
    /// Main component with cached key and name.
    pub main_component: Option<TaskComponent>,
    /// Submitter uuid.
    pub submitter_uuid: Option<String>,
    /// Task characteristics.
    pub characteristics: BTreeMap<String, String>,
    /// Current status.
    pub status: QueueStatus,
    /// Lease holder.
    pub worker_uuid: Option<WorkerUuid>,
    /// Submission timestamp.
    pub created_at: DateTime<Utc>,
    /// Last transition timestamp.
    pub updated_at: DateTime<Utc>,
    /// Timestamp of the latest lease.
    pub started_at: Option<DateTime<Utc>>,
}

impl QueueEntry {
    /// Creates a pending row for a submission.
    ///
    /// `component` and `main_component` carry whatever the component
    /// directory resolved at submission time.
    #[must_use]
    pub fn pending_from_submit(
        submit: &CeTaskSubmit,
        organization_uuid: String,
        component: Option<TaskComponent>,
        main_component: Option<TaskComponent>,
        clock: &impl Clock,
    ) -> Self {
        let timestamp = clock.utc();
        Self {
            uuid: submit.uuid().clone(),
            task_type: submit.task_type().to_owned(),
            organization_uuid,
            component,
            main_component,
            submitter_uuid: submit.submitter_uuid().map(str::to_owned),
            characteristics: submit.characteristics().clone(),
            status: QueueStatus::Pending,
            worker_uuid: None,
            created_at: timestamp,
            updated_at: timestamp,
            started_at: None,
        }
    }

    /// Reconstructs a row from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedQueueEntryData) -> Self {
        Self {
            uuid: data.uuid,
            task_type: data.task_type,
            organization_uuid: data.organization_uuid,
            component: data.component,
            main_component: data.main_component,
            submitter_uuid: data.submitter_uuid,
            characteristics: data.characteristics,
            status: data.status,
            worker_uuid: data.worker_uuid,
            created_at: data.created_at,
            updated_at: data.updated_at,
            started_at: data.started_at,
        }
    }

    /// Returns the task identifier.
    #[must_use]
    pub const fn uuid(&self) -> &TaskUuid {
        &self.uuid
    }

    /// Returns the task type.
    #[must_use]
    pub fn task_type(&self) -> &str {
        &self.task_type
    }

    /// Returns the owning organization.
    #[must_use]
    pub fn organization_uuid(&self) -> &str {
        &self.organization_uuid
    }

    /// Returns the target component.
    #[must_use]
    pub const fn component(&self) -> Option<&TaskComponent> {
        self.component.as_ref()
    }

    /// Returns the main component.
    #[must_use]
    pub const fn main_component(&self) -> Option<&TaskComponent> {
        self.main_component.as_ref()
    }

    /// Returns the target component uuid.
    #[must_use]
    pub fn component_uuid(&self) -> Option<&str> {
        self.component.as_ref().map(TaskComponent::uuid)
    }

    /// Returns the main component uuid.
    #[must_use]
    pub fn main_component_uuid(&self) -> Option<&str> {
        self.main_component.as_ref().map(TaskComponent::uuid)
    }

    /// Returns the submitter uuid.
    #[must_use]
    pub fn submitter_uuid(&self) -> Option<&str> {
        self.submitter_uuid.as_deref()
    }

    /// Returns the task characteristics.
    #[must_use]
    pub const fn characteristics(&self) -> &BTreeMap<String, String> {
        &self.characteristics
    }

    /// Returns the current status.
    #[must_use]
    pub const fn status(&self) -> QueueStatus {
        self.status
    }

    /// Returns the lease holder.
    #[must_use]
    pub const fn worker_uuid(&self) -> Option<&WorkerUuid> {
        self.worker_uuid.as_ref()
    }

    /// Returns the submission timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the last transition timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns the timestamp of the latest lease.
    #[must_use]
    pub const fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Returns `true` for a pending row that has already been leased once.
    #[must_use]
    pub const fn is_worn_out(&self) -> bool {
        matches!(self.status, QueueStatus::Pending) && self.started_at.is_some()
    }

    /// Returns `true` when the row is in progress for `worker`.
    #[must_use]
    pub fn is_leased_by(&self, worker: &WorkerUuid) -> bool {
        self.status == QueueStatus::InProgress && self.worker_uuid.as_ref() == Some(worker)
    }

    /// Marks the row as leased by `worker`.
    pub fn lease(&mut self, worker: WorkerUuid, now: DateTime<Utc>) {
        self.status = QueueStatus::InProgress;
        self.worker_uuid = Some(worker);
        self.started_at = Some(now);
        self.updated_at = now;
    }

    /// Releases the lease, keeping `created_at` and `started_at`.
    pub fn reset_to_pending(&mut self, now: DateTime<Utc>) {
        self.status = QueueStatus::Pending;
        self.worker_uuid = None;
        self.updated_at = now;
    }

    /// Orders rows by `created_at`, then uuid.
    #[must_use]
    pub fn queue_order(&self, other: &Self) -> std::cmp::Ordering {
        self.created_at
            .cmp(&other.created_at)
            .then_with(|| self.uuid.cmp(&other.uuid))
    }

    /// Builds the worker-facing task view from the cached row data.
    #[must_use]
    pub fn to_task(&self) -> Task {
        Task::from_data(TaskData {
            uuid: self.uuid.clone(),
            task_type: self.task_type.clone(),
            organization_uuid: self.organization_uuid.clone(),
            component: self.component.clone(),
            main_component: self.main_component.clone(),
            submitter: self
                .submitter_uuid
                .as_ref()
                .map(|uuid| TaskSubmitter::new(uuid.clone(), None)),
            characteristics: self.characteristics.clone(),
        })
    }
}
