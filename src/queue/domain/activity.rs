//! Terminal history records of finished tasks.

use super::{ParseActivityStatusError, QueueEntry, TaskUuid, WorkerUuid};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::fmt;
use std::fmt::Write as _;

/// Terminal status of a finished task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityStatus {
    /// The worker completed the task.
    Success,
    /// The worker or an operator marked the task as failed.
    Failed,
    /// The task was canceled before a worker completed it.
    Canceled,
}

impl ActivityStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
            Self::Canceled => "CANCELED",
        }
    }
}

impl TryFrom<&str> for ActivityStatus {
    type Error = ParseActivityStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_uppercase().as_str() {
            "SUCCESS" => Ok(Self::Success),
            "FAILED" => Ok(Self::Failed),
            "CANCELED" => Ok(Self::Canceled),
            _ => Err(ParseActivityStatusError(value.to_owned())),
        }
    }
}

impl fmt::Display for ActivityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Width of the `error_type` column.
pub const MAX_ERROR_TYPE_LENGTH: usize = 20;

/// Width of the `analysis_uuid` column.
pub const MAX_ANALYSIS_UUID_LENGTH: usize = 50;

/// Width of the `node_name` column.
pub const MAX_NODE_NAME_LENGTH: usize = 100;

/// Result reported by a worker on completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskResult {
    analysis_uuid: Option<String>,
}

impl TaskResult {
    /// Creates a result without an analysis.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            analysis_uuid: None,
        }
    }

    /// Creates a result referencing the produced analysis.
    #[must_use]
    pub fn with_analysis(analysis_uuid: impl Into<String>) -> Self {
        Self {
            analysis_uuid: Some(analysis_uuid.into()),
        }
    }

    /// Returns the produced analysis uuid, if any.
    #[must_use]
    pub fn analysis_uuid(&self) -> Option<&str> {
        self.analysis_uuid.as_deref()
    }
}

/// Failure details recorded with a failed task.
///
/// `error_type` is the optional discriminator some failures carry (for
/// instance `TIMEOUT`), stored verbatim in the activity row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskError {
    message: String,
    stacktrace: Option<String>,
    error_type: Option<String>,
}

impl TaskError {
    /// Creates an error with a message only.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stacktrace: None,
            error_type: None,
        }
    }

    /// Decomposes a Rust error into message and a stacktrace made of its
    /// source chain.
    #[must_use]
    pub fn from_error(error: &(dyn StdError + 'static)) -> Self {
        let mut stacktrace = error.to_string();
        let mut source = error.source();
        while let Some(cause) = source {
            let _ignored = write!(stacktrace, "\nCaused by: {cause}");
            source = cause.source();
        }
        Self {
            message: error.to_string(),
            stacktrace: Some(stacktrace),
            error_type: None,
        }
    }

    /// Sets the stacktrace.
    #[must_use]
    pub fn with_stacktrace(mut self, stacktrace: impl Into<String>) -> Self {
        self.stacktrace = Some(stacktrace.into());
        self
    }

    /// Sets the type discriminator.
    #[must_use]
    pub fn with_type(mut self, error_type: impl Into<String>) -> Self {
        self.error_type = Some(error_type.into());
        self
    }

    /// Returns the error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the stacktrace, if any.
    #[must_use]
    pub fn stacktrace(&self) -> Option<&str> {
        self.stacktrace.as_deref()
    }

    /// Returns the type discriminator, if any.
    #[must_use]
    pub fn error_type(&self) -> Option<&str> {
        self.error_type.as_deref()
    }
}

/// Everything needed to archive a queue row, besides the row itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityOutcome {
    /// Terminal status.
    pub status: ActivityStatus,
    /// Analysis produced by a successful task.
    pub analysis_uuid: Option<String>,
    /// Failure details of a failed task.
    pub error: Option<TaskError>,
    /// Node that archived the task.
    pub node_name: Option<String>,
}

impl ActivityOutcome {
    /// Creates an outcome with only a status.
    #[must_use]
    pub const fn new(status: ActivityStatus) -> Self {
        Self {
            status,
            analysis_uuid: None,
            error: None,
            node_name: None,
        }
    }

    /// Sets the analysis uuid.
    #[must_use]
    pub fn with_analysis_uuid(mut self, analysis_uuid: Option<String>) -> Self {
        self.analysis_uuid = analysis_uuid;
        self
    }

    /// Sets the failure details.
    #[must_use]
    pub fn with_error(mut self, error: Option<TaskError>) -> Self {
        self.error = error;
        self
    }

    /// Sets the archiving node.
    #[must_use]
    pub fn with_node_name(mut self, node_name: Option<String>) -> Self {
        self.node_name = node_name;
        self
    }
}

/// Finished task in the activity store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEntry {
    uuid: TaskUuid,
    task_type: String,
    organization_uuid: String,
    component_uuid: Option<String>,
    main_component_uuid: Option<String>,
    submitter_uuid: Option<String>,
    status: ActivityStatus,
    analysis_uuid: Option<String>,
    error_message: Option<String>,
    error_stacktrace: Option<String>,
    error_type: Option<String>,
    worker_uuid: Option<WorkerUuid>,
    node_name: Option<String>,
    is_last: bool,
    is_last_key: String,
    submitted_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    executed_at: DateTime<Utc>,
    execution_time_ms: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted activity row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedActivityData {
    /// Task identifier.
    pub uuid: TaskUuid,
    /// Task type.
    pub task_type: String,
    /// Owning organization.
    pub organization_uuid: String,
    /// Target component uuid.
    pub component_uuid: Option<String>,
    /// Main component uuid.
    pub main_component_uuid: Option<String>,
    /// Submitter uuid.
    pub submitter_uuid: Option<String>,
    /// Terminal status.
    pub status: ActivityStatus,
    /// Produced analysis.
    pub analysis_uuid: Option<String>,
    /// Failure message.
    pub error_message: Option<String>,
    /// Failure stacktrace.
    pub error_stacktrace: Option<String>,
    /// Failure discriminator.
    pub error_type: Option<String>,
    /// Last lease holder.
    pub worker_uuid: Option<WorkerUuid>,
    /// Archiving node.
    pub node_name: Option<String>,
    /// Whether this is the latest entry of its series.
    pub is_last: bool,
    /// Series key.
    pub is_last_key: String,
    /// Submission timestamp.
    pub submitted_at: DateTime<Utc>,
    /// Latest lease timestamp.
    pub started_at: Option<DateTime<Utc>>,
    /// Archiving timestamp.
    pub executed_at: DateTime<Utc>,
    /// Time between lease and archiving.
    pub execution_time_ms: Option<i64>,
    /// Row creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Row update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl ActivityEntry {
    /// Builds the activity row that replaces `entry` in the store.
    ///
    /// The new row is the last of its series; callers persisting it must
    /// clear the flag on older rows sharing [`Self::is_last_key`]. The error
    /// type, analysis uuid, and node name are cut to their column widths so
    /// archiving never fails on an oversized value.
    #[must_use]
    pub fn archive(entry: &QueueEntry, outcome: ActivityOutcome, now: DateTime<Utc>) -> Self {
        let ActivityOutcome {
            status,
            analysis_uuid,
            error,
            node_name,
        } = outcome;
        let (error_message, error_stacktrace, error_type) = match error {
            Some(TaskError {
                message,
                stacktrace,
                error_type,
            }) => (Some(message), stacktrace, error_type),
            None => (None, None, None),
        };
        let execution_time_ms = entry
            .started_at()
            .map(|started_at| (now - started_at).num_milliseconds().max(0));

        Self {
            uuid: entry.uuid().clone(),
            task_type: entry.task_type().to_owned(),
            organization_uuid: entry.organization_uuid().to_owned(),
            component_uuid: entry.component_uuid().map(str::to_owned),
            main_component_uuid: entry.main_component_uuid().map(str::to_owned),
            submitter_uuid: entry.submitter_uuid().map(str::to_owned),
            status,
            analysis_uuid: truncate_chars(analysis_uuid, MAX_ANALYSIS_UUID_LENGTH),
            error_message,
            error_stacktrace,
            error_type: truncate_chars(error_type, MAX_ERROR_TYPE_LENGTH),
            worker_uuid: entry.worker_uuid().cloned(),
            node_name: truncate_chars(node_name, MAX_NODE_NAME_LENGTH),
            is_last: true,
            is_last_key: is_last_key(entry.task_type(), entry.component_uuid()),
            submitted_at: entry.created_at(),
            started_at: entry.started_at(),
            executed_at: now,
            execution_time_ms,
            created_at: now,
            updated_at: now,
        }
    }

    /// Reconstructs a row from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedActivityData) -> Self {
        Self {
            uuid: data.uuid,
            task_type: data.task_type,
            organization_uuid: data.organization_uuid,
            component_uuid: data.component_uuid,
            main_component_uuid: data.main_component_uuid,
            submitter_uuid: data.submitter_uuid,
            status: data.status,
            analysis_uuid: data.analysis_uuid,
            error_message: data.error_message,
            error_stacktrace: data.error_stacktrace,
            error_type: data.error_type,
            worker_uuid: data.worker_uuid,
            node_name: data.node_name,
            is_last: data.is_last,
            is_last_key: data.is_last_key,
            submitted_at: data.submitted_at,
            started_at: data.started_at,
            executed_at: data.executed_at,
            execution_time_ms: data.execution_time_ms,
            created_at: data.created_at,
            updated_at: data.updated_at,
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

    /// Returns the target component uuid.
    #[must_use]
    pub fn component_uuid(&self) -> Option<&str> {
        self.component_uuid.as_deref()
    }

    /// Returns the main component uuid.
    #[must_use]
    pub fn main_component_uuid(&self) -> Option<&str> {
        self.main_component_uuid.as_deref()
    }

    /// Returns the submitter uuid.
    #[must_use]
    pub fn submitter_uuid(&self) -> Option<&str> {
        self.submitter_uuid.as_deref()
    }

    /// Returns the terminal status.
    #[must_use]
    pub const fn status(&self) -> ActivityStatus {
        self.status
    }

    /// Returns the produced analysis uuid.
    #[must_use]
    pub fn analysis_uuid(&self) -> Option<&str> {
        self.analysis_uuid.as_deref()
    }

    /// Returns the failure message.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Returns the failure stacktrace.
    #[must_use]
    pub fn error_stacktrace(&self) -> Option<&str> {
        self.error_stacktrace.as_deref()
    }

    /// Returns the failure discriminator.
    #[must_use]
    pub fn error_type(&self) -> Option<&str> {
        self.error_type.as_deref()
    }

    /// Returns the last lease holder.
    #[must_use]
    pub const fn worker_uuid(&self) -> Option<&WorkerUuid> {
        self.worker_uuid.as_ref()
    }

    /// Returns the archiving node.
    #[must_use]
    pub fn node_name(&self) -> Option<&str> {
        self.node_name.as_deref()
    }

    /// Returns whether this is the latest entry of its series.
    #[must_use]
    pub const fn is_last(&self) -> bool {
        self.is_last
    }

    /// Returns the series key.
    #[must_use]
    pub fn is_last_key(&self) -> &str {
        &self.is_last_key
    }

    /// Returns the submission timestamp.
    #[must_use]
    pub const fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }

    /// Returns the latest lease timestamp.
    #[must_use]
    pub const fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Returns the archiving timestamp.
    #[must_use]
    pub const fn executed_at(&self) -> DateTime<Utc> {
        self.executed_at
    }

    /// Returns the time between lease and archiving.
    #[must_use]
    pub const fn execution_time_ms(&self) -> Option<i64> {
        self.execution_time_ms
    }

    /// Returns the row creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the row update timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Clears the latest-of-series flag.
    pub fn mark_not_last(&mut self, now: DateTime<Utc>) {
        self.is_last = false;
        self.updated_at = now;
    }
}

/// Series key: the component uuid, or the task type for component-less
/// tasks.
#[must_use]
pub fn is_last_key(task_type: &str, component_uuid: Option<&str>) -> String {
    component_uuid.unwrap_or(task_type).to_owned()
}

fn truncate_chars(value: Option<String>, max: usize) -> Option<String> {
    value.map(|text| {
        if text.chars().count() > max {
            text.chars().take(max).collect()
        } else {
            text
        }
    })
}
