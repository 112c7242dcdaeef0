//! Domain model for the compute-engine task queue.
//!
//! Queue rows, activity rows, the task view handed to workers, and the
//! lifecycle gate. Storage concerns stay outside this boundary.

mod activity;
mod entry;
mod error;
mod ids;
mod lifecycle;
mod task;

pub use activity::{
    ActivityEntry, ActivityOutcome, ActivityStatus, MAX_ANALYSIS_UUID_LENGTH,
    MAX_ERROR_TYPE_LENGTH, MAX_NODE_NAME_LENGTH, PersistedActivityData, TaskError, TaskResult,
    is_last_key,
};
pub use entry::{PersistedQueueEntryData, QueueEntry, QueueStatus};
pub use error::{CeQueueDomainError, ParseActivityStatusError, ParseQueueStatusError};
pub use ids::{MAX_UUID_LENGTH, TaskUuid, WorkerUuid};
pub(crate) use ids::ensure_max_length;
pub use lifecycle::{ComputeEngineStatus, LifecycleGate, WorkersPauseStatus};
pub use task::{
    CeTaskSubmit, CeTaskSubmitBuilder, DEFAULT_ORGANIZATION_UUID, REPORT_TASK_TYPE,
    SubmitComponent, Task, TaskComponent, TaskData, TaskSubmitter,
};
