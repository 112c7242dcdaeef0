//! Service-level errors for queue operations.

use crate::queue::{
    domain::{ActivityStatus, CeQueueDomainError, TaskUuid},
    ports::CeQueueRepositoryError,
};
use thiserror::Error;

/// Coarse classification of [`CeQueueServiceError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CeQueueErrorKind {
    /// The caller violated the operation contract.
    InvalidArgument,
    /// The operation conflicts with the current state of the task or queue.
    IllegalState,
    /// The store failed.
    Storage,
}

/// Errors returned by queue services.
#[derive(Debug, Error)]
pub enum CeQueueServiceError {
    /// Domain validation failed.
    #[error(transparent)]
    Domain(#[from] CeQueueDomainError),

    /// Repository operation failed.
    #[error(transparent)]
    Repository(#[from] CeQueueRepositoryError),

    /// An error was supplied together with a non-failed status.
    #[error("error can be provided only when status is FAILED, got {0}")]
    ErrorWithNonFailedStatus(ActivityStatus),

    /// The task has no queue row.
    #[error("task {0} is not in queue")]
    NotInQueue(TaskUuid),

    /// The task is leased by a worker and cannot be canceled.
    #[error("task {0} is in progress and can't be canceled")]
    TaskInProgress(TaskUuid),

    /// The task is not leased and cannot be marked as failed.
    #[error("task {0} is not in-progress and can't be marked as failed")]
    TaskNotInProgress(TaskUuid),

    /// Submissions are paused.
    #[error("compute engine does not currently accept new tasks")]
    SubmitPaused,
}

impl CeQueueServiceError {
    /// Classifies the error.
    #[must_use]
    pub const fn kind(&self) -> CeQueueErrorKind {
        match self {
            Self::Domain(_) | Self::ErrorWithNonFailedStatus(_) => {
                CeQueueErrorKind::InvalidArgument
            }
            Self::Repository(CeQueueRepositoryError::DuplicateTask(_))
            | Self::NotInQueue(_)
            | Self::TaskInProgress(_)
            | Self::TaskNotInProgress(_)
            | Self::SubmitPaused => CeQueueErrorKind::IllegalState,
            Self::Repository(_) => CeQueueErrorKind::Storage,
        }
    }
}

/// Result type for queue service operations.
pub type CeQueueServiceResult<T> = Result<T, CeQueueServiceError>;
