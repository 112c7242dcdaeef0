//! Error types for queue domain validation and parsing.

use thiserror::Error;

/// Errors returned while constructing domain queue values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CeQueueDomainError {
    /// The worker identity is empty after trimming.
    #[error("worker uuid must not be empty")]
    EmptyWorkerUuid,

    /// The task uuid is empty after trimming.
    #[error("task uuid must not be empty")]
    EmptyTaskUuid,

    /// The task type is empty after trimming.
    #[error("task type must not be empty")]
    EmptyTaskType,

    /// The value exceeds the persisted column width.
    #[error("{field} exceeds {max} characters: '{value}'")]
    ValueTooLong {
        /// Name of the offending field.
        field: &'static str,
        /// Maximum accepted length.
        max: usize,
        /// Rejected value.
        value: String,
    },
}

/// Error returned while parsing queue statuses from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown queue status: {0}")]
pub struct ParseQueueStatusError(pub String);

/// Error returned while parsing activity statuses from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown activity status: {0}")]
pub struct ParseActivityStatusError(pub String);
