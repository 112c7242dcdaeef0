//! Identifier types for the queue domain.

use super::CeQueueDomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Width of the uuid columns in the queue and activity tables.
pub const MAX_UUID_LENGTH: usize = 40;

/// Unique identifier of a queued task.
///
/// The same value identifies the queue row while the task is open and the
/// activity row once it is finished.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskUuid(String);

impl TaskUuid {
    /// Generates a new random task identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Creates a validated task identifier.
    ///
    /// # Errors
    ///
    /// Returns [`CeQueueDomainError::EmptyTaskUuid`] when the value is blank
    /// or [`CeQueueDomainError::ValueTooLong`] when it does not fit the
    /// persisted column.
    pub fn new(value: impl Into<String>) -> Result<Self, CeQueueDomainError> {
        let raw = value.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CeQueueDomainError::EmptyTaskUuid);
        }
        ensure_max_length("task uuid", trimmed, MAX_UUID_LENGTH)?;
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the identifier as `str`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for TaskUuid {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for TaskUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque identity of the worker holding a lease.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerUuid(String);

impl WorkerUuid {
    /// Creates a validated worker identity.
    ///
    /// # Errors
    ///
    /// Returns [`CeQueueDomainError::EmptyWorkerUuid`] when the value is
    /// blank or [`CeQueueDomainError::ValueTooLong`] when it does not fit the
    /// persisted column.
    pub fn new(value: impl Into<String>) -> Result<Self, CeQueueDomainError> {
        let raw = value.into();
        if raw.trim().is_empty() {
            return Err(CeQueueDomainError::EmptyWorkerUuid);
        }
        ensure_max_length("worker uuid", &raw, MAX_UUID_LENGTH)?;
        Ok(Self(raw))
    }

    /// Returns the identity as `str`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for WorkerUuid {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for WorkerUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Rejects `value` when it has more than `max` characters.
pub(crate) fn ensure_max_length(
    field: &'static str,
    value: &str,
    max: usize,
) -> Result<(), CeQueueDomainError> {
    if value.chars().count() > max {
        return Err(CeQueueDomainError::ValueTooLong {
            field,
            max,
            value: value.to_owned(),
        });
    }
    Ok(())
}
