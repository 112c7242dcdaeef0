//! Application services for the compute-engine task queue.

mod cleaner;
mod error;
mod queue;
mod recovery;
mod status;

pub use cleaner::{CeCleaner, CleanReport, DEFAULT_ACTIVITY_RETENTION_DAYS};
pub use error::{CeQueueErrorKind, CeQueueServiceError, CeQueueServiceResult};
pub use queue::{CeQueueService, QueueStatusSnapshot, SubmitOption};
pub use recovery::{CeQueueRecovery, StartupReport};
pub use status::CeQueueStatus;
