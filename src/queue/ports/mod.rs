//! Port contracts for the compute-engine task queue.
//!
//! Ports define infrastructure-agnostic interfaces used by queue services.

pub mod component;
pub mod repository;
pub mod status;
pub mod task_data;

pub use component::{ComponentDirectory, ComponentInfo};
pub use repository::{
    ArchiveResult, CeQueueRepository, CeQueueRepositoryError, CeQueueRepositoryResult,
};
pub use status::{QueueCounters, QueueStatusRecorder};
pub use task_data::CeTaskDataRepository;
