//! Process-wide switches that decide whether work may be leased or
//! submitted.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// Coarse application status of the compute engine process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComputeEngineStatus {
    /// The process is booting; nothing may be leased yet.
    Starting,
    /// The process is fully started.
    Started,
    /// The process is shutting down; nothing new may be leased.
    Stopping,
}

impl ComputeEngineStatus {
    const fn to_u8(self) -> u8 {
        match self {
            Self::Starting => 0,
            Self::Started => 1,
            Self::Stopping => 2,
        }
    }

    const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Started,
            2 => Self::Stopping,
            _ => Self::Starting,
        }
    }
}

/// Pause state of the workers as seen by operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkersPauseStatus {
    /// Workers lease tasks normally.
    Resumed,
    /// Pause requested while tasks are still in progress.
    Pausing,
    /// Pause requested and nothing is in progress.
    Paused,
}

/// Shared gate consulted by every lease and submission.
///
/// Injected into the queue service; reads and writes are lock-free so that
/// operator calls never wait on workers.
#[derive(Debug)]
pub struct LifecycleGate {
    workers_paused: AtomicBool,
    submit_paused: AtomicBool,
    status: AtomicU8,
}

impl LifecycleGate {
    /// Creates a gate in the given application status, not paused.
    #[must_use]
    pub const fn new(status: ComputeEngineStatus) -> Self {
        Self {
            workers_paused: AtomicBool::new(false),
            submit_paused: AtomicBool::new(false),
            status: AtomicU8::new(status.to_u8()),
        }
    }

    /// Creates a gate for a fully started process.
    #[must_use]
    pub const fn started() -> Self {
        Self::new(ComputeEngineStatus::Started)
    }

    /// Stops workers from leasing new tasks.
    pub fn pause_workers(&self) {
        self.workers_paused.store(true, Ordering::SeqCst);
    }

    /// Lets workers lease tasks again.
    pub fn resume_workers(&self) {
        self.workers_paused.store(false, Ordering::SeqCst);
    }

    /// Returns `true` while workers are paused.
    #[must_use]
    pub fn is_workers_paused(&self) -> bool {
        self.workers_paused.load(Ordering::SeqCst)
    }

    /// Rejects new submissions.
    pub fn pause_submit(&self) {
        self.submit_paused.store(true, Ordering::SeqCst);
    }

    /// Accepts new submissions again.
    pub fn resume_submit(&self) {
        self.submit_paused.store(false, Ordering::SeqCst);
    }

    /// Returns `true` while submissions are rejected.
    #[must_use]
    pub fn is_submit_paused(&self) -> bool {
        self.submit_paused.load(Ordering::SeqCst)
    }

    /// Updates the application status.
    pub fn set_status(&self, status: ComputeEngineStatus) {
        self.status.store(status.to_u8(), Ordering::SeqCst);
    }

    /// Returns the application status.
    #[must_use]
    pub fn status(&self) -> ComputeEngineStatus {
        ComputeEngineStatus::from_u8(self.status.load(Ordering::SeqCst))
    }

    /// Returns `true` when a worker may lease a task right now.
    #[must_use]
    pub fn allows_lease(&self) -> bool {
        !self.is_workers_paused() && self.status() == ComputeEngineStatus::Started
    }
}

impl Default for LifecycleGate {
    fn default() -> Self {
        Self::new(ComputeEngineStatus::Starting)
    }
}
