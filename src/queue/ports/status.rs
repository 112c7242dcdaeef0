//! Port for the monitoring counters fed by terminal transitions.

/// Cumulative counters of terminal transitions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueCounters {
    /// Tasks removed as successful.
    pub success_count: u64,
    /// Tasks removed or marked as failed.
    pub error_count: u64,
    /// Tasks canceled through the queue API.
    pub canceled_count: u64,
    /// Sum of processing times of successful and failed tasks.
    pub processing_time_ms: u64,
}

/// Sink for terminal-transition events.
///
/// Each terminal transition is reported exactly once, including a `remove`
/// whose queue row has already vanished.
pub trait QueueStatusRecorder: Send + Sync {
    /// Records a successful task.
    fn add_success(&self, processing_time_ms: u64);

    /// Records a failed task.
    fn add_error(&self, processing_time_ms: u64);

    /// Records a canceled task.
    fn add_canceled(&self);

    /// Returns the counters recorded so far.
    fn counters(&self) -> QueueCounters;
}
