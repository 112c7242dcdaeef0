//! In-process queue status counters.

use crate::queue::ports::{QueueCounters, QueueStatusRecorder};
use std::sync::atomic::{AtomicU64, Ordering};

/// Cumulative counters kept in process memory.
///
/// Values reset when the process restarts.
#[derive(Debug, Default)]
pub struct CeQueueStatus {
    success_count: AtomicU64,
    error_count: AtomicU64,
    canceled_count: AtomicU64,
    processing_time_ms: AtomicU64,
}

impl CeQueueStatus {
    /// Creates zeroed counters.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            success_count: AtomicU64::new(0),
            error_count: AtomicU64::new(0),
            canceled_count: AtomicU64::new(0),
            processing_time_ms: AtomicU64::new(0),
        }
    }
}

impl QueueStatusRecorder for CeQueueStatus {
    fn add_success(&self, processing_time_ms: u64) {
        self.success_count.fetch_add(1, Ordering::Relaxed);
        self.processing_time_ms
            .fetch_add(processing_time_ms, Ordering::Relaxed);
    }

    fn add_error(&self, processing_time_ms: u64) {
        self.error_count.fetch_add(1, Ordering::Relaxed);
        self.processing_time_ms
            .fetch_add(processing_time_ms, Ordering::Relaxed);
    }

    fn add_canceled(&self) {
        self.canceled_count.fetch_add(1, Ordering::Relaxed);
    }

    fn counters(&self) -> QueueCounters {
        QueueCounters {
            success_count: self.success_count.load(Ordering::Relaxed),
            error_count: self.error_count.load(Ordering::Relaxed),
            canceled_count: self.canceled_count.load(Ordering::Relaxed),
            processing_time_ms: self.processing_time_ms.load(Ordering::Relaxed),
        }
    }
}
