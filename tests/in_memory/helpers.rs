//! Shared test helpers for in-memory queue integration tests.

use std::sync::Arc;

use ce_queue::queue::{
    adapters::memory::{InMemoryCeStore, InMemoryComponentDirectory},
    domain::{CeTaskSubmit, LifecycleGate, REPORT_TASK_TYPE, SubmitComponent},
    services::{CeCleaner, CeQueueRecovery, CeQueueService, CeQueueStatus},
};
use mockable::DefaultClock;
use rstest::fixture;

/// Queue service wired to in-memory adapters.
pub type MemoryQueueService =
    CeQueueService<InMemoryCeStore, InMemoryComponentDirectory, CeQueueStatus, DefaultClock>;

/// Adapters and services sharing one in-memory store.
pub struct QueueFixture {
    pub store: Arc<InMemoryCeStore>,
    pub directory: Arc<InMemoryComponentDirectory>,
    pub status: Arc<CeQueueStatus>,
    pub service: MemoryQueueService,
}

impl QueueFixture {
    /// Builds the startup recovery service over the shared store.
    #[must_use]
    pub fn recovery(&self) -> CeQueueRecovery<InMemoryCeStore, InMemoryCeStore, DefaultClock> {
        CeQueueRecovery::new(
            Arc::clone(&self.store),
            Arc::clone(&self.store),
            Arc::new(DefaultClock),
        )
    }

    /// Builds a cleaner over the shared store.
    #[must_use]
    pub fn cleaner(
        &self,
        retention_days: u32,
    ) -> CeCleaner<InMemoryCeStore, InMemoryCeStore, DefaultClock> {
        CeCleaner::new(
            Arc::clone(&self.store),
            Arc::clone(&self.store),
            Arc::new(DefaultClock),
            retention_days,
        )
    }
}

/// Provides a started queue with empty stores.
#[fixture]
pub fn queue() -> QueueFixture {
    let store = Arc::new(InMemoryCeStore::new());
    let directory = Arc::new(InMemoryComponentDirectory::new());
    let status = Arc::new(CeQueueStatus::new());
    let service = CeQueueService::new(
        Arc::clone(&store),
        Arc::clone(&directory),
        Arc::clone(&status),
        Arc::new(LifecycleGate::started()),
        Arc::new(DefaultClock),
    )
    .with_node_name("integration-node");
    QueueFixture {
        store,
        directory,
        status,
        service,
    }
}

/// Builds a report submission for `component_uuid` with a fixed uuid.
///
/// # Errors
///
/// Returns an error if the submission is invalid.
pub fn report_for(uuid: &str, component_uuid: &str) -> Result<CeTaskSubmit, eyre::Report> {
    CeTaskSubmit::builder(REPORT_TASK_TYPE)
        .with_uuid(uuid)
        .with_component(SubmitComponent::new(component_uuid))
        .build()
        .map_err(|err| eyre::eyre!("invalid submission: {err}"))
}
