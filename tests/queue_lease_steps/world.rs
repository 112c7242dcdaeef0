//! Shared world state for queue lease BDD scenarios.

use std::collections::HashMap;
use std::sync::Arc;

use ce_queue::queue::{
    adapters::memory::{InMemoryCeStore, InMemoryComponentDirectory},
    domain::{ComputeEngineStatus, LifecycleGate, Task},
    services::{CeQueueRecovery, CeQueueService, CeQueueStatus},
};
use mockable::DefaultClock;
use rstest::fixture;

/// Service type used by the BDD world.
pub type TestQueueService =
    CeQueueService<InMemoryCeStore, InMemoryComponentDirectory, CeQueueStatus, DefaultClock>;

/// Scenario world for queue lease behaviour tests.
pub struct QueueLeaseWorld {
    pub store: Arc<InMemoryCeStore>,
    pub status: Arc<CeQueueStatus>,
    pub gate: Arc<LifecycleGate>,
    pub service: TestQueueService,
    pub leases: HashMap<String, Option<Task>>,
}

impl QueueLeaseWorld {
    /// Creates a world whose engine is still starting.
    #[must_use]
    pub fn new() -> Self {
        let store = Arc::new(InMemoryCeStore::new());
        let status = Arc::new(CeQueueStatus::new());
        let gate = Arc::new(LifecycleGate::new(ComputeEngineStatus::Starting));
        let service = CeQueueService::new(
            Arc::clone(&store),
            Arc::new(InMemoryComponentDirectory::new()),
            Arc::clone(&status),
            Arc::clone(&gate),
            Arc::new(DefaultClock),
        );

        Self {
            store,
            status,
            gate,
            service,
            leases: HashMap::new(),
        }
    }

    /// Builds a recovery service over the world's store.
    #[must_use]
    pub fn recovery(&self) -> CeQueueRecovery<InMemoryCeStore, InMemoryCeStore, DefaultClock> {
        CeQueueRecovery::new(
            Arc::clone(&self.store),
            Arc::clone(&self.store),
            Arc::new(DefaultClock),
        )
    }

    /// Returns the task last leased by `worker`.
    ///
    /// # Errors
    ///
    /// Returns an error when the worker never peeked or received nothing.
    pub fn lease_of(&self, worker: &str) -> Result<&Task, eyre::Report> {
        self.leases
            .get(worker)
            .ok_or_else(|| eyre::eyre!("worker {worker} never peeked"))?
            .as_ref()
            .ok_or_else(|| eyre::eyre!("worker {worker} received nothing"))
    }
}

impl Default for QueueLeaseWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> QueueLeaseWorld {
    QueueLeaseWorld::default()
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
