//! Shared test helpers for `PostgreSQL` integration tests.

use std::sync::Arc;

use ce_queue::queue::{
    adapters::{memory::InMemoryComponentDirectory, postgres::PostgresCeStore},
    domain::{CeTaskSubmit, LifecycleGate, REPORT_TASK_TYPE},
    services::{CeQueueService, CeQueueStatus},
};
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use mockable::DefaultClock;
use postgresql_embedded::{PostgreSQL, Settings};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// SQL creating the queue, activity, and payload tables.
pub const CREATE_CE_TABLES_SQL: &str =
    include_str!("../../migrations/2026-01-15-000000_create_ce_tables/up.sql");

const DATABASE: &str = "ce_queue_test";

/// Queue service wired to the `PostgreSQL` store.
pub type PgQueueService =
    CeQueueService<PostgresCeStore, InMemoryComponentDirectory, CeQueueStatus, DefaultClock>;

/// Embedded server with the schema applied and a store connected to it.
pub struct TestDatabase {
    postgres: PostgreSQL,
    pub store: Arc<PostgresCeStore>,
}

impl TestDatabase {
    /// Starts a throwaway server and applies the schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot start or the schema fails.
    pub async fn start() -> Result<Self, BoxError> {
        let mut postgres = PostgreSQL::new(Settings::default());
        postgres.setup().await?;
        postgres.start().await?;
        postgres.create_database(DATABASE).await?;
        let url = postgres.settings().url(DATABASE);

        let store = tokio::task::spawn_blocking(move || -> Result<PostgresCeStore, BoxError> {
            apply_migrations(&url)?;
            Ok(PostgresCeStore::connect(&url, 4)?)
        })
        .await??;

        Ok(Self {
            postgres,
            store: Arc::new(store),
        })
    }

    /// Builds a started queue service over the store.
    #[must_use]
    pub fn service(&self) -> PgQueueService {
        CeQueueService::new(
            Arc::clone(&self.store),
            Arc::new(InMemoryComponentDirectory::new()),
            Arc::new(CeQueueStatus::new()),
            Arc::new(LifecycleGate::started()),
            Arc::new(DefaultClock),
        )
        .with_node_name("pg-node")
    }

    /// Stops the server and removes its data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the server does not stop cleanly.
    pub async fn stop(self) -> Result<(), BoxError> {
        self.postgres.stop().await?;
        Ok(())
    }
}

fn apply_migrations(url: &str) -> Result<(), BoxError> {
    let mut conn = PgConnection::establish(url)?;
    conn.batch_execute(CREATE_CE_TABLES_SQL)?;
    Ok(())
}

/// Builds a report submission with a fixed uuid.
///
/// # Errors
///
/// Returns an error if the submission is invalid.
pub fn report(uuid: &str) -> Result<CeTaskSubmit, BoxError> {
    Ok(CeTaskSubmit::builder(REPORT_TASK_TYPE).with_uuid(uuid).build()?)
}
