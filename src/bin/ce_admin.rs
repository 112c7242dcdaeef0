//! Runs compute-engine queue maintenance against a `PostgreSQL` store.
//!
//! Usage:
//!
//! ```text
//! ce_admin <operation> <config-path>
//! ```
//!
//! The `operation` must be one of `start`, `clean`, `status`, `cancel-all`,
//! `cancel-worn-outs`, or `reset-unknown-workers`. The JSON document at
//! `config-path` must deserialize into a [`CeQueueConfig`]. A representative
//! document is:
//!
//! ```json
//! {
//!   "database_url": "postgres://ce:ce@localhost:5432/ce",
//!   "pool_size": 4,
//!   "node_name": "ce-node-1",
//!   "activity_retention_days": 180,
//!   "upgraded": false,
//!   "known_worker_uuids": ["worker-1", "worker-2"]
//! }
//! ```
//!
//! `CE_QUEUE_DATABASE_URL` overrides `database_url`. Log verbosity follows
//! `RUST_LOG`.

use camino::{Utf8Path, Utf8PathBuf};
use ce_queue::config::{CeQueueConfig, CeQueueConfigError};
use ce_queue::queue::{
    adapters::{memory::InMemoryComponentDirectory, postgres::PostgresCeStore},
    domain::LifecycleGate,
    ports::CeQueueRepositoryError,
    services::{CeCleaner, CeQueueRecovery, CeQueueService, CeQueueServiceError, CeQueueStatus},
};
use ce_queue::telemetry;
use mockable::DefaultClock;
use std::env;
use std::sync::Arc;
use thiserror::Error;
use tokio::runtime::Builder;
use tracing::info;

/// Boxed error type for the main result.
type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
enum AdminError {
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),
    #[error(transparent)]
    Config(#[from] CeQueueConfigError),
    #[error("failed to connect to the queue store: {0}")]
    Connect(#[source] CeQueueRepositoryError),
    #[error("runtime init failed: {0}")]
    RuntimeInit(#[source] std::io::Error),
    #[error(transparent)]
    Queue(#[from] CeQueueServiceError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Start,
    Clean,
    Status,
    CancelAll,
    CancelWornOuts,
    ResetUnknownWorkers,
}

impl Operation {
    fn parse(arg: &Utf8Path) -> Result<Self, AdminError> {
        match arg.as_str() {
            "start" => Ok(Self::Start),
            "clean" => Ok(Self::Clean),
            "status" => Ok(Self::Status),
            "cancel-all" => Ok(Self::CancelAll),
            "cancel-worn-outs" => Ok(Self::CancelWornOuts),
            "reset-unknown-workers" => Ok(Self::ResetUnknownWorkers),
            other => Err(AdminError::InvalidArgs(format!(
                "unknown operation '{other}'; expected start, clean, status, cancel-all, \
                 cancel-worn-outs, or reset-unknown-workers"
            ))),
        }
    }
}

struct Admin {
    config: CeQueueConfig,
    store: Arc<PostgresCeStore>,
    clock: Arc<DefaultClock>,
}

impl Admin {
    fn queue_service(
        &self,
    ) -> CeQueueService<PostgresCeStore, InMemoryComponentDirectory, CeQueueStatus, DefaultClock>
    {
        let service = CeQueueService::new(
            Arc::clone(&self.store),
            Arc::new(InMemoryComponentDirectory::new()),
            Arc::new(CeQueueStatus::new()),
            Arc::new(LifecycleGate::started()),
            Arc::clone(&self.clock),
        );
        let Some(node_name) = &self.config.node_name else {
            return service;
        };
        service.with_node_name(node_name.as_str())
    }

    fn recovery(&self) -> CeQueueRecovery<PostgresCeStore, PostgresCeStore, DefaultClock> {
        let recovery = CeQueueRecovery::new(
            Arc::clone(&self.store),
            Arc::clone(&self.store),
            Arc::clone(&self.clock),
        );
        let Some(node_name) = &self.config.node_name else {
            return recovery;
        };
        recovery.with_node_name(node_name.as_str())
    }

    async fn execute(&self, operation: Operation) -> Result<(), AdminError> {
        match operation {
            Operation::Start => {
                let report = self.recovery().start(self.config.upgraded).await?;
                info!(
                    orphan_inputs_deleted = report.orphan_inputs_deleted,
                    queue_rows_cleared = report.queue_rows_cleared,
                    "start completed"
                );
            }
            Operation::Clean => {
                let cleaner = CeCleaner::new(
                    Arc::clone(&self.store),
                    Arc::clone(&self.store),
                    Arc::clone(&self.clock),
                    self.config.activity_retention_days,
                );
                if let Some(report) = cleaner.clean().await? {
                    info!(
                        activities_purged = report.activities_purged,
                        scanner_contexts_deleted = report.scanner_contexts_deleted,
                        task_inputs_deleted = report.task_inputs_deleted,
                        "clean completed"
                    );
                }
            }
            Operation::Status => {
                let snapshot = self.queue_service().status_snapshot().await?;
                info!(
                    pending = snapshot.pending_count,
                    in_progress = snapshot.in_progress_count,
                    "queue status"
                );
            }
            Operation::CancelAll => {
                let canceled = self.queue_service().cancel_all().await?;
                info!(canceled, "cancel-all completed");
            }
            Operation::CancelWornOuts => {
                let canceled = self.recovery().cancel_worn_outs().await?;
                info!(canceled, "cancel-worn-outs completed");
            }
            Operation::ResetUnknownWorkers => {
                let reset = self
                    .recovery()
                    .reset_tasks_with_unknown_worker_uuids(&self.config.known_worker_uuids)
                    .await?;
                info!(reset, "reset-unknown-workers completed");
            }
        }
        Ok(())
    }
}

fn main() -> Result<(), BoxError> {
    telemetry::init();
    let args = collect_args()?;
    run_admin(args.into_iter()).map_err(Into::into)
}

fn collect_args() -> Result<Vec<Utf8PathBuf>, AdminError> {
    env::args_os()
        .map(|arg_os| {
            let arg = arg_os
                .into_string()
                .map_err(|_| AdminError::InvalidArgs("argument is not valid UTF-8".into()))?;
            Ok(Utf8PathBuf::from(arg))
        })
        .collect()
}

fn run_admin(args: impl Iterator<Item = Utf8PathBuf>) -> Result<(), AdminError> {
    let (operation, config_path) = parse_args(args)?;
    let config = CeQueueConfig::load(&config_path)?;
    let store = PostgresCeStore::connect(config.database_url()?, config.pool_size)
        .map_err(AdminError::Connect)?;
    let admin = Admin {
        config,
        store: Arc::new(store),
        clock: Arc::new(DefaultClock),
    };

    let runtime = Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(AdminError::RuntimeInit)?;
    runtime.block_on(admin.execute(operation))
}

fn parse_args(
    mut args: impl Iterator<Item = Utf8PathBuf>,
) -> Result<(Operation, Utf8PathBuf), AdminError> {
    let _program = args.next();
    let operation = args
        .next()
        .ok_or_else(|| AdminError::InvalidArgs("missing operation".into()))?;
    let config_path = args
        .next()
        .ok_or_else(|| AdminError::InvalidArgs("missing config path".into()))?;
    if let Some(extra) = args.next() {
        return Err(AdminError::InvalidArgs(format!(
            "unexpected extra argument: {extra}"
        )));
    }
    Ok((Operation::parse(&operation)?, config_path))
}
