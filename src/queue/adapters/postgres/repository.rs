//! `PostgreSQL` repository implementation for the queue, activity, and task
//! data stores.

use super::{
    conversion::{
        activity_to_row, entry_to_new_row, parse_task_uuid, row_to_activity, row_to_entry,
        to_count,
    },
    models::{ActivityRow, QueueRow},
    schema::{ce_activity, ce_queue, ce_scanner_context, ce_task_input},
};
use crate::queue::{
    domain::{ActivityEntry, ActivityOutcome, QueueEntry, QueueStatus, TaskUuid, WorkerUuid},
    ports::{
        ArchiveResult, CeQueueRepository, CeQueueRepositoryError, CeQueueRepositoryResult,
        CeTaskDataRepository,
    },
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sql_types::{Timestamptz, Varchar};
use std::collections::BTreeSet;

/// `PostgreSQL` connection pool type for queue adapters.
pub type CePgPool = Pool<ConnectionManager<PgConnection>>;

type BoxedQueueQuery = ce_queue::BoxedQuery<'static, diesel::pg::Pg>;

const PENDING: &str = "PENDING";
const IN_PROGRESS: &str = "IN_PROGRESS";

/// Selects the oldest pending row, skipping rows locked by concurrent
/// callers, and leases it in the same statement.
const LEASE_OLDEST_PENDING_SQL: &str = r"
WITH next_task AS (
    SELECT uuid FROM ce_queue
    WHERE status = 'PENDING'
    ORDER BY created_at ASC, uuid ASC
    LIMIT 1
    FOR UPDATE SKIP LOCKED
)
UPDATE ce_queue
SET status = 'IN_PROGRESS', worker_uuid = $1, started_at = $2, updated_at = $2
FROM next_task
WHERE ce_queue.uuid = next_task.uuid
RETURNING ce_queue.*
";

/// Serializes archives of one `is_last_key` series until the transaction
/// ends, so exactly one activity of the series keeps `is_last`.
const LOCK_ACTIVITY_SERIES_SQL: &str = "SELECT pg_advisory_xact_lock(hashtext($1))";

impl From<DieselError> for CeQueueRepositoryError {
    fn from(err: DieselError) -> Self {
        Self::persistence(err)
    }
}

/// `PostgreSQL`-backed store implementing both queue ports.
#[derive(Debug, Clone)]
pub struct PostgresCeStore {
    pool: CePgPool,
}

impl PostgresCeStore {
    /// Creates a new store from a `PostgreSQL` pool.
    #[must_use]
    pub const fn new(pool: CePgPool) -> Self {
        Self { pool }
    }

    /// Builds a pool of at most `pool_size` connections to `database_url`.
    ///
    /// # Errors
    ///
    /// Returns [`CeQueueRepositoryError::Persistence`] when the pool cannot
    /// open its initial connections.
    pub fn connect(database_url: &str, pool_size: u32) -> CeQueueRepositoryResult<Self> {
        let manager = ConnectionManager::<PgConnection>::new(database_url);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(CeQueueRepositoryError::persistence)?;
        Ok(Self::new(pool))
    }

    async fn run_blocking<F, T>(&self, operation: F) -> CeQueueRepositoryResult<T>
    where
        F: FnOnce(&mut PgConnection) -> CeQueueRepositoryResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(CeQueueRepositoryError::persistence)?;
            operation(&mut connection)
        })
        .await
        .map_err(CeQueueRepositoryError::persistence)?
    }

    async fn select_queue_rows<F>(&self, filter: F) -> CeQueueRepositoryResult<Vec<QueueEntry>>
    where
        F: FnOnce(BoxedQueueQuery) -> BoxedQueueQuery + Send + 'static,
    {
        self.run_blocking(move |connection| {
            let rows = filter(ce_queue::table.into_boxed())
                .order((ce_queue::created_at.asc(), ce_queue::uuid.asc()))
                .select(QueueRow::as_select())
                .load::<QueueRow>(connection)?;
            rows.into_iter().map(row_to_entry).collect()
        })
        .await
    }
}

fn pending_exists<F>(connection: &mut PgConnection, filter: F) -> CeQueueRepositoryResult<bool>
where
    F: FnOnce(BoxedQueueQuery) -> BoxedQueueQuery,
{
    let count: i64 = filter(ce_queue::table.into_boxed())
        .filter(ce_queue::status.eq(PENDING))
        .count()
        .get_result(connection)?;
    Ok(count > 0)
}

fn archive_in_transaction(
    connection: &mut PgConnection,
    uuid: &str,
    expected_status: Option<QueueStatus>,
    outcome: ActivityOutcome,
    now: DateTime<Utc>,
) -> CeQueueRepositoryResult<ArchiveResult> {
    let row = ce_queue::table
        .find(uuid)
        .select(QueueRow::as_select())
        .for_update()
        .first::<QueueRow>(connection)
        .optional()?;
    let Some(row) = row else {
        return Ok(ArchiveResult::NotFound);
    };
    let entry = row_to_entry(row)?;
    if let Some(expected) = expected_status {
        if entry.status() != expected {
            return Ok(ArchiveResult::StatusMismatch(entry.status()));
        }
    }

    let activity = ActivityEntry::archive(&entry, outcome, now);
    diesel::sql_query(LOCK_ACTIVITY_SERIES_SQL)
        .bind::<Varchar, _>(activity.is_last_key().to_owned())
        .execute(connection)?;
    diesel::update(
        ce_activity::table
            .filter(ce_activity::is_last_key.eq(activity.is_last_key()))
            .filter(ce_activity::is_last.eq(true)),
    )
    .set((
        ce_activity::is_last.eq(false),
        ce_activity::updated_at.eq(now),
    ))
    .execute(connection)?;
    diesel::insert_into(ce_activity::table)
        .values(&activity_to_row(&activity))
        .execute(connection)?;
    diesel::delete(ce_queue::table.find(uuid)).execute(connection)?;
    Ok(ArchiveResult::Archived(activity))
}

#[async_trait]
impl CeQueueRepository for PostgresCeStore {
    async fn insert(&self, entry: &QueueEntry) -> CeQueueRepositoryResult<()> {
        let task_uuid = entry.uuid().clone();
        let new_row = entry_to_new_row(entry)?;

        self.run_blocking(move |connection| {
            connection.transaction::<_, CeQueueRepositoryError, _>(|tx| {
                let archived: i64 = ce_activity::table
                    .filter(ce_activity::uuid.eq(task_uuid.as_str()))
                    .count()
                    .get_result(tx)?;
                if archived > 0 {
                    return Err(CeQueueRepositoryError::DuplicateTask(task_uuid.clone()));
                }
                diesel::insert_into(ce_queue::table)
                    .values(&new_row)
                    .execute(tx)
                    .map_err(|err| match err {
                        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                            CeQueueRepositoryError::DuplicateTask(task_uuid.clone())
                        }
                        _ => CeQueueRepositoryError::persistence(err),
                    })?;
                Ok(())
            })
        })
        .await
    }

    async fn find_by_uuid(&self, uuid: &TaskUuid) -> CeQueueRepositoryResult<Option<QueueEntry>> {
        let key = uuid.as_str().to_owned();
        self.run_blocking(move |connection| {
            let row = ce_queue::table
                .find(key)
                .select(QueueRow::as_select())
                .first::<QueueRow>(connection)
                .optional()?;
            row.map(row_to_entry).transpose()
        })
        .await
    }

    async fn select_all_in_asc_order(&self) -> CeQueueRepositoryResult<Vec<QueueEntry>> {
        self.select_queue_rows(|query| query).await
    }

    async fn select_pending(&self) -> CeQueueRepositoryResult<Vec<QueueEntry>> {
        self.select_queue_rows(|query| query.filter(ce_queue::status.eq(PENDING)))
            .await
    }

    async fn select_worn_outs(&self) -> CeQueueRepositoryResult<Vec<QueueEntry>> {
        self.select_queue_rows(|query| {
            query
                .filter(ce_queue::status.eq(PENDING))
                .filter(ce_queue::started_at.is_not_null())
        })
        .await
    }

    async fn count_by_status(&self, status: QueueStatus) -> CeQueueRepositoryResult<u64> {
        self.run_blocking(move |connection| {
            let count: i64 = ce_queue::table
                .filter(ce_queue::status.eq(status.as_str()))
                .count()
                .get_result(connection)?;
            Ok(to_count(count))
        })
        .await
    }

    async fn has_pending_for_main_component(
        &self,
        main_component_uuid: &str,
    ) -> CeQueueRepositoryResult<bool> {
        let key = main_component_uuid.to_owned();
        self.run_blocking(move |connection| {
            pending_exists(connection, |query| {
                query.filter(ce_queue::main_component_uuid.eq(key))
            })
        })
        .await
    }

    async fn has_pending_for_task_type(&self, task_type: &str) -> CeQueueRepositoryResult<bool> {
        let key = task_type.to_owned();
        self.run_blocking(move |connection| {
            pending_exists(connection, |query| query.filter(ce_queue::task_type.eq(key)))
        })
        .await
    }

    async fn reset_to_pending_for_worker(
        &self,
        worker: &WorkerUuid,
        now: DateTime<Utc>,
    ) -> CeQueueRepositoryResult<u64> {
        let worker_key = worker.as_str().to_owned();
        self.run_blocking(move |connection| {
            let updated = diesel::update(
                ce_queue::table
                    .filter(ce_queue::status.eq(IN_PROGRESS))
                    .filter(ce_queue::worker_uuid.eq(worker_key)),
            )
            .set((
                ce_queue::status.eq(PENDING),
                ce_queue::worker_uuid.eq(None::<String>),
                ce_queue::updated_at.eq(now),
            ))
            .execute(connection)?;
            Ok(to_count(updated))
        })
        .await
    }

    async fn lease_oldest_pending(
        &self,
        worker: &WorkerUuid,
        now: DateTime<Utc>,
    ) -> CeQueueRepositoryResult<Option<QueueEntry>> {
        let worker_key = worker.as_str().to_owned();
        self.run_blocking(move |connection| {
            let rows = connection.transaction::<_, CeQueueRepositoryError, _>(|tx| {
                Ok(diesel::sql_query(LEASE_OLDEST_PENDING_SQL)
                    .bind::<Varchar, _>(worker_key)
                    .bind::<Timestamptz, _>(now)
                    .load::<QueueRow>(tx)?)
            })?;
            rows.into_iter().next().map(row_to_entry).transpose()
        })
        .await
    }

    async fn reset_tasks_with_unknown_workers(
        &self,
        known_workers: &BTreeSet<String>,
        now: DateTime<Utc>,
    ) -> CeQueueRepositoryResult<u64> {
        let known: Vec<String> = known_workers.iter().cloned().collect();
        self.run_blocking(move |connection| {
            let updated = diesel::update(
                ce_queue::table
                    .filter(ce_queue::status.eq(IN_PROGRESS))
                    .filter(
                        ce_queue::worker_uuid
                            .is_null()
                            .or(ce_queue::worker_uuid.assume_not_null().ne_all(known)),
                    ),
            )
            .set((
                ce_queue::status.eq(PENDING),
                ce_queue::worker_uuid.eq(None::<String>),
                ce_queue::updated_at.eq(now),
            ))
            .execute(connection)?;
            Ok(to_count(updated))
        })
        .await
    }

    async fn archive(
        &self,
        uuid: &TaskUuid,
        expected_status: Option<QueueStatus>,
        outcome: ActivityOutcome,
        now: DateTime<Utc>,
    ) -> CeQueueRepositoryResult<ArchiveResult> {
        let key = uuid.as_str().to_owned();
        self.run_blocking(move |connection| {
            connection.transaction::<_, CeQueueRepositoryError, _>(|tx| {
                archive_in_transaction(tx, &key, expected_status, outcome, now)
            })
        })
        .await
    }

    async fn clear(&self) -> CeQueueRepositoryResult<u64> {
        self.run_blocking(move |connection| {
            connection.transaction::<_, CeQueueRepositoryError, _>(|tx| {
                diesel::delete(
                    ce_task_input::table.filter(
                        ce_task_input::task_uuid.eq_any(ce_queue::table.select(ce_queue::uuid)),
                    ),
                )
                .execute(tx)?;
                let deleted = diesel::delete(ce_queue::table).execute(tx)?;
                Ok(to_count(deleted))
            })
        })
        .await
    }

    async fn find_activity_by_uuid(
        &self,
        uuid: &TaskUuid,
    ) -> CeQueueRepositoryResult<Option<ActivityEntry>> {
        let key = uuid.as_str().to_owned();
        self.run_blocking(move |connection| {
            let row = ce_activity::table
                .find(key)
                .select(ActivityRow::as_select())
                .first::<ActivityRow>(connection)
                .optional()?;
            row.map(row_to_activity).transpose()
        })
        .await
    }

    async fn purge_activities_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> CeQueueRepositoryResult<Vec<TaskUuid>> {
        self.run_blocking(move |connection| {
            let mut purged: Vec<String> =
                diesel::delete(ce_activity::table.filter(ce_activity::created_at.lt(cutoff)))
                    .returning(ce_activity::uuid)
                    .get_results(connection)?;
            purged.sort();
            purged.into_iter().map(parse_task_uuid).collect()
        })
        .await
    }
}

#[async_trait]
impl CeTaskDataRepository for PostgresCeStore {
    async fn insert_task_input(
        &self,
        uuid: &TaskUuid,
        data: Vec<u8>,
        now: DateTime<Utc>,
    ) -> CeQueueRepositoryResult<()> {
        let key = uuid.as_str().to_owned();
        self.run_blocking(move |connection| {
            diesel::insert_into(ce_task_input::table)
                .values((
                    ce_task_input::task_uuid.eq(&key),
                    ce_task_input::input_data.eq(&data),
                    ce_task_input::created_at.eq(now),
                ))
                .on_conflict(ce_task_input::task_uuid)
                .do_update()
                .set((
                    ce_task_input::input_data.eq(&data),
                    ce_task_input::created_at.eq(now),
                ))
                .execute(connection)?;
            Ok(())
        })
        .await
    }

    async fn find_task_input(&self, uuid: &TaskUuid) -> CeQueueRepositoryResult<Option<Vec<u8>>> {
        let key = uuid.as_str().to_owned();
        self.run_blocking(move |connection| {
            Ok(ce_task_input::table
                .find(key)
                .select(ce_task_input::input_data)
                .first::<Vec<u8>>(connection)
                .optional()?)
        })
        .await
    }

    async fn insert_scanner_context(
        &self,
        uuid: &TaskUuid,
        data: Vec<u8>,
        now: DateTime<Utc>,
    ) -> CeQueueRepositoryResult<()> {
        let key = uuid.as_str().to_owned();
        self.run_blocking(move |connection| {
            diesel::insert_into(ce_scanner_context::table)
                .values((
                    ce_scanner_context::task_uuid.eq(&key),
                    ce_scanner_context::context_data.eq(&data),
                    ce_scanner_context::created_at.eq(now),
                ))
                .on_conflict(ce_scanner_context::task_uuid)
                .do_update()
                .set((
                    ce_scanner_context::context_data.eq(&data),
                    ce_scanner_context::created_at.eq(now),
                ))
                .execute(connection)?;
            Ok(())
        })
        .await
    }

    async fn find_scanner_context(
        &self,
        uuid: &TaskUuid,
    ) -> CeQueueRepositoryResult<Option<Vec<u8>>> {
        let key = uuid.as_str().to_owned();
        self.run_blocking(move |connection| {
            Ok(ce_scanner_context::table
                .find(key)
                .select(ce_scanner_context::context_data)
                .first::<Vec<u8>>(connection)
                .optional()?)
        })
        .await
    }

    async fn delete_task_inputs_without_queue_entry(&self) -> CeQueueRepositoryResult<u64> {
        self.run_blocking(move |connection| {
            let deleted = diesel::delete(ce_task_input::table.filter(diesel::dsl::not(
                ce_task_input::task_uuid.eq_any(ce_queue::table.select(ce_queue::uuid)),
            )))
            .execute(connection)?;
            Ok(to_count(deleted))
        })
        .await
    }

    async fn delete_orphan_task_inputs(&self) -> CeQueueRepositoryResult<u64> {
        self.run_blocking(move |connection| {
            let deleted = diesel::delete(
                ce_task_input::table
                    .filter(diesel::dsl::not(
                        ce_task_input::task_uuid.eq_any(ce_queue::table.select(ce_queue::uuid)),
                    ))
                    .filter(diesel::dsl::not(
                        ce_task_input::task_uuid
                            .eq_any(ce_activity::table.select(ce_activity::uuid)),
                    )),
            )
            .execute(connection)?;
            Ok(to_count(deleted))
        })
        .await
    }

    async fn delete_scanner_contexts(&self, uuids: &[TaskUuid]) -> CeQueueRepositoryResult<u64> {
        if uuids.is_empty() {
            return Ok(0);
        }
        let keys: Vec<String> = uuids.iter().map(|uuid| uuid.as_str().to_owned()).collect();
        self.run_blocking(move |connection| {
            let deleted = diesel::delete(
                ce_scanner_context::table.filter(ce_scanner_context::task_uuid.eq_any(keys)),
            )
            .execute(connection)?;
            Ok(to_count(deleted))
        })
        .await
    }

    async fn delete_scanner_contexts_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> CeQueueRepositoryResult<u64> {
        self.run_blocking(move |connection| {
            let deleted = diesel::delete(
                ce_scanner_context::table.filter(ce_scanner_context::created_at.lt(cutoff)),
            )
            .execute(connection)?;
            Ok(to_count(deleted))
        })
        .await
    }
}
