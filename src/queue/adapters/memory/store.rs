//! In-memory queue store for tests and single-process deployments.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::queue::{
    domain::{
        ActivityEntry, ActivityOutcome, QueueEntry, QueueStatus, TaskUuid, WorkerUuid,
    },
    ports::{
        ArchiveResult, CeQueueRepository, CeQueueRepositoryError, CeQueueRepositoryResult,
        CeTaskDataRepository,
    },
};

/// Thread-safe in-memory queue, activity, and task data store.
///
/// Every operation runs under a single lock, which makes each method one
/// indivisible step with respect to concurrent callers.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCeStore {
    state: Arc<RwLock<InMemoryCeState>>,
}

#[derive(Debug, Default)]
struct InMemoryCeState {
    queue: HashMap<TaskUuid, QueueEntry>,
    activities: HashMap<TaskUuid, ActivityEntry>,
    task_inputs: HashMap<TaskUuid, StoredBlob>,
    scanner_contexts: HashMap<TaskUuid, StoredBlob>,
}

#[derive(Debug, Clone)]
struct StoredBlob {
    data: Vec<u8>,
    created_at: DateTime<Utc>,
}

impl InMemoryCeStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Deletes a queue row without archiving it.
    ///
    /// Returns `true` when a row was deleted. Lets callers simulate a row
    /// removed behind the queue's back, e.g. by another node.
    ///
    /// # Errors
    ///
    /// Returns [`CeQueueRepositoryError::Persistence`] when the lock is
    /// poisoned.
    pub fn delete_by_uuid(&self, uuid: &TaskUuid) -> CeQueueRepositoryResult<bool> {
        let mut state = self.write_state()?;
        Ok(state.queue.remove(uuid).is_some())
    }

    fn read_state(&self) -> CeQueueRepositoryResult<RwLockReadGuard<'_, InMemoryCeState>> {
        self.state.read().map_err(|err| {
            CeQueueRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })
    }

    fn write_state(&self) -> CeQueueRepositoryResult<RwLockWriteGuard<'_, InMemoryCeState>> {
        self.state.write().map_err(|err| {
            CeQueueRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })
    }
}

/// Collects rows matching `predicate` in queue order.
fn select_ordered(
    state: &InMemoryCeState,
    predicate: impl Fn(&QueueEntry) -> bool,
) -> Vec<QueueEntry> {
    let mut entries: Vec<QueueEntry> = state
        .queue
        .values()
        .filter(|entry| predicate(entry))
        .cloned()
        .collect();
    entries.sort_by(QueueEntry::queue_order);
    entries
}

/// Resets every in-progress row matching `predicate`.
fn reset_matching(
    state: &mut InMemoryCeState,
    now: DateTime<Utc>,
    predicate: impl Fn(&QueueEntry) -> bool,
) -> u64 {
    let mut reset = 0_u64;
    for entry in state.queue.values_mut() {
        if entry.status() == QueueStatus::InProgress && predicate(entry) {
            entry.reset_to_pending(now);
            reset += 1;
        }
    }
    reset
}

fn to_count(value: usize) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}

#[async_trait]
impl CeQueueRepository for InMemoryCeStore {
    async fn insert(&self, entry: &QueueEntry) -> CeQueueRepositoryResult<()> {
        let mut state = self.write_state()?;
        let uuid = entry.uuid();
        if state.queue.contains_key(uuid) || state.activities.contains_key(uuid) {
            return Err(CeQueueRepositoryError::DuplicateTask(uuid.clone()));
        }
        state.queue.insert(uuid.clone(), entry.clone());
        Ok(())
    }

    async fn find_by_uuid(&self, uuid: &TaskUuid) -> CeQueueRepositoryResult<Option<QueueEntry>> {
        let state = self.read_state()?;
        Ok(state.queue.get(uuid).cloned())
    }

    async fn select_all_in_asc_order(&self) -> CeQueueRepositoryResult<Vec<QueueEntry>> {
        let state = self.read_state()?;
        Ok(select_ordered(&state, |_| true))
    }

    async fn select_pending(&self) -> CeQueueRepositoryResult<Vec<QueueEntry>> {
        let state = self.read_state()?;
        Ok(select_ordered(&state, |entry| {
            entry.status() == QueueStatus::Pending
        }))
    }

    async fn select_worn_outs(&self) -> CeQueueRepositoryResult<Vec<QueueEntry>> {
        let state = self.read_state()?;
        Ok(select_ordered(&state, QueueEntry::is_worn_out))
    }

    async fn count_by_status(&self, status: QueueStatus) -> CeQueueRepositoryResult<u64> {
        let state = self.read_state()?;
        let count = state
            .queue
            .values()
            .filter(|entry| entry.status() == status)
            .count();
        Ok(to_count(count))
    }

    async fn has_pending_for_main_component(
        &self,
        main_component_uuid: &str,
    ) -> CeQueueRepositoryResult<bool> {
        let state = self.read_state()?;
        Ok(state.queue.values().any(|entry| {
            entry.status() == QueueStatus::Pending
                && entry.main_component_uuid() == Some(main_component_uuid)
        }))
    }

    async fn has_pending_for_task_type(&self, task_type: &str) -> CeQueueRepositoryResult<bool> {
        let state = self.read_state()?;
        Ok(state
            .queue
            .values()
            .any(|entry| entry.status() == QueueStatus::Pending && entry.task_type() == task_type))
    }

    async fn reset_to_pending_for_worker(
        &self,
        worker: &WorkerUuid,
        now: DateTime<Utc>,
    ) -> CeQueueRepositoryResult<u64> {
        let mut state = self.write_state()?;
        Ok(reset_matching(&mut state, now, |entry| {
            entry.is_leased_by(worker)
        }))
    }

    async fn lease_oldest_pending(
        &self,
        worker: &WorkerUuid,
        now: DateTime<Utc>,
    ) -> CeQueueRepositoryResult<Option<QueueEntry>> {
        let mut state = self.write_state()?;
        let oldest = state
            .queue
            .values()
            .filter(|entry| entry.status() == QueueStatus::Pending)
            .min_by(|left, right| left.queue_order(right))
            .map(|entry| entry.uuid().clone());

        let Some(uuid) = oldest else {
            return Ok(None);
        };
        let leased = state.queue.get_mut(&uuid).map(|entry| {
            entry.lease(worker.clone(), now);
            entry.clone()
        });
        Ok(leased)
    }

    async fn reset_tasks_with_unknown_workers(
        &self,
        known_workers: &BTreeSet<String>,
        now: DateTime<Utc>,
    ) -> CeQueueRepositoryResult<u64> {
        let mut state = self.write_state()?;
        Ok(reset_matching(&mut state, now, |entry| {
            entry
                .worker_uuid()
                .is_none_or(|worker| !known_workers.contains(worker.as_str()))
        }))
    }

    async fn archive(
        &self,
        uuid: &TaskUuid,
        expected_status: Option<QueueStatus>,
        outcome: ActivityOutcome,
        now: DateTime<Utc>,
    ) -> CeQueueRepositoryResult<ArchiveResult> {
        let mut state = self.write_state()?;
        let Some(entry) = state.queue.get(uuid) else {
            return Ok(ArchiveResult::NotFound);
        };
        if let Some(expected) = expected_status {
            if entry.status() != expected {
                return Ok(ArchiveResult::StatusMismatch(entry.status()));
            }
        }

        let activity = ActivityEntry::archive(entry, outcome, now);
        for previous in state.activities.values_mut() {
            if previous.is_last() && previous.is_last_key() == activity.is_last_key() {
                previous.mark_not_last(now);
            }
        }
        state.queue.remove(uuid);
        state.activities.insert(uuid.clone(), activity.clone());
        Ok(ArchiveResult::Archived(activity))
    }

    async fn clear(&self) -> CeQueueRepositoryResult<u64> {
        let mut state = self.write_state()?;
        let uuids: Vec<TaskUuid> = state.queue.keys().cloned().collect();
        for uuid in &uuids {
            state.task_inputs.remove(uuid);
        }
        state.queue.clear();
        Ok(to_count(uuids.len()))
    }

    async fn find_activity_by_uuid(
        &self,
        uuid: &TaskUuid,
    ) -> CeQueueRepositoryResult<Option<ActivityEntry>> {
        let state = self.read_state()?;
        Ok(state.activities.get(uuid).cloned())
    }

    async fn purge_activities_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> CeQueueRepositoryResult<Vec<TaskUuid>> {
        let mut state = self.write_state()?;
        let mut purged: Vec<TaskUuid> = state
            .activities
            .values()
            .filter(|activity| activity.created_at() < cutoff)
            .map(|activity| activity.uuid().clone())
            .collect();
        purged.sort();
        for uuid in &purged {
            state.activities.remove(uuid);
        }
        Ok(purged)
    }
}

#[async_trait]
impl CeTaskDataRepository for InMemoryCeStore {
    async fn insert_task_input(
        &self,
        uuid: &TaskUuid,
        data: Vec<u8>,
        now: DateTime<Utc>,
    ) -> CeQueueRepositoryResult<()> {
        let mut state = self.write_state()?;
        state.task_inputs.insert(
            uuid.clone(),
            StoredBlob {
                data,
                created_at: now,
            },
        );
        Ok(())
    }

    async fn find_task_input(&self, uuid: &TaskUuid) -> CeQueueRepositoryResult<Option<Vec<u8>>> {
        let state = self.read_state()?;
        Ok(state.task_inputs.get(uuid).map(|blob| blob.data.clone()))
    }

    async fn insert_scanner_context(
        &self,
        uuid: &TaskUuid,
        data: Vec<u8>,
        now: DateTime<Utc>,
    ) -> CeQueueRepositoryResult<()> {
        let mut state = self.write_state()?;
        state.scanner_contexts.insert(
            uuid.clone(),
            StoredBlob {
                data,
                created_at: now,
            },
        );
        Ok(())
    }

    async fn find_scanner_context(
        &self,
        uuid: &TaskUuid,
    ) -> CeQueueRepositoryResult<Option<Vec<u8>>> {
        let state = self.read_state()?;
        Ok(state.scanner_contexts.get(uuid).map(|blob| blob.data.clone()))
    }

    async fn delete_task_inputs_without_queue_entry(&self) -> CeQueueRepositoryResult<u64> {
        let mut state = self.write_state()?;
        let InMemoryCeState {
            queue, task_inputs, ..
        } = &mut *state;
        let before = task_inputs.len();
        task_inputs.retain(|uuid, _| queue.contains_key(uuid));
        Ok(to_count(before - task_inputs.len()))
    }

    async fn delete_orphan_task_inputs(&self) -> CeQueueRepositoryResult<u64> {
        let mut state = self.write_state()?;
        let InMemoryCeState {
            queue,
            activities,
            task_inputs,
            ..
        } = &mut *state;
        let before = task_inputs.len();
        task_inputs.retain(|uuid, _| queue.contains_key(uuid) || activities.contains_key(uuid));
        Ok(to_count(before - task_inputs.len()))
    }

    async fn delete_scanner_contexts(&self, uuids: &[TaskUuid]) -> CeQueueRepositoryResult<u64> {
        let mut state = self.write_state()?;
        let deleted = uuids
            .iter()
            .filter(|uuid| state.scanner_contexts.remove(*uuid).is_some())
            .count();
        Ok(to_count(deleted))
    }

    async fn delete_scanner_contexts_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> CeQueueRepositoryResult<u64> {
        let mut state = self.write_state()?;
        let before = state.scanner_contexts.len();
        state
            .scanner_contexts
            .retain(|_, blob| blob.created_at >= cutoff);
        Ok(to_count(before - state.scanner_contexts.len()))
    }
}
