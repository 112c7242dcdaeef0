//! Conversions between Diesel rows and queue domain types.

use super::models::{ActivityRow, NewQueueRow, QueueRow};
use crate::queue::{
    domain::{
        ActivityEntry, ActivityStatus, PersistedActivityData, PersistedQueueEntryData,
        QueueEntry, QueueStatus, TaskComponent, TaskUuid, WorkerUuid,
    },
    ports::{CeQueueRepositoryError, CeQueueRepositoryResult},
};
use std::collections::BTreeMap;

pub(super) fn entry_to_new_row(entry: &QueueEntry) -> CeQueueRepositoryResult<NewQueueRow> {
    let characteristics = serde_json::to_value(entry.characteristics())
        .map_err(CeQueueRepositoryError::persistence)?;
    let (component_uuid, component_key, component_name) = split_component(entry.component());
    let (main_component_uuid, main_component_key, main_component_name) =
        split_component(entry.main_component());

    Ok(NewQueueRow {
        uuid: entry.uuid().as_str().to_owned(),
        task_type: entry.task_type().to_owned(),
        organization_uuid: entry.organization_uuid().to_owned(),
        component_uuid,
        component_key,
        component_name,
        main_component_uuid,
        main_component_key,
        main_component_name,
        submitter_uuid: entry.submitter_uuid().map(str::to_owned),
        characteristics,
        status: entry.status().as_str().to_owned(),
        worker_uuid: entry.worker_uuid().map(|worker| worker.as_str().to_owned()),
        created_at: entry.created_at(),
        updated_at: entry.updated_at(),
        started_at: entry.started_at(),
    })
}

fn split_component(
    component: Option<&TaskComponent>,
) -> (Option<String>, Option<String>, Option<String>) {
    component.map_or((None, None, None), |value| {
        (
            Some(value.uuid().to_owned()),
            value.key().map(str::to_owned),
            value.name().map(str::to_owned),
        )
    })
}

pub(super) fn row_to_entry(row: QueueRow) -> CeQueueRepositoryResult<QueueEntry> {
    let QueueRow {
        uuid,
        task_type,
        organization_uuid,
        component_uuid,
        component_key,
        component_name,
        main_component_uuid,
        main_component_key,
        main_component_name,
        submitter_uuid,
        characteristics,
        status,
        worker_uuid,
        created_at,
        updated_at,
        started_at,
    } = row;

    let parsed_characteristics: BTreeMap<String, String> = serde_json::from_value(characteristics)
        .map_err(CeQueueRepositoryError::invalid_persisted_data)?;
    let parsed_status = QueueStatus::try_from(status.as_str())
        .map_err(CeQueueRepositoryError::invalid_persisted_data)?;

    Ok(QueueEntry::from_persisted(PersistedQueueEntryData {
        uuid: parse_task_uuid(uuid)?,
        task_type,
        organization_uuid,
        component: component_uuid
            .map(|value| TaskComponent::new(value, component_key, component_name)),
        main_component: main_component_uuid
            .map(|value| TaskComponent::new(value, main_component_key, main_component_name)),
        submitter_uuid,
        characteristics: parsed_characteristics,
        status: parsed_status,
        worker_uuid: parse_worker_uuid(worker_uuid)?,
        created_at,
        updated_at,
        started_at,
    }))
}

pub(super) fn activity_to_row(activity: &ActivityEntry) -> ActivityRow {
    ActivityRow {
        uuid: activity.uuid().as_str().to_owned(),
        task_type: activity.task_type().to_owned(),
        organization_uuid: activity.organization_uuid().to_owned(),
        component_uuid: activity.component_uuid().map(str::to_owned),
        main_component_uuid: activity.main_component_uuid().map(str::to_owned),
        submitter_uuid: activity.submitter_uuid().map(str::to_owned),
        status: activity.status().as_str().to_owned(),
        analysis_uuid: activity.analysis_uuid().map(str::to_owned),
        error_message: activity.error_message().map(str::to_owned),
        error_stacktrace: activity.error_stacktrace().map(str::to_owned),
        error_type: activity.error_type().map(str::to_owned),
        worker_uuid: activity
            .worker_uuid()
            .map(|worker| worker.as_str().to_owned()),
        node_name: activity.node_name().map(str::to_owned),
        is_last: activity.is_last(),
        is_last_key: activity.is_last_key().to_owned(),
        submitted_at: activity.submitted_at(),
        started_at: activity.started_at(),
        executed_at: activity.executed_at(),
        execution_time_ms: activity.execution_time_ms(),
        created_at: activity.created_at(),
        updated_at: activity.updated_at(),
    }
}

pub(super) fn row_to_activity(row: ActivityRow) -> CeQueueRepositoryResult<ActivityEntry> {
    let status = ActivityStatus::try_from(row.status.as_str())
        .map_err(CeQueueRepositoryError::invalid_persisted_data)?;

    Ok(ActivityEntry::from_persisted(PersistedActivityData {
        uuid: parse_task_uuid(row.uuid)?,
        task_type: row.task_type,
        organization_uuid: row.organization_uuid,
        component_uuid: row.component_uuid,
        main_component_uuid: row.main_component_uuid,
        submitter_uuid: row.submitter_uuid,
        status,
        analysis_uuid: row.analysis_uuid,
        error_message: row.error_message,
        error_stacktrace: row.error_stacktrace,
        error_type: row.error_type,
        worker_uuid: parse_worker_uuid(row.worker_uuid)?,
        node_name: row.node_name,
        is_last: row.is_last,
        is_last_key: row.is_last_key,
        submitted_at: row.submitted_at,
        started_at: row.started_at,
        executed_at: row.executed_at,
        execution_time_ms: row.execution_time_ms,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }))
}

pub(super) fn parse_task_uuid(value: String) -> CeQueueRepositoryResult<TaskUuid> {
    TaskUuid::new(value).map_err(CeQueueRepositoryError::invalid_persisted_data)
}

fn parse_worker_uuid(value: Option<String>) -> CeQueueRepositoryResult<Option<WorkerUuid>> {
    value
        .map(WorkerUuid::new)
        .transpose()
        .map_err(CeQueueRepositoryError::invalid_persisted_data)
}

/// Converts a database count into the port's unsigned count.
pub(super) fn to_count(value: impl TryInto<u64>) -> u64 {
    value.try_into().unwrap_or(0)
}
