//! `PostgreSQL` integration tests for queue statements.

use std::collections::BTreeSet;
use std::sync::Arc;

use ce_queue::queue::{
    domain::{
        ActivityOutcome, ActivityStatus, CeTaskSubmit, QueueStatus, REPORT_TASK_TYPE,
        MAX_UUID_LENGTH, SubmitComponent, TaskError, TaskUuid, WorkerUuid,
    },
    ports::{ArchiveResult, CeQueueRepository, CeQueueRepositoryError},
    services::CeQueueServiceError,
};
use mockable::{Clock, DefaultClock};
use rstest::rstest;

use crate::postgres::helpers::{BoxError, TestDatabase, report};

#[rstest]
#[tokio::test(flavor = "multi_thread")]
#[ignore = "starts an embedded PostgreSQL server"]
async fn postgres_submit_round_trips_all_fields() -> Result<(), BoxError> {
    let db = TestDatabase::start().await?;
    let service = db.service();
    let submit = CeTaskSubmit::builder(REPORT_TASK_TYPE)
        .with_uuid("task-1")
        .with_organization_uuid("org-1")
        .with_component(SubmitComponent::branch("branch-1", "project-1"))
        .with_submitter_uuid("user-1")
        .with_characteristic("branch", "feature/x")
        .build()?;

    service.submit(&submit).await?;
    let entry = service
        .select_by_uuid(submit.uuid())
        .await?
        .ok_or("queue row missing")?;

    assert_eq!(entry.status(), QueueStatus::Pending);
    assert_eq!(entry.organization_uuid(), "org-1");
    assert_eq!(entry.component_uuid(), Some("branch-1"));
    assert_eq!(entry.main_component_uuid(), Some("project-1"));
    assert_eq!(entry.submitter_uuid(), Some("user-1"));
    assert_eq!(
        entry.characteristics().get("branch").map(String::as_str),
        Some("feature/x")
    );
    db.stop().await
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
#[ignore = "starts an embedded PostgreSQL server"]
async fn postgres_lease_and_remove_archives_task() -> Result<(), BoxError> {
    let db = TestDatabase::start().await?;
    let service = db.service();
    service.submit(&report("task-a")?).await?;
    service.submit(&report("task-b")?).await?;

    let first = service.peek("worker-1").await?.ok_or("no task leased")?;
    let second = service.peek("worker-2").await?.ok_or("no task leased")?;
    let none = service.peek("worker-3").await?;
    assert_eq!(first.uuid().as_str(), "task-a");
    assert_eq!(second.uuid().as_str(), "task-b");
    assert!(none.is_none());

    service
        .remove(&first, ActivityStatus::Success, None, None)
        .await?;
    let activity = service
        .select_activity_by_uuid(first.uuid())
        .await?
        .ok_or("activity row missing")?;
    assert_eq!(activity.status(), ActivityStatus::Success);
    assert_eq!(activity.worker_uuid().map(WorkerUuid::as_str), Some("worker-1"));
    assert_eq!(activity.node_name(), Some("pg-node"));
    assert!(activity.execution_time_ms().is_some());
    assert!(service.select_by_uuid(first.uuid()).await?.is_none());
    db.stop().await
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
#[ignore = "starts an embedded PostgreSQL server"]
async fn postgres_concurrent_leases_are_distinct() -> Result<(), BoxError> {
    const TASKS: usize = 6;
    let db = TestDatabase::start().await?;
    let service = Arc::new(db.service());
    for index in 0..TASKS {
        service.submit(&report(&format!("task-{index}"))?).await?;
    }

    let handles: Vec<_> = (0..TASKS * 2)
        .map(|index| {
            let worker_service = Arc::clone(&service);
            tokio::spawn(async move { worker_service.peek(&format!("worker-{index}")).await })
        })
        .collect();
    let mut leased = Vec::new();
    for handle in handles {
        if let Some(task) = handle.await?? {
            leased.push(task.uuid().clone());
        }
    }

    let distinct: BTreeSet<_> = leased.iter().cloned().collect();
    assert_eq!(leased.len(), TASKS);
    assert_eq!(distinct.len(), TASKS);
    drop(service);
    db.stop().await
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
#[ignore = "starts an embedded PostgreSQL server"]
async fn postgres_archive_respects_expected_status() -> Result<(), BoxError> {
    let db = TestDatabase::start().await?;
    let service = db.service();
    service.submit(&report("task-a")?).await?;
    let leased = service.peek("worker-1").await?.ok_or("no task leased")?;

    let result = db
        .store
        .archive(
            leased.uuid(),
            Some(QueueStatus::Pending),
            ActivityOutcome::new(ActivityStatus::Canceled),
            DefaultClock.utc(),
        )
        .await?;

    assert_eq!(
        result,
        ArchiveResult::StatusMismatch(QueueStatus::InProgress)
    );
    let err = service
        .cancel_by_uuid(leased.uuid())
        .await
        .err()
        .ok_or("cancel should fail")?;
    assert!(matches!(err, CeQueueServiceError::TaskInProgress(_)));
    db.stop().await
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
#[ignore = "starts an embedded PostgreSQL server"]
async fn postgres_latest_activity_per_key_is_flagged() -> Result<(), BoxError> {
    let db = TestDatabase::start().await?;
    let service = db.service();
    for uuid in ["task-a", "task-b"] {
        let submit = CeTaskSubmit::builder(REPORT_TASK_TYPE)
            .with_uuid(uuid)
            .with_component(SubmitComponent::new("project-1"))
            .build()?;
        service.submit(&submit).await?;
        let leased = service.peek("worker-1").await?.ok_or("no task leased")?;
        service
            .remove(&leased, ActivityStatus::Success, None, None)
            .await?;
    }

    let first = service
        .select_activity_by_uuid(&TaskUuid::new("task-a")?)
        .await?
        .ok_or("activity row missing")?;
    let second = service
        .select_activity_by_uuid(&TaskUuid::new("task-b")?)
        .await?
        .ok_or("activity row missing")?;
    assert!(!first.is_last());
    assert!(second.is_last());
    assert_eq!(second.is_last_key(), "project-1");
    db.stop().await
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
#[ignore = "starts an embedded PostgreSQL server"]
async fn postgres_concurrent_archives_keep_one_latest_per_series() -> Result<(), BoxError> {
    const TASKS: usize = 8;
    let db = TestDatabase::start().await?;
    let service = Arc::new(db.service());
    let mut leased = Vec::new();
    for index in 0..TASKS {
        let submit = CeTaskSubmit::builder(REPORT_TASK_TYPE)
            .with_uuid(format!("task-{index}"))
            .with_component(SubmitComponent::new("project-1"))
            .build()?;
        service.submit(&submit).await?;
        leased.push(
            service
                .peek(&format!("worker-{index}"))
                .await?
                .ok_or("no task leased")?,
        );
    }

    let handles: Vec<_> = leased
        .into_iter()
        .map(|task| {
            let worker_service = Arc::clone(&service);
            tokio::spawn(async move {
                worker_service
                    .remove(&task, ActivityStatus::Success, None, None)
                    .await
                    .map(|()| task.uuid().clone())
            })
        })
        .collect();
    let mut archived = Vec::new();
    for handle in handles {
        archived.push(handle.await??);
    }

    let mut latest = 0;
    for uuid in &archived {
        let activity = service
            .select_activity_by_uuid(uuid)
            .await?
            .ok_or("activity row missing")?;
        if activity.is_last() {
            latest += 1;
        }
    }
    assert_eq!(archived.len(), TASKS);
    assert_eq!(latest, 1);
    drop(service);
    db.stop().await
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
#[ignore = "starts an embedded PostgreSQL server"]
async fn postgres_values_at_column_width_are_stored() -> Result<(), BoxError> {
    let db = TestDatabase::start().await?;
    let service = db.service();
    let submit = CeTaskSubmit::builder(REPORT_TASK_TYPE)
        .with_uuid("t".repeat(MAX_UUID_LENGTH))
        .with_organization_uuid("o".repeat(MAX_UUID_LENGTH))
        .with_component(SubmitComponent::new("c".repeat(MAX_UUID_LENGTH)))
        .build()?;
    service.submit(&submit).await?;
    let worker = "w".repeat(MAX_UUID_LENGTH);

    let leased = service.peek(&worker).await?.ok_or("no task leased")?;
    let error = TaskError::new("analysis took too long").with_type("ANALYSIS_TIMEOUT_EXCEEDED");
    service
        .remove(&leased, ActivityStatus::Failed, None, Some(error))
        .await?;

    let activity = service
        .select_activity_by_uuid(submit.uuid())
        .await?
        .ok_or("activity row missing")?;
    assert_eq!(activity.worker_uuid().map(WorkerUuid::as_str), Some(worker.as_str()));
    assert_eq!(activity.error_type(), Some("ANALYSIS_TIMEOUT_EXC"));
    assert!(service.peek(&format!("{worker}w")).await.is_err());
    db.stop().await
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
#[ignore = "starts an embedded PostgreSQL server"]
async fn postgres_duplicate_uuid_is_rejected_after_archive() -> Result<(), BoxError> {
    let db = TestDatabase::start().await?;
    let service = db.service();
    let submit = report("task-a")?;
    service.submit(&submit).await?;
    let duplicate_while_queued = service.submit(&submit).await;
    service.cancel_by_uuid(submit.uuid()).await?;
    let duplicate_after_archive = service.submit(&submit).await;

    for result in [duplicate_while_queued, duplicate_after_archive] {
        assert!(matches!(
            result,
            Err(CeQueueServiceError::Repository(
                CeQueueRepositoryError::DuplicateTask(_)
            ))
        ));
    }
    db.stop().await
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
#[ignore = "starts an embedded PostgreSQL server"]
async fn postgres_reset_unknown_workers_and_worn_outs() -> Result<(), BoxError> {
    let db = TestDatabase::start().await?;
    let service = db.service();
    for uuid in ["task-a", "task-b", "task-c"] {
        service.submit(&report(uuid)?).await?;
    }
    service.peek("w1").await?;
    service.peek("w2").await?;
    let known = BTreeSet::from(["w2".to_owned()]);

    let reset = db
        .store
        .reset_tasks_with_unknown_workers(&known, DefaultClock.utc())
        .await?;
    let worn_outs = db.store.select_worn_outs().await?;

    assert_eq!(reset, 1);
    let worn_uuids: Vec<_> = worn_outs.iter().map(|e| e.uuid().as_str()).collect();
    assert_eq!(worn_uuids, vec!["task-a"]);
    assert_eq!(db.store.count_by_status(QueueStatus::Pending).await?, 2);
    assert!(db.store.has_pending_for_task_type(REPORT_TASK_TYPE).await?);
    db.stop().await
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
#[ignore = "starts an embedded PostgreSQL server"]
async fn postgres_purge_deletes_only_old_activities() -> Result<(), BoxError> {
    let db = TestDatabase::start().await?;
    let service = db.service();
    service.submit(&report("task-a")?).await?;
    service.cancel_by_uuid(&TaskUuid::new("task-a")?).await?;

    let kept = db
        .store
        .purge_activities_before(DefaultClock.utc() - chrono::Duration::days(1))
        .await?;
    let purged = db
        .store
        .purge_activities_before(DefaultClock.utc() + chrono::Duration::seconds(1))
        .await?;

    assert!(kept.is_empty());
    let purged_uuids: Vec<_> = purged.iter().map(TaskUuid::as_str).collect();
    assert_eq!(purged_uuids, vec!["task-a"]);
    db.stop().await
}
