//! In-memory integration tests for startup and purge maintenance.

use std::collections::BTreeSet;

use super::helpers::{QueueFixture, queue, report_for};
use ce_queue::queue::{domain::QueueStatus, ports::CeTaskDataRepository};
use mockable::{Clock, DefaultClock};
use rstest::rstest;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn restart_recovers_tasks_of_dead_workers(queue: QueueFixture) -> eyre::Result<()> {
    queue.service.submit(&report_for("task-a", "project-1")?).await?;
    queue.service.submit(&report_for("task-b", "project-2")?).await?;
    queue.service.peek("dead-worker").await?;
    queue.service.peek("live-worker").await?;
    let known: BTreeSet<String> = BTreeSet::from(["live-worker".to_owned()]);
    let recovery = queue.recovery();

    let report = recovery.start(false).await?;
    let reset = recovery.reset_tasks_with_unknown_worker_uuids(&known).await?;
    let canceled = recovery.cancel_worn_outs().await?;

    eyre::ensure!(report.queue_rows_cleared == 0, "queue should survive restart");
    eyre::ensure!(reset == 1, "expected one released task, got {reset}");
    eyre::ensure!(canceled == 1, "expected one worn-out cancel, got {canceled}");
    eyre::ensure!(
        queue.service.count_by_status(QueueStatus::InProgress).await? == 1,
        "live worker keeps its task"
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn cleaner_runs_once_per_instance(queue: QueueFixture) -> eyre::Result<()> {
    let orphan = report_for("orphan", "project-1")?;
    queue
        .store
        .insert_task_input(orphan.uuid(), b"payload".to_vec(), DefaultClock.utc())
        .await?;
    let cleaner = queue.cleaner(30);

    let first = cleaner
        .clean()
        .await?
        .ok_or_else(|| eyre::eyre!("first clean should run"))?;
    let second = cleaner.clean().await?;

    eyre::ensure!(first.task_inputs_deleted == 1, "orphan input should go");
    eyre::ensure!(first.activities_purged == 0, "fresh history is kept");
    eyre::ensure!(second.is_none(), "second clean should be skipped");
    Ok(())
}
