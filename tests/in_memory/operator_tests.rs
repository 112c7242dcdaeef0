//! In-memory integration tests for operator controls.

use super::helpers::{QueueFixture, queue, report_for};
use ce_queue::queue::{
    domain::{QueueStatus, WorkersPauseStatus},
    services::{CeQueueErrorKind, CeQueueServiceError},
};
use rstest::rstest;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn cancel_all_and_snapshot(queue: QueueFixture) -> eyre::Result<()> {
    let submits = vec![
        report_for("task-a", "project-1")?,
        report_for("task-b", "project-2")?,
        report_for("task-c", "project-3")?,
    ];
    queue.service.mass_submit(&submits).await?;
    queue
        .service
        .peek("worker-1")
        .await?
        .ok_or_else(|| eyre::eyre!("expected a leased task"))?;

    let canceled = queue.service.cancel_all().await?;
    let snapshot = queue.service.status_snapshot().await?;

    eyre::ensure!(canceled == 2, "expected two cancellations, got {canceled}");
    eyre::ensure!(snapshot.pending_count == 0, "no pending rows expected");
    eyre::ensure!(snapshot.in_progress_count == 1, "one leased row expected");
    eyre::ensure!(
        snapshot.counters.canceled_count == 2,
        "canceled counter mismatch"
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn paused_queue_rejects_submissions_and_leases(queue: QueueFixture) -> eyre::Result<()> {
    queue.service.submit(&report_for("task-a", "project-1")?).await?;
    queue.service.pause_submit();
    queue.service.pause_workers();

    let rejected = queue.service.submit(&report_for("task-b", "project-1")?).await;
    let leased = queue.service.peek("worker-1").await?;

    match rejected {
        Err(ref err @ CeQueueServiceError::SubmitPaused) => {
            eyre::ensure!(err.kind() == CeQueueErrorKind::IllegalState, "kind mismatch");
        }
        other => eyre::bail!("expected SubmitPaused, got {other:?}"),
    }
    eyre::ensure!(leased.is_none(), "paused workers should not lease");
    eyre::ensure!(
        queue.service.workers_pause_status().await? == WorkersPauseStatus::Paused,
        "nothing in progress, pause should be complete"
    );
    eyre::ensure!(
        queue.service.count_by_status(QueueStatus::Pending).await? == 1,
        "first submission should remain pending"
    );
    Ok(())
}
