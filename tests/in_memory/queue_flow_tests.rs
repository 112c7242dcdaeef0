//! In-memory integration tests for the producer-to-worker flow.

use super::helpers::{QueueFixture, queue, report_for};
use ce_queue::queue::{
    domain::{ActivityStatus, QueueStatus, TaskResult},
    ports::ComponentInfo,
};
use eyre::WrapErr;
use rstest::rstest;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn submitted_task_is_processed_and_archived(queue: QueueFixture) -> eyre::Result<()> {
    queue
        .directory
        .insert(ComponentInfo {
            uuid: "project-1".to_owned(),
            key: "org.acme:project".to_owned(),
            name: "Acme".to_owned(),
            organization_uuid: "org-1".to_owned(),
        })
        .wrap_err("register component")?;
    let submit = report_for("task-1", "project-1")?;

    let submitted = queue.service.submit(&submit).await.wrap_err("submit")?;
    let leased = queue
        .service
        .peek("worker-1")
        .await
        .wrap_err("peek")?
        .ok_or_else(|| eyre::eyre!("expected a leased task"))?;
    eyre::ensure!(leased.uuid() == submitted.uuid(), "leased a different task");
    eyre::ensure!(leased.organization_uuid() == "org-1", "organization mismatch");

    queue
        .service
        .remove(
            &leased,
            ActivityStatus::Success,
            Some(&TaskResult::with_analysis("analysis-1")),
            None,
        )
        .await
        .wrap_err("remove")?;

    let activity = queue
        .service
        .select_activity_by_uuid(leased.uuid())
        .await
        .wrap_err("activity lookup")?
        .ok_or_else(|| eyre::eyre!("expected an activity row"))?;
    eyre::ensure!(activity.status() == ActivityStatus::Success, "status mismatch");
    eyre::ensure!(
        activity.node_name() == Some("integration-node"),
        "node name mismatch"
    );
    eyre::ensure!(
        activity.component_uuid() == Some("project-1"),
        "component mismatch"
    );
    eyre::ensure!(
        queue
            .service
            .select_by_uuid(leased.uuid())
            .await
            .wrap_err("queue lookup")?
            .is_none(),
        "queue row should be gone"
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn a_task_lives_in_exactly_one_store(queue: QueueFixture) -> eyre::Result<()> {
    let submit = report_for("task-1", "project-1")?;
    queue.service.submit(&submit).await.wrap_err("submit")?;

    let queued = queue.service.select_by_uuid(submit.uuid()).await?;
    let archived = queue.service.select_activity_by_uuid(submit.uuid()).await?;
    eyre::ensure!(queued.is_some() && archived.is_none(), "task should be queued only");

    let leased = queue
        .service
        .peek("worker-1")
        .await?
        .ok_or_else(|| eyre::eyre!("expected a leased task"))?;
    queue
        .service
        .remove(&leased, ActivityStatus::Canceled, None, None)
        .await?;

    let queued_after = queue.service.select_by_uuid(submit.uuid()).await?;
    let archived_after = queue.service.select_activity_by_uuid(submit.uuid()).await?;
    eyre::ensure!(
        queued_after.is_none() && archived_after.is_some(),
        "task should be archived only"
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn resubmitting_an_archived_uuid_is_rejected(queue: QueueFixture) -> eyre::Result<()> {
    let submit = report_for("task-1", "project-1")?;
    queue.service.submit(&submit).await?;
    let leased = queue
        .service
        .peek("worker-1")
        .await?
        .ok_or_else(|| eyre::eyre!("expected a leased task"))?;
    queue
        .service
        .remove(&leased, ActivityStatus::Success, None, None)
        .await?;

    let result = queue.service.submit(&submit).await;

    eyre::ensure!(result.is_err(), "duplicate uuid should be rejected");
    eyre::ensure!(
        queue.service.count_by_status(QueueStatus::Pending).await? == 0,
        "nothing should be queued"
    );
    Ok(())
}
