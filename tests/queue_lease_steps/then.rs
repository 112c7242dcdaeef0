//! Then steps for queue lease BDD scenarios.

use super::world::{QueueLeaseWorld, run_async};
use ce_queue::queue::{
    domain::{ActivityStatus, QueueStatus, TaskUuid},
    ports::QueueStatusRecorder,
};
use eyre::WrapErr;
use rstest_bdd_macros::then;

#[then(r#"worker "{worker}" holds task "{uuid}""#)]
fn worker_holds_task(
    world: &QueueLeaseWorld,
    worker: String,
    uuid: String,
) -> Result<(), eyre::Report> {
    let task_uuid = TaskUuid::new(uuid).wrap_err("expected uuid in scenario")?;
    let entry = run_async(world.service.select_by_uuid(&task_uuid))
        .wrap_err("look up queue row")?
        .ok_or_else(|| eyre::eyre!("task {task_uuid} is not queued"))?;

    if entry.status() != QueueStatus::InProgress
        || entry.worker_uuid().map(|w| w.as_str()) != Some(worker.as_str())
    {
        return Err(eyre::eyre!(
            "expected {task_uuid} in progress for {worker}, found {} for {:?}",
            entry.status(),
            entry.worker_uuid()
        ));
    }
    Ok(())
}

#[then(r#"worker "{worker}" received nothing"#)]
fn worker_received_nothing(world: &QueueLeaseWorld, worker: String) -> Result<(), eyre::Report> {
    match world.leases.get(&worker) {
        Some(None) => Ok(()),
        Some(Some(task)) => Err(eyre::eyre!("worker {worker} leased {}", task.uuid())),
        None => Err(eyre::eyre!("worker {worker} never peeked")),
    }
}

#[then(r#"task "{uuid}" is pending"#)]
fn task_is_pending(world: &QueueLeaseWorld, uuid: String) -> Result<(), eyre::Report> {
    let task_uuid = TaskUuid::new(uuid).wrap_err("expected uuid in scenario")?;
    let entry = run_async(world.service.select_by_uuid(&task_uuid))
        .wrap_err("look up queue row")?
        .ok_or_else(|| eyre::eyre!("task {task_uuid} is not queued"))?;

    if entry.status() != QueueStatus::Pending || entry.worker_uuid().is_some() {
        return Err(eyre::eyre!(
            "expected {task_uuid} pending without worker, found {}",
            entry.status()
        ));
    }
    Ok(())
}

#[then(r#"task "{uuid}" is archived as "{status}""#)]
fn task_is_archived(
    world: &QueueLeaseWorld,
    uuid: String,
    status: String,
) -> Result<(), eyre::Report> {
    let expected = ActivityStatus::try_from(status.as_str())
        .map_err(|err| eyre::eyre!("invalid expected status in scenario: {err}"))?;
    let task_uuid = TaskUuid::new(uuid).wrap_err("expected uuid in scenario")?;
    let activity = run_async(world.service.select_activity_by_uuid(&task_uuid))
        .wrap_err("look up activity row")?
        .ok_or_else(|| eyre::eyre!("task {task_uuid} has no activity row"))?;

    if activity.status() != expected {
        return Err(eyre::eyre!(
            "expected status {expected}, found {}",
            activity.status()
        ));
    }
    if run_async(world.service.select_by_uuid(&task_uuid))?.is_some() {
        return Err(eyre::eyre!("task {task_uuid} is still queued"));
    }
    Ok(())
}

#[then("the success counter is {count:u64}")]
fn success_counter_is(world: &QueueLeaseWorld, count: u64) -> Result<(), eyre::Report> {
    let actual = world.status.counters().success_count;
    if actual != count {
        return Err(eyre::eyre!("expected {count} successes, found {actual}"));
    }
    Ok(())
}
