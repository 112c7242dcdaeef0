//! When steps for queue lease BDD scenarios.

use std::collections::BTreeSet;

use super::world::{QueueLeaseWorld, run_async};
use ce_queue::queue::domain::ActivityStatus;
use eyre::WrapErr;
use rstest_bdd_macros::when;

#[when(r#"worker "{worker}" peeks"#)]
fn worker_peeks(world: &mut QueueLeaseWorld, worker: String) -> Result<(), eyre::Report> {
    let leased = run_async(world.service.peek(&worker)).wrap_err("peek in scenario")?;
    world.leases.insert(worker, leased);
    Ok(())
}

#[when(r#"worker "{worker}" reports success"#)]
fn worker_reports_success(
    world: &mut QueueLeaseWorld,
    worker: String,
) -> Result<(), eyre::Report> {
    let task = world.lease_of(&worker)?.clone();
    run_async(
        world
            .service
            .remove(&task, ActivityStatus::Success, None, None),
    )
    .wrap_err("remove finished task in scenario")?;
    Ok(())
}

#[when(r#"tasks of workers other than "{worker}" are released"#)]
fn tasks_of_other_workers_released(
    world: &mut QueueLeaseWorld,
    worker: String,
) -> Result<(), eyre::Report> {
    let known = BTreeSet::from([worker]);
    run_async(world.recovery().reset_tasks_with_unknown_worker_uuids(&known))
        .wrap_err("release tasks of unknown workers")?;
    Ok(())
}
