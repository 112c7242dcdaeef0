//! Given steps for queue lease BDD scenarios.

use super::world::{QueueLeaseWorld, run_async};
use ce_queue::queue::domain::{CeTaskSubmit, ComputeEngineStatus, REPORT_TASK_TYPE};
use eyre::WrapErr;
use rstest_bdd_macros::given;

#[given("a started queue")]
fn started_queue(world: &mut QueueLeaseWorld) {
    world.gate.set_status(ComputeEngineStatus::Started);
}

#[given(r#"a pending task "{uuid}""#)]
fn pending_task(world: &mut QueueLeaseWorld, uuid: String) -> Result<(), eyre::Report> {
    let submit = CeTaskSubmit::builder(REPORT_TASK_TYPE)
        .with_uuid(uuid)
        .build()
        .map_err(|err| eyre::eyre!("invalid submission in scenario: {err}"))?;
    run_async(world.service.submit(&submit)).wrap_err("submit task in scenario setup")?;
    Ok(())
}

#[given("workers are paused")]
fn workers_are_paused(world: &mut QueueLeaseWorld) {
    world.service.pause_workers();
}
