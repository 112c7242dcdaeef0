//! Durable compute-engine task queue.
//!
//! Producers submit analysis tasks, workers lease them one at a time through
//! `peek` and report completion through `remove`, and operators cancel,
//! fail, or pause work. Finished tasks move to a bounded activity history.
//! The module follows hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
