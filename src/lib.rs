//! Compute-engine task queue.
//!
//! This crate persists long-running analysis tasks, leases them to workers
//! one at a time, recovers from crashed workers, and archives finished tasks
//! into a bounded activity history.
//!
//! # Architecture
//!
//! The queue follows hexagonal architecture principles:
//!
//! - **Domain**: Pure queue semantics with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for stores, directories, and counters
//! - **Adapters**: In-memory and `PostgreSQL` implementations of the ports
//!
//! # Modules
//!
//! - [`queue`]: Submission, lease, completion, cancellation, and recovery
//! - [`config`]: File-based settings for hosting processes
//! - [`telemetry`]: Log subscriber installation for binaries

pub mod config;
pub mod queue;
pub mod telemetry;
