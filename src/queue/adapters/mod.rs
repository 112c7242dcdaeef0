//! Adapter implementations for the compute-engine queue ports.

pub mod memory;
pub mod postgres;
