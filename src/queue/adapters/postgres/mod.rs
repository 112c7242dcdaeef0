//! `PostgreSQL` adapters for compute-engine queue persistence.

mod conversion;
mod models;
mod repository;
mod schema;

pub use repository::{CePgPool, PostgresCeStore};
