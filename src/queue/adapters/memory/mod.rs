//! In-memory adapters for the compute-engine queue ports.

mod component;
mod store;

pub use component::InMemoryComponentDirectory;
pub use store::InMemoryCeStore;
