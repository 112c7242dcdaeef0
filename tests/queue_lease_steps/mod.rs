//! Step definitions for queue lease scenarios.

pub mod given;
pub mod then;
pub mod when;
pub mod world;
