//! Unit tests for the queue module.
//!
//! Services run against the in-memory store and a stepping clock so that
//! submission order and timestamps are deterministic.
