//! Pollable async task tracking.
//!
//! Long-running operations are exposed to callers as an opaque task id.
//! Records live in two tiers: a fast in-memory map and a TTL-bearing
//! persistent store, so a poll survives a restart for as long as the
//! record's TTL. The tiers are deliberately not transactional; brief
//! divergence is tolerated everywhere.

pub mod record;
pub mod runner;
pub mod tracker;

pub use record::{TaskRecord, TaskStatus};
pub use runner::TaskRunner;
pub use tracker::TaskTracker;
