//! Per-operation logic that runs against a [`GitBackend`]
//!
//! [`GitBackend`]: crate::services::GitBackend

pub mod bisect;
pub mod commit;
pub mod conflict;
pub mod in_progress;
pub mod staging;

pub use commit::{CommitOutcome, CommitRequest, StagedCounts};
