//! Job lifecycle for the remote pipe.
//!
//! Provides:
//! - `JobEntry` — one registered job: the `sh -c` subprocess, its owned
//!   stdin pipe, and the per-job mutex that totally orders requests
//! - `JobRegistry` — rwlock'd map from job id to entry
//! - `JobSnapshot` — lock-free view for the debug listener

pub mod job;
pub mod registry;

pub use job::{DoneOutcome, JobEntry, JobState};
pub use registry::{JobRegistry, JobSnapshot};
