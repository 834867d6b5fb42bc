//! Registry of active jobs.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::Serialize;
use uuid::Uuid;

use super::job::JobEntry;

/// Map from job id to entry, guarded by a reader/writer lock.
///
/// Lookups take the read lock only long enough to clone the `Arc`; `/new`
/// inserts and `/done` removes under the write lock. The lock is never held
/// across an await, so unrelated jobs proceed fully in parallel and the
/// per-entry mutex alone orders requests for the same job.
pub struct JobRegistry {
    jobs: RwLock<HashMap<Uuid, Arc<JobEntry>>>,
}

/// Point-in-time view of one job for `GET /debug/jobs`.
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub id: String,
    pub command: String,
    pub bytes_processed: u64,
    pub state: &'static str,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
        }
    }

    pub fn insert(&self, entry: Arc<JobEntry>) {
        match self.jobs.write() {
            Ok(mut jobs) => {
                jobs.insert(entry.id(), entry);
            }
            Err(e) => tracing::error!("RwLock poisoned inserting job: {e}"),
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<Arc<JobEntry>> {
        match self.jobs.read() {
            Ok(jobs) => jobs.get(id).cloned(),
            Err(e) => {
                tracing::error!("RwLock poisoned reading jobs map: {e}");
                None
            }
        }
    }

    /// Forget a job. Stops its output scanners; the entry itself lives on
    /// in any `Arc` a handler still holds.
    pub fn remove(&self, id: &Uuid) -> Option<Arc<JobEntry>> {
        let removed = match self.jobs.write() {
            Ok(mut jobs) => jobs.remove(id),
            Err(e) => {
                tracing::error!("RwLock poisoned removing job: {e}");
                None
            }
        };
        if let Some(entry) = &removed {
            entry.abort_scanners();
        }
        removed
    }

    /// Snapshot every registered job without touching per-job mutexes, so
    /// an in-flight upload cannot stall the debug listener.
    pub fn snapshot(&self) -> Vec<JobSnapshot> {
        match self.jobs.read() {
            Ok(jobs) => jobs
                .values()
                .map(|entry| {
                    let (bytes_processed, state) = entry.progress();
                    JobSnapshot {
                        id: entry.id().to_string(),
                        command: entry.command().to_string(),
                        bytes_processed,
                        state: state.as_str(),
                    }
                })
                .collect(),
            Err(e) => {
                tracing::error!("RwLock poisoned snapshotting jobs: {e}");
                Vec::new()
            }
        }
    }

    pub fn len(&self) -> usize {
        match self.jobs.read() {
            Ok(jobs) => jobs.len(),
            Err(e) => {
                tracing::error!("RwLock poisoned counting jobs: {e}");
                0
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}
