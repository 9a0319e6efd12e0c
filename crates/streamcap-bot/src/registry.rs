//! Job registry: tracked, cancellable capture tasks.
//!
//! Every accepted schedule command gets an entry here instead of a
//! fire-and-forget spawn, so jobs can be listed and cancelled later.
//! Terminal entries are kept for status queries; nothing survives a
//! restart.

use std::collections::HashMap;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::info;

use streamcap_types::JobStatus;

struct JobEntry {
    status: JobStatus,
    cancel: CancellationToken,
}

/// In-memory registry of capture jobs keyed by job id.
#[derive(Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<String, JobEntry>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new job in `Waiting` state and hand back its
    /// cancellation token for the runner task.
    pub async fn insert(&self, id: &str) -> CancellationToken {
        let cancel = CancellationToken::new();
        self.jobs.write().await.insert(
            id.to_string(),
            JobEntry {
                status: JobStatus::Waiting,
                cancel: cancel.clone(),
            },
        );
        cancel
    }

    /// Update a job's status. Unknown ids are ignored.
    pub async fn set_status(&self, id: &str, status: JobStatus) {
        if let Some(entry) = self.jobs.write().await.get_mut(id) {
            info!(job_id = id, %status, "Job status changed");
            entry.status = status;
        }
    }

    /// Request cancellation of a job. Returns false for unknown ids and
    /// jobs that already finished. Cancellation takes effect before the
    /// capture starts; an in-flight encoder run is not interrupted.
    pub async fn cancel(&self, id: &str) -> bool {
        let jobs = self.jobs.read().await;
        match jobs.get(id) {
            Some(entry) if !entry.status.is_terminal() => {
                entry.cancel.cancel();
                true
            }
            _ => false,
        }
    }

    /// Current status of a job.
    pub async fn status(&self, id: &str) -> Option<JobStatus> {
        self.jobs.read().await.get(id).map(|e| e.status.clone())
    }

    /// Snapshot of all jobs, sorted by id for stable output.
    pub async fn list(&self) -> Vec<(String, JobStatus)> {
        let jobs = self.jobs.read().await;
        let mut out: Vec<_> = jobs
            .iter()
            .map(|(id, entry)| (id.clone(), entry.status.clone()))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }
}
