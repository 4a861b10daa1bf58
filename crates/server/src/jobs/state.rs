// crates/server/src/jobs/state.rs
//! In-memory registry of jobs that currently have a live processor.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

/// Set of job ids with a running processor.
///
/// Claiming a job hands out an [`ActiveJob`] guard; the id stays claimed
/// until the guard drops, so two processors can never write the same job.
#[derive(Debug, Clone, Default)]
pub struct ActiveImports {
    jobs: Arc<RwLock<HashSet<String>>>,
}

impl ActiveImports {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `job_id`. `None` if another processor holds it.
    pub fn claim(&self, job_id: &str) -> Option<ActiveJob> {
        let mut jobs = match self.jobs.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("RwLock poisoned writing active imports");
                poisoned.into_inner()
            }
        };
        jobs.insert(job_id.to_string()).then(|| ActiveJob {
            id: job_id.to_string(),
            jobs: Arc::clone(&self.jobs),
        })
    }

    pub fn contains(&self, job_id: &str) -> bool {
        match self.jobs.read() {
            Ok(jobs) => jobs.contains(job_id),
            Err(e) => {
                tracing::error!("RwLock poisoned reading active imports: {e}");
                false
            }
        }
    }

    pub fn len(&self) -> usize {
        match self.jobs.read() {
            Ok(jobs) => jobs.len(),
            Err(e) => {
                tracing::error!("RwLock poisoned reading active imports: {e}");
                0
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exclusive claim on one job. Releases on drop.
#[derive(Debug)]
pub struct ActiveJob {
    id: String,
    jobs: Arc<RwLock<HashSet<String>>>,
}

impl ActiveJob {
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Drop for ActiveJob {
    fn drop(&mut self) {
        match self.jobs.write() {
            Ok(mut jobs) => {
                jobs.remove(&self.id);
            }
            Err(poisoned) => {
                poisoned.into_inner().remove(&self.id);
            }
        }
    }
}
