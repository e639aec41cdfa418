// In-memory job store: the single source of truth polled by clients

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use tokio::time::Instant;

use super::models::{Job, JobId, JobStatus};

/// Concurrency-safe map from job id to job state.
///
/// Every mutation takes the write lock once, so readers always see a
/// consistent `status`/`filename`/`error` combination. Terminal jobs are
/// immutable: transitions on them are refused and reported as `false`.
#[derive(Debug, Default)]
pub struct JobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<JobId, Job>> {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<JobId, Job>> {
        self.jobs.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a fresh job. Returns `false` if the id is already taken.
    pub fn insert(&self, job: Job) -> bool {
        let mut jobs = self.write();
        if jobs.contains_key(&job.id) {
            return false;
        }
        jobs.insert(job.id.clone(), job);
        true
    }

    pub fn get(&self, id: &JobId) -> Option<Job> {
        self.read().get(id).cloned()
    }

    pub fn contains(&self, id: &JobId) -> bool {
        self.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Apply `f` to a live (non-terminal) job. Unknown or terminal jobs are left alone.
    fn update_live<F>(&self, id: &JobId, f: F) -> bool
    where
        F: FnOnce(&mut Job),
    {
        let mut jobs = self.write();
        match jobs.get_mut(id) {
            Some(job) if !job.status.is_terminal() => {
                f(job);
                true
            }
            _ => false,
        }
    }

    /// `preparing -> downloading` once metadata is known
    pub fn start_downloading(&self, id: &JobId, title: String) -> bool {
        self.update_live(id, |job| {
            job.title = Some(title);
            job.status = JobStatus::Downloading;
            job.progress = 0;
        })
    }

    /// Bump the attempt counter and reset progress for a new attempt.
    pub fn begin_attempt(&self, id: &JobId) -> bool {
        self.update_live(id, |job| {
            job.attempts += 1;
            job.progress = 0;
        })
    }

    /// Raise progress to `percent`. Lower values are ignored so progress never
    /// goes backwards within an attempt.
    pub fn raise_progress(&self, id: &JobId, percent: u8) -> bool {
        let percent = percent.min(100);
        self.update_live(id, |job| {
            if job.status == JobStatus::Downloading && percent > job.progress {
                job.progress = percent;
            }
        })
    }

    /// Terminal success.
    pub fn complete(&self, id: &JobId, filename: PathBuf) -> bool {
        self.update_live(id, |job| {
            job.status = JobStatus::Completed;
            job.filename = Some(filename);
            job.error = None;
            job.progress = 100;
            job.finished_at = Some(Instant::now());
        })
    }

    /// Terminal failure.
    pub fn fail(&self, id: &JobId, error: impl Into<String>) -> bool {
        let error = error.into();
        self.update_live(id, |job| {
            job.status = JobStatus::Error;
            job.error = Some(error);
            job.filename = None;
            job.finished_at = Some(Instant::now());
        })
    }

    /// A completed job whose artifact vanished becomes an error. This is the
    /// only transition allowed out of a terminal state.
    pub fn demote_missing_artifact(&self, id: &JobId, reason: &str) -> Option<Job> {
        let mut jobs = self.write();
        let job = jobs.get_mut(id)?;
        if job.status == JobStatus::Completed {
            job.status = JobStatus::Error;
            job.filename = None;
            job.error = Some(reason.to_string());
        }
        Some(job.clone())
    }

    /// Drop terminal jobs that finished more than `ttl` ago. Returns how many were removed.
    pub fn prune_finished(&self, ttl: Duration) -> usize {
        let now = Instant::now();
        let mut jobs = self.write();
        let before = jobs.len();
        jobs.retain(|_, job| match job.finished_at {
            Some(done) if job.status.is_terminal() => now.duration_since(done) < ttl,
            _ => true,
        });
        before - jobs.len()
    }
}
