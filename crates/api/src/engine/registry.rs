//! Authoritative in-memory job state.
//!
//! Jobs live in a [`DashMap`], which locks one shard of the id space at a
//! time: readers copy a snapshot under the shard read lock, writers mutate
//! under the shard write lock, so a poll never observes a half-applied
//! update and unrelated jobs do not contend.
//!
//! Mutation rights are handed out exactly once per job, as the non-cloneable
//! [`JobWriter`] returned by [`JobRegistry::create`]. The executor that owns
//! the writer is therefore the only code path able to change that job.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use genstudio_core::job::{Job, JobPayload, JobUpdate, UpdateRejected};
use genstudio_core::types::{JobId, Timestamp};

/// Shared registry of live jobs. Inject it as `Arc<JobRegistry>`.
pub struct JobRegistry {
    jobs: DashMap<JobId, Job>,
    job_ttl: chrono::Duration,
}

impl JobRegistry {
    pub fn new(job_ttl: chrono::Duration) -> Self {
        Self {
            jobs: DashMap::new(),
            job_ttl,
        }
    }

    /// Register a new pending job and return its sole writer.
    pub fn create(self: &Arc<Self>, payload: JobPayload) -> JobWriter {
        let job = Job::new(payload, Utc::now(), self.job_ttl);
        let id = job.id;
        tracing::debug!(job_id = %id, kind = %job.kind(), "Job registered");
        self.jobs.insert(id, job);
        JobWriter {
            id,
            registry: Arc::clone(self),
        }
    }

    /// Snapshot of the job's current state.
    pub fn get(&self, id: &JobId) -> Option<Job> {
        self.jobs.get(id).map(|entry| entry.value().clone())
    }

    /// Remove a job if it is terminal and past its expiry. Returns whether
    /// it was removed; live jobs are always kept.
    pub fn expire(&self, id: &JobId, now: Timestamp) -> bool {
        self.jobs
            .remove_if(id, |_, job| job.is_evictable(now))
            .is_some()
    }

    /// Ids of all jobs that [`expire`](Self::expire) would currently remove.
    pub fn expired_ids(&self, now: Timestamp) -> Vec<JobId> {
        self.jobs
            .iter()
            .filter(|entry| entry.value().is_evictable(now))
            .map(|entry| *entry.key())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Number of jobs that have not reached a terminal state.
    pub fn active_count(&self) -> usize {
        self.jobs
            .iter()
            .filter(|entry| !entry.value().status.is_terminal())
            .count()
    }

    fn apply_update(&self, id: &JobId, update: JobUpdate) -> Result<Job, UpdateRejected> {
        let mut entry = self
            .jobs
            .get_mut(id)
            .ok_or(UpdateRejected::UnknownJob(*id))?;

        if let Err(rejected) = entry.apply(update, Utc::now()) {
            tracing::error!(
                job_id = %id,
                status = %entry.status,
                error = %rejected,
                "Rejected job update that violates lifecycle rules",
            );
            return Err(rejected);
        }
        Ok(entry.clone())
    }
}

/// Exclusive right to mutate one job.
///
/// Deliberately neither `Clone` nor `Copy`.
pub struct JobWriter {
    id: JobId,
    registry: Arc<JobRegistry>,
}

impl JobWriter {
    pub fn id(&self) -> JobId {
        self.id
    }

    /// Apply `update` atomically and return the resulting snapshot.
    ///
    /// A rejected update is logged as a defect and leaves the job unchanged.
    pub fn apply(&self, update: JobUpdate) -> Result<Job, UpdateRejected> {
        self.registry.apply_update(&self.id, update)
    }

    pub fn snapshot(&self) -> Option<Job> {
        self.registry.get(&self.id)
    }
}

impl std::fmt::Debug for JobWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobWriter").field("id", &self.id).finish()
    }
}
