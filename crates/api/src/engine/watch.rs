//! Change-driven observation of a single job.
//!
//! A [`JobWatch`] polls the registry on a fixed period and yields a snapshot
//! whenever status, progress or the number of results changed. It ends after
//! yielding a terminal snapshot, when the job disappears, or when the handle
//! is disposed. Dropping the handle releases the poller as well.

use std::sync::Arc;
use std::time::Duration;

use genstudio_core::job::{Job, JobStatus};
use genstudio_core::types::JobId;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::engine::registry::JobRegistry;

const WATCH_BUFFER: usize = 8;

/// Observable part of a job; a change in any field is worth reporting.
type Fingerprint = (JobStatus, u8, usize);

#[derive(Debug)]
pub struct JobWatch {
    job_id: JobId,
    rx: mpsc::Receiver<Job>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl JobWatch {
    pub(crate) fn spawn(registry: Arc<JobRegistry>, job_id: JobId, interval: Duration) -> Self {
        let (tx, rx) = mpsc::channel(WATCH_BUFFER);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(poll_job(registry, job_id, interval, tx, cancel.clone()));
        Self {
            job_id,
            rx,
            cancel,
            task,
        }
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Next changed snapshot, or `None` once the watch has ended.
    pub async fn next(&mut self) -> Option<Job> {
        self.rx.recv().await
    }

    /// Skip intermediate snapshots and return the terminal one, if the job
    /// reaches a terminal state before it disappears.
    pub async fn wait_terminal(mut self) -> Option<Job> {
        while let Some(job) = self.next().await {
            if job.status.is_terminal() {
                return Some(job);
            }
        }
        None
    }

    /// Stop polling. Has no effect on the job itself.
    pub fn dispose(self) {}

    /// Turn the watch into a [`Stream`](futures::Stream) of snapshots. The
    /// poller is released when the stream is dropped.
    pub fn into_stream(self) -> impl futures::Stream<Item = Job> + Send + 'static {
        futures::stream::unfold(self, |mut watch| async move {
            let job = watch.next().await?;
            Some((job, watch))
        })
    }
}

impl Drop for JobWatch {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.task.abort();
    }
}

async fn poll_job(
    registry: Arc<JobRegistry>,
    job_id: JobId,
    interval: Duration,
    tx: mpsc::Sender<Job>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last: Option<Fingerprint> = None;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!(job_id = %job_id, "Job watch disposed");
                return;
            }
            _ = ticker.tick() => {}
        }

        let Some(job) = registry.get(&job_id) else {
            tracing::debug!(job_id = %job_id, "Watched job no longer exists");
            return;
        };

        let fingerprint = (job.status, job.progress, job.partial_results.len());
        let terminal = job.status.is_terminal();
        if last != Some(fingerprint) {
            last = Some(fingerprint);
            if tx.send(job).await.is_err() {
                return;
            }
        }
        if terminal {
            return;
        }
    }
}
