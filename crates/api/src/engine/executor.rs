//! Drives one job from `Pending` to a terminal state.
//!
//! The executor owns the job's [`JobWriter`], consumes the provider's event
//! stream and translates it into lifecycle updates. Every exit path ends in
//! exactly one terminal update: `Completed` when at least one artifact was
//! produced, `Failed` otherwise (provider error, idle or overall timeout,
//! panic).

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::{FutureExt, StreamExt};
use genstudio_core::job::{JobError, JobKind, JobUpdate};
use genstudio_provider::{ArtifactStream, GenerationProvider, GenerationRequest, ProviderEvent};
use genstudio_store::models::HistoryItem;
use genstudio_store::HistoryStore;

use crate::config::EngineConfig;
use crate::engine::registry::JobWriter;

/// Progress reported once the provider has been called.
pub const PROGRESS_STARTED: u8 = 10;

/// Highest progress reachable before the job completes.
pub const PROGRESS_CEILING: u8 = 95;

/// Share of the progress bar covered by artifact arrival.
const PROGRESS_RESULTS_SPAN: u8 = 80;

/// Time budgets applied to every job.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionLimits {
    /// Wall-clock budget of the whole job.
    pub processing_job_max: Duration,
    pub image_call_timeout: Duration,
    pub video_call_timeout: Duration,
}

impl ExecutionLimits {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            processing_job_max: config.processing_job_max,
            image_call_timeout: config.image_call_timeout,
            video_call_timeout: config.video_call_timeout,
        }
    }

    /// Longest silence tolerated between two provider events.
    pub fn call_timeout(&self, kind: JobKind) -> Duration {
        match kind {
            JobKind::Image => self.image_call_timeout,
            JobKind::Video => self.video_call_timeout,
        }
    }
}

pub struct Executor {
    writer: JobWriter,
    provider: Arc<dyn GenerationProvider>,
    history: Arc<HistoryStore>,
    limits: ExecutionLimits,
}

impl Executor {
    pub fn new(
        writer: JobWriter,
        provider: Arc<dyn GenerationProvider>,
        history: Arc<HistoryStore>,
        limits: ExecutionLimits,
    ) -> Self {
        Self {
            writer,
            provider,
            history,
            limits,
        }
    }

    /// Run the job to completion. Never panics and never returns early
    /// without leaving the job terminal (unless it was evicted meanwhile).
    pub async fn run(self, request: GenerationRequest) {
        let job_id = self.writer.id();
        let kind = request.kind();

        let Ok(job) = self.writer.apply(JobUpdate::started(PROGRESS_STARTED)) else {
            return;
        };
        let expected = job.payload.expected_artifacts();
        tracing::info!(
            job_id = %job_id,
            kind = %kind,
            provider = self.provider.name(),
            "Job processing started",
        );

        let provider = Arc::clone(&self.provider);
        let stream = match std::panic::catch_unwind(AssertUnwindSafe(|| provider.generate(request)))
        {
            Ok(stream) => stream,
            Err(panic) => {
                self.fail(JobError::internal(format!(
                    "provider panicked: {}",
                    panic_message(panic.as_ref())
                )));
                return;
            }
        };

        let deadline = self.limits.processing_job_max;
        let driven = AssertUnwindSafe(self.drive(stream, kind, expected)).catch_unwind();
        let outcome = match tokio::time::timeout(deadline, driven).await {
            Ok(Ok(result)) => result,
            Ok(Err(panic)) => Err(JobError::internal(format!(
                "generation panicked: {}",
                panic_message(panic.as_ref())
            ))),
            Err(_) => Err(JobError::timeout(format!(
                "job exceeded the processing limit of {}s",
                deadline.as_secs()
            ))),
        };

        match outcome {
            Ok(()) => self.complete().await,
            Err(error) => self.fail(error),
        }
    }

    /// Consume provider events until the stream ends.
    async fn drive(
        &self,
        mut stream: ArtifactStream,
        kind: JobKind,
        expected: usize,
    ) -> Result<(), JobError> {
        let job_id = self.writer.id();
        let call_timeout = self.limits.call_timeout(kind);
        let mut progress = PROGRESS_STARTED;
        let mut produced = 0usize;

        loop {
            let event = match tokio::time::timeout(call_timeout, stream.next()).await {
                Ok(Some(event)) => event,
                Ok(None) => break,
                Err(_) => {
                    return Err(JobError::timeout(format!(
                        "provider sent nothing for {}s",
                        call_timeout.as_secs()
                    )));
                }
            };

            match event.map_err(|e| JobError::provider(e.to_string()))? {
                ProviderEvent::Progress { percent } => {
                    let target = percent.min(PROGRESS_CEILING);
                    if target > progress && self.writer.apply(JobUpdate::progress(target)).is_ok()
                    {
                        progress = target;
                        tracing::debug!(job_id = %job_id, progress, "Job progress");
                    }
                }
                ProviderEvent::Artifact(artifact) => {
                    if kind == JobKind::Video && produced >= 1 {
                        tracing::warn!(
                            job_id = %job_id,
                            artifact = %artifact,
                            "Ignoring extra artifact for video job",
                        );
                        continue;
                    }
                    produced += 1;
                    let target = artifact_progress(produced, expected).max(progress);
                    self.writer
                        .apply(JobUpdate::artifact(artifact, target))
                        .map_err(|e| JobError::internal(format!("result rejected: {e}")))?;
                    progress = target;
                    tracing::debug!(job_id = %job_id, produced, expected, "Artifact received");
                }
            }
        }

        if produced == 0 {
            return Err(JobError::provider("provider returned no artifacts"));
        }
        if produced < expected {
            tracing::warn!(
                job_id = %job_id,
                produced,
                expected,
                "Provider returned fewer artifacts than requested",
            );
        }
        Ok(())
    }

    /// Record the job in history, then publish `Completed`.
    async fn complete(self) {
        let job_id = self.writer.id();
        let Some(job) = self.writer.snapshot() else {
            tracing::warn!(job_id = %job_id, "Job evicted before completion");
            return;
        };

        let item = HistoryItem::from_job(&job, Utc::now());
        let record_id = item.record_id;
        match self.history.append(item).await {
            Ok(()) => tracing::debug!(job_id = %job_id, %record_id, "Job recorded in history"),
            Err(e) => tracing::error!(
                job_id = %job_id,
                error = %e,
                "Failed to record completed job in history",
            ),
        }

        if let Ok(job) = self.writer.apply(JobUpdate::completed()) {
            tracing::info!(
                job_id = %job_id,
                kind = %job.kind(),
                results = job.partial_results.len(),
                "Job completed",
            );
        }
    }

    fn fail(&self, error: JobError) {
        tracing::warn!(
            job_id = %self.writer.id(),
            error_kind = %error.kind,
            error = %error.message,
            "Job failed",
        );
        if let Err(e) = self.writer.apply(JobUpdate::failed(error)) {
            tracing::warn!(
                job_id = %self.writer.id(),
                error = %e,
                "Could not record job failure",
            );
        }
    }
}

/// Progress once `produced` of `expected` artifacts have arrived.
fn artifact_progress(produced: usize, expected: usize) -> u8 {
    let expected = expected.max(1);
    let share = produced.min(expected) * PROGRESS_RESULTS_SPAN as usize / expected;
    PROGRESS_STARTED + share as u8
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use genstudio_core::job::{ImageJobData, JobErrorKind, JobPayload, JobStatus, VideoJobData};
    use genstudio_core::params::{ImageParams, VideoParams};
    use genstudio_core::types::ConversationHandle;
    use genstudio_provider::scripted::{ScriptStep, ScriptedProvider};
    use genstudio_provider::{ImageRequest, VideoRequest};
    use tempfile::TempDir;

    use super::*;
    use crate::engine::registry::JobRegistry;

    struct Harness {
        registry: Arc<JobRegistry>,
        provider: Arc<ScriptedProvider>,
        history: Arc<HistoryStore>,
        _dir: TempDir,
    }

    async fn harness() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let history = HistoryStore::open(dir.path().join("history.json"), 100)
            .await
            .unwrap();
        Harness {
            registry: Arc::new(JobRegistry::new(chrono::Duration::hours(1))),
            provider: Arc::new(ScriptedProvider::new(Duration::from_millis(1))),
            history: Arc::new(history),
            _dir: dir,
        }
    }

    fn limits() -> ExecutionLimits {
        ExecutionLimits {
            processing_job_max: Duration::from_secs(60),
            image_call_timeout: Duration::from_secs(5),
            video_call_timeout: Duration::from_secs(5),
        }
    }

    fn image_params(count: u32) -> ImageParams {
        serde_json::from_value(serde_json::json!({ "prompt": "a fox", "count": count })).unwrap()
    }

    fn video_params() -> VideoParams {
        serde_json::from_value(serde_json::json!({ "prompt": "waves" })).unwrap()
    }

    impl Harness {
        async fn run_image(&self, count: u32, limits: ExecutionLimits) -> genstudio_core::job::Job {
            let params = image_params(count);
            let writer = self.registry.create(JobPayload::Image(ImageJobData {
                params: params.clone(),
                session_id: None,
                is_edit: false,
            }));
            let id = writer.id();
            let provider: Arc<dyn GenerationProvider> = self.provider.clone();
            Executor::new(writer, provider, Arc::clone(&self.history), limits)
                .run(GenerationRequest::Image(ImageRequest {
                    params,
                    conversation: ConversationHandle::generate(),
                    is_edit: false,
                }))
                .await;
            self.registry.get(&id).unwrap()
        }

        async fn run_video(&self, limits: ExecutionLimits) -> genstudio_core::job::Job {
            let params = video_params();
            let writer = self
                .registry
                .create(JobPayload::Video(VideoJobData::original(params.clone())));
            let id = writer.id();
            let provider: Arc<dyn GenerationProvider> = self.provider.clone();
            Executor::new(writer, provider, Arc::clone(&self.history), limits)
                .run(GenerationRequest::Video(VideoRequest {
                    params,
                    source_video: None,
                }))
                .await;
            self.registry.get(&id).unwrap()
        }
    }

    // -- artifact_progress --

    #[test]
    fn artifact_progress_spreads_over_span() {
        assert_eq!(artifact_progress(1, 4), 30);
        assert_eq!(artifact_progress(4, 4), 90);
        assert_eq!(artifact_progress(5, 4), 90);
        assert_eq!(artifact_progress(1, 1), 90);
    }

    #[test]
    fn panic_message_reads_both_payload_types() {
        let boxed: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(boxed.as_ref()), "static");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");
    }

    // -- run --

    #[tokio::test]
    async fn image_job_completes_with_all_results_and_history() {
        let h = harness().await;
        let job = h.run_image(3, limits()).await;

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100);
        assert_eq!(job.partial_results.len(), 3);
        assert!(job.error.is_none());
        assert_eq!(h.history.len().await, 1);
    }

    #[tokio::test]
    async fn provider_error_fails_job() {
        let h = harness().await;
        h.provider
            .push_script(vec![ScriptStep::Fail("quota exhausted".into())]);
        let job = h.run_video(limits()).await;

        assert_eq!(job.status, JobStatus::Failed);
        let error = job.error.unwrap();
        assert_eq!(error.kind, JobErrorKind::Provider);
        assert!(error.message.contains("quota exhausted"));
        assert!(h.history.is_empty().await);
    }

    #[tokio::test]
    async fn empty_stream_fails_job() {
        let h = harness().await;
        h.provider.push_script(vec![ScriptStep::Progress(50)]);
        let job = h.run_video(limits()).await;

        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error.unwrap().message.contains("no artifacts"));
    }

    #[tokio::test]
    async fn panic_in_stream_fails_job_as_internal() {
        let h = harness().await;
        h.provider.push_script(vec![ScriptStep::Panic("kaboom".into())]);
        let job = h.run_video(limits()).await;

        assert_eq!(job.status, JobStatus::Failed);
        let error = job.error.unwrap();
        assert_eq!(error.kind, JobErrorKind::Internal);
        assert!(error.message.contains("kaboom"));
    }

    #[tokio::test(start_paused = true)]
    async fn silent_provider_times_out() {
        let h = harness().await;
        h.provider.push_script(vec![ScriptStep::Hang]);
        let job = h.run_video(limits()).await;

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.unwrap().kind, JobErrorKind::Timeout);
    }

    #[tokio::test(start_paused = true)]
    async fn overall_deadline_caps_a_chatty_provider() {
        let h = harness().await;
        let mut steps = Vec::new();
        for percent in 20..90 {
            steps.push(ScriptStep::Wait(Duration::from_secs(1)));
            steps.push(ScriptStep::Progress(percent));
        }
        h.provider.push_script(steps);

        let tight = ExecutionLimits {
            processing_job_max: Duration::from_secs(10),
            ..limits()
        };
        let job = h.run_video(tight).await;

        assert_eq!(job.status, JobStatus::Failed);
        let error = job.error.unwrap();
        assert_eq!(error.kind, JobErrorKind::Timeout);
        assert!(error.message.contains("processing limit"));
    }

    #[tokio::test]
    async fn partial_images_still_complete() {
        let h = harness().await;
        h.provider
            .push_script(vec![ScriptStep::Artifact("only-one.png".into())]);
        let job = h.run_image(3, limits()).await;

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.partial_results.len(), 1);
    }

    #[tokio::test]
    async fn video_keeps_first_artifact_only() {
        let h = harness().await;
        h.provider.push_script(vec![
            ScriptStep::Progress(99),
            ScriptStep::Artifact("a.mp4".into()),
            ScriptStep::Artifact("b.mp4".into()),
        ]);
        let job = h.run_video(limits()).await;

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.partial_results.len(), 1);
        assert_eq!(job.partial_results[0].as_str(), "a.mp4");
    }

    #[tokio::test]
    async fn late_failure_leaves_terminal_job_untouched() {
        let h = harness().await;
        let writer = h
            .registry
            .create(JobPayload::Video(VideoJobData::original(video_params())));
        let id = writer.id();
        writer.apply(JobUpdate::started(PROGRESS_STARTED)).unwrap();
        writer
            .apply(JobUpdate::artifact(
                genstudio_core::types::ArtifactRef::new("v.mp4"),
                90,
            ))
            .unwrap();
        writer.apply(JobUpdate::completed()).unwrap();

        let provider: Arc<dyn GenerationProvider> = h.provider.clone();
        let executor = Executor::new(writer, provider, Arc::clone(&h.history), limits());
        executor.fail(JobError::provider("arrived too late"));

        let job = h.registry.get(&id).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.error.is_none());
    }
}
