//! Generation job model and its lifecycle rules.
//!
//! A [`Job`] moves through `pending -> processing -> completed | failed` and
//! never backwards. Every mutation is expressed as a [`JobUpdate`] delta and
//! goes through [`Job::apply`], which validates the whole delta before
//! touching any field: an update either applies completely or not at all.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::params::{ImageParams, VideoParams};
use crate::types::{ArtifactRef, JobId, SessionId, Timestamp};

/* --------------------------------------------------------------------------
Kind and status
-------------------------------------------------------------------------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Image,
    Video,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Completed and Failed are final.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether `next` is a legal successor of this status.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing)
                | (Self::Processing, Self::Completed)
                | (Self::Processing, Self::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/* --------------------------------------------------------------------------
Errors recorded on failed jobs
-------------------------------------------------------------------------- */

/// Classification of an asynchronous job failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobErrorKind {
    /// The provider reported an error or produced nothing usable.
    Provider,
    /// A processing deadline or provider call timeout elapsed.
    Timeout,
    /// The executor itself misbehaved.
    Internal,
}

impl fmt::Display for JobErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Provider => "provider",
            Self::Timeout => "timeout",
            Self::Internal => "internal",
        })
    }
}

/// Error detail carried by a job in the `failed` state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind} error: {message}")]
pub struct JobError {
    pub kind: JobErrorKind,
    pub message: String,
}

impl JobError {
    pub fn provider(message: impl Into<String>) -> Self {
        Self {
            kind: JobErrorKind::Provider,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            kind: JobErrorKind::Timeout,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: JobErrorKind::Internal,
            message: message.into(),
        }
    }
}

/* --------------------------------------------------------------------------
Payload
-------------------------------------------------------------------------- */

/// Image-specific job data.
#[derive(Debug, Clone, Serialize)]
pub struct ImageJobData {
    pub params: ImageParams,
    /// Conversation this turn belongs to.
    pub session_id: Option<SessionId>,
    /// `true` when this job continues an existing conversation.
    pub is_edit: bool,
}

/// Video-specific job data.
#[derive(Debug, Clone, Serialize)]
pub struct VideoJobData {
    pub params: VideoParams,
    /// Job whose output this video extends.
    pub parent_job_id: Option<JobId>,
    /// Artifact of the parent job handed to the provider.
    pub source_video: Option<ArtifactRef>,
    /// Accumulated length of the whole extension chain, in seconds.
    pub total_duration_secs: u32,
}

impl VideoJobData {
    /// Data for a video that does not extend anything.
    pub fn original(params: VideoParams) -> Self {
        let total_duration_secs = params.duration_seconds;
        Self {
            params,
            parent_job_id: None,
            source_video: None,
            total_duration_secs,
        }
    }
}

/// Kind-specific job data. The variant determines the job's [`JobKind`].
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobPayload {
    Image(ImageJobData),
    Video(VideoJobData),
}

impl JobPayload {
    pub fn kind(&self) -> JobKind {
        match self {
            Self::Image(_) => JobKind::Image,
            Self::Video(_) => JobKind::Video,
        }
    }

    pub fn prompt(&self) -> &str {
        match self {
            Self::Image(data) => &data.params.prompt,
            Self::Video(data) => &data.params.prompt,
        }
    }

    /// Number of artifacts a successful run is expected to produce.
    pub fn expected_artifacts(&self) -> usize {
        match self {
            Self::Image(data) => data.params.count.max(1) as usize,
            Self::Video(_) => 1,
        }
    }
}

/* --------------------------------------------------------------------------
Updates
-------------------------------------------------------------------------- */

/// A delta applied to a job by its executor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub progress: Option<u8>,
    pub append_results: Vec<ArtifactRef>,
    pub error: Option<JobError>,
}

impl JobUpdate {
    /// Move into `processing` with an initial progress value.
    pub fn started(progress: u8) -> Self {
        Self {
            status: Some(JobStatus::Processing),
            progress: Some(progress),
            ..Self::default()
        }
    }

    pub fn progress(progress: u8) -> Self {
        Self {
            progress: Some(progress),
            ..Self::default()
        }
    }

    /// Append one artifact and advance progress in the same step.
    pub fn artifact(artifact: ArtifactRef, progress: u8) -> Self {
        Self {
            progress: Some(progress),
            append_results: vec![artifact],
            ..Self::default()
        }
    }

    pub fn completed() -> Self {
        Self {
            status: Some(JobStatus::Completed),
            progress: Some(100),
            ..Self::default()
        }
    }

    pub fn failed(error: JobError) -> Self {
        Self {
            status: Some(JobStatus::Failed),
            error: Some(error),
            ..Self::default()
        }
    }
}

/// Why an update was refused. Any of these indicates an executor defect.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpdateRejected {
    #[error("job {0} is not registered")]
    UnknownJob(JobId),

    #[error("job is already {status} and can no longer change")]
    AlreadyTerminal { status: JobStatus },

    #[error("illegal status transition from {from} to {to}")]
    IllegalTransition { from: JobStatus, to: JobStatus },

    #[error("progress may not decrease (current {current}, requested {requested})")]
    ProgressRegression { current: u8, requested: u8 },

    #[error("progress {0} is outside 0..=100")]
    ProgressOutOfRange(u8),

    #[error("results may only be appended while processing or completing (status {status})")]
    ResultsOutsideProcessing { status: JobStatus },

    #[error("an error may only be recorded together with the failed status")]
    ErrorWithoutFailure,

    #[error("the failed status requires an error")]
    FailureWithoutError,
}

/* --------------------------------------------------------------------------
Job
-------------------------------------------------------------------------- */

/// One generation request and its observable state.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: JobId,
    pub status: JobStatus,
    pub progress: u8,
    pub partial_results: Vec<ArtifactRef>,
    pub error: Option<JobError>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub expires_at: Timestamp,
    #[serde(flatten)]
    pub payload: JobPayload,
}

impl Job {
    /// A fresh pending job that becomes evictable `ttl` after creation.
    pub fn new(payload: JobPayload, now: Timestamp, ttl: chrono::Duration) -> Self {
        Self {
            id: JobId::new(),
            status: JobStatus::Pending,
            progress: 0,
            partial_results: Vec::new(),
            error: None,
            created_at: now,
            updated_at: now,
            expires_at: now + ttl,
            payload,
        }
    }

    pub fn kind(&self) -> JobKind {
        self.payload.kind()
    }

    /// Terminal jobs past their expiry may be evicted. Non-terminal jobs
    /// never expire, however old they are.
    pub fn is_evictable(&self, now: Timestamp) -> bool {
        self.status.is_terminal() && now >= self.expires_at
    }

    /// Validate and apply `update`. On error the job is left untouched.
    pub fn apply(&mut self, update: JobUpdate, now: Timestamp) -> Result<(), UpdateRejected> {
        if self.status.is_terminal() {
            return Err(UpdateRejected::AlreadyTerminal {
                status: self.status,
            });
        }

        let next = update.status.unwrap_or(self.status);
        if next != self.status && !self.status.can_transition_to(next) {
            return Err(UpdateRejected::IllegalTransition {
                from: self.status,
                to: next,
            });
        }

        if let Some(requested) = update.progress {
            if requested > 100 {
                return Err(UpdateRejected::ProgressOutOfRange(requested));
            }
            if requested < self.progress {
                return Err(UpdateRejected::ProgressRegression {
                    current: self.progress,
                    requested,
                });
            }
        }

        if !update.append_results.is_empty()
            && !matches!(next, JobStatus::Processing | JobStatus::Completed)
        {
            return Err(UpdateRejected::ResultsOutsideProcessing { status: next });
        }

        match (next == JobStatus::Failed, update.error.is_some()) {
            (true, false) => return Err(UpdateRejected::FailureWithoutError),
            (false, true) => return Err(UpdateRejected::ErrorWithoutFailure),
            _ => {}
        }

        self.status = next;
        if let Some(progress) = update.progress {
            self.progress = progress;
        }
        if next == JobStatus::Completed {
            self.progress = 100;
        }
        self.partial_results.extend(update.append_results);
        self.error = update.error;
        self.updated_at = now;
        Ok(())
    }
}
