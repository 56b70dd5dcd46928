//! Video extension chains.
//!
//! Every rule deciding whether a video may be extended lives in
//! [`ExtensionChainTracker::check`]; capability queries and extension
//! requests both go through it.

use genstudio_core::error::CoreError;
use genstudio_core::extension::ExtensionPolicy;
use genstudio_core::job::{Job, JobPayload, JobStatus, VideoJobData};
use genstudio_core::params::{validate_prompt, VideoMode, VideoParams};
use genstudio_core::types::{ArtifactRef, JobId};
use genstudio_provider::{GenerationRequest, VideoRequest};
use serde::Serialize;

use crate::engine::Launcher;

/// Answer to "can this video be extended, and how far".
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ExtensionCapability {
    pub extendable: bool,
    /// Why not, when `extendable` is false.
    pub reason: Option<String>,
    pub extensions_used: u32,
    pub extensions_remaining: u32,
    pub total_duration_secs: u32,
    pub max_total_duration_secs: u32,
}

pub struct ExtensionChainTracker {
    policy: ExtensionPolicy,
}

impl ExtensionChainTracker {
    pub fn new(policy: ExtensionPolicy) -> Self {
        Self { policy }
    }

    /// The extension predicate. On success returns the video data of `job`
    /// and the artifact a new segment would continue from.
    pub fn check<'a>(&self, job: &'a Job) -> Result<(&'a VideoJobData, &'a ArtifactRef), CoreError> {
        let JobPayload::Video(video) = &job.payload else {
            return Err(CoreError::Validation(format!(
                "Job {} is not a video and cannot be extended",
                job.id
            )));
        };

        let source = match (job.status, job.partial_results.first()) {
            (JobStatus::Completed, Some(source)) => source,
            _ => {
                return Err(CoreError::Validation(format!(
                    "Video {} has not completed successfully",
                    job.id
                )));
            }
        };

        if video.params.resolution != self.policy.extendable_resolution {
            return Err(CoreError::Validation(format!(
                "Only {} videos can be extended (this video is {})",
                self.policy.extendable_resolution, video.params.resolution
            )));
        }

        if !self.policy.has_room(video.total_duration_secs) {
            return Err(CoreError::Validation(format!(
                "Video has reached the extension limit ({} extensions, {}s total)",
                self.policy.max_extensions,
                self.policy.max_total_duration_secs()
            )));
        }

        Ok((video, source))
    }

    pub fn can_extend(&self, job: &Job) -> bool {
        self.check(job).is_ok()
    }

    pub fn capability(&self, job: &Job) -> ExtensionCapability {
        let total = match &job.payload {
            JobPayload::Video(video) => video.total_duration_secs,
            JobPayload::Image(_) => 0,
        };
        let reason = match self.check(job) {
            Ok(_) => None,
            Err(CoreError::Validation(msg)) => Some(msg),
            Err(other) => Some(other.to_string()),
        };
        ExtensionCapability {
            extendable: reason.is_none(),
            reason,
            extensions_used: self.policy.extensions_used(total),
            extensions_remaining: self.policy.extensions_remaining(total),
            total_duration_secs: total,
            max_total_duration_secs: self.policy.max_total_duration_secs(),
        }
    }

    /// Start a job that continues `source_id` with one more segment.
    ///
    /// Nothing is registered and the provider is not called unless every
    /// check passes.
    pub fn extend(
        &self,
        launcher: &Launcher,
        source_id: JobId,
        prompt: String,
    ) -> Result<JobId, CoreError> {
        validate_prompt(&prompt)?;

        let source_job = launcher
            .registry()
            .get(&source_id)
            .ok_or_else(|| CoreError::not_found("Video", source_id))?;
        let (source, artifact) = self.check(&source_job)?;

        let params = VideoParams {
            prompt,
            mode: VideoMode::TextToVideo,
            aspect_ratio: source.params.aspect_ratio,
            resolution: source.params.resolution,
            duration_seconds: self.policy.increment_secs,
            first_frame: None,
            last_frame: None,
        };
        let payload = JobPayload::Video(VideoJobData {
            params: params.clone(),
            parent_job_id: Some(source_id),
            source_video: Some(artifact.clone()),
            total_duration_secs: self.policy.next_total_duration_secs(source.total_duration_secs),
        });
        let request = GenerationRequest::Video(VideoRequest {
            params,
            source_video: Some(artifact.clone()),
        });

        let job_id = launcher.launch(payload, request);
        tracing::info!(
            job_id = %job_id,
            parent_job_id = %source_id,
            total_duration_secs = self.policy.next_total_duration_secs(source.total_duration_secs),
            "Video extension submitted",
        );
        Ok(job_id)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::Utc;
    use genstudio_core::job::{ImageJobData, JobError, JobUpdate};
    use genstudio_core::params::VideoResolution;

    use super::*;

    fn tracker() -> ExtensionChainTracker {
        ExtensionChainTracker::new(ExtensionPolicy::default())
    }

    fn video_job(resolution: &str, total: u32, status: JobStatus) -> Job {
        let params: VideoParams = serde_json::from_value(serde_json::json!({
            "prompt": "waves",
            "resolution": resolution,
        }))
        .unwrap();
        let mut data = VideoJobData::original(params);
        data.total_duration_secs = total;
        let mut job = Job::new(JobPayload::Video(data), Utc::now(), chrono::Duration::hours(1));
        job.apply(JobUpdate::started(10), Utc::now()).unwrap();
        match status {
            JobStatus::Completed => {
                job.apply(JobUpdate::artifact(ArtifactRef::new("v.mp4"), 90), Utc::now())
                    .unwrap();
                job.apply(JobUpdate::completed(), Utc::now()).unwrap();
            }
            JobStatus::Failed => {
                job.apply(JobUpdate::failed(JobError::provider("x")), Utc::now())
                    .unwrap();
            }
            _ => {}
        }
        job
    }

    #[test]
    fn completed_720p_video_is_extendable() {
        let job = video_job("720p", 8, JobStatus::Completed);
        let (_, artifact) = tracker().check(&job).unwrap();
        assert_eq!(artifact.as_str(), "v.mp4");

        let capability = tracker().capability(&job);
        assert!(capability.extendable);
        assert_eq!(capability.extensions_used, 0);
        assert_eq!(capability.extensions_remaining, 20);
        assert_eq!(capability.max_total_duration_secs, 148);
    }

    #[test]
    fn high_resolution_video_is_rejected() {
        let job = video_job("1080p", 8, JobStatus::Completed);
        assert_matches!(tracker().check(&job), Err(CoreError::Validation(msg)) if msg.contains("720p"));
        assert!(!tracker().can_extend(&job));
    }

    #[test]
    fn unfinished_or_failed_video_is_rejected() {
        assert!(!tracker().can_extend(&video_job("720p", 8, JobStatus::Processing)));
        assert!(!tracker().can_extend(&video_job("720p", 8, JobStatus::Failed)));
    }

    #[test]
    fn chain_at_limit_is_rejected() {
        let at_limit = video_job("720p", 148, JobStatus::Completed);
        let capability = tracker().capability(&at_limit);
        assert!(!capability.extendable);
        assert_eq!(capability.extensions_used, 20);
        assert_eq!(capability.extensions_remaining, 0);
        assert!(capability.reason.unwrap().contains("limit"));

        let one_left = video_job("720p", 141, JobStatus::Completed);
        assert!(tracker().can_extend(&one_left));
    }

    #[test]
    fn image_job_is_not_extendable() {
        let params = serde_json::from_value(serde_json::json!({ "prompt": "fox" })).unwrap();
        let job = Job::new(
            JobPayload::Image(ImageJobData {
                params,
                session_id: None,
                is_edit: false,
            }),
            Utc::now(),
            chrono::Duration::hours(1),
        );
        let capability = tracker().capability(&job);
        assert!(!capability.extendable);
        assert_eq!(capability.total_duration_secs, 0);
    }

    #[test]
    fn policy_resolution_is_configurable() {
        let tracker = ExtensionChainTracker::new(ExtensionPolicy {
            extendable_resolution: VideoResolution::P1080,
            ..ExtensionPolicy::default()
        });
        assert!(tracker.can_extend(&video_job("1080p", 8, JobStatus::Completed)));
        assert!(!tracker.can_extend(&video_job("720p", 8, JobStatus::Completed)));
    }
}
