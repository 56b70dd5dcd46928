//! Job orchestration.
//!
//! [`Engine`] is the single entry point used by the HTTP handlers: it
//! validates submissions, resolves editing sessions, registers jobs and
//! hands each one to an [`Executor`](executor::Executor) running on the
//! shared [`TaskTracker`]. Submission returns as soon as the job is
//! registered; clients poll [`Engine::get_status`] or open a
//! [`JobWatch`](watch::JobWatch) for progress.

pub mod executor;
pub mod extension;
pub mod registry;
pub mod sessions;
pub mod watch;

use std::sync::Arc;
use std::time::Duration;

use genstudio_core::error::CoreError;
use genstudio_core::job::{ImageJobData, Job, JobKind, JobPayload, VideoJobData};
use genstudio_core::params::{
    validate_image_params, validate_prompt, validate_video_params, ImageParams, VideoParams,
};
use genstudio_core::types::{ConversationHandle, JobId, SessionId};
use genstudio_provider::{GenerationProvider, GenerationRequest, ImageRequest, VideoRequest};
use genstudio_store::HistoryStore;
use serde::{Deserialize, Serialize};
use tokio_util::task::TaskTracker;

use crate::config::EngineConfig;
use executor::{ExecutionLimits, Executor};
use extension::{ExtensionCapability, ExtensionChainTracker};
use registry::JobRegistry;
use sessions::SessionManager;
use watch::JobWatch;

/* --------------------------------------------------------------------------
Request / response DTOs
-------------------------------------------------------------------------- */

/// Body of `POST /images`. With a `session_id` the request edits the
/// session's latest output; without one it starts a new conversation.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitImage {
    #[serde(flatten)]
    pub params: ImageParams,
    #[serde(default)]
    pub session_id: Option<SessionId>,
}

/// Body of `POST /videos/{id}/extend`.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtendVideo {
    pub prompt: String,
}

/// Body of `POST /prompts/enhance`.
#[derive(Debug, Clone, Deserialize)]
pub struct EnhancePrompt {
    pub prompt: String,
    #[serde(default = "default_enhance_target")]
    pub target_type: JobKind,
}

fn default_enhance_target() -> JobKind {
    JobKind::Image
}

#[derive(Debug, Clone, Serialize)]
pub struct EnhancedPrompt {
    pub enhanced_prompt: String,
}

/// Identifiers handed back on accepted submissions.
#[derive(Debug, Clone, Serialize)]
pub struct Submission {
    pub job_id: JobId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
}

/* --------------------------------------------------------------------------
Launcher
-------------------------------------------------------------------------- */

/// Registers jobs and starts their executors.
pub struct Launcher {
    registry: Arc<JobRegistry>,
    provider: Arc<dyn GenerationProvider>,
    history: Arc<HistoryStore>,
    limits: ExecutionLimits,
    tasks: TaskTracker,
}

impl Launcher {
    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    /// Register `payload` as a pending job and run `request` for it in the
    /// background. Returns without waiting for the provider.
    pub fn launch(&self, payload: JobPayload, request: GenerationRequest) -> JobId {
        let writer = self.registry.create(payload);
        let job_id = writer.id();
        let executor = Executor::new(
            writer,
            Arc::clone(&self.provider),
            Arc::clone(&self.history),
            self.limits,
        );
        self.tasks.spawn(executor.run(request));
        job_id
    }
}

/* --------------------------------------------------------------------------
Engine
-------------------------------------------------------------------------- */

pub struct Engine {
    registry: Arc<JobRegistry>,
    sessions: Arc<SessionManager>,
    extensions: ExtensionChainTracker,
    launcher: Launcher,
    provider: Arc<dyn GenerationProvider>,
    history: Arc<HistoryStore>,
    watch_interval: Duration,
}

impl Engine {
    pub fn new(
        config: &EngineConfig,
        provider: Arc<dyn GenerationProvider>,
        history: Arc<HistoryStore>,
    ) -> Self {
        let registry = Arc::new(JobRegistry::new(config.job_ttl));
        let launcher = Launcher {
            registry: Arc::clone(&registry),
            provider: Arc::clone(&provider),
            history: Arc::clone(&history),
            limits: ExecutionLimits::from_config(config),
            tasks: TaskTracker::new(),
        };
        Self {
            registry,
            sessions: Arc::new(SessionManager::new(config.session_ttl)),
            extensions: ExtensionChainTracker::new(config.extension),
            launcher,
            provider,
            history,
            watch_interval: config.watch_interval,
        }
    }

    /// Start an image generation, or an edit turn when `session_id` is set.
    ///
    /// An unknown or expired session is rejected before any job exists.
    pub fn submit_image(&self, request: SubmitImage) -> Result<Submission, CoreError> {
        let SubmitImage { params, session_id } = request;
        validate_image_params(&params)?;

        let (session, is_edit) = match session_id {
            Some(id) => (self.sessions.touch(id)?, true),
            None => (self.sessions.open(ConversationHandle::generate()), false),
        };

        let mut recorded = params.clone();
        recorded.reference_images.clear();
        let payload = JobPayload::Image(ImageJobData {
            params: recorded,
            session_id: Some(session.id),
            is_edit,
        });
        let count = params.count;
        let request = GenerationRequest::Image(ImageRequest {
            params,
            conversation: session.provider_handle.clone(),
            is_edit,
        });

        let job_id = self.launcher.launch(payload, request);
        tracing::info!(
            job_id = %job_id,
            session_id = %session.id,
            is_edit,
            count,
            "Image job submitted",
        );
        Ok(Submission {
            job_id,
            session_id: Some(session.id),
        })
    }

    pub fn submit_video(&self, params: VideoParams) -> Result<Submission, CoreError> {
        validate_video_params(&params)?;

        let mut recorded = params.clone();
        recorded.first_frame = None;
        recorded.last_frame = None;
        let payload = JobPayload::Video(VideoJobData::original(recorded));
        let request = GenerationRequest::Video(VideoRequest {
            params,
            source_video: None,
        });

        let job_id = self.launcher.launch(payload, request);
        tracing::info!(job_id = %job_id, "Video job submitted");
        Ok(Submission {
            job_id,
            session_id: None,
        })
    }

    /// Continue a completed video with one more segment.
    pub fn extend_video(&self, source_id: JobId, prompt: String) -> Result<Submission, CoreError> {
        let job_id = self.extensions.extend(&self.launcher, source_id, prompt)?;
        Ok(Submission {
            job_id,
            session_id: None,
        })
    }

    pub fn get_status(&self, id: JobId) -> Result<Job, CoreError> {
        self.registry
            .get(&id)
            .ok_or_else(|| CoreError::not_found("Job", id))
    }

    pub fn extension_capability(&self, id: JobId) -> Result<ExtensionCapability, CoreError> {
        let job = self.get_status(id)?;
        Ok(self.extensions.capability(&job))
    }

    /// End an editing session and release its provider conversation.
    pub async fn close_session(&self, id: SessionId) -> Result<(), CoreError> {
        let session = self
            .sessions
            .close(id)
            .ok_or_else(|| CoreError::not_found("Session", id))?;

        if let Err(e) = self
            .provider
            .release_conversation(&session.provider_handle)
            .await
        {
            tracing::warn!(session_id = %id, error = %e, "Failed to release provider conversation");
        }
        tracing::info!(session_id = %id, "Session closed");
        Ok(())
    }

    /// Rewrite a prompt through the provider. Creates no job.
    pub async fn enhance_prompt(&self, request: EnhancePrompt) -> Result<EnhancedPrompt, CoreError> {
        let EnhancePrompt {
            prompt,
            target_type,
        } = request;
        validate_prompt(&prompt)?;

        let enhanced_prompt = self
            .provider
            .enhance_prompt(&prompt, target_type)
            .await
            .map_err(|e| CoreError::Internal(format!("Prompt enhancement failed: {e}")))?;
        tracing::info!(
            target_type = %target_type,
            original_chars = prompt.chars().count(),
            enhanced_chars = enhanced_prompt.chars().count(),
            "Prompt enhanced",
        );
        Ok(EnhancedPrompt { enhanced_prompt })
    }

    /// Observe a job until it finishes.
    pub fn watch(&self, id: JobId) -> Result<JobWatch, CoreError> {
        if self.registry.get(&id).is_none() {
            return Err(CoreError::not_found("Job", id));
        }
        Ok(JobWatch::spawn(
            Arc::clone(&self.registry),
            id,
            self.watch_interval,
        ))
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn provider(&self) -> &Arc<dyn GenerationProvider> {
        &self.provider
    }

    pub fn history(&self) -> &Arc<HistoryStore> {
        &self.history
    }

    /// Tracker of running executors; close and wait on it during shutdown.
    pub fn tasks(&self) -> &TaskTracker {
        &self.launcher.tasks
    }
}
