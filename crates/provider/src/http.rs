//! Provider backed by the generation gateway REST API.
//!
//! Image requests run one gateway call per requested image inside the same
//! conversation, emitting each image as soon as it arrives. Video requests
//! start a long-running operation and poll it until it finishes. Each
//! generation runs on its own task feeding a bounded channel; once the
//! consumer drops the stream the task stops at its next send or poll.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use genstudio_core::job::JobKind;
use genstudio_core::types::{ArtifactRef, ConversationHandle};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::api::{EnhancePromptCall, ExtendVideoCall, GenerationApi, ImageCall, VideoCall};
use crate::events::ProviderEvent;
use crate::provider::{
    ArtifactStream, GenerationProvider, GenerationRequest, ImageRequest, ProviderError,
    VideoRequest,
};

/// Default interval between operation polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Prompt used for every image after the first in a multi-image request.
const VARIATION_PROMPT: &str = "Generate another variation of the previous image.";

/// Progress reported once a video operation has been accepted.
const VIDEO_SUBMITTED_PROGRESS: u8 = 30;

/// Progress added per completed poll.
const VIDEO_PROGRESS_PER_POLL: u32 = 5;

/// Highest progress reported while the operation is still running.
const VIDEO_POLLING_PROGRESS_CAP: u32 = 90;

const EVENT_BUFFER: usize = 16;

type EventSender = mpsc::Sender<Result<ProviderEvent, ProviderError>>;

/// Settings for [`HttpProvider`].
#[derive(Debug, Clone)]
pub struct HttpProviderConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub poll_interval: Duration,
}

pub struct HttpProvider {
    api: Arc<GenerationApi>,
    poll_interval: Duration,
}

impl HttpProvider {
    pub fn new(config: HttpProviderConfig) -> Self {
        Self {
            api: Arc::new(GenerationApi::new(config.base_url, config.api_key)),
            poll_interval: config.poll_interval,
        }
    }
}

#[async_trait]
impl GenerationProvider for HttpProvider {
    fn name(&self) -> &'static str {
        "http"
    }

    fn generate(&self, request: GenerationRequest) -> ArtifactStream {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let api = Arc::clone(&self.api);
        let poll_interval = self.poll_interval;

        tokio::spawn(async move {
            let result = match request {
                GenerationRequest::Image(req) => run_image(&api, req, &tx).await,
                GenerationRequest::Video(req) => run_video(&api, req, poll_interval, &tx).await,
            };
            if let Err(e) = result {
                // Nobody may be listening any more; that is fine.
                let _ = tx.send(Err(e)).await;
            }
        });

        Box::pin(ReceiverStream::new(rx))
    }

    async fn release_conversation(
        &self,
        handle: &ConversationHandle,
    ) -> Result<(), ProviderError> {
        self.api.delete_conversation(handle.as_str()).await?;
        Ok(())
    }

    async fn enhance_prompt(&self, prompt: &str, target: JobKind) -> Result<String, ProviderError> {
        let response = self
            .api
            .enhance_prompt(&EnhancePromptCall {
                prompt,
                target_type: target.as_str(),
            })
            .await?;

        let enhanced = response.enhanced_prompt.trim();
        if enhanced.is_empty() {
            return Err(ProviderError::Malformed(
                "prompt enhancement returned an empty prompt".to_string(),
            ));
        }
        Ok(enhanced.to_string())
    }
}

/// Send an event. Returns `false` once the consumer has gone away.
async fn emit(tx: &EventSender, event: ProviderEvent) -> bool {
    tx.send(Ok(event)).await.is_ok()
}

async fn run_image(
    api: &GenerationApi,
    req: ImageRequest,
    tx: &EventSender,
) -> Result<(), ProviderError> {
    let params = &req.params;
    let count = params.count.max(1);

    for index in 0..count {
        let first = index == 0;
        let call = ImageCall {
            conversation_id: req.conversation.as_str(),
            prompt: if first { params.prompt.as_str() } else { VARIATION_PROMPT },
            aspect_ratio: &params.aspect_ratio,
            image_size: params.resolution.as_str(),
            use_google_search: params.use_google_search,
            reference_images: if first { params.reference_images.as_slice() } else { &[] },
        };

        let response = api.generate_image(&call).await?;
        if response.images.is_empty() {
            tracing::warn!(
                conversation = %req.conversation,
                index,
                "Image turn returned no images"
            );
        }

        for image in response.images {
            if !emit(tx, ProviderEvent::Artifact(ArtifactRef::new(image))).await {
                tracing::debug!(conversation = %req.conversation, "Image consumer gone, stopping");
                return Ok(());
            }
        }
    }
    Ok(())
}

async fn run_video(
    api: &GenerationApi,
    req: VideoRequest,
    poll_interval: Duration,
    tx: &EventSender,
) -> Result<(), ProviderError> {
    let params = &req.params;
    let operation = match &req.source_video {
        Some(source) => {
            api.extend_video(&ExtendVideoCall {
                source_video: source.as_str(),
                prompt: &params.prompt,
                aspect_ratio: params.aspect_ratio.as_str(),
                resolution: params.resolution.as_str(),
            })
            .await?
        }
        None => {
            api.start_video(&VideoCall {
                prompt: &params.prompt,
                mode: params.mode.as_str(),
                aspect_ratio: params.aspect_ratio.as_str(),
                resolution: params.resolution.as_str(),
                duration_seconds: params.duration_seconds,
                first_frame: params.first_frame.as_deref(),
                last_frame: params.last_frame.as_deref(),
            })
            .await?
        }
    };

    tracing::info!(operation = %operation.name, "Video operation started");
    if !emit(
        tx,
        ProviderEvent::Progress {
            percent: VIDEO_SUBMITTED_PROGRESS,
        },
    )
    .await
    {
        return Ok(());
    }

    let mut polls: u32 = 0;
    loop {
        tokio::select! {
            _ = tx.closed() => {
                tracing::debug!(operation = %operation.name, "Video consumer gone, polling stopped");
                return Ok(());
            }
            _ = tokio::time::sleep(poll_interval) => {}
        }

        polls += 1;
        let status = api.get_operation(&operation.name).await?;

        if let Some(error) = status.error {
            return Err(ProviderError::Rejected(error.message));
        }

        if status.done {
            let video = status.video.ok_or_else(|| {
                ProviderError::Malformed(format!(
                    "operation {} finished without a video",
                    operation.name
                ))
            })?;
            emit(tx, ProviderEvent::Artifact(ArtifactRef::new(video))).await;
            return Ok(());
        }

        let percent = polling_progress(polls);
        tracing::debug!(operation = %operation.name, polls, percent, "Video still generating");
        if !emit(tx, ProviderEvent::Progress { percent }).await {
            return Ok(());
        }
    }
}

/// Coarse progress after `polls` unfinished polls.
fn polling_progress(polls: u32) -> u8 {
    let percent = (u32::from(VIDEO_SUBMITTED_PROGRESS)
        + polls.saturating_mul(VIDEO_PROGRESS_PER_POLL))
    .min(VIDEO_POLLING_PROGRESS_CAP);
    percent as u8
}
