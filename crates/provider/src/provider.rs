//! The provider trait and the requests it accepts.

use futures::stream::BoxStream;
use genstudio_core::job::JobKind;
use genstudio_core::params::{ImageParams, VideoParams};
use genstudio_core::types::{ArtifactRef, ConversationHandle};

use crate::api::GenerationApiError;
use crate::events::ProviderEvent;

/// Stream of events for one generation. It ends after the last artifact,
/// or after yielding a single error.
pub type ArtifactStream = BoxStream<'static, Result<ProviderEvent, ProviderError>>;

/// Errors a provider reports for a generation or conversation call.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Transport or HTTP status failure talking to the gateway.
    #[error(transparent)]
    Api(#[from] GenerationApiError),

    /// The provider accepted the call but refused to produce output.
    #[error("Provider rejected the request: {0}")]
    Rejected(String),

    /// The provider answered with something we cannot interpret.
    #[error("Malformed provider response: {0}")]
    Malformed(String),
}

/// One image generation or edit turn.
#[derive(Debug, Clone)]
pub struct ImageRequest {
    pub params: ImageParams,
    /// Conversation the images are generated in.
    pub conversation: ConversationHandle,
    /// `true` when continuing an existing conversation.
    pub is_edit: bool,
}

/// One video generation; an extension when `source_video` is set.
#[derive(Debug, Clone)]
pub struct VideoRequest {
    pub params: VideoParams,
    pub source_video: Option<ArtifactRef>,
}

#[derive(Debug, Clone)]
pub enum GenerationRequest {
    Image(ImageRequest),
    Video(VideoRequest),
}

impl GenerationRequest {
    pub fn kind(&self) -> JobKind {
        match self {
            Self::Image(_) => JobKind::Image,
            Self::Video(_) => JobKind::Video,
        }
    }
}

/// A black-box generative backend.
///
/// Implementations must not retry on their own: one failure ends the
/// stream. Dropping the stream abandons the generation; implementations
/// should stop any polling they do once nobody is listening.
#[async_trait::async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Start a generation. The returned stream may be dropped at any point.
    fn generate(&self, request: GenerationRequest) -> ArtifactStream;

    /// Let the provider free a conversation that will not be used again.
    async fn release_conversation(&self, handle: &ConversationHandle)
        -> Result<(), ProviderError>;

    /// Rewrite a short prompt into a detailed one suited to `target`.
    async fn enhance_prompt(&self, prompt: &str, target: JobKind) -> Result<String, ProviderError>;
}
