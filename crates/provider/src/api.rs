//! REST API client for the generation gateway.
//!
//! Wraps the gateway HTTP endpoints (image generation turns, video
//! operations, operation polling, conversation release, prompt enhancement)
//! using [`reqwest`].

use serde::{Deserialize, Serialize};

/// Header carrying the gateway API key.
const API_KEY_HEADER: &str = "x-api-key";

/// HTTP client for a generation gateway.
pub struct GenerationApi {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
}

/// Body of `POST /v1/images:generate`.
#[derive(Debug, Serialize)]
pub struct ImageCall<'a> {
    pub conversation_id: &'a str,
    pub prompt: &'a str,
    pub aspect_ratio: &'a str,
    pub image_size: &'a str,
    pub use_google_search: bool,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    pub reference_images: &'a [String],
}

/// Response of an image generation turn.
#[derive(Debug, Deserialize)]
pub struct ImageCallResponse {
    /// References of the images produced by this turn.
    #[serde(default)]
    pub images: Vec<String>,
}

/// Body of `POST /v1/videos:generate`.
#[derive(Debug, Serialize)]
pub struct VideoCall<'a> {
    pub prompt: &'a str,
    pub mode: &'a str,
    pub aspect_ratio: &'a str,
    pub resolution: &'a str,
    pub duration_seconds: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_frame: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_frame: Option<&'a str>,
}

/// Body of `POST /v1/videos:extend`.
#[derive(Debug, Serialize)]
pub struct ExtendVideoCall<'a> {
    pub source_video: &'a str,
    pub prompt: &'a str,
    pub aspect_ratio: &'a str,
    pub resolution: &'a str,
}

/// Body of `POST /v1/prompts:enhance`.
#[derive(Debug, Serialize)]
pub struct EnhancePromptCall<'a> {
    pub prompt: &'a str,
    /// `image` or `video`.
    pub target_type: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct EnhancePromptResponse {
    #[serde(default)]
    pub enhanced_prompt: String,
}

/// A long-running operation started by the gateway.
#[derive(Debug, Deserialize)]
pub struct OperationHandle {
    pub name: String,
}

/// State of a long-running operation.
#[derive(Debug, Deserialize)]
pub struct OperationStatus {
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub error: Option<OperationError>,
    /// Reference of the finished video, once `done`.
    #[serde(default)]
    pub video: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OperationError {
    pub message: String,
}

/// Errors from the gateway REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum GenerationApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The gateway returned a non-2xx status code.
    #[error("Generation API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}

impl GenerationApi {
    /// Create a new API client.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `http://host:8090`.
    pub fn new(api_url: String, api_key: Option<String>) -> Self {
        Self::with_client(reqwest::Client::new(), api_url, api_key)
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, api_url: String, api_key: Option<String>) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// Run one image turn in a conversation.
    pub async fn generate_image(
        &self,
        call: &ImageCall<'_>,
    ) -> Result<ImageCallResponse, GenerationApiError> {
        let response = self
            .request(reqwest::Method::POST, "/v1/images:generate")
            .json(call)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Start a video generation operation.
    pub async fn start_video(
        &self,
        call: &VideoCall<'_>,
    ) -> Result<OperationHandle, GenerationApiError> {
        let response = self
            .request(reqwest::Method::POST, "/v1/videos:generate")
            .json(call)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Start an operation that continues an existing video.
    pub async fn extend_video(
        &self,
        call: &ExtendVideoCall<'_>,
    ) -> Result<OperationHandle, GenerationApiError> {
        let response = self
            .request(reqwest::Method::POST, "/v1/videos:extend")
            .json(call)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Fetch the current state of an operation.
    pub async fn get_operation(&self, name: &str) -> Result<OperationStatus, GenerationApiError> {
        let response = self
            .request(reqwest::Method::GET, &format!("/v1/operations/{name}"))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Drop a conversation on the gateway side.
    pub async fn delete_conversation(&self, conversation_id: &str) -> Result<(), GenerationApiError> {
        let response = self
            .request(
                reqwest::Method::DELETE,
                &format!("/v1/conversations/{conversation_id}"),
            )
            .send()
            .await?;

        Self::check_status(response).await
    }

    /// Ask the gateway to rewrite a prompt for the given target type.
    pub async fn enhance_prompt(
        &self,
        call: &EnhancePromptCall<'_>,
    ) -> Result<EnhancePromptResponse, GenerationApiError> {
        let response = self
            .request(reqwest::Method::POST, "/v1/prompts:enhance")
            .json(call)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    // ---- private helpers ----

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{}", self.api_url, path));
        match &self.api_key {
            Some(key) => builder.header(API_KEY_HEADER, key),
            None => builder,
        }
    }

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`GenerationApiError::ApiError`]
    /// containing the status and body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, GenerationApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(GenerationApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, GenerationApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    /// Assert the response has a success status code, discarding the body.
    async fn check_status(response: reqwest::Response) -> Result<(), GenerationApiError> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}
