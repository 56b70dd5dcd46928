//! Generation parameter snapshots and their validation rules.
//!
//! Parameters are validated once, synchronously, before a job is created.
//! Binary inputs (reference images, frames) are accepted on input but never
//! serialized back out, so status snapshots and history records stay small.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/* --------------------------------------------------------------------------
Named constants
-------------------------------------------------------------------------- */

/// Maximum prompt length in characters.
pub const MAX_PROMPT_CHARS: usize = 2000;

/// Maximum number of images a single image job may request.
pub const MAX_IMAGE_COUNT: u32 = 10;

/// Maximum number of reference images attached to an image request.
pub const MAX_REFERENCE_IMAGES: usize = 14;

/// Video clip lengths the provider accepts, in seconds.
pub const VIDEO_DURATIONS_SECS: &[u32] = &[4, 6, 8];

/// The only clip length allowed above 720p.
pub const HIGH_RES_VIDEO_DURATION_SECS: u32 = 8;

const DEFAULT_IMAGE_ASPECT_RATIO: &str = "3:2";

static ASPECT_RATIO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+):(\d+)$").expect("valid regex"));

/* --------------------------------------------------------------------------
Image parameters
-------------------------------------------------------------------------- */

/// Output size tier for generated images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ImageResolution {
    #[serde(rename = "1K")]
    OneK,
    #[default]
    #[serde(rename = "2K")]
    TwoK,
    #[serde(rename = "4K")]
    FourK,
}

impl ImageResolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneK => "1K",
            Self::TwoK => "2K",
            Self::FourK => "4K",
        }
    }
}

/// Parameters of an image generation or edit turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageParams {
    pub prompt: String,
    #[serde(default = "default_image_aspect_ratio")]
    pub aspect_ratio: String,
    #[serde(default)]
    pub resolution: ImageResolution,
    #[serde(default = "default_image_count")]
    pub count: u32,
    #[serde(default)]
    pub use_google_search: bool,
    /// Base64-encoded reference images.
    #[serde(default, skip_serializing)]
    pub reference_images: Vec<String>,
}

fn default_image_aspect_ratio() -> String {
    DEFAULT_IMAGE_ASPECT_RATIO.to_string()
}

fn default_image_count() -> u32 {
    1
}

/* --------------------------------------------------------------------------
Video parameters
-------------------------------------------------------------------------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VideoMode {
    #[default]
    #[serde(rename = "text2vid")]
    TextToVideo,
    #[serde(rename = "img2vid")]
    ImageToVideo,
    #[serde(rename = "first_last")]
    FirstLast,
}

impl VideoMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TextToVideo => "text2vid",
            Self::ImageToVideo => "img2vid",
            Self::FirstLast => "first_last",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VideoAspectRatio {
    #[default]
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "9:16")]
    Portrait,
}

impl VideoAspectRatio {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Landscape => "16:9",
            Self::Portrait => "9:16",
        }
    }
}

/// Output resolution tier for generated videos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VideoResolution {
    #[default]
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "1080p")]
    P1080,
    #[serde(rename = "4k")]
    Uhd4k,
}

impl VideoResolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::P720 => "720p",
            Self::P1080 => "1080p",
            Self::Uhd4k => "4k",
        }
    }
}

impl std::fmt::Display for VideoResolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters of a video generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoParams {
    pub prompt: String,
    #[serde(default)]
    pub mode: VideoMode,
    #[serde(default)]
    pub aspect_ratio: VideoAspectRatio,
    #[serde(default)]
    pub resolution: VideoResolution,
    #[serde(default = "default_video_duration")]
    pub duration_seconds: u32,
    /// Base64-encoded first frame (`img2vid` and `first_last`).
    #[serde(default, skip_serializing)]
    pub first_frame: Option<String>,
    /// Base64-encoded last frame (`first_last` only).
    #[serde(default, skip_serializing)]
    pub last_frame: Option<String>,
}

fn default_video_duration() -> u32 {
    HIGH_RES_VIDEO_DURATION_SECS
}

/* --------------------------------------------------------------------------
Validation functions
-------------------------------------------------------------------------- */

/// Validate that a prompt is non-blank and within the length limit.
pub fn validate_prompt(prompt: &str) -> Result<(), CoreError> {
    if prompt.trim().is_empty() {
        return Err(CoreError::Validation("Prompt must not be empty".to_string()));
    }
    let chars = prompt.chars().count();
    if chars > MAX_PROMPT_CHARS {
        return Err(CoreError::Validation(format!(
            "Prompt must not exceed {MAX_PROMPT_CHARS} characters (got {chars})"
        )));
    }
    Ok(())
}

/// Validate a free-form `W:H` aspect ratio with positive terms.
pub fn validate_aspect_ratio(ratio: &str) -> Result<(), CoreError> {
    let invalid = || {
        CoreError::Validation(format!(
            "Invalid aspect ratio '{ratio}': expected the form W:H, e.g. 3:2"
        ))
    };
    let caps = ASPECT_RATIO_RE.captures(ratio).ok_or_else(invalid)?;
    let positive = |idx: usize| {
        caps.get(idx)
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .is_some_and(|v| v > 0)
    };
    if positive(1) && positive(2) {
        Ok(())
    } else {
        Err(invalid())
    }
}

/// Validate a complete image request.
pub fn validate_image_params(params: &ImageParams) -> Result<(), CoreError> {
    validate_prompt(&params.prompt)?;
    validate_aspect_ratio(&params.aspect_ratio)?;
    if params.count == 0 || params.count > MAX_IMAGE_COUNT {
        return Err(CoreError::Validation(format!(
            "Image count must be between 1 and {MAX_IMAGE_COUNT} (got {})",
            params.count
        )));
    }
    if params.reference_images.len() > MAX_REFERENCE_IMAGES {
        return Err(CoreError::Validation(format!(
            "At most {MAX_REFERENCE_IMAGES} reference images are allowed (got {})",
            params.reference_images.len()
        )));
    }
    Ok(())
}

/// Validate a complete video request, including per-mode frame requirements.
pub fn validate_video_params(params: &VideoParams) -> Result<(), CoreError> {
    validate_prompt(&params.prompt)?;

    if !VIDEO_DURATIONS_SECS.contains(&params.duration_seconds) {
        return Err(CoreError::Validation(format!(
            "Video duration must be one of 4, 6 or 8 seconds (got {})",
            params.duration_seconds
        )));
    }
    if params.resolution != VideoResolution::P720
        && params.duration_seconds != HIGH_RES_VIDEO_DURATION_SECS
    {
        return Err(CoreError::Validation(format!(
            "{} videos must be {HIGH_RES_VIDEO_DURATION_SECS} seconds long",
            params.resolution
        )));
    }

    match params.mode {
        VideoMode::TextToVideo => {}
        VideoMode::ImageToVideo => {
            if params.first_frame.is_none() {
                return Err(CoreError::Validation(
                    "Image-to-video mode requires a first frame".to_string(),
                ));
            }
        }
        VideoMode::FirstLast => {
            if params.first_frame.is_none() || params.last_frame.is_none() {
                return Err(CoreError::Validation(
                    "First/last frame mode requires both a first and a last frame".to_string(),
                ));
            }
        }
    }
    Ok(())
}

/* --------------------------------------------------------------------------
Tests
-------------------------------------------------------------------------- */
