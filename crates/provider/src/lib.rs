//! Generation provider abstraction and implementations.
//!
//! The orchestration engine only sees [`GenerationProvider`]: a request goes
//! in, a stream of progress and artifact events (or one error) comes out.
//! [`http::HttpProvider`] talks to a generation gateway over REST and polls
//! long-running video operations; [`scripted::ScriptedProvider`] replays
//! deterministic scripts for offline development and tests.

pub mod api;
pub mod events;
pub mod http;
pub mod provider;
pub mod scripted;

pub use events::ProviderEvent;
pub use provider::{
    ArtifactStream, GenerationProvider, GenerationRequest, ImageRequest, ProviderError,
    VideoRequest,
};
