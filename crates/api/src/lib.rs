//! HTTP service for asynchronous image and video generation.
//!
//! Submissions are validated and registered in the [`engine`], executed in
//! the background against a [`genstudio_provider::GenerationProvider`], and
//! observed by polling or server-sent events. Completed jobs are recorded in
//! the persistent [`genstudio_store::HistoryStore`].

pub mod background;
pub mod config;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
