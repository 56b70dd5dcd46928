use std::sync::Arc;

use genstudio_store::HistoryStore;

use crate::config::ServerConfig;
use crate::engine::Engine;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (every field is behind an `Arc`).
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Job orchestration: registry, sessions, executors.
    pub engine: Arc<Engine>,
    /// Durable record of completed jobs.
    pub history: Arc<HistoryStore>,
}
