//! Periodic eviction of expired jobs and sessions.
//!
//! Terminal jobs past their TTL are dropped from the registry; sessions idle
//! past theirs are dropped and their provider conversations released.
//! Non-terminal jobs are never touched.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use genstudio_core::types::Timestamp;
use genstudio_provider::GenerationProvider;
use tokio_util::sync::CancellationToken;

use crate::engine::registry::JobRegistry;
use crate::engine::sessions::SessionManager;
use crate::engine::Engine;

/// Outcome of one sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub jobs_evicted: usize,
    pub sessions_evicted: usize,
}

pub struct Janitor {
    registry: Arc<JobRegistry>,
    sessions: Arc<SessionManager>,
    provider: Arc<dyn GenerationProvider>,
    interval: Duration,
}

impl Janitor {
    pub fn new(engine: &Engine, interval: Duration) -> Self {
        Self {
            registry: Arc::clone(engine.registry()),
            sessions: Arc::clone(engine.sessions()),
            provider: Arc::clone(engine.provider()),
            interval,
        }
    }

    /// Run the sweep loop until `cancel` is triggered.
    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!(interval_secs = self.interval.as_secs(), "Janitor started");

        let mut interval = tokio::time::interval(self.interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Janitor stopping");
                    break;
                }
                _ = interval.tick() => {
                    let report = self.sweep(Utc::now()).await;
                    if report.jobs_evicted > 0 || report.sessions_evicted > 0 {
                        tracing::info!(
                            jobs = report.jobs_evicted,
                            sessions = report.sessions_evicted,
                            "Janitor: evicted expired entries",
                        );
                    } else {
                        tracing::debug!("Janitor: nothing to evict");
                    }
                }
            }
        }
    }

    /// Evict everything that has expired as of `now`.
    pub async fn sweep(&self, now: Timestamp) -> SweepReport {
        let jobs_evicted = self
            .registry
            .expired_ids(now)
            .iter()
            .filter(|id| self.registry.expire(id, now))
            .count();

        let sessions = self.sessions.evict_expired(now);
        for session in &sessions {
            if let Err(e) = self
                .provider
                .release_conversation(&session.provider_handle)
                .await
            {
                tracing::warn!(
                    session_id = %session.id,
                    error = %e,
                    "Janitor: failed to release provider conversation",
                );
            }
        }

        SweepReport {
            jobs_evicted,
            sessions_evicted: sessions.len(),
        }
    }
}
