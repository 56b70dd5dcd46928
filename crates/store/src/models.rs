//! History record models and listing DTOs.

use genstudio_core::job::{Job, JobKind, JobPayload};
use genstudio_core::types::{ArtifactRef, JobId, RecordId, Timestamp};
use serde::{Deserialize, Serialize};

/// Default page size for history listings.
pub const DEFAULT_PAGE_LIMIT: usize = 50;

/// Largest page size a caller may request.
pub const MAX_PAGE_LIMIT: usize = 100;

/// Summary of one completed job, persisted across restarts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryItem {
    pub record_id: RecordId,
    pub job_id: JobId,
    pub kind: JobKind,
    pub prompt: String,
    /// Parameter summary without any binary inputs.
    pub params: serde_json::Value,
    pub result_refs: Vec<ArtifactRef>,
    pub completed_at: Timestamp,
}

impl HistoryItem {
    /// Build the record for a job that has just produced its results.
    pub fn from_job(job: &Job, completed_at: Timestamp) -> Self {
        let params = match &job.payload {
            JobPayload::Image(data) => serde_json::json!({
                "aspect_ratio": data.params.aspect_ratio,
                "resolution": data.params.resolution.as_str(),
                "count": data.params.count,
                "use_google_search": data.params.use_google_search,
                "session_id": data.session_id,
                "is_edit": data.is_edit,
            }),
            JobPayload::Video(data) => serde_json::json!({
                "mode": data.params.mode.as_str(),
                "aspect_ratio": data.params.aspect_ratio.as_str(),
                "resolution": data.params.resolution.as_str(),
                "duration_seconds": data.params.duration_seconds,
                "total_duration_secs": data.total_duration_secs,
                "parent_job_id": data.parent_job_id,
            }),
        };

        Self {
            record_id: RecordId::new(),
            job_id: job.id,
            kind: job.kind(),
            prompt: job.payload.prompt().to_string(),
            params,
            result_refs: job.partial_results.clone(),
            completed_at,
        }
    }
}

/// Which records a listing or clear operation applies to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct HistoryFilter {
    pub kind: Option<JobKind>,
}

impl HistoryFilter {
    pub fn matches(&self, item: &HistoryItem) -> bool {
        match self.kind {
            Some(kind) => item.kind == kind,
            None => true,
        }
    }
}

/// Offset-cursor pagination with a clamped page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: usize,
    pub cursor: usize,
}

impl PageRequest {
    /// Clamp caller input: limit into `1..=MAX_PAGE_LIMIT`, cursor defaults to 0.
    pub fn new(limit: Option<usize>, cursor: Option<usize>) -> Self {
        Self {
            limit: limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT),
            cursor: cursor.unwrap_or(0),
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// One page of history, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryPage {
    pub items: Vec<HistoryItem>,
    /// Number of records matching the filter across all pages.
    pub total: usize,
    /// Cursor of the next page, absent on the last page.
    pub next_cursor: Option<usize>,
}
