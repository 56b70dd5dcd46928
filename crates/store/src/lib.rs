//! Durable storage for completed generation results.
//!
//! Live job state is deliberately ephemeral; only the summary of a
//! completed job survives a restart, as a [`models::HistoryItem`] in the
//! JSON-file backed [`history::HistoryStore`].

use std::path::PathBuf;

pub mod history;
pub mod models;

pub use history::HistoryStore;

/// Errors from the history store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading, writing or renaming a store file failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The committed store file exists but does not parse.
    #[error("History file {} is not valid JSON: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize history: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}
