//! Append-only, crash-safe history of completed jobs.
//!
//! The whole history lives in one JSON document (`{"items": [...]}`, newest
//! first). Every mutation is serialized through a single writer lock and
//! persisted by writing a fresh temporary file in the same directory,
//! fsyncing it, and atomically renaming it over the store file. A crash at
//! any point leaves either the old or the new document on disk, never a
//! partial one. Readers only observe a change after its rename completed.

use std::path::{Path, PathBuf};

use genstudio_core::types::RecordId;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};

use crate::models::{HistoryFilter, HistoryItem, HistoryPage, PageRequest};
use crate::StoreError;

/// Default cap on the number of retained records.
pub const DEFAULT_MAX_ITEMS: usize = 1000;

/// Marker between the store file name and the random suffix of temp files.
const TEMP_MARKER: &str = ".tmp-";

#[derive(Deserialize)]
struct HistoryDocument {
    #[serde(default)]
    items: Vec<HistoryItem>,
}

#[derive(Serialize)]
struct HistoryDocumentRef<'a> {
    items: &'a [HistoryItem],
}

/// JSON-file backed history store.
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
#[derive(Debug)]
pub struct HistoryStore {
    path: PathBuf,
    max_items: usize,
    /// Serializes every write; held across the whole read-modify-persist cycle.
    writer: Mutex<()>,
    /// Last successfully persisted document.
    committed: RwLock<Vec<HistoryItem>>,
}

impl HistoryStore {
    /// Open (or create) the store at `path`.
    ///
    /// Temporary files left behind by an interrupted write are removed.
    /// A store file that exists but does not parse is reported as
    /// [`StoreError::Corrupt`] and left untouched.
    pub async fn open(path: impl Into<PathBuf>, max_items: usize) -> Result<Self, StoreError> {
        let path = path.into();
        let dir = parent_dir(&path);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(StoreError::io(&dir))?;

        let removed = remove_stale_temp_files(&path).await?;
        if removed > 0 {
            tracing::warn!(
                path = %path.display(),
                removed,
                "Removed temporary history files left by an interrupted write"
            );
        }

        let items = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Vec::new(),
            Ok(bytes) => {
                let doc: HistoryDocument =
                    serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
                        path: path.clone(),
                        source,
                    })?;
                doc.items
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(StoreError::io(&path)(e)),
        };

        tracing::info!(
            path = %path.display(),
            records = items.len(),
            "History store opened"
        );

        Ok(Self {
            path,
            max_items: max_items.max(1),
            writer: Mutex::new(()),
            committed: RwLock::new(items),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Durably record `item` as the newest entry.
    ///
    /// When the cap is exceeded the oldest records are dropped.
    pub async fn append(&self, item: HistoryItem) -> Result<(), StoreError> {
        let _writer = self.writer.lock().await;

        let mut items = self.committed.read().await.clone();
        items.insert(0, item);
        items.truncate(self.max_items);

        self.persist(&items).await?;
        *self.committed.write().await = items;
        Ok(())
    }

    /// List records matching `filter`, newest first.
    pub async fn list(&self, filter: HistoryFilter, page: PageRequest) -> HistoryPage {
        let items = self.committed.read().await;
        let matching: Vec<&HistoryItem> = items.iter().filter(|i| filter.matches(i)).collect();
        let total = matching.len();

        let page_items: Vec<HistoryItem> = matching
            .into_iter()
            .skip(page.cursor)
            .take(page.limit)
            .cloned()
            .collect();

        let consumed = page.cursor.saturating_add(page_items.len());
        let next_cursor = (consumed < total).then_some(consumed);

        HistoryPage {
            items: page_items,
            total,
            next_cursor,
        }
    }

    pub async fn get(&self, record_id: RecordId) -> Option<HistoryItem> {
        self.committed
            .read()
            .await
            .iter()
            .find(|i| i.record_id == record_id)
            .cloned()
    }

    pub async fn len(&self) -> usize {
        self.committed.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.committed.read().await.is_empty()
    }

    /// Delete a single record. Returns `false` if it did not exist.
    pub async fn delete(&self, record_id: RecordId) -> Result<bool, StoreError> {
        let _writer = self.writer.lock().await;

        let mut items = self.committed.read().await.clone();
        let before = items.len();
        items.retain(|i| i.record_id != record_id);
        if items.len() == before {
            return Ok(false);
        }

        self.persist(&items).await?;
        *self.committed.write().await = items;
        Ok(true)
    }

    /// Delete every record matching `filter`. Returns the number removed.
    pub async fn clear(&self, filter: HistoryFilter) -> Result<usize, StoreError> {
        let _writer = self.writer.lock().await;

        let mut items = self.committed.read().await.clone();
        let before = items.len();
        items.retain(|i| !filter.matches(i));
        let removed = before - items.len();
        if removed == 0 {
            return Ok(0);
        }

        self.persist(&items).await?;
        *self.committed.write().await = items;
        Ok(removed)
    }

    // ---- private helpers ----

    /// Write `items` to a temp file, fsync it, then rename it into place.
    async fn persist(&self, items: &[HistoryItem]) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(&HistoryDocumentRef { items })?;
        let tmp = temp_path(&self.path);

        let result = write_synced(&tmp, &bytes).await;
        let result = match result {
            Ok(()) => tokio::fs::rename(&tmp, &self.path)
                .await
                .map_err(StoreError::io(&self.path)),
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            if let Err(cleanup) = tokio::fs::remove_file(&tmp).await {
                tracing::debug!(
                    path = %tmp.display(),
                    error = %cleanup,
                    "Temporary history file not removed after failed write"
                );
            }
            return Err(e);
        }

        sync_dir(&parent_dir(&self.path)).await;
        Ok(())
    }
}

/* --------------------------------------------------------------------------
File helpers
-------------------------------------------------------------------------- */

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "history.json".to_string())
}

/// `<dir>/.<name>.tmp-<uuid>`: hidden, unique, and on the same filesystem.
fn temp_path(path: &Path) -> PathBuf {
    let name = format!(
        ".{}{TEMP_MARKER}{}",
        file_name(path),
        uuid::Uuid::new_v4().simple()
    );
    parent_dir(path).join(name)
}

async fn write_synced(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(StoreError::io(path))?;
    file.write_all(bytes).await.map_err(StoreError::io(path))?;
    file.sync_all().await.map_err(StoreError::io(path))?;
    Ok(())
}

/// Persist the rename itself. Not every platform can fsync a directory.
async fn sync_dir(dir: &Path) {
    #[cfg(unix)]
    {
        match tokio::fs::File::open(dir).await {
            Ok(handle) => {
                if let Err(e) = handle.sync_all().await {
                    tracing::debug!(dir = %dir.display(), error = %e, "Directory fsync failed");
                }
            }
            Err(e) => {
                tracing::debug!(dir = %dir.display(), error = %e, "Directory open for fsync failed");
            }
        }
    }
    #[cfg(not(unix))]
    let _ = dir;
}

async fn remove_stale_temp_files(path: &Path) -> Result<usize, StoreError> {
    let dir = parent_dir(path);
    let prefix = format!(".{}{TEMP_MARKER}", file_name(path));

    let mut entries = tokio::fs::read_dir(&dir)
        .await
        .map_err(StoreError::io(&dir))?;
    let mut removed = 0;
    while let Some(entry) = entries.next_entry().await.map_err(StoreError::io(&dir))? {
        if entry.file_name().to_string_lossy().starts_with(&prefix) {
            let stale = entry.path();
            tokio::fs::remove_file(&stale)
                .await
                .map_err(StoreError::io(&stale))?;
            removed += 1;
        }
    }
    Ok(removed)
}
