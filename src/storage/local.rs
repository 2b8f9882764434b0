//! Local filesystem storage implementation.
//!
//! ## Storage Layout
//!
//! ```text
//! {board_dir}/
//! ├── article_cache.json                # Dedup cache
//! └── ptt_{board}_{signature}_YYYYMM.json  # Monthly result sets
//! ```
//!
//! Writes go to a temporary file that is then renamed over the target.
//! Clones share one write lock, so every session holding a clone of the same
//! storage performs its read-merge-write cycles one at a time.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::Entry;
use crate::storage::{CacheMap, ResultKey, WatchStorage, WriteMetadata};

const CACHE_FILE: &str = "article_cache.json";

/// Local filesystem storage backend for one board directory.
#[derive(Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given board directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Write JSON data.
    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Read JSON data.
    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn read_cache(&self) -> CacheMap {
        match self.read_json::<CacheMap>(CACHE_FILE).await {
            Ok(Some(records)) => records,
            Ok(None) => {
                log::debug!("No cache at {}, starting cold", self.path(CACHE_FILE).display());
                CacheMap::new()
            }
            Err(e) => {
                log::warn!(
                    "Cache at {} is unreadable ({}), starting cold",
                    self.path(CACHE_FILE).display(),
                    e
                );
                CacheMap::new()
            }
        }
    }

    /// Result files present in the board directory, sorted by name.
    pub async fn list_result_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut dir = match tokio::fs::read_dir(&self.root_dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(files),
            Err(e) => return Err(AppError::Io(e)),
        };

        while let Some(item) = dir.next_entry().await? {
            let path = item.path();
            let is_result = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("ptt_") && n.ends_with(".json"));
            if is_result {
                files.push(path);
            }
        }

        files.sort();
        Ok(files)
    }
}

#[async_trait]
impl WatchStorage for LocalStorage {
    async fn load_cache(&self) -> CacheMap {
        self.read_cache().await
    }

    async fn persist_cache(&self, records: &CacheMap) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut merged = self.read_cache().await;
        merged.extend(records.iter().map(|(id, record)| (id.clone(), *record)));

        self.write_json(CACHE_FILE, &merged).await?;
        log::debug!(
            "Cache: {} records written to {}",
            merged.len(),
            self.path(CACHE_FILE).display()
        );
        Ok(())
    }

    async fn append_results(&self, key: &ResultKey, entries: &[Entry]) -> Result<WriteMetadata> {
        let _guard = self.write_lock.lock().await;

        let file_name = key.file_name();
        let mut existing: Vec<Entry> = self.read_json(&file_name).await?.unwrap_or_default();
        existing.extend_from_slice(entries);

        self.write_json(&file_name, &existing).await?;

        Ok(WriteMetadata {
            location: self.path(&file_name).display().to_string(),
            appended: entries.len(),
            total: existing.len(),
        })
    }
}
