//! Durable state for a watched board.
//!
//! ## Directory Structure
//!
//! ```text
//! {output_root}/
//! └── ptt_{board}_data/
//!     ├── article_cache.json                      # entry id -> crawl time
//!     ├── ptt_{board}_{signature}_202501.json     # results, one file per month
//!     └── ptt_{board}_{signature}_202502.json
//! ```
//!
//! Sessions watching the same board share one storage handle. Its writes are
//! serialized and merge with what is already on disk, so one session's
//! records never overwrite a sibling's.

pub mod cache;
pub mod local;
pub mod results;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::Entry;

// Re-export for convenience
pub use cache::{CacheMap, CacheRecord, SeenCache};
pub use local::LocalStorage;
pub use results::ResultKey;

/// Metadata about a result write.
#[derive(Debug, Clone)]
pub struct WriteMetadata {
    /// Where the records were written
    pub location: String,
    /// Records appended by this write
    pub appended: usize,
    /// Records in the file after the write
    pub total: usize,
}

/// Storage backend for the dedup cache and result sets.
#[async_trait]
pub trait WatchStorage: Send + Sync {
    /// Load the dedup cache.
    ///
    /// A missing or unreadable cache is a cold start and yields an empty map.
    async fn load_cache(&self) -> CacheMap;

    /// Persist the dedup cache, merging with records already on disk.
    async fn persist_cache(&self, records: &CacheMap) -> Result<()>;

    /// Append entries to the result set for `key`.
    async fn append_results(&self, key: &ResultKey, entries: &[Entry]) -> Result<WriteMetadata>;
}
