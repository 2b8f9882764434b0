//! Deduplication cache of already processed entries.

use std::collections::BTreeMap;

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::storage::WatchStorage;

/// Persisted cache content, keyed by entry id.
pub type CacheMap = BTreeMap<String, CacheRecord>;

/// When an entry was processed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheRecord {
    /// Local wall-clock time, stored as `YYYY-MM-DD HH:MM:SS`
    #[serde(rename = "crawled_time", with = "crawl_time")]
    pub crawled_at: NaiveDateTime,
}

impl CacheRecord {
    pub fn now() -> Self {
        Self {
            crawled_at: Local::now().naive_local(),
        }
    }
}

mod crawl_time {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S: Serializer>(time: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&time.format(FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveDateTime::parse_from_str(&raw, FORMAT).map_err(serde::de::Error::custom)
    }
}

/// In-memory view of the dedup cache for one session.
///
/// Loaded once when the session starts and persisted once when it ends.
#[derive(Debug, Default, Clone)]
pub struct SeenCache {
    records: CacheMap,
}

impl SeenCache {
    pub fn new(records: CacheMap) -> Self {
        Self { records }
    }

    /// Load the cache from storage, cold-starting on absence or corruption.
    pub async fn load(storage: &dyn WatchStorage) -> Self {
        Self::new(storage.load_cache().await)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    /// Record an entry. Re-inserting an id replaces its timestamp.
    pub fn insert(&mut self, id: impl Into<String>, record: CacheRecord) {
        self.records.insert(id.into(), record);
    }

    /// Write the full cache back to storage.
    pub async fn persist(&self, storage: &dyn WatchStorage) -> Result<()> {
        storage.persist_cache(&self.records).await
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
