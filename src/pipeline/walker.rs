//! The crawl session: a backward walk over the board listing.
//!
//! Pages are fetched newest-first following the previous-page link. On each
//! page the matching entries are processed oldest-first, and the first entry
//! already present in the dedup cache ends the walk: everything older is
//! assumed processed by an earlier run.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{AppError, Result};
use crate::models::{Config, Entry, KeywordFilter, KeywordGroup};
use crate::pipeline::batch::{MessageFormat, NotificationBatcher};
use crate::services::{Notifier, PageFetcher, PageParser};
use crate::storage::{CacheRecord, ResultKey, SeenCache, WatchStorage};
use crate::utils::throttle::Throttle;

/// Collaborators shared by every session on one board.
#[derive(Clone)]
pub struct Collaborators {
    pub fetcher: Arc<dyn PageFetcher>,
    pub parser: Arc<dyn PageParser>,
    pub notifier: Arc<dyn Notifier>,
    pub storage: Arc<dyn WatchStorage>,
    pub recipient: String,
}

/// Per-board session settings.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub board: String,
    pub start_url: String,
    pub max_pages: usize,
    pub request_interval: Duration,
    pub batch_size: usize,
    pub format: MessageFormat,
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            board: config.board.name.clone(),
            start_url: config.board.start_url(),
            max_pages: config.board.max_pages,
            request_interval: Duration::from_millis(config.crawler.request_delay_ms),
            batch_size: config.notify.batch_size,
            format: MessageFormat::from(&config.notify),
        }
    }
}

/// Why a session stopped walking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Reached an entry that was already processed
    Boundary,
    /// Walked `max_pages` pages
    PageLimit,
    /// The oldest page has no previous-page link
    NoMorePages,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Boundary => write!(f, "reached an already seen entry"),
            StopReason::PageLimit => write!(f, "page limit reached"),
            StopReason::NoMorePages => write!(f, "no more pages"),
        }
    }
}

/// Outcome of a completed session.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub name: String,
    pub pages: usize,
    pub checked: usize,
    pub new: usize,
    pub stop: StopReason,
    /// New entries in processing order
    pub entries: Vec<Entry>,
    /// Result file written, if any entries were new
    pub result_file: Option<String>,
}

/// Mutable walk state, owned by one session.
struct WalkState {
    current_url: String,
    page_count: usize,
    found_boundary: bool,
    checked: usize,
    found: Vec<Entry>,
}

/// One crawl session for one set of keyword groups.
pub struct CrawlSession {
    name: String,
    settings: SessionSettings,
    filter: KeywordFilter,
    fetcher: Arc<dyn PageFetcher>,
    parser: Arc<dyn PageParser>,
    storage: Arc<dyn WatchStorage>,
    batcher: NotificationBatcher,
    throttle: Throttle,
}

impl CrawlSession {
    pub fn new(
        name: impl Into<String>,
        groups: &[KeywordGroup],
        settings: SessionSettings,
        deps: &Collaborators,
    ) -> Self {
        let batcher = NotificationBatcher::new(
            Arc::clone(&deps.notifier),
            deps.recipient.clone(),
            settings.format.clone(),
            settings.batch_size,
        );

        Self {
            name: name.into(),
            filter: KeywordFilter::new(groups),
            throttle: Throttle::new(settings.request_interval),
            settings,
            fetcher: Arc::clone(&deps.fetcher),
            parser: Arc::clone(&deps.parser),
            storage: Arc::clone(&deps.storage),
            batcher,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Walk the listing until a stopping condition, then flush and persist.
    ///
    /// A listing fetch failure aborts the walk: pending notifications are
    /// flushed, progress so far is persisted, a failure notification is sent
    /// and the fetch error is returned.
    pub async fn run(mut self) -> Result<SessionReport> {
        let mut cache = SeenCache::load(self.storage.as_ref()).await;
        log::info!(
            "[{}] Watching {} (keywords: {}, {} cached entries)",
            self.name,
            self.settings.board,
            self.filter.signature(),
            cache.len()
        );

        let mut state = WalkState {
            current_url: self.settings.start_url.clone(),
            page_count: 0,
            found_boundary: false,
            checked: 0,
            found: Vec::new(),
        };
        let mut stop = StopReason::PageLimit;

        while state.page_count < self.settings.max_pages && !state.found_boundary {
            state.page_count += 1;
            log::info!(
                "[{}] Crawling page {}: {}",
                self.name,
                state.page_count,
                state.current_url
            );

            self.throttle.wait().await;
            let raw = match self.fetcher.fetch(&state.current_url).await {
                Ok(raw) => raw,
                Err(e) => return Err(self.abort(e, &cache, &state).await),
            };

            let page = self.parser.parse_listing(&raw);
            let prev_url = page.prev_url;

            // Listing order is newest-first; process oldest-first.
            let mut matches: Vec<Entry> = page
                .entries
                .into_iter()
                .filter(|c| self.filter.matches(&c.title))
                .filter_map(Entry::from_candidate)
                .collect();
            matches.reverse();

            if matches.is_empty() {
                log::debug!("[{}] No matching entries on page {}", self.name, state.page_count);
                match prev_url {
                    Some(prev) => {
                        state.current_url = prev;
                        continue;
                    }
                    None => {
                        stop = StopReason::NoMorePages;
                        break;
                    }
                }
            }

            state.checked += matches.len();
            self.process_page(matches, &mut cache, &mut state).await;

            if state.found_boundary {
                stop = StopReason::Boundary;
                break;
            }
            match prev_url {
                Some(prev) => state.current_url = prev,
                None => {
                    stop = StopReason::NoMorePages;
                    break;
                }
            }
        }

        self.batcher.flush().await;
        cache.persist(self.storage.as_ref()).await?;
        let result_file = self.persist_results(&state.found).await?;

        let report = SessionReport {
            name: self.name,
            pages: state.page_count,
            checked: state.checked,
            new: state.found.len(),
            stop,
            entries: state.found,
            result_file,
        };
        log::info!(
            "[{}] Done: {} pages walked, {} matching entries checked, {} new ({})",
            report.name,
            report.pages,
            report.checked,
            report.new,
            report.stop
        );
        Ok(report)
    }

    /// Process one page's matches, oldest first, stopping at the first seen entry.
    async fn process_page(
        &mut self,
        matches: Vec<Entry>,
        cache: &mut SeenCache,
        state: &mut WalkState,
    ) {
        for (idx, entry) in matches.into_iter().enumerate() {
            if cache.contains(&entry.id) {
                log::info!("[{}]   Already seen: {}", self.name, entry.title);
                state.found_boundary = true;
                break;
            }

            log::info!(
                "[{}]   New entry ({}-{}): {}",
                self.name,
                state.page_count,
                idx + 1,
                entry.title
            );

            self.throttle.wait().await;
            let detail = match self.fetcher.fetch(&entry.url).await {
                Ok(raw) => raw,
                Err(e) => {
                    log::warn!("[{}]   Skipping {}: {}", self.name, entry.url, e);
                    continue;
                }
            };

            let entry = entry.with_metadata(self.parser.parse_detail(&detail));
            cache.insert(entry.id.clone(), CacheRecord::now());
            state.found.push(entry.clone());
            self.batcher.push(entry).await;
        }
    }

    async fn persist_results(&self, found: &[Entry]) -> Result<Option<String>> {
        if found.is_empty() {
            return Ok(None);
        }

        let key = ResultKey::current(&self.settings.board, self.filter.signature());
        let meta = self.storage.append_results(&key, found).await?;
        log::info!(
            "[{}] Results saved to {} ({} appended, {} total)",
            self.name,
            meta.location,
            meta.appended,
            meta.total
        );
        Ok(Some(meta.location))
    }

    /// Wind down after a listing fetch failure and hand back the error.
    async fn abort(&mut self, error: AppError, cache: &SeenCache, state: &WalkState) -> AppError {
        log::error!(
            "[{}] Fetch failed on page {}: {}",
            self.name,
            state.page_count,
            error
        );

        self.batcher.flush().await;
        let context = format!("{} / {}", self.settings.board, self.name);
        self.batcher
            .notify_failure(&context, &error.to_string())
            .await;

        if let Err(e) = cache.persist(self.storage.as_ref()).await {
            return e;
        }
        if let Err(e) = self.persist_results(&state.found).await {
            return e;
        }
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testing::{FakeBoard, RecordingNotifier, page_url, post_url};
    use crate::storage::LocalStorage;
    use tempfile::TempDir;

    struct Harness {
        _tmp: TempDir,
        board: Arc<FakeBoard>,
        notifier: Arc<RecordingNotifier>,
        storage: LocalStorage,
    }

    impl Harness {
        fn new(board: FakeBoard) -> Self {
            let tmp = TempDir::new().unwrap();
            let storage = LocalStorage::new(tmp.path().join("ptt_Test_data"));
            Self {
                _tmp: tmp,
                board: Arc::new(board),
                notifier: Arc::new(RecordingNotifier::default()),
                storage,
            }
        }

        fn deps(&self) -> Collaborators {
            Collaborators {
                fetcher: self.board.clone(),
                parser: self.board.clone(),
                notifier: self.notifier.clone(),
                storage: Arc::new(self.storage.clone()),
                recipient: "U42".to_string(),
            }
        }

        fn settings(&self, max_pages: usize, batch_size: usize) -> SessionSettings {
            SessionSettings {
                board: "Test".to_string(),
                start_url: page_url(0),
                max_pages,
                request_interval: Duration::ZERO,
                batch_size,
                format: MessageFormat::default(),
            }
        }

        async fn seed(&self, ids: &[&str]) {
            let mut cache = SeenCache::load(&self.storage).await;
            for id in ids {
                cache.insert(format!("{id}.html"), CacheRecord::now());
            }
            cache.persist(&self.storage).await.unwrap();
        }

        async fn run(&self, groups: &[KeywordGroup], max_pages: usize) -> Result<SessionReport> {
            CrawlSession::new("test", groups, self.settings(max_pages, 5), &self.deps())
                .run()
                .await
        }
    }

    fn ids(report: &SessionReport) -> Vec<&str> {
        report
            .entries
            .iter()
            .map(|e| e.id.trim_end_matches(".html"))
            .collect()
    }

    fn gracie() -> Vec<KeywordGroup> {
        vec![
            KeywordGroup::new("ticket", &["售票"]),
            KeywordGroup::new("artist", &["gracie"]),
        ]
    }

    #[tokio::test]
    async fn test_reversed_page_seen_entry_first_stops_walk() {
        // Listing shows E5, E4, E3 (newest first); E3 was seen before.
        let board = FakeBoard::default().page(
            0,
            &[
                ("E5", "[售票] gracie E5"),
                ("E4", "[售票] gracie E4"),
                ("E3", "[售票] gracie E3"),
            ],
            Some(1),
        );
        let harness = Harness::new(board);
        harness.seed(&["E3"]).await;

        let report = harness.run(&gracie(), 10).await.unwrap();

        // E3 comes first after reversal, sets the boundary, E4/E5 untouched
        assert_eq!(report.stop, StopReason::Boundary);
        assert_eq!(report.new, 0);
        assert!(harness.board.detail_fetches().is_empty());
        assert_eq!(harness.board.fetched(), vec![page_url(0)]);
        assert!(harness.notifier.messages().is_empty());
    }

    #[tokio::test]
    async fn test_boundary_stops_before_older_pages() {
        let board = FakeBoard::default()
            .page(0, &[("E6", "[售票] gracie E6"), ("E5", "[售票] gracie E5")], Some(1))
            .page(1, &[("E4", "[售票] gracie E4"), ("E3", "[售票] gracie E3")], Some(2))
            .page(2, &[("E2", "[售票] gracie E2"), ("E1", "[售票] gracie E1")], None);
        let harness = Harness::new(board);
        harness.seed(&["E4"]).await;

        let report = harness.run(&gracie(), 10).await.unwrap();

        // page 1 is processed oldest-first: E3 is new, then E4 is seen
        assert_eq!(ids(&report), ["E5", "E6", "E3"]);
        assert_eq!(report.stop, StopReason::Boundary);
        assert_eq!(report.pages, 2);
        assert!(!harness.board.fetched().contains(&page_url(2)));
        assert!(!harness.board.fetched().contains(&post_url("E2")));
    }

    #[tokio::test]
    async fn test_filter_and_metadata() {
        let board = FakeBoard::default().page(
            0,
            &[
                ("E3", "[售票] GRACIE 台北場"),
                ("E2", "[徵票] gracie"),
                ("E1", "[售票] someone else"),
            ],
            None,
        );
        let harness = Harness::new(board);

        let report = harness.run(&gracie(), 10).await.unwrap();

        assert_eq!(ids(&report), ["E3"]);
        assert_eq!(report.checked, 1);
        assert_eq!(report.stop, StopReason::NoMorePages);
        assert_eq!(report.entries[0].field("作者"), Some("author-of-E3"));

        let messages = harness.notifier.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("author-of-E3"));
    }

    #[tokio::test]
    async fn test_pages_without_matches_are_skipped() {
        let board = FakeBoard::default()
            .page(0, &[("E9", "[閒聊] nothing")], Some(1))
            .page(1, &[], Some(2))
            .page(2, &[("E1", "[售票] gracie E1")], None);
        let harness = Harness::new(board);

        let report = harness.run(&gracie(), 10).await.unwrap();

        assert_eq!(ids(&report), ["E1"]);
        assert_eq!(report.pages, 3);
        assert_eq!(report.stop, StopReason::NoMorePages);
    }

    #[tokio::test]
    async fn test_page_limit() {
        let board = FakeBoard::default()
            .page(0, &[("E3", "[售票] gracie E3")], Some(1))
            .page(1, &[("E2", "[售票] gracie E2")], Some(2))
            .page(2, &[("E1", "[售票] gracie E1")], None);
        let harness = Harness::new(board);

        let report = harness.run(&gracie(), 2).await.unwrap();

        assert_eq!(ids(&report), ["E3", "E2"]);
        assert_eq!(report.pages, 2);
        assert_eq!(report.stop, StopReason::PageLimit);
    }

    #[tokio::test]
    async fn test_second_run_is_idempotent() {
        let board = FakeBoard::default()
            .page(0, &[("E3", "[售票] gracie E3"), ("E2", "[售票] gracie E2")], Some(1))
            .page(1, &[("E1", "[售票] gracie E1")], None);
        let harness = Harness::new(board);

        let first = harness.run(&gracie(), 10).await.unwrap();
        assert_eq!(first.new, 3);
        let result_file = first.result_file.clone().unwrap();
        let before = std::fs::read_to_string(&result_file).unwrap();

        let second = harness.run(&gracie(), 10).await.unwrap();
        assert_eq!(second.new, 0);
        assert_eq!(second.stop, StopReason::Boundary);
        assert!(second.result_file.is_none());
        assert_eq!(std::fs::read_to_string(&result_file).unwrap(), before);
        assert_eq!(harness.notifier.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_cold_start_on_corrupt_cache() {
        let board = FakeBoard::default().page(0, &[("E1", "[售票] gracie E1")], None);
        let harness = Harness::new(board);
        std::fs::create_dir_all(harness.storage.root_dir()).unwrap();
        std::fs::write(harness.storage.root_dir().join("article_cache.json"), b"garbage").unwrap();

        let report = harness.run(&gracie(), 10).await.unwrap();

        assert_eq!(ids(&report), ["E1"]);
        // the cache is rewritten in a valid form
        let reloaded = SeenCache::load(&harness.storage).await;
        assert!(reloaded.contains("E1.html"));
    }

    #[tokio::test]
    async fn test_batches_flush_during_and_after_walk() {
        let posts: Vec<(String, String)> = (1..=7)
            .rev()
            .map(|n| (format!("E{n}"), format!("[售票] gracie E{n}")))
            .collect();
        let posts: Vec<(&str, &str)> = posts.iter().map(|(i, t)| (i.as_str(), t.as_str())).collect();
        let harness = Harness::new(FakeBoard::default().page(0, &posts, None));

        let report = harness.run(&gracie(), 10).await.unwrap();

        assert_eq!(report.new, 7);
        let messages = harness.notifier.messages();
        assert_eq!(messages.len(), 2);
        // oldest first: the first batch holds E1..E5
        assert!(messages[0].contains("gracie E1"));
        assert!(messages[0].contains("gracie E5"));
        assert!(messages[1].contains("gracie E6"));
        assert!(messages[1].contains("gracie E7"));
    }

    #[tokio::test]
    async fn test_listing_failure_persists_progress_and_notifies() {
        let board = FakeBoard::default()
            .page(0, &[("E3", "[售票] gracie E3")], Some(1))
            .broken(page_url(1));
        let harness = Harness::new(board);

        let err = harness.run(&gracie(), 10).await.unwrap_err();
        assert!(err.is_transport());

        let messages = harness.notifier.messages();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].contains("gracie E3"));
        assert!(messages[1].starts_with("\u{1F6A8}"));

        // E3 was delivered, so it must not be delivered again
        let cache = SeenCache::load(&harness.storage).await;
        assert!(cache.contains("E3.html"));
        assert_eq!(harness.storage.list_result_files().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_first_page_failure() {
        let harness = Harness::new(FakeBoard::default().broken(page_url(0)));

        let err = harness.run(&gracie(), 10).await.unwrap_err();

        assert!(matches!(err, AppError::Fetch { .. }));
        assert_eq!(harness.notifier.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_detail_failure_skips_entry() {
        let board = FakeBoard::default()
            .page(0, &[("E2", "[售票] gracie E2"), ("E1", "[售票] gracie E1")], None)
            .broken(post_url("E1"));
        let harness = Harness::new(board);

        let report = harness.run(&gracie(), 10).await.unwrap();

        assert_eq!(ids(&report), ["E2"]);
        let cache = SeenCache::load(&harness.storage).await;
        assert!(!cache.contains("E1.html"));
        assert!(cache.contains("E2.html"));

        // E1 precedes E2 on the page, so the next run tries it again
        let second = harness.run(&gracie(), 10).await.unwrap();
        assert_eq!(second.stop, StopReason::Boundary);
        assert_eq!(harness.board.detail_fetches(), ["E1", "E2", "E1"]);
    }

    #[tokio::test]
    async fn test_failed_detail_behind_newer_entry_is_not_revisited() {
        let board = FakeBoard::default()
            .page(0, &[("E2", "[售票] gracie E2")], Some(1))
            .page(1, &[("E1", "[售票] gracie E1")], None)
            .broken(post_url("E1"));
        let harness = Harness::new(board);

        let first = harness.run(&gracie(), 10).await.unwrap();
        assert_eq!(ids(&first), ["E2"]);
        assert_eq!(harness.board.detail_fetches(), ["E2", "E1"]);

        // E2 is now the boundary on the newest page, so E1 is never reached
        let second = harness.run(&gracie(), 10).await.unwrap();
        assert_eq!(second.new, 0);
        assert_eq!(second.stop, StopReason::Boundary);
        assert_eq!(harness.board.detail_fetches(), ["E2", "E1"]);
        assert!(!SeenCache::load(&harness.storage).await.contains("E1.html"));
    }
}
