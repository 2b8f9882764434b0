//! In-memory collaborators for pipeline tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::models::{CandidateEntry, ListingPage};
use crate::services::{Notifier, PageFetcher, PageParser};

/// Notifier that records every message it is asked to send.
#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
    attempts: AtomicUsize,
    fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, _recipient: &str, text: &str) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AppError::notify("status 500"));
        }
        self.messages.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

/// A fake board. Fetching a known URL returns the URL itself as the page
/// body, which the parser half then looks up.
#[derive(Default)]
pub struct FakeBoard {
    listings: HashMap<String, ListingPage>,
    details: HashMap<String, BTreeMap<String, String>>,
    broken: HashSet<String>,
    fetched: Mutex<Vec<String>>,
}

pub const BASE: &str = "https://ptt.test/bbs/Test";

pub fn page_url(n: u32) -> String {
    if n == 0 {
        format!("{BASE}/index.html")
    } else {
        format!("{BASE}/index{n}.html")
    }
}

pub fn post_url(id: &str) -> String {
    format!("{BASE}/{id}.html")
}

impl FakeBoard {
    /// Add a listing page. Posts are `(id, title)` in listing order (newest
    /// first); each post gets a detail page with an author field.
    pub fn page(mut self, n: u32, posts: &[(&str, &str)], prev: Option<u32>) -> Self {
        let entries = posts
            .iter()
            .map(|(id, title)| CandidateEntry::new(*title, post_url(id)))
            .collect();
        for (id, _) in posts {
            let mut fields = BTreeMap::new();
            fields.insert("作者".to_string(), format!("author-of-{id}"));
            self.details.insert(post_url(id), fields);
        }
        self.listings.insert(
            page_url(n),
            ListingPage {
                entries,
                prev_url: prev.map(page_url),
            },
        );
        self
    }

    /// Make fetching a URL fail.
    pub fn broken(mut self, url: impl Into<String>) -> Self {
        self.broken.insert(url.into());
        self
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }

    /// Post ids whose detail page was fetched, in order.
    pub fn detail_fetches(&self) -> Vec<String> {
        self.fetched()
            .into_iter()
            .filter(|url| self.details.contains_key(url))
            .map(|url| {
                url.trim_start_matches(&format!("{BASE}/"))
                    .trim_end_matches(".html")
                    .to_string()
            })
            .collect()
    }
}

#[async_trait]
impl PageFetcher for FakeBoard {
    async fn fetch(&self, url: &str) -> Result<String> {
        self.fetched.lock().unwrap().push(url.to_string());
        if self.broken.contains(url) {
            return Err(AppError::fetch(url, "status 503"));
        }
        if self.listings.contains_key(url) || self.details.contains_key(url) {
            Ok(url.to_string())
        } else {
            Err(AppError::fetch(url, "status 404"))
        }
    }
}

impl PageParser for FakeBoard {
    fn parse_listing(&self, raw: &str) -> ListingPage {
        self.listings.get(raw).cloned().unwrap_or_default()
    }

    fn parse_detail(&self, raw: &str) -> BTreeMap<String, String> {
        self.details.get(raw).cloned().unwrap_or_default()
    }
}
