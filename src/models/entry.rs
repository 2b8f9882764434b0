//! Board entry data structures.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::utils::entry_id;

/// A post link as it appears on a listing page, before filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateEntry {
    /// Post title as shown in the listing
    pub title: String,

    /// Absolute URL of the post
    pub url: String,
}

impl CandidateEntry {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
        }
    }
}

/// One parsed listing page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingPage {
    /// Candidates in the order the listing shows them
    pub entries: Vec<CandidateEntry>,

    /// Link to the next-older page, if any
    pub prev_url: Option<String>,
}

/// A post that passed the keyword filter.
///
/// The identifier is the final path segment of the URL. Metadata from the
/// detail page is attached once through [`Entry::with_metadata`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Entry {
    /// Stable identifier derived from the URL
    pub id: String,

    /// Post title
    pub title: String,

    /// Full URL to the post
    pub url: String,

    /// Detail-page fields keyed by the site's own labels
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Entry {
    /// Build an entry from a listing candidate.
    ///
    /// Returns `None` when no identifier can be derived from the URL.
    pub fn from_candidate(candidate: CandidateEntry) -> Option<Self> {
        let id = entry_id(&candidate.url)?;
        Some(Self {
            id,
            title: candidate.title,
            url: candidate.url,
            metadata: BTreeMap::new(),
        })
    }

    /// Attach detail-page metadata, consuming the bare entry.
    pub fn with_metadata(self, metadata: BTreeMap<String, String>) -> Self {
        Self { metadata, ..self }
    }

    /// Look up a metadata field, treating blank values as absent.
    pub fn field(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_candidate_derives_id() {
        let entry = Entry::from_candidate(CandidateEntry::new(
            "[售票] gracie 台北場",
            "https://www.ptt.cc/bbs/Drama-Ticket/M.1700000000.A.1B2.html",
        ))
        .unwrap();
        assert_eq!(entry.id, "M.1700000000.A.1B2.html");
        assert!(entry.metadata.is_empty());
    }

    #[test]
    fn test_from_candidate_without_id() {
        assert!(Entry::from_candidate(CandidateEntry::new("t", "https://www.ptt.cc/")).is_none());
    }

    #[test]
    fn test_field_treats_blank_as_absent() {
        let mut metadata = BTreeMap::new();
        metadata.insert("作者".to_string(), "someone (Some One)".to_string());
        metadata.insert("時間".to_string(), "  ".to_string());

        let entry = Entry::from_candidate(CandidateEntry::new("t", "https://x.test/bbs/B/M.1.html"))
            .unwrap()
            .with_metadata(metadata);

        assert_eq!(entry.field("作者"), Some("someone (Some One)"));
        assert_eq!(entry.field("時間"), None);
        assert_eq!(entry.field("看板"), None);
    }
}
