//! Listing and detail page parsing.
//!
//! The default parser understands PTT board markup; every selector comes
//! from [`ParserConfig`] so a similar board layout only needs new selectors.

use std::collections::BTreeMap;

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{CandidateEntry, ListingPage, ParserConfig};
use crate::utils::resolve_url;

/// Turns fetched page text into listing candidates and detail metadata.
///
/// Missing markup is never an error: rows without a link are left out and
/// absent metadata fields are simply not returned.
pub trait PageParser: Send + Sync {
    /// Candidates in listing order plus the previous-page link.
    fn parse_listing(&self, raw: &str) -> ListingPage;

    /// Metadata fields of a detail page, keyed by the site's labels.
    fn parse_detail(&self, raw: &str) -> BTreeMap<String, String>;
}

/// Selector-driven parser for PTT-style boards.
pub struct BoardParser {
    base_url: Url,
    row: Selector,
    title: Selector,
    paging: Selector,
    metaline: Selector,
    meta_tag: Selector,
    meta_value: Selector,
    prev_label: String,
    skip_tags: Vec<String>,
}

impl BoardParser {
    /// Build a parser resolving relative links against `base_url`.
    pub fn new(config: &ParserConfig, base_url: &str) -> Result<Self> {
        Ok(Self {
            base_url: Url::parse(base_url)?,
            row: Self::parse_selector(&config.row_selector)?,
            title: Self::parse_selector(&config.title_selector)?,
            paging: Self::parse_selector(&config.paging_selector)?,
            metaline: Self::parse_selector(&config.metaline_selector)?,
            meta_tag: Self::parse_selector(&config.meta_tag_selector)?,
            meta_value: Self::parse_selector(&config.meta_value_selector)?,
            prev_label: config.prev_label.clone(),
            skip_tags: config.skip_tags.clone(),
        })
    }

    fn parse_row(&self, row: ElementRef<'_>) -> Option<CandidateEntry> {
        let link = row.select(&self.title).next()?;
        let href = link.value().attr("href")?;
        let title = text_of(link);
        if title.is_empty() {
            return None;
        }
        Some(CandidateEntry::new(title, resolve_url(&self.base_url, href)))
    }

    fn find_prev_url(&self, document: &Html) -> Option<String> {
        document
            .select(&self.paging)
            .find(|a| text_of(*a).contains(&self.prev_label))
            .and_then(|a| a.value().attr("href"))
            .map(|href| resolve_url(&self.base_url, href))
    }

    fn parse_selector(s: &str) -> Result<Selector> {
        Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
    }
}

impl PageParser for BoardParser {
    fn parse_listing(&self, raw: &str) -> ListingPage {
        let document = Html::parse_document(raw);

        let entries = document
            .select(&self.row)
            .filter_map(|row| self.parse_row(row))
            .collect();

        ListingPage {
            entries,
            prev_url: self.find_prev_url(&document),
        }
    }

    fn parse_detail(&self, raw: &str) -> BTreeMap<String, String> {
        let document = Html::parse_document(raw);
        let mut fields = BTreeMap::new();

        for line in document.select(&self.metaline) {
            let (Some(tag), Some(value)) = (
                line.select(&self.meta_tag).next(),
                line.select(&self.meta_value).next(),
            ) else {
                continue;
            };

            let key = text_of(tag);
            if key.is_empty() || self.skip_tags.contains(&key) {
                continue;
            }
            fields.insert(key, text_of(value));
        }

        fields
    }
}

fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}
