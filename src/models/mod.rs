// src/models/mod.rs

//! Domain models for the watcher.

mod config;
mod entry;
mod keywords;

// Re-export all public types
pub use config::{
    BoardConfig, Config, CrawlerConfig, FilterConfig, NotifyConfig, ParserConfig, PathsConfig,
};
pub use entry::{CandidateEntry, Entry, ListingPage};
pub use keywords::{KeywordFilter, KeywordGroup, signature};
