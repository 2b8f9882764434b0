// src/lib.rs

//! Board Watcher Library
//!
//! Walks a reverse-chronological board listing page by page, keeps the posts
//! whose titles match the configured keyword groups, and reports the ones it
//! has not seen before.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
