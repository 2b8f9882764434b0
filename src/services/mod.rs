//! Service layer: the collaborators a crawl session talks to.
//!
//! - Page fetching (`PageFetcher`, `HttpFetcher`)
//! - Page parsing (`PageParser`, `BoardParser`)
//! - Notification delivery (`Notifier`, `LineNotifier`, `LogNotifier`)

mod fetcher;
mod notifier;
mod parser;

pub use fetcher::{HttpFetcher, PageFetcher};
pub use notifier::{Credentials, LineNotifier, LogNotifier, Notifier};
pub use parser::{BoardParser, PageParser};
