//! Pipeline entry points for watch operations.
//!
//! - `CrawlSession`: one backward walk over the board listing
//! - `NotificationBatcher`: batched delivery of new entries
//! - `run_watch`: every configured session, concurrently

pub mod batch;
pub mod runner;
pub mod walker;

#[cfg(test)]
pub(crate) mod testing;

pub use batch::{MessageFormat, NotificationBatcher};
pub use runner::{SessionOutcome, build_sessions, run_sessions, run_watch};
pub use walker::{Collaborators, CrawlSession, SessionReport, SessionSettings, StopReason};
