//! Concurrent sessions, one per keyword group.

use tokio::task::JoinHandle;

use crate::error::{AppError, Result};
use crate::models::Config;
use crate::pipeline::walker::{Collaborators, CrawlSession, SessionReport, SessionSettings};

/// Result of one session, successful or not.
#[derive(Debug)]
pub struct SessionOutcome {
    pub name: String,
    pub result: Result<SessionReport>,
}

/// Build one session per configured keyword group.
pub fn build_sessions(config: &Config, deps: &Collaborators) -> Vec<CrawlSession> {
    let settings = SessionSettings::from_config(config);

    config
        .filter
        .session_groups()
        .into_iter()
        .map(|(name, groups)| CrawlSession::new(name, &groups, settings.clone(), deps))
        .collect()
}

/// Run sessions concurrently and collect every outcome.
///
/// Outcomes are returned in the order the sessions were given; a failed or
/// panicked session does not affect the others.
pub async fn run_sessions(sessions: Vec<CrawlSession>) -> Vec<SessionOutcome> {
    let handles: Vec<(String, JoinHandle<Result<SessionReport>>)> = sessions
        .into_iter()
        .map(|session| (session.name().to_string(), tokio::spawn(session.run())))
        .collect();

    let mut outcomes = Vec::with_capacity(handles.len());
    for (name, handle) in handles {
        let result = match handle.await {
            Ok(result) => result,
            Err(e) => Err(AppError::Task {
                session: name.clone(),
                message: e.to_string(),
            }),
        };

        if let Err(e) = &result {
            log::error!("[{}] Session failed: {}", name, e);
        }
        outcomes.push(SessionOutcome { name, result });
    }

    outcomes
}

/// Run every configured session against the board.
pub async fn run_watch(config: &Config, deps: &Collaborators) -> Vec<SessionOutcome> {
    let sessions = build_sessions(config, deps);
    log::info!(
        "Starting {} session(s) on board {}",
        sessions.len(),
        config.board.name
    );

    let outcomes = run_sessions(sessions).await;

    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
    let new: usize = outcomes
        .iter()
        .filter_map(|o| o.result.as_ref().ok())
        .map(|r| r.new)
        .sum();
    log::info!(
        "All sessions finished: {} new entries, {} of {} session(s) failed",
        new,
        failed,
        outcomes.len()
    );

    outcomes
}
