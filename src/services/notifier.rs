//! Push notification delivery.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::models::NotifyConfig;

/// Delivers a text message to a recipient.
///
/// Callers log failures and carry on; nothing here retries.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, recipient: &str, text: &str) -> Result<()>;
}

/// Channel access token and recipient read from the environment.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub token: String,
    pub recipient: String,
}

impl Credentials {
    /// Read credentials from the variables named in the notify config.
    ///
    /// The process environment wins; a dotenv file supplies anything it
    /// lacks, and a missing file is ignored. Missing or blank variables are a
    /// configuration error.
    pub fn from_env_or_file(config: &NotifyConfig, path: impl AsRef<Path>) -> Result<Self> {
        let file = read_env_file(path.as_ref())?;
        Self::resolve(config, |name| {
            std::env::var(name)
                .ok()
                .or_else(|| file.get(name).cloned())
        })
    }

    fn resolve(config: &NotifyConfig, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let read = |name: &str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| AppError::config(format!("{name} is not set")))
        };

        Ok(Self {
            token: read(&config.token_env)?,
            recipient: read(&config.recipient_env)?,
        })
    }
}

fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let invalid = |e: dotenvy::Error| AppError::config(format!("{}: {e}", path.display()));

    match dotenvy::from_path_iter(path) {
        Ok(vars) => vars.collect::<std::result::Result<_, _>>().map_err(invalid),
        Err(e) if e.not_found() => Ok(HashMap::new()),
        Err(e) => Err(invalid(e)),
    }
}

#[derive(Serialize)]
struct PushMessage<'a> {
    to: &'a str,
    messages: [TextMessage<'a>; 1],
}

#[derive(Serialize)]
struct TextMessage<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    text: &'a str,
}

/// LINE Messaging API push notifier.
pub struct LineNotifier {
    client: Client,
    endpoint: String,
    token: String,
}

impl LineNotifier {
    pub fn new(client: Client, endpoint: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            token: token.into(),
        }
    }
}

#[async_trait]
impl Notifier for LineNotifier {
    async fn send(&self, recipient: &str, text: &str) -> Result<()> {
        let body = PushMessage {
            to: recipient,
            messages: [TextMessage { kind: "text", text }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            log::debug!("Notification delivered to {}", recipient);
            Ok(())
        } else {
            let detail = response.text().await.unwrap_or_default();
            Err(AppError::notify(format!("status {status}: {detail}")))
        }
    }
}

/// Notifier that only writes messages to the log. Used for dry runs.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, recipient: &str, text: &str) -> Result<()> {
        log::info!("[dry-run] notification for {}:\n{}", recipient, text);
        Ok(())
    }
}
