//! Page fetching.

use async_trait::async_trait;
use reqwest::Client;

use crate::error::{AppError, Result};

/// Fetches raw page text. Implementations do not retry.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch a page. Any transport error or non-success status is a failure.
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// [`PageFetcher`] backed by a shared `reqwest` client.
///
/// The client is expected to carry the User-Agent, cookies and timeout, see
/// [`crate::utils::http::create_client`].
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::fetch(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::fetch(url, format!("status {status}")));
        }

        response.text().await.map_err(|e| AppError::fetch(url, e))
    }
}
