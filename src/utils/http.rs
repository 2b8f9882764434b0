// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use reqwest::header::{COOKIE, HeaderMap, HeaderValue};

use crate::error::{AppError, Result};
use crate::models::CrawlerConfig;

/// Create a configured asynchronous HTTP client.
///
/// Every request carries the configured User-Agent and cookies.
pub fn create_client(config: &CrawlerConfig) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    if let Some(cookie) = cookie_header(&config.cookies) {
        let value = HeaderValue::from_str(&cookie)
            .map_err(|e| AppError::config(format!("Invalid cookie header '{cookie}': {e}")))?;
        headers.insert(COOKIE, value);
    }

    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .default_headers(headers)
        .build()?;
    Ok(client)
}

/// Join `name=value` pairs into a single Cookie header value.
fn cookie_header(cookies: &[String]) -> Option<String> {
    let pairs: Vec<&str> = cookies
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .collect();

    if pairs.is_empty() {
        None
    } else {
        Some(pairs.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cookie_header() {
        assert_eq!(
            cookie_header(&["over18=1".into(), " lang=zh ".into()]),
            Some("over18=1; lang=zh".to_string())
        );
        assert_eq!(cookie_header(&[" ".into()]), None);
    }

    #[test]
    fn test_create_client_default_config() {
        assert!(create_client(&CrawlerConfig::default()).is_ok());
    }
}
