//! HTTP client construction
//!
//! Builds reqwest clients shared by modules that talk to reputation,
//! search and vision services.

use reqwest::{Client, Proxy, StatusCode};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Optional proxy URL (http, https or socks5h)
    pub proxy: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Maximum retries per request on transient failures
    pub max_retries: u32,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            proxy: None,
            timeout_secs: 10,
            max_retries: 2,
        }
    }
}

impl HttpConfig {
    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }
}

/// Errors from outbound HTTP
#[derive(Debug, Error)]
pub enum NetError {
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Rate limited by {0}")]
    RateLimited(String),

    #[error("Max retries ({0}) exceeded")]
    MaxRetries(u32),
}

/// User agents for rotation
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/135.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/135.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/135.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:137.0) Gecko/20100101 Firefox/137.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14.7; rv:137.0) Gecko/20100101 Firefox/137.0",
];

/// Get a random user agent
pub fn random_user_agent() -> &'static str {
    use rand::Rng;
    let idx = rand::thread_rng().gen_range(0..USER_AGENTS.len());
    USER_AGENTS[idx]
}

/// Create an HTTP client for the given configuration
pub fn create_client(config: &HttpConfig) -> Result<Client, NetError> {
    let mut builder = Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .user_agent(random_user_agent());

    if let Some(proxy) = &config.proxy {
        let proxy = Proxy::all(proxy).map_err(|e| NetError::ClientBuild(e.to_string()))?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| NetError::ClientBuild(e.to_string()))
}

/// GET a URL and return its body, retrying server errors and connection failures.
///
/// 429 is returned immediately as `RateLimited`; other 4xx as `Status`.
pub async fn fetch_text(client: &Client, url: &str, max_retries: u32) -> Result<String, NetError> {
    let mut attempt = 0;

    loop {
        let outcome = client.get(url).send().await;

        match outcome {
            Ok(response) if response.status().is_success() => {
                return Ok(response.text().await?);
            }
            Ok(response) if response.status() == StatusCode::TOO_MANY_REQUESTS => {
                return Err(NetError::RateLimited(url.to_string()));
            }
            Ok(response) if !response.status().is_server_error() => {
                return Err(NetError::Status {
                    url: url.to_string(),
                    status: response.status().as_u16(),
                });
            }
            Ok(response) => {
                warn!("{} returned status: {} (attempt {})", url, response.status(), attempt + 1);
            }
            Err(e) if e.is_builder() => return Err(e.into()),
            Err(e) => {
                warn!("Request to {} failed: {} (attempt {})", url, e, attempt + 1);
            }
        }

        if attempt >= max_retries {
            return Err(NetError::MaxRetries(max_retries));
        }
        attempt += 1;

        let backoff = backoff_delay(attempt);
        debug!("Retrying {} in {:?}", url, backoff);
        tokio::time::sleep(backoff).await;
    }
}

/// Doubling backoff from 250 ms, capped at 1 s
fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(250u64 << attempt.clamp(1, 3).saturating_sub(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HttpConfig::default();
        assert!(config.proxy.is_none());
        assert_eq!(config.timeout_secs, 10);
        assert_eq!(config.max_retries, 2);
    }

    #[test]
    fn test_random_user_agent() {
        let ua = random_user_agent();
        assert!(ua.contains("Mozilla"));
    }

    #[test]
    fn test_create_client_with_proxy() {
        let config = HttpConfig::default().with_proxy("socks5h://127.0.0.1:9050");
        assert!(create_client(&config).is_ok());
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        assert_eq!(backoff_delay(1), Duration::from_millis(250));
        assert_eq!(backoff_delay(2), Duration::from_millis(500));
        assert_eq!(backoff_delay(3), Duration::from_millis(1000));
        assert_eq!(backoff_delay(9), Duration::from_millis(1000));
    }
}
