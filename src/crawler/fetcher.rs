//! HTTP fetcher implementation
//!
//! This module handles all page requests for the crawler:
//! - Building the HTTP client with the configured user agent and timeout
//! - GET requests returning the page body
//! - Error classification into [`TransportError`]
//!
//! Retrying is not done here; the worker that owns the request decides
//! whether a failure is worth another attempt.

use crate::config::{CrawlerConfig, UserAgentConfig};
use reqwest::{redirect::Policy, Client, StatusCode};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Maximum redirect hops followed for one page
const MAX_REDIRECTS: usize = 10;

/// A fetched page
#[derive(Debug, Clone)]
pub struct PageContent {
    /// Final URL after redirects; relative links resolve against it
    pub url: Url,
    pub status: u16,
    pub body: String,
}

/// Why a fetch failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportCause {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("{0}")]
    Other(String),
}

/// A page could not be retrieved
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to fetch {url}: {cause}")]
pub struct TransportError {
    pub url: String,
    pub cause: TransportCause,
}

impl TransportError {
    pub fn new(url: &Url, cause: TransportCause) -> Self {
        Self {
            url: url.to_string(),
            cause,
        }
    }

    /// Whether another attempt could plausibly succeed
    ///
    /// | Cause | Retried |
    /// |-------|---------|
    /// | Timeout | yes |
    /// | Connection failure | yes |
    /// | HTTP 5xx, 408, 429 | yes |
    /// | Other HTTP 4xx | no |
    /// | Body decoding and other errors | no |
    pub fn is_retryable(&self) -> bool {
        match &self.cause {
            TransportCause::Timeout | TransportCause::Connect(_) => true,
            TransportCause::Status(code) => {
                *code >= 500
                    || *code == StatusCode::REQUEST_TIMEOUT.as_u16()
                    || *code == StatusCode::TOO_MANY_REQUESTS.as_u16()
            }
            TransportCause::Other(_) => false,
        }
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Example
///
/// ```no_run
/// use ghub_scraper::config::{CrawlerConfig, UserAgentConfig};
/// use ghub_scraper::crawler::build_http_client;
///
/// let user_agent = UserAgentConfig {
///     crawler_name: "ghub-scraper".to_string(),
///     crawler_version: "0.1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "ops@example.com".to_string(),
/// };
///
/// let client = build_http_client(&user_agent, &CrawlerConfig::default()).unwrap();
/// ```
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    crawler: &CrawlerConfig,
) -> Result<Client, reqwest::Error> {
    let timeout = crawler.fetch_timeout();

    Client::builder()
        .user_agent(user_agent.header_value())
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches a page
///
/// Any non-2xx answer is a failure; the response body of an error page is
/// never handed to a parser.
pub async fn fetch_url(client: &Client, url: &Url) -> Result<PageContent, TransportError> {
    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| TransportError::new(url, classify(&e)))?;

    let status = response.status();
    if !status.is_success() {
        return Err(TransportError::new(
            url,
            TransportCause::Status(status.as_u16()),
        ));
    }

    let final_url = response.url().clone();
    let body = response
        .text()
        .await
        .map_err(|e| TransportError::new(url, classify(&e)))?;

    Ok(PageContent {
        url: final_url,
        status: status.as_u16(),
        body,
    })
}

fn classify(error: &reqwest::Error) -> TransportCause {
    if error.is_timeout() {
        TransportCause::Timeout
    } else if error.is_connect() {
        TransportCause::Connect(error.to_string())
    } else if let Some(status) = error.status() {
        TransportCause::Status(status.as_u16())
    } else {
        TransportCause::Other(error.to_string())
    }
}
