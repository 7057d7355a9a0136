use serde::Deserialize;
use std::time::Duration;

/// Default dispatcher endpoint used when neither config nor CLI names one
pub const DEFAULT_DISPATCHER_HOST: &str = "http://scrapyd:6800";

/// Main configuration structure for ghub-scraper
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Account URLs to crawl
    #[serde(default)]
    pub seeds: Vec<String>,

    #[serde(default)]
    pub crawler: CrawlerConfig,

    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,

    pub output: OutputConfig,

    #[serde(default)]
    pub dispatcher: DispatcherConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Number of concurrent fetch workers
    #[serde(default = "default_worker_count")]
    pub worker_count: u32,

    /// Per-request deadline (milliseconds)
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,

    /// Maximum number of transport retries before a URL is abandoned
    #[serde(default = "default_retry_limit")]
    pub retry_limit: u32,

    /// Pause between transport retries (milliseconds)
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl CrawlerConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            retry_limit: default_retry_limit(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

fn default_worker_count() -> u32 {
    8
}

fn default_fetch_timeout_ms() -> u64 {
    30_000
}

fn default_retry_limit() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    500
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the User-Agent header value: `Name/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Which record store finished items are delivered to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StoreKind {
    /// Local SQLite database
    Sqlite,
    /// Remote ingestion API
    Http,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    pub store: StoreKind,

    /// Path to the SQLite database file
    #[serde(default)]
    pub database_path: String,

    /// Base URL of the ingestion API
    #[serde(default)]
    pub ingestion_url: String,

    /// Attempts per record before it is reported as failed-to-deliver
    #[serde(default = "default_delivery_retry_limit")]
    pub delivery_retry_limit: u32,
}

fn default_delivery_retry_limit() -> u32 {
    3
}

/// Remote crawl dispatcher configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DispatcherConfig {
    #[serde(default = "default_dispatcher_host")]
    pub host: String,

    #[serde(default = "default_project")]
    pub project: String,

    #[serde(default = "default_spider")]
    pub spider: String,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            host: default_dispatcher_host(),
            project: default_project(),
            spider: default_spider(),
        }
    }
}

fn default_dispatcher_host() -> String {
    DEFAULT_DISPATCHER_HOST.to_string()
}

fn default_project() -> String {
    "scraper".to_string()
}

fn default_spider() -> String {
    "scraper_api".to_string()
}
