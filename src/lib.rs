//! ghub-scraper: a code-hosting account crawler
//!
//! This crate crawls account pages, follows the fixed chain
//! account → repository list → repository → releases → latest release,
//! extracts typed repository records and hands them to a record store.

pub mod config;
pub mod crawler;
pub mod dispatch;
pub mod items;
pub mod output;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for ghub-scraper operations
#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("Transport error: {0}")]
    Transport(#[from] crawler::TransportError),

    #[error("Page structure error: {0}")]
    Structure(#[from] crawler::StructureError),

    #[error("Field parse error: {0}")]
    Field(#[from] items::FieldParseError),

    #[error("Store error: {0}")]
    Store(#[from] storage::StoreError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] dispatch::DispatchError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors (the crawl's `InvalidUrlError`)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlError {
    #[error("URL is empty")]
    Empty,

    #[error("Failed to parse URL '{url}': {reason}")]
    Parse { url: String, reason: String },

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("No path segment to derive an identifier from: {0}")]
    MissingSegment(String),
}

/// Result type alias for ghub-scraper operations
pub type Result<T> = std::result::Result<T, ScraperError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use items::{LatestReleaseItem, MainBranchItem, RepoInfoItem};
pub use state::CrawlState;
pub use crate::url::{last_path_segment, normalize, prepare_seeds, AccountId};
