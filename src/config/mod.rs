//! Configuration module for ghub-scraper
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use ghub_scraper::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("ghub-scraper.toml")).unwrap();
//! println!("Workers: {}", config.crawler.worker_count);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, DispatcherConfig, OutputConfig, StoreKind, UserAgentConfig,
    DEFAULT_DISPATCHER_HOST,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
pub use validation::validate;
