//! State tracking module
//!
//! This module defines the crawl states that drive traversal of the page chain.

mod crawl_state;

pub use crawl_state::CrawlState;
