//! Crawler module for traversing the account page chain
//!
//! This module contains the core crawling logic, including:
//! - The frontier with its visited set and termination detection
//! - HTTP fetching and transport error classification
//! - One stage parser per page type
//! - Assembly of per-page fragments into repository records
//! - The worker pool that ties them together

mod assembler;
mod coordinator;
mod fetcher;
mod frontier;
mod parser;

pub use assembler::{DiscardReason, DiscardedRecord, ItemAssembler, RecordKey};
pub use coordinator::{run_crawl, AbortHandle, Coordinator};
pub use fetcher::{build_http_client, fetch_url, PageContent, TransportCause, TransportError};
pub use frontier::{CrawlContext, CrawlRequest, Frontier};
pub use parser::{parse_page, FollowUp, StageOutput, StructureError};
