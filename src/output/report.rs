//! Per-run crawl report
//!
//! The report is filled in while the crawl runs and printed at the end.

use crate::crawler::{DiscardReason, DiscardedRecord};
use crate::state::CrawlState;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::time::Duration;

/// What happened during one crawl run
#[derive(Debug, Clone)]
pub struct CrawlReport {
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,

    /// Seeds accepted after normalization and dedup
    pub seeds_accepted: u64,

    /// Pages fetched successfully, by page type
    pub pages_by_state: BTreeMap<CrawlState, u64>,

    /// URLs given up on after transport failures
    pub urls_abandoned: u64,

    /// Seed or derived URLs that could not be normalized
    pub invalid_urls: u64,

    /// Pages missing a link required to continue
    pub structure_failures: u64,

    /// Field values that failed coercion
    pub field_parse_failures: u64,

    pub records_finalized: u64,
    pub discarded: Vec<DiscardedRecord>,

    pub records_delivered: u64,
    pub delivery_failures: u64,

    pub aborted: bool,
}

impl Default for CrawlReport {
    fn default() -> Self {
        Self {
            started_at: Utc::now(),
            elapsed: Duration::ZERO,
            seeds_accepted: 0,
            pages_by_state: BTreeMap::new(),
            urls_abandoned: 0,
            invalid_urls: 0,
            structure_failures: 0,
            field_parse_failures: 0,
            records_finalized: 0,
            discarded: Vec::new(),
            records_delivered: 0,
            delivery_failures: 0,
            aborted: false,
        }
    }
}

impl CrawlReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_page(&mut self, state: CrawlState) {
        *self.pages_by_state.entry(state).or_insert(0) += 1;
    }

    pub fn record_discard(&mut self, discarded: DiscardedRecord) {
        tracing::warn!("Discarded record {}: {}", discarded.key, discarded.reason);
        self.discarded.push(discarded);
    }

    pub fn pages_fetched(&self) -> u64 {
        self.pages_by_state.values().sum()
    }

    pub fn records_discarded(&self) -> u64 {
        self.discarded.len() as u64
    }

    /// Discard counts grouped by reason kind
    pub fn discard_summary(&self) -> BTreeMap<&'static str, u64> {
        let mut summary = BTreeMap::new();
        for record in &self.discarded {
            let kind = match record.reason {
                DiscardReason::MissingRequired(_) => "missing required field",
                DiscardReason::InvalidRequired(_) => "invalid required field",
                DiscardReason::MissingIdentifier => "missing identifier",
                DiscardReason::ChainAbandoned(_) => "chain abandoned",
                DiscardReason::Incomplete => "incomplete",
                DiscardReason::Cancelled => "cancelled",
            };
            *summary.entry(kind).or_insert(0) += 1;
        }
        summary
    }
}

/// Prints the report to stdout in a formatted manner
pub fn print_report(report: &CrawlReport) {
    println!("=== Crawl Report ===\n");

    println!("Run:");
    println!("  Started: {}", report.started_at.to_rfc3339());
    println!("  Duration: {:.1}s", report.elapsed.as_secs_f64());
    if report.aborted {
        println!("  Status: aborted");
    }
    println!("  Seeds: {}", report.seeds_accepted);
    println!();

    println!("Pages ({} fetched):", report.pages_fetched());
    for (state, count) in &report.pages_by_state {
        println!("  {}: {}", state, count);
    }
    println!();

    println!("Failures:");
    println!("  URLs abandoned: {}", report.urls_abandoned);
    println!("  Invalid URLs: {}", report.invalid_urls);
    println!("  Structure errors: {}", report.structure_failures);
    println!("  Field parse errors: {}", report.field_parse_failures);
    println!();

    println!("Records:");
    println!("  Finalized: {}", report.records_finalized);
    println!("  Discarded: {}", report.records_discarded());
    for (kind, count) in report.discard_summary() {
        println!("    {}: {}", kind, count);
    }
    println!("  Delivered: {}", report.records_delivered);
    println!("  Failed to deliver: {}", report.delivery_failures);
}
