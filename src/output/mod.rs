//! Output module for delivering records and reporting on runs
//!
//! This module handles:
//! - Delivering finalized records to the configured record store
//! - Collecting and printing the per-run crawl report

mod pipeline;
mod report;

pub use pipeline::{DeliveryStats, OutputPipeline};
pub use report::{print_report, CrawlReport};

use crate::storage::{AccountStats, StoreOverview};

/// Prints one account's aggregates to stdout
pub fn print_account_stats(account: &str, stats: &AccountStats) {
    println!("=== {} ===\n", account);

    if !stats.has_data() {
        println!("This account has not been crawled yet.");
        return;
    }

    match stats.commit_count {
        Some(count) => {
            println!("Most commits on main branch: {}", count);
            for repo in &stats.top_repos_by_commit_count {
                println!("  - {}", repo);
            }
        }
        None => println!("Most commits on main branch: unknown"),
    }

    if let Some(avg) = stats.avg_stars_count {
        println!("Average stars: {:.1}", avg);
    }
}

/// Prints store-wide totals to stdout
pub fn print_overview(overview: &StoreOverview) {
    println!("=== Store Overview ===\n");
    println!("  Accounts: {}", overview.account_count);
    println!("  Repositories: {}", overview.repo_count);
    println!("  Repositories per account: {:.1}", overview.avg_repo_count);
}
