//! Storage module for finalized records
//!
//! This module handles everything on the far side of the output pipeline:
//! - The [`RecordStore`] interface (delete, create, query)
//! - A local SQLite store
//! - A client for the remote ingestion API
//! - The per-account aggregation rules shared by both

mod remote;
mod schema;
mod sqlite;
mod traits;

pub use remote::IngestionClient;
pub use schema::initialize_schema;
pub use sqlite::SqliteStore;
pub use traits::{RecordStore, StoreError, StoreResult};

use crate::config::{Config, StoreKind};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Aggregates over one account's stored repositories
///
/// Repositories without a commit count take no part in the maximum; they
/// are never counted as zero commits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountStats {
    /// Every repository sharing the highest commit count
    #[serde(default)]
    pub top_repos_by_commit_count: Vec<String>,

    /// Highest known commit count
    #[serde(default)]
    pub commit_count: Option<u64>,

    #[serde(default)]
    pub avg_stars_count: Option<f64>,
}

impl AccountStats {
    /// Computes the aggregates from `(repo, commit_count, stars)` rows
    pub fn from_rows<'a, I>(rows: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, Option<u64>, Option<u64>)>,
    {
        let rows: Vec<_> = rows.into_iter().collect();

        let commit_count = rows.iter().filter_map(|(_, commits, _)| *commits).max();
        let mut top_repos_by_commit_count: Vec<String> = match commit_count {
            Some(max) => rows
                .iter()
                .filter(|(_, commits, _)| *commits == Some(max))
                .map(|(repo, _, _)| repo.to_string())
                .collect(),
            None => Vec::new(),
        };
        top_repos_by_commit_count.sort();

        let stars: Vec<u64> = rows.iter().filter_map(|(_, _, stars)| *stars).collect();
        let avg_stars_count = if stars.is_empty() {
            None
        } else {
            Some(stars.iter().sum::<u64>() as f64 / stars.len() as f64)
        };

        Self {
            top_repos_by_commit_count,
            commit_count,
            avg_stars_count,
        }
    }

    /// False when the account has no stored repositories
    pub fn has_data(&self) -> bool {
        self.avg_stars_count.is_some() || !self.top_repos_by_commit_count.is_empty()
    }
}

/// Totals across the whole store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreOverview {
    pub account_count: u64,
    pub repo_count: u64,
    pub avg_repo_count: f64,
}

impl StoreOverview {
    pub fn new(account_count: u64, repo_count: u64) -> Self {
        let avg_repo_count = if account_count == 0 {
            0.0
        } else {
            repo_count as f64 / account_count as f64
        };

        Self {
            account_count,
            repo_count,
            avg_repo_count,
        }
    }
}

/// Opens the record store selected by the `[output]` section
pub fn open_store(config: &Config) -> StoreResult<Arc<dyn RecordStore>> {
    match config.output.store {
        StoreKind::Sqlite => {
            let store = SqliteStore::new(Path::new(&config.output.database_path))?;
            Ok(Arc::new(store))
        }
        StoreKind::Http => {
            let client = IngestionClient::new(&config.output.ingestion_url, &config.user_agent)?;
            Ok(Arc::new(client))
        }
    }
}
