//! Record store trait and error types
//!
//! [`RecordStore`] is the narrow interface the output pipeline and the CLI
//! query modes use. It is implemented by the local SQLite store and by the
//! HTTP client for the remote ingestion API.

use crate::items::RepoInfoItem;
use crate::storage::{AccountStats, StoreOverview};
use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{endpoint} answered with status {status}")]
    Status { endpoint: String, status: u16 },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid store location: {0}")]
    InvalidLocation(String),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Persistent home of finalized records
///
/// Records are keyed by `(account, repo)`. Replacing a record is always
/// [`RecordStore::delete_record`] followed by [`RecordStore::create_record`];
/// there is no upsert.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Removes every stored record for `(account, repo)`
    ///
    /// Returns the number of records removed; zero is not an error.
    async fn delete_record(&self, account: &str, repo: &str) -> StoreResult<u64>;

    /// Stores one record
    async fn create_record(&self, item: &RepoInfoItem) -> StoreResult<()>;

    /// Distinct stored account names, sorted
    async fn list_accounts(&self) -> StoreResult<Vec<String>>;

    /// Commit-count and star aggregates for one account
    async fn account_stats(&self, account: &str) -> StoreResult<AccountStats>;

    /// Totals across every stored account
    async fn overview(&self) -> StoreResult<StoreOverview>;
}
