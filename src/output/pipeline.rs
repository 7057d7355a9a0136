//! Output pipeline: hands finalized records to the record store
//!
//! Each record is delivered as a delete of any stored record with the same
//! `(account, repo)` followed by an insert. A failed attempt repeats both
//! steps, so a retried record still ends up stored exactly once.

use crate::items::RepoInfoItem;
use crate::storage::{RecordStore, StoreError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Delivery outcome counts for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryStats {
    pub delivered: u64,
    pub failed: u64,
}

/// Delivers records to a [`RecordStore`] with bounded retry
#[derive(Clone)]
pub struct OutputPipeline {
    store: Arc<dyn RecordStore>,
    attempts: u32,
    retry_delay: Duration,
}

impl OutputPipeline {
    /// `attempts` is the number of tries per record; zero is treated as one
    pub fn new(store: Arc<dyn RecordStore>, attempts: u32, retry_delay: Duration) -> Self {
        Self {
            store,
            attempts: attempts.max(1),
            retry_delay,
        }
    }

    async fn replace(&self, item: &RepoInfoItem) -> Result<(), StoreError> {
        let removed = self.store.delete_record(&item.account, &item.repo).await?;
        if removed > 0 {
            tracing::debug!(
                "Removed {} stored record(s) for {}/{}",
                removed,
                item.account,
                item.repo
            );
        }
        self.store.create_record(item).await
    }

    /// Delivers one record, retrying the whole delete-then-insert sequence
    pub async fn deliver(&self, item: &RepoInfoItem) -> Result<(), StoreError> {
        let mut attempt = 1;
        loop {
            match self.replace(item).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.attempts => {
                    tracing::debug!(
                        "Delivery attempt {}/{} for {}/{} failed: {}",
                        attempt,
                        self.attempts,
                        item.account,
                        item.repo,
                        e
                    );
                    attempt += 1;
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Delivers records until the channel closes
    pub async fn run(self, mut records: mpsc::Receiver<RepoInfoItem>) -> DeliveryStats {
        let mut stats = DeliveryStats::default();

        while let Some(item) = records.recv().await {
            match self.deliver(&item).await {
                Ok(()) => {
                    tracing::info!("Stored {}/{}", item.account, item.repo);
                    stats.delivered += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to deliver {}/{} after {} attempt(s): {}",
                        item.account,
                        item.repo,
                        self.attempts,
                        e
                    );
                    stats.failed += 1;
                }
            }
        }

        stats
    }
}
