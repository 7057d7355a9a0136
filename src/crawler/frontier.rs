//! Crawl frontier: pending requests, the visited set and termination
//!
//! This module handles:
//! - Normalizing and deduplicating every URL before it is queued
//! - Handing requests to workers, one worker per request
//! - Detecting the end of traversal (empty queue, nothing in flight)
//! - Aborting a run
//!
//! All state sits behind one mutex so the visited check and the enqueue
//! are a single step. A URL is marked visited when it is queued, which
//! keeps duplicates out of the queue entirely.

use crate::state::CrawlState;
use crate::url::{normalize, prepare_seeds, AccountId, PreparedSeeds};
use crate::UrlError;
use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use url::Url;

/// Which account (and, deeper in the chain, which repository) a request
/// belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CrawlContext {
    pub account: AccountId,
    pub repo: Option<String>,
}

impl CrawlContext {
    pub fn account(account: AccountId) -> Self {
        Self {
            account,
            repo: None,
        }
    }

    pub fn with_repo(&self, repo: impl Into<String>) -> Self {
        Self {
            account: self.account.clone(),
            repo: Some(repo.into()),
        }
    }
}

/// One pending fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlRequest {
    /// Canonical URL, the visited-set key
    pub url: String,
    /// URL actually requested
    pub fetch_url: Url,
    pub state: CrawlState,
    pub context: CrawlContext,
}

#[derive(Debug, Default)]
struct FrontierInner {
    queue: VecDeque<CrawlRequest>,
    visited: HashSet<String>,
    in_flight: usize,
    aborted: bool,
}

/// Work queue and visited set for one crawl run
#[derive(Debug, Default)]
pub struct Frontier {
    inner: Mutex<FrontierInner>,
    notify: Notify,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FrontierInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Normalizes and deduplicates seed account URLs and queues one
    /// `AccountPage` request per unique account URL
    ///
    /// Returns the preparation outcome so the caller can report rejected
    /// seeds.
    pub fn submit<I, S>(&self, seeds: I) -> PreparedSeeds
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let prepared = prepare_seeds(seeds);

        {
            let mut inner = self.lock();
            for seed in &prepared.accepted {
                if inner.aborted || !inner.visited.insert(seed.canonical.clone()) {
                    continue;
                }
                inner.queue.push_back(CrawlRequest {
                    url: seed.canonical.clone(),
                    fetch_url: seed.fetch_url.clone(),
                    state: CrawlState::AccountPage,
                    context: CrawlContext::account(seed.account.clone()),
                });
            }
        }

        self.notify.notify_waiters();
        prepared
    }

    /// Queues a derived URL unless it was already seen
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - The request was queued
    /// * `Ok(false)` - The URL was already visited or the run was aborted
    /// * `Err(UrlError)` - The URL could not be normalized
    pub fn enqueue(
        &self,
        fetch_url: Url,
        state: CrawlState,
        context: CrawlContext,
    ) -> Result<bool, UrlError> {
        let canonical = normalize(fetch_url.as_str())?;

        {
            let mut inner = self.lock();
            if inner.aborted {
                return Ok(false);
            }
            if !inner.visited.insert(canonical.clone()) {
                tracing::trace!("Skipping visited URL {}", canonical);
                return Ok(false);
            }
            tracing::trace!("Queued {} as {}", canonical, state);
            inner.queue.push_back(CrawlRequest {
                url: canonical,
                fetch_url,
                state,
                context,
            });
        }

        self.notify.notify_waiters();
        Ok(true)
    }

    /// Waits for the next request
    ///
    /// Returns `None` once the queue is empty and no worker holds a
    /// request (nothing more can be discovered), or after an abort. Every
    /// request returned must be handed back through [`Frontier::complete`].
    pub async fn next(&self) -> Option<CrawlRequest> {
        loop {
            // Registered before the check so a wakeup in between is not lost
            let notified = self.notify.notified();

            {
                let mut inner = self.lock();
                if inner.aborted {
                    return None;
                }
                if let Some(request) = inner.queue.pop_front() {
                    inner.in_flight += 1;
                    return Some(request);
                }
                if inner.in_flight == 0 {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Marks a request returned by [`Frontier::next`] as finished
    pub fn complete(&self) {
        {
            let mut inner = self.lock();
            inner.in_flight = inner.in_flight.saturating_sub(1);
        }
        self.notify.notify_waiters();
    }

    /// Stops the run: drops every queued request and wakes idle workers
    ///
    /// Requests already handed out finish normally.
    pub fn abort(&self) {
        {
            let mut inner = self.lock();
            inner.aborted = true;
            let dropped = inner.queue.len();
            inner.queue.clear();
            tracing::info!("Crawl aborted, {} queued requests dropped", dropped);
        }
        self.notify.notify_waiters();
    }

    pub fn is_aborted(&self) -> bool {
        self.lock().aborted
    }

    /// Number of distinct URLs ever queued
    pub fn visited_count(&self) -> usize {
        self.lock().visited.len()
    }

    pub fn queue_len(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn in_flight(&self) -> usize {
        self.lock().in_flight
    }
}
