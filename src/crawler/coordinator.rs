//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the worker pool that drives a crawl run:
//! - Seeding the frontier
//! - Fetching pages with bounded retry
//! - Running the stage parser for each page and queueing its follow-ups
//! - Feeding repository pages into the item assembler
//! - Passing finalized records to the output pipeline
//! - Handling aborts

use crate::config::Config;
use crate::crawler::assembler::{DiscardReason, ItemAssembler, RecordKey};
use crate::crawler::fetcher::{build_http_client, fetch_url, PageContent, TransportError};
use crate::crawler::frontier::{CrawlContext, CrawlRequest, Frontier};
use crate::crawler::parser::{parse_page, StageOutput};
use crate::items::RepoInfoItem;
use crate::output::{CrawlReport, OutputPipeline};
use crate::state::CrawlState;
use crate::storage::RecordStore;
use crate::url::last_path_segment;
use crate::ScraperError;
use reqwest::Client;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Records buffered between the workers and the output pipeline
const RECORD_CHANNEL_CAPACITY: usize = 64;

/// Frontier of the run in progress, if any
#[derive(Debug, Default)]
struct RunSlot {
    frontier: Option<Arc<Frontier>>,
    /// Abort requested while no run was active; applies to the next run
    abort_requested: bool,
}

fn lock_slot(slot: &Mutex<RunSlot>) -> MutexGuard<'_, RunSlot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle that stops a running crawl from another task
#[derive(Debug, Clone)]
pub struct AbortHandle {
    slot: Arc<Mutex<RunSlot>>,
}

impl AbortHandle {
    /// Aborts the current run, or the next one if none is running
    pub fn abort(&self) {
        let mut slot = lock_slot(&self.slot);
        if let Some(frontier) = slot.frontier.clone() {
            frontier.abort();
        } else {
            slot.abort_requested = true;
        }
    }
}

/// State shared by every worker of one run
struct Shared {
    client: Client,
    frontier: Arc<Frontier>,
    assembler: Mutex<ItemAssembler>,
    report: Mutex<CrawlReport>,
    records: mpsc::Sender<RepoInfoItem>,
    retry_limit: u32,
    retry_delay: Duration,
}

impl Shared {
    fn report(&self) -> MutexGuard<'_, CrawlReport> {
        self.report.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn assembler(&self) -> MutexGuard<'_, ItemAssembler> {
        self.assembler.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    client: Client,
    store: Arc<dyn RecordStore>,
    run_slot: Arc<Mutex<RunSlot>>,
}

impl Coordinator {
    /// Creates a new coordinator delivering to `store`
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to run
    /// * `Err(ScraperError)` - The HTTP client could not be built
    pub fn new(config: Config, store: Arc<dyn RecordStore>) -> Result<Self, ScraperError> {
        let client = build_http_client(&config.user_agent, &config.crawler)?;

        Ok(Self {
            config: Arc::new(config),
            client,
            store,
            run_slot: Arc::new(Mutex::new(RunSlot::default())),
        })
    }

    /// Returns a handle that aborts the run
    pub fn abort_handle(&self) -> AbortHandle {
        AbortHandle {
            slot: self.run_slot.clone(),
        }
    }

    /// Runs the crawl over the configured seeds
    ///
    /// Page and field failures never end the run; they are counted in the
    /// returned report. Records still in progress when the run ends are
    /// discarded, never delivered. Each run starts from an empty visited
    /// set.
    pub async fn run(&self) -> CrawlReport {
        let start_time = Instant::now();
        let mut report = CrawlReport::new();

        let frontier = Arc::new(Frontier::new());
        {
            let mut slot = lock_slot(&self.run_slot);
            if std::mem::take(&mut slot.abort_requested) {
                frontier.abort();
            }
            slot.frontier = Some(frontier.clone());
        }

        let prepared = frontier.submit(&self.config.seeds);
        for (raw, e) in &prepared.rejected {
            tracing::warn!("Dropping seed {:?}: {}", raw, e);
        }
        if prepared.duplicates > 0 {
            tracing::debug!("Ignored {} duplicate seed(s)", prepared.duplicates);
        }
        report.seeds_accepted = prepared.accepted.len() as u64;
        report.invalid_urls = prepared.rejected.len() as u64;

        let worker_count = self.config.crawler.worker_count.max(1) as usize;
        tracing::info!(
            "Starting crawl of {} account(s) with {} worker(s)",
            prepared.accepted.len(),
            worker_count
        );

        let (tx, rx) = mpsc::channel(RECORD_CHANNEL_CAPACITY);
        let pipeline = OutputPipeline::new(
            self.store.clone(),
            self.config.output.delivery_retry_limit,
            self.config.crawler.retry_delay(),
        );
        let delivery = tokio::spawn(pipeline.run(rx));

        let shared = Arc::new(Shared {
            client: self.client.clone(),
            frontier: frontier.clone(),
            assembler: Mutex::new(ItemAssembler::new()),
            report: Mutex::new(report),
            records: tx,
            retry_limit: self.config.crawler.retry_limit,
            retry_delay: self.config.crawler.retry_delay(),
        });

        let mut workers = Vec::with_capacity(worker_count);
        for id in 0..worker_count {
            let shared = shared.clone();
            workers.push(tokio::spawn(async move {
                while let Some(request) = shared.frontier.next().await {
                    process_request(&shared, request).await;
                    shared.frontier.complete();
                }
                tracing::trace!("Worker {} finished", id);
            }));
        }

        for worker in workers {
            if let Err(e) = worker.await {
                tracing::error!("Crawl worker failed: {}", e);
            }
        }

        let aborted = frontier.is_aborted();
        lock_slot(&self.run_slot).frontier = None;
        let leftover_reason = if aborted {
            DiscardReason::Cancelled
        } else {
            DiscardReason::Incomplete
        };
        let leftovers = shared.assembler().drain(leftover_reason);

        let mut report = {
            let mut guard = shared.report();
            for discarded in leftovers {
                guard.record_discard(discarded);
            }
            std::mem::take(&mut *guard)
        };

        // Closing the last sender lets the pipeline finish
        drop(shared);
        match delivery.await {
            Ok(stats) => {
                report.records_delivered = stats.delivered;
                report.delivery_failures = stats.failed;
            }
            Err(e) => tracing::error!("Output pipeline failed: {}", e),
        }

        report.aborted = aborted;
        report.elapsed = start_time.elapsed();

        tracing::info!(
            "Crawl completed: {} pages fetched, {} records finalized, {} discarded, {} URLs abandoned in {:?}",
            report.pages_fetched(),
            report.records_finalized,
            report.records_discarded(),
            report.urls_abandoned,
            report.elapsed
        );

        report
    }
}

/// Fetches a page, retrying transient failures in place
async fn fetch_with_retry(
    shared: &Shared,
    request: &CrawlRequest,
) -> Result<PageContent, TransportError> {
    let mut attempt = 0;
    loop {
        match fetch_url(&shared.client, &request.fetch_url).await {
            Ok(page) => return Ok(page),
            Err(e)
                if e.is_retryable()
                    && attempt < shared.retry_limit
                    && !shared.frontier.is_aborted() =>
            {
                attempt += 1;
                tracing::debug!(
                    "Retrying {} ({}/{}): {}",
                    request.url,
                    attempt,
                    shared.retry_limit,
                    e
                );
                tokio::time::sleep(shared.retry_delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Record key for a request of a repository's chain
fn record_key(request: &CrawlRequest) -> Option<RecordKey> {
    let repo = request
        .context
        .repo
        .clone()
        .or_else(|| last_path_segment(&request.url))?;
    Some(RecordKey::new(request.context.account.clone(), repo))
}

/// Processes a single request
///
/// This function:
/// 1. Fetches the page
/// 2. Runs the stage parser for the request's state
/// 3. Queues follow-ups, or merges fragments and finalizes the record when
///    the repository's chain ends
async fn process_request(shared: &Shared, request: CrawlRequest) {
    tracing::debug!("Fetching {} ({})", request.url, request.state);

    let page = match fetch_with_retry(shared, &request).await {
        Ok(page) => page,
        Err(e) => {
            tracing::warn!("Abandoning {}: {}", request.url, e);
            shared.report().urls_abandoned += 1;
            if request.state.is_repo_chain() {
                if let Some(key) = record_key(&request) {
                    let discarded = shared
                        .assembler()
                        .discard(&key, DiscardReason::ChainAbandoned(request.url.clone()));
                    if let Some(discarded) = discarded {
                        shared.report().record_discard(discarded);
                    }
                }
            }
            return;
        }
    };
    shared.report().record_page(request.state);

    let output = match parse_page(request.state, &page) {
        Ok(output) => output,
        Err(e) => {
            tracing::warn!("Halting account {}: {}", request.context.account, e);
            shared.report().structure_failures += 1;
            return;
        }
    };

    if request.state.is_repo_chain() {
        continue_chain(shared, &request, output).await;
    } else {
        queue_follow_ups(shared, &request, output);
    }
}

/// Queues the links found on an account or repository list page
fn queue_follow_ups(shared: &Shared, request: &CrawlRequest, output: StageOutput) {
    for follow_up in output.follow_ups {
        let context = match follow_up.state {
            CrawlState::RepoDetailPage => match last_path_segment(follow_up.url.as_str()) {
                Some(repo) => request.context.with_repo(repo),
                None => {
                    tracing::warn!("No repository name in {}", follow_up.url);
                    shared.report().invalid_urls += 1;
                    continue;
                }
            },
            _ => request.context.clone(),
        };

        if let Err(e) = shared
            .frontier
            .enqueue(follow_up.url, follow_up.state, context)
        {
            tracing::warn!("Dropping link from {}: {}", request.url, e);
            shared.report().invalid_urls += 1;
        }
    }
}

/// Merges a repository-chain page into its record and either queues the
/// next page of the chain or finalizes the record
async fn continue_chain(shared: &Shared, request: &CrawlRequest, output: StageOutput) {
    let Some(key) = record_key(request) else {
        tracing::warn!("No repository name for {}", request.url);
        shared.report().invalid_urls += 1;
        return;
    };

    let errors = shared.assembler().merge(&key, &output.fragments);
    if !errors.is_empty() {
        for e in &errors {
            tracing::warn!("{}: {}", key, e);
        }
        shared.report().field_parse_failures += errors.len() as u64;
    }

    let next = if request.state.is_terminal() {
        None
    } else {
        let next_state = request.state.follow_up_states().first().copied();
        next_state.and_then(|state| output.follow_up(state))
    };

    if let Some(follow_up) = next {
        match shared.frontier.enqueue(
            follow_up.url.clone(),
            follow_up.state,
            request.context.clone(),
        ) {
            Ok(true) => return,
            Ok(false) if shared.frontier.is_aborted() => {
                let discarded = shared.assembler().discard(&key, DiscardReason::Cancelled);
                if let Some(discarded) = discarded {
                    shared.report().record_discard(discarded);
                }
                return;
            }
            Ok(false) => {
                tracing::debug!("{} already visited, finalizing {}", follow_up.url, key)
            }
            Err(e) => {
                tracing::warn!("Dropping link from {}: {}", request.url, e);
                shared.report().invalid_urls += 1;
            }
        }
    }

    let finalized = shared.assembler().finalize(&key);
    match finalized {
        Ok(item) => {
            shared.report().records_finalized += 1;
            tracing::debug!("Finalized {}", key);
            if shared.records.send(item).await.is_err() {
                tracing::error!("Output pipeline closed, {} not delivered", key);
            }
        }
        Err(discarded) => shared.report().record_discard(discarded),
    }
}

/// Runs a complete crawl with the store selected by the configuration
///
/// # Example
///
/// ```no_run
/// use ghub_scraper::config::load_config;
/// use ghub_scraper::crawler::run_crawl;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("ghub-scraper.toml"))?;
/// let report = run_crawl(config).await?;
/// println!("{} records finalized", report.records_finalized);
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(config: Config) -> Result<CrawlReport, ScraperError> {
    let store = crate::storage::open_store(&config)?;
    let coordinator = Coordinator::new(config, store)?;
    Ok(coordinator.run().await)
}
