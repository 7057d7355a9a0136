//! ghub-scraper main entry point
//!
//! This is the command-line interface for the ghub-scraper account crawler.

use anyhow::{bail, Context};
use clap::Parser;
use ghub_scraper::config::{load_config_with_hash, validate, Config};
use ghub_scraper::crawler::Coordinator;
use ghub_scraper::dispatch::submit_batch;
use ghub_scraper::output::{print_account_stats, print_overview, print_report};
use ghub_scraper::storage::{open_store, RecordStore};
use ghub_scraper::{prepare_seeds, AccountId};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// ghub-scraper: a code-hosting account crawler
///
/// Crawls account pages, follows each repository to its latest release,
/// and stores one record per repository.
#[derive(Parser, Debug)]
#[command(name = "ghub-scraper")]
#[command(version)]
#[command(about = "A code-hosting account crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Additional seed account URL (repeatable)
    #[arg(long = "seed", value_name = "URL")]
    seeds: Vec<String>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show the prepared seed list without crawling
    #[arg(long, conflicts_with_all = ["dispatch", "accounts", "stats", "overview"])]
    dry_run: bool,

    /// Submit the seeds to the remote dispatcher instead of crawling locally
    #[arg(long, conflicts_with_all = ["dry_run", "accounts", "stats", "overview"])]
    dispatch: bool,

    /// Override the dispatcher host
    #[arg(long, value_name = "URL")]
    dispatcher_host: Option<String>,

    /// List stored accounts and exit
    #[arg(long, conflicts_with_all = ["dry_run", "dispatch", "stats", "overview"])]
    accounts: bool,

    /// Show aggregates for one stored account (name or URL) and exit
    #[arg(long, value_name = "ACCOUNT", conflicts_with_all = ["dry_run", "dispatch", "accounts", "overview"])]
    stats: Option<String>,

    /// Show store-wide totals and exit
    #[arg(long, conflicts_with_all = ["dry_run", "dispatch", "accounts", "stats"])]
    overview: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    config.seeds.extend(cli.seeds.iter().cloned());
    if let Some(host) = &cli.dispatcher_host {
        config.dispatcher.host = host.clone();
    }
    validate(&config).context("Invalid dispatcher host override")?;

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.dispatch {
        handle_dispatch(&config).await?;
    } else if cli.accounts {
        handle_accounts(&config).await?;
    } else if let Some(account) = &cli.stats {
        handle_stats(&config, account).await?;
    } else if cli.overview {
        handle_overview(&config).await?;
    } else {
        handle_crawl(config).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("ghub_scraper=info,warn"),
            1 => EnvFilter::new("ghub_scraper=debug,info"),
            2 => EnvFilter::new("ghub_scraper=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) {
    println!("=== ghub-scraper Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Workers: {}", config.crawler.worker_count);
    println!("  Fetch timeout: {}ms", config.crawler.fetch_timeout_ms);
    println!("  Retry limit: {}", config.crawler.retry_limit);
    println!("  Retry delay: {}ms", config.crawler.retry_delay_ms);

    println!("\nUser Agent: {}", config.user_agent.header_value());

    println!("\nOutput:");
    println!("  Store: {:?}", config.output.store);
    println!("  Database: {}", config.output.database_path);
    println!("  Ingestion URL: {}", config.output.ingestion_url);
    println!("  Delivery attempts: {}", config.output.delivery_retry_limit);

    println!("\nDispatcher: {}", config.dispatcher.host);

    let prepared = prepare_seeds(&config.seeds);
    println!("\nSeeds ({}):", prepared.accepted.len());
    for url in prepared.canonical_urls() {
        println!("  - {}", url);
    }
    if prepared.duplicates > 0 {
        println!("  ({} duplicate(s) ignored)", prepared.duplicates);
    }
    for (raw, e) in &prepared.rejected {
        println!("  ! {:?}: {}", raw, e);
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --dispatch mode: submits the seed batch to the dispatcher
async fn handle_dispatch(config: &Config) -> anyhow::Result<()> {
    let client = reqwest::Client::builder()
        .user_agent(config.user_agent.header_value())
        .build()?;

    let receipt = submit_batch(&client, &config.dispatcher, &config.seeds).await?;

    println!("✓ Submitted job {} to {}", receipt.job_id, config.dispatcher.host);
    for url in &receipt.start_urls {
        println!("  - {}", url);
    }
    Ok(())
}

/// Handles the --accounts mode: lists stored accounts
async fn handle_accounts(config: &Config) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let accounts = store.list_accounts().await?;

    println!("Accounts ({}):", accounts.len());
    for account in accounts {
        println!("  - {}", account);
    }
    Ok(())
}

/// Handles the --stats mode: shows aggregates for one account
async fn handle_stats(config: &Config, account: &str) -> anyhow::Result<()> {
    let account = AccountId::from_url(account)
        .with_context(|| format!("Cannot derive an account name from {:?}", account))?;

    let store = open_store(config)?;
    let stats = store.account_stats(account.as_str()).await?;
    print_account_stats(account.as_str(), &stats);
    Ok(())
}

/// Handles the --overview mode: shows store-wide totals
async fn handle_overview(config: &Config) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let overview = store.overview().await?;
    print_overview(&overview);
    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config) -> anyhow::Result<()> {
    if prepare_seeds(&config.seeds).accepted.is_empty() {
        bail!("No valid seed URLs: add `seeds` to the config or pass --seed");
    }

    let store = open_store(&config)?;
    let coordinator = Coordinator::new(config, store)?;

    // Ctrl-C stops queueing new pages; in-flight pages finish
    let abort = coordinator.abort_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping crawl");
            abort.abort();
        }
    });

    let report = coordinator.run().await;
    print_report(&report);

    if report.aborted {
        bail!("Crawl aborted");
    }
    Ok(())
}
