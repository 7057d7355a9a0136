//! Batch submission to the remote crawl dispatcher
//!
//! The dispatcher schedules crawl runs elsewhere and reports only whether
//! the submission was accepted. It does no normalization of its own, so
//! seeds go through the same preparation as a local crawl.

use crate::config::DispatcherConfig;
use crate::url::prepare_seeds;
use crate::UrlError;
use chrono::{DateTime, Local};
use reqwest::Client;
use thiserror::Error;
use url::Url;

/// Errors that can occur while submitting a batch
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("No valid seed URLs to submit")]
    EmptyBatch,

    #[error("Invalid dispatcher host '{host}': {reason}")]
    InvalidHost { host: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Dispatcher answered with status {0}")]
    Status(u16),
}

/// An accepted submission
#[derive(Debug, Clone)]
pub struct DispatchReceipt {
    pub job_id: String,
    /// Canonical seed URLs sent, sorted
    pub start_urls: Vec<String>,
    /// Inputs dropped before submission
    pub rejected: Vec<(String, UrlError)>,
}

/// Formats the run identifier sent with a batch
pub fn job_id(now: DateTime<Local>) -> String {
    now.format("%Y-%m-%dT%H_%M_%S").to_string()
}

/// Endpoint that accepts batches
pub fn schedule_url(host: &str) -> Result<Url, DispatchError> {
    let endpoint = format!("{}/schedule.json", host.trim().trim_end_matches('/'));
    Url::parse(&endpoint).map_err(|e| DispatchError::InvalidHost {
        host: host.to_string(),
        reason: e.to_string(),
    })
}

/// Normalizes, deduplicates and submits a batch of seed account URLs
///
/// An empty batch is rejected before any request is made.
pub async fn submit_batch<I, S>(
    client: &Client,
    config: &DispatcherConfig,
    seeds: I,
) -> Result<DispatchReceipt, DispatchError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let prepared = prepare_seeds(seeds);
    for (raw, e) in &prepared.rejected {
        tracing::warn!("Dropping seed {:?}: {}", raw, e);
    }

    let start_urls = prepared.canonical_urls();
    if start_urls.is_empty() {
        return Err(DispatchError::EmptyBatch);
    }

    let endpoint = schedule_url(&config.host)?;
    let job_id = job_id(Local::now());
    tracing::info!(
        "Submitting {} seed(s) to {} as job {}",
        start_urls.len(),
        endpoint,
        job_id
    );

    let joined = start_urls.join(",");
    let form = [
        ("start_urls", joined.as_str()),
        ("project", config.project.as_str()),
        ("spider", config.spider.as_str()),
        ("jobid", job_id.as_str()),
    ];
    let response = client.post(endpoint).form(&form).send().await?;

    let status = response.status();
    if status != reqwest::StatusCode::OK {
        return Err(DispatchError::Status(status.as_u16()));
    }

    Ok(DispatchReceipt {
        job_id,
        start_urls,
        rejected: prepared.rejected,
    })
}
