//! URL handling module for ghub-scraper
//!
//! This module provides URL normalization, identifier derivation from path
//! segments, and seed preparation shared by the local crawl and the
//! dispatcher submission.

mod normalize;

use crate::UrlError;
use std::collections::HashSet;
use std::fmt;
use url::Url;

pub use normalize::normalize;

/// Normalized account identifier, derived from the last path segment of an
/// account URL. Partition key for dedup and a field on every output record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccountId(String);

impl AccountId {
    /// Derives the account identifier from an account URL
    ///
    /// ```
    /// use ghub_scraper::url::AccountId;
    ///
    /// let account = AccountId::from_url("http://github.com/scrapy/").unwrap();
    /// assert_eq!(account.as_str(), "scrapy");
    /// ```
    pub fn from_url(url: &str) -> Result<Self, UrlError> {
        let canonical = normalize(url)?;
        last_path_segment(&canonical)
            .map(Self)
            .ok_or(UrlError::MissingSegment(canonical))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Returns the last non-empty path segment of a URL, ignoring query,
/// fragment and trailing slashes
///
/// ```
/// use ghub_scraper::url::last_path_segment;
///
/// assert_eq!(last_path_segment("https://github.com/scrapy/scrapy/"), Some("scrapy".to_string()));
/// assert_eq!(last_path_segment("https://github.com/orgs/scrapy/repositories?page=2"), Some("repositories".to_string()));
/// ```
pub fn last_path_segment(url: &str) -> Option<String> {
    let without_fragment = url.split('#').next().unwrap_or(url);
    let without_query = without_fragment
        .split('?')
        .next()
        .unwrap_or(without_fragment);

    without_query
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty() && !segment.ends_with(':'))
        .map(str::to_string)
}

/// A seed account URL that survived normalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seed {
    /// Canonical form, used as the dedup key
    pub canonical: String,
    /// The URL actually requested (scheme as given)
    pub fetch_url: Url,
    pub account: AccountId,
}

/// Outcome of normalizing and deduplicating a batch of seed URLs
#[derive(Debug, Default)]
pub struct PreparedSeeds {
    /// Unique seeds in first-seen order
    pub accepted: Vec<Seed>,
    /// Inputs that failed normalization or parsing
    pub rejected: Vec<(String, UrlError)>,
    /// Inputs dropped because their canonical form was already accepted
    pub duplicates: usize,
}

impl PreparedSeeds {
    /// Canonical URLs of the accepted seeds, sorted
    pub fn canonical_urls(&self) -> Vec<String> {
        let mut urls: Vec<String> = self.accepted.iter().map(|s| s.canonical.clone()).collect();
        urls.sort();
        urls
    }
}

/// Normalizes and deduplicates seed URLs
///
/// Both the local crawl and the dispatcher submission go through this
/// function so the two paths agree on what counts as the same account.
pub fn prepare_seeds<I, S>(seeds: I) -> PreparedSeeds
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut prepared = PreparedSeeds::default();
    let mut seen = HashSet::new();

    for raw in seeds {
        let raw = raw.as_ref();
        match prepare_seed(raw) {
            Ok(seed) => {
                if seen.insert(seed.canonical.clone()) {
                    prepared.accepted.push(seed);
                } else {
                    prepared.duplicates += 1;
                }
            }
            Err(e) => prepared.rejected.push((raw.to_string(), e)),
        }
    }

    prepared
}

fn prepare_seed(raw: &str) -> Result<Seed, UrlError> {
    let canonical = normalize(raw)?;
    let fetch_url = parse_http_url(raw.trim())?;
    let account = AccountId::from_url(&canonical)?;
    Ok(Seed {
        canonical,
        fetch_url,
        account,
    })
}

/// Resolves an href found on a page against that page's URL
///
/// Returns `None` for hrefs that cannot lead to another page of the chain
/// (empty, fragment-only, non-HTTP schemes).
pub fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let mut absolute = base_url.join(href).ok()?;
    if absolute.scheme() != "http" && absolute.scheme() != "https" {
        return None;
    }
    absolute.set_fragment(None);
    Some(absolute)
}

fn parse_http_url(value: &str) -> Result<Url, UrlError> {
    let url = Url::parse(value).map_err(|e| UrlError::Parse {
        url: value.to_string(),
        reason: e.to_string(),
    })?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    Ok(url)
}
