//! Stage parsers for the fixed page chain
//!
//! Each [`CrawlState`] has one parser function. A parser reads a fetched
//! page and returns:
//! - follow-up URLs, each tagged with the state of the page it points at
//! - raw field fragments, coerced later by the item assembler
//!
//! Only the account page treats a missing link as an error. Everywhere else
//! a missing element simply means the field or follow-up is absent.

use crate::crawler::fetcher::PageContent;
use crate::items::{Field, Fragments};
use crate::state::CrawlState;
use crate::url::{last_path_segment, resolve_link};
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use url::Url;

/// A link a parser wants fetched next
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowUp {
    pub url: Url,
    pub state: CrawlState,
}

/// Everything a stage parser extracted from one page
#[derive(Debug, Clone, Default)]
pub struct StageOutput {
    pub follow_ups: Vec<FollowUp>,
    pub fragments: Fragments,
}

impl StageOutput {
    fn follow(&mut self, url: Url, state: CrawlState) {
        self.follow_ups.push(FollowUp { url, state });
    }

    /// First follow-up tagged with `state`
    pub fn follow_up(&self, state: CrawlState) -> Option<&FollowUp> {
        self.follow_ups.iter().find(|f| f.state == state)
    }
}

/// A navigational link required to continue traversal is missing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{state} {url} has no {missing}")]
pub struct StructureError {
    pub state: CrawlState,
    pub url: String,
    pub missing: &'static str,
}

type StageParser = fn(&Html, &Url) -> Result<StageOutput, StructureError>;

fn parser_for(state: CrawlState) -> StageParser {
    match state {
        CrawlState::AccountPage => parse_account_page,
        CrawlState::RepoListPage => parse_repo_list_page,
        CrawlState::RepoDetailPage => parse_repo_detail_page,
        CrawlState::ReleaseListPage => parse_release_list_page,
        CrawlState::ReleaseDetailPage => parse_release_detail_page,
    }
}

/// Runs the parser matching `state` over a fetched page
///
/// # Example
///
/// ```
/// use ghub_scraper::crawler::{parse_page, PageContent};
/// use ghub_scraper::CrawlState;
/// use url::Url;
///
/// let page = PageContent {
///     url: Url::parse("https://github.com/scrapy/scrapy/releases").unwrap(),
///     status: 200,
///     body: r#"<a href="/scrapy/scrapy/releases/tag/2.11.0">2.11.0</a>"#.to_string(),
/// };
/// let output = parse_page(CrawlState::ReleaseListPage, &page).unwrap();
/// assert_eq!(output.follow_ups[0].state, CrawlState::ReleaseDetailPage);
/// ```
pub fn parse_page(state: CrawlState, page: &PageContent) -> Result<StageOutput, StructureError> {
    let document = Html::parse_document(&page.body);
    parser_for(state)(&document, &page.url)
}

fn parse_account_page(document: &Html, page_url: &Url) -> Result<StageOutput, StructureError> {
    let mut output = StageOutput::default();

    let repos_link = hrefs(document, "a.UnderlineNav-item[href]")
        .find(|href| href.contains("repositories"))
        .and_then(|href| resolve_link(href, page_url));

    match repos_link {
        Some(url) => {
            output.follow(url, CrawlState::RepoListPage);
            Ok(output)
        }
        None => Err(StructureError {
            state: CrawlState::AccountPage,
            url: page_url.to_string(),
            missing: "repositories navigation link",
        }),
    }
}

fn parse_repo_list_page(document: &Html, page_url: &Url) -> Result<StageOutput, StructureError> {
    let mut output = StageOutput::default();

    for href in hrefs(document, r#"[data-hovercard-type="repository"][href]"#) {
        if let Some(url) = resolve_link(href, page_url) {
            output.follow(url, CrawlState::RepoDetailPage);
        }
    }

    let next_page = hrefs(document, r#"a.next_page[href], a[rel="next"][href]"#)
        .find_map(|href| resolve_link(href, page_url));
    if let Some(url) = next_page {
        output.follow(url, CrawlState::RepoListPage);
    }

    Ok(output)
}

fn parse_repo_detail_page(document: &Html, page_url: &Url) -> Result<StageOutput, StructureError> {
    let mut output = StageOutput::default();
    let fragments = &mut output.fragments;

    fragments.extend(Field::About, texts(document, r#"[class="f4 my-3"]"#));
    fragments.extend(
        Field::WebsiteLink,
        hrefs(document, r#"[class="f4 my-3"] ~ div a[href^="http"]"#).map(str::to_string),
    );
    fragments.extend(Field::Stars, counter(document, "#repo-stars-counter-star"));
    fragments.extend(Field::Forks, counter(document, "#repo-network-counter"));
    fragments.extend(
        Field::Watching,
        texts(document, r#"a[href$="/watchers"] strong"#),
    );
    fragments.extend(
        Field::MainBranch,
        texts(document, "#branch-select-menu .css-truncate-target"),
    );

    fragments.extend(
        Field::CommitCount,
        texts(document, r#"a[href*="/commits/"] strong"#),
    );
    fragments.extend(Field::LatestCommitAuthor, texts(document, "a.commit-author"));
    fragments.extend(
        Field::LatestCommitDatetime,
        attrs(document, "relative-time[datetime]", "datetime"),
    );
    fragments.extend(Field::LatestCommitMessage, texts(document, ".commit-title"));

    // The list page, not a specific tag, starts the release chain
    let releases_link = hrefs(document, "a[href]")
        .filter(|href| href.contains("releases") && !href.contains("releases/tag"))
        .find_map(|href| resolve_link(href, page_url));

    if let Some(url) = releases_link {
        fragments.extend(
            Field::ReleaseCount,
            texts(document, r#"a[href$="/releases"] span.Counter"#),
        );
        output.follow(url, CrawlState::ReleaseListPage);
    }

    Ok(output)
}

fn parse_release_list_page(
    document: &Html,
    page_url: &Url,
) -> Result<StageOutput, StructureError> {
    let mut output = StageOutput::default();

    let latest = hrefs(document, "a[href]")
        .filter(|href| href.contains("releases/tag"))
        .find_map(|href| resolve_link(href, page_url));
    if let Some(url) = latest {
        output.follow(url, CrawlState::ReleaseDetailPage);
    }

    Ok(output)
}

fn parse_release_detail_page(
    document: &Html,
    page_url: &Url,
) -> Result<StageOutput, StructureError> {
    let mut output = StageOutput::default();
    let fragments = &mut output.fragments;

    if let Some(tag) = last_path_segment(page_url.as_str()) {
        fragments.push(Field::ReleaseTag, tag);
    }
    fragments.extend(
        Field::ReleaseDatetime,
        attrs(document, "relative-time[datetime]", "datetime"),
    );
    fragments.extend(
        Field::Changelog,
        texts(document, r#"[data-test-selector="body-content"]"#),
    );

    Ok(output)
}

fn select<'a>(document: &'a Html, css: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(css) {
        Ok(selector) => document.select(&selector).collect(),
        Err(e) => {
            tracing::error!("Invalid selector {}: {}", css, e);
            Vec::new()
        }
    }
}

/// `href` attributes of matching elements, in document order
fn hrefs<'a>(document: &'a Html, css: &str) -> impl Iterator<Item = &'a str> {
    select(document, css)
        .into_iter()
        .filter_map(|element| element.value().attr("href"))
}

/// Text nodes under every matching element, in document order
fn texts(document: &Html, css: &str) -> Vec<String> {
    select(document, css)
        .into_iter()
        .flat_map(|element| element.text())
        .map(str::to_string)
        .collect()
}

fn attrs(document: &Html, css: &str, name: &str) -> Vec<String> {
    select(document, css)
        .into_iter()
        .filter_map(|element| element.value().attr(name))
        .map(str::to_string)
        .collect()
}

/// Counter value: the exact `title` when present, else the rounded text
fn counter(document: &Html, css: &str) -> Vec<String> {
    select(document, css)
        .into_iter()
        .map(|element| match element.value().attr("title") {
            Some(title) if !title.trim().is_empty() => title.to_string(),
            _ => element.text().collect(),
        })
        .collect()
}
