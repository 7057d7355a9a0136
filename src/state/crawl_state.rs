/// Crawl state definitions for the fixed page chain
///
/// Every fetched page is tagged with the state that decides which stage
/// parser reads it.
use std::fmt;

/// The page type a crawl request points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CrawlState {
    /// Account overview page (crawl seed)
    AccountPage,

    /// One page of the account's repository list
    RepoListPage,

    /// Repository landing page
    RepoDetailPage,

    /// Release list of one repository
    ReleaseListPage,

    /// Latest release of one repository
    ReleaseDetailPage,
}

impl CrawlState {
    /// Returns true if pages in this state belong to a single repository's
    /// chain, i.e. their results feed one in-progress record
    pub fn is_repo_chain(&self) -> bool {
        matches!(
            self,
            Self::RepoDetailPage | Self::ReleaseListPage | Self::ReleaseDetailPage
        )
    }

    /// Returns true if no page is ever followed from this state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::ReleaseDetailPage)
    }

    /// States a parser for this state may tag its follow-ups with
    pub fn follow_up_states(&self) -> &'static [CrawlState] {
        match self {
            Self::AccountPage => &[Self::RepoListPage],
            Self::RepoListPage => &[Self::RepoDetailPage, Self::RepoListPage],
            Self::RepoDetailPage => &[Self::ReleaseListPage],
            Self::ReleaseListPage => &[Self::ReleaseDetailPage],
            Self::ReleaseDetailPage => &[],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccountPage => "account_page",
            Self::RepoListPage => "repo_list_page",
            Self::RepoDetailPage => "repo_detail_page",
            Self::ReleaseListPage => "release_list_page",
            Self::ReleaseDetailPage => "release_detail_page",
        }
    }

    pub fn all_states() -> [Self; 5] {
        [
            Self::AccountPage,
            Self::RepoListPage,
            Self::RepoDetailPage,
            Self::ReleaseListPage,
            Self::ReleaseDetailPage,
        ]
    }
}

impl fmt::Display for CrawlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
