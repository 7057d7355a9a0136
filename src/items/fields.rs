//! Raw field fragments produced by the stage parsers

use std::collections::BTreeMap;
use std::fmt;

/// How raw text for a field becomes a typed value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Strip thousands separators, parse as integer
    Count,
    /// Concatenate every match in document order, then trim
    JoinedText,
    /// First non-blank match, trimmed
    FirstText,
}

/// A scraped field of a repository record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    About,
    WebsiteLink,
    Stars,
    Forks,
    Watching,
    MainBranch,
    ReleaseCount,
    CommitCount,
    LatestCommitAuthor,
    LatestCommitDatetime,
    LatestCommitMessage,
    ReleaseTag,
    ReleaseDatetime,
    Changelog,
}

impl Field {
    pub fn kind(&self) -> FieldKind {
        match self {
            Self::Stars | Self::Forks | Self::ReleaseCount | Self::CommitCount => FieldKind::Count,
            Self::About | Self::LatestCommitMessage | Self::Changelog => FieldKind::JoinedText,
            Self::WebsiteLink
            | Self::Watching
            | Self::MainBranch
            | Self::LatestCommitAuthor
            | Self::LatestCommitDatetime
            | Self::ReleaseTag
            | Self::ReleaseDatetime => FieldKind::FirstText,
        }
    }

    /// Fields without a safe default; a record missing one is discarded
    pub fn is_required(&self) -> bool {
        matches!(self, Self::Stars | Self::Forks)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::About => "about",
            Self::WebsiteLink => "website_link",
            Self::Stars => "stars",
            Self::Forks => "forks",
            Self::Watching => "watching",
            Self::MainBranch => "main_branch",
            Self::ReleaseCount => "release_count",
            Self::CommitCount => "main_branch_commit_count",
            Self::LatestCommitAuthor => "latest_commit_author",
            Self::LatestCommitDatetime => "latest_commit_datetime",
            Self::LatestCommitMessage => "latest_commit_message",
            Self::ReleaseTag => "tag",
            Self::ReleaseDatetime => "datetime",
            Self::Changelog => "changelog",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Raw values per field, each list in document order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fragments {
    values: BTreeMap<Field, Vec<String>>,
}

impl Fragments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: Field, value: impl Into<String>) {
        self.values.entry(field).or_default().push(value.into());
    }

    pub fn extend<I>(&mut self, field: Field, values: I)
    where
        I: IntoIterator<Item = String>,
    {
        let mut values = values.into_iter().peekable();
        if values.peek().is_some() {
            self.values.entry(field).or_default().extend(values);
        }
    }

    /// Raw matches for a field; empty when the page had none
    pub fn get(&self, field: Field) -> &[String] {
        self.values.get(&field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, field: Field) -> bool {
        !self.get(field).is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &[String])> {
        self.values.iter().map(|(f, v)| (*f, v.as_slice()))
    }
}
