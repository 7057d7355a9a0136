//! Item assembler: merges per-stage fragments into finished records
//!
//! One pending record exists per (account, repo) pair from the moment its
//! repository page is parsed until its chain ends. Coercion happens when
//! fragments are merged; required fields are checked on finalize.

use crate::items::{
    first_count, first_text, join_text, Field, FieldKind, FieldParseError, Fragments,
    LatestReleaseItem, MainBranchItem, RepoInfoItem,
};
use crate::url::AccountId;
use std::collections::HashMap;
use std::fmt;

/// Identity of one record
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    pub account: AccountId,
    pub repo: String,
}

impl RecordKey {
    pub fn new(account: AccountId, repo: impl Into<String>) -> Self {
        Self {
            account,
            repo: repo.into(),
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.account, self.repo)
    }
}

/// Why a record never reached the output pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscardReason {
    /// A required field had no value on the page
    MissingRequired(Field),
    /// A required field had a value that failed coercion
    InvalidRequired(FieldParseError),
    /// The record has no repository name
    MissingIdentifier,
    /// A page of the record's chain could not be fetched
    ChainAbandoned(String),
    /// The run ended before the chain finished
    Incomplete,
    /// The run was aborted before the chain finished
    Cancelled,
}

impl fmt::Display for DiscardReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingRequired(field) => write!(f, "required field {} is missing", field),
            Self::InvalidRequired(e) => write!(f, "required field invalid: {}", e),
            Self::MissingIdentifier => f.write_str("no repository name"),
            Self::ChainAbandoned(url) => write!(f, "could not fetch {}", url),
            Self::Incomplete => f.write_str("chain did not finish"),
            Self::Cancelled => f.write_str("crawl aborted"),
        }
    }
}

/// A record dropped instead of delivered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscardedRecord {
    pub key: RecordKey,
    pub reason: DiscardReason,
}

#[derive(Debug, Default)]
struct PendingRecord {
    about: Option<String>,
    website_link: Option<String>,
    stars: Option<u64>,
    forks: Option<u64>,
    watching: Option<String>,
    main_branch: Option<String>,
    release_count: Option<u64>,
    main_branch_info: MainBranchItem,
    release_tag: Option<String>,
    release_datetime: Option<String>,
    changelog: Option<String>,
    parse_errors: Vec<FieldParseError>,
}

impl PendingRecord {
    fn apply(&mut self, field: Field, values: &[String]) -> Result<(), FieldParseError> {
        let text = || match field.kind() {
            FieldKind::JoinedText => join_text(values),
            FieldKind::FirstText | FieldKind::Count => first_text(values),
        };

        match field {
            Field::About => self.about = text(),
            Field::WebsiteLink => self.website_link = text(),
            Field::Stars => self.stars = first_count(field, values)?,
            Field::Forks => self.forks = first_count(field, values)?,
            Field::Watching => self.watching = text(),
            Field::MainBranch => self.main_branch = text(),
            Field::ReleaseCount => self.release_count = first_count(field, values)?,
            Field::CommitCount => self.main_branch_info.commit_count = first_count(field, values)?,
            Field::LatestCommitAuthor => self.main_branch_info.latest_commit_author = text(),
            Field::LatestCommitDatetime => self.main_branch_info.latest_commit_datetime = text(),
            Field::LatestCommitMessage => self.main_branch_info.latest_commit_message = text(),
            Field::ReleaseTag => self.release_tag = text(),
            Field::ReleaseDatetime => self.release_datetime = text(),
            Field::Changelog => self.changelog = text(),
        }
        Ok(())
    }

    fn required(&self, field: Field) -> Result<u64, DiscardReason> {
        let value = match field {
            Field::Stars => self.stars,
            Field::Forks => self.forks,
            _ => None,
        };

        value.ok_or_else(|| {
            self.parse_errors
                .iter()
                .find(|e| e.field == field)
                .map(|e| DiscardReason::InvalidRequired(e.clone()))
                .unwrap_or(DiscardReason::MissingRequired(field))
        })
    }

    fn into_item(self, key: &RecordKey) -> Result<RepoInfoItem, DiscardReason> {
        if key.repo.trim().is_empty() || key.account.as_str().is_empty() {
            return Err(DiscardReason::MissingIdentifier);
        }

        let stars = self.required(Field::Stars)?;
        let forks = self.required(Field::Forks)?;

        let latest_release = self.release_tag.map(|tag| LatestReleaseItem {
            tag,
            datetime: self.release_datetime,
            changelog: self.changelog,
        });

        Ok(RepoInfoItem {
            account: key.account.to_string(),
            repo: key.repo.clone(),
            about: self.about,
            website_link: self.website_link,
            stars,
            forks,
            watching: self.watching,
            main_branch: self.main_branch,
            release_count: self.release_count,
            main_branch_info: self.main_branch_info,
            latest_release,
        })
    }
}

/// In-progress records of one crawl run
#[derive(Debug, Default)]
pub struct ItemAssembler {
    pending: HashMap<RecordKey, PendingRecord>,
}

impl ItemAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges a page's fragments into the record for `key`, creating it on
    /// first use
    ///
    /// Fields that fail coercion are left absent; the errors are returned
    /// for reporting and never stop the merge.
    pub fn merge(&mut self, key: &RecordKey, fragments: &Fragments) -> Vec<FieldParseError> {
        let record = self.pending.entry(key.clone()).or_default();
        let mut errors = Vec::new();

        for (field, values) in fragments.iter() {
            if let Err(e) = record.apply(field, values) {
                errors.push(e);
            }
        }

        record.parse_errors.extend(errors.iter().cloned());
        errors
    }

    /// Closes the record for `key` and validates it
    ///
    /// A key that was never merged finalizes to a record with no fields,
    /// which fails validation like any other incomplete record.
    pub fn finalize(&mut self, key: &RecordKey) -> Result<RepoInfoItem, DiscardedRecord> {
        let record = self.pending.remove(key).unwrap_or_default();
        record.into_item(key).map_err(|reason| DiscardedRecord {
            key: key.clone(),
            reason,
        })
    }

    /// Drops the record for `key`, if one is pending
    pub fn discard(&mut self, key: &RecordKey, reason: DiscardReason) -> Option<DiscardedRecord> {
        self.pending.remove(key).map(|_| DiscardedRecord {
            key: key.clone(),
            reason,
        })
    }

    /// Drops every pending record; used when a run ends
    pub fn drain(&mut self, reason: DiscardReason) -> Vec<DiscardedRecord> {
        let mut discarded: Vec<DiscardedRecord> = self
            .pending
            .drain()
            .map(|(key, _)| DiscardedRecord {
                key,
                reason: reason.clone(),
            })
            .collect();
        discarded.sort_by(|a, b| a.key.cmp(&b.key));
        discarded
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
