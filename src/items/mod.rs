//! Output records and the rules that build them from scraped text
//!
//! Stage parsers produce raw [`Fragments`]; the coercion functions in this
//! module turn them into the typed fields of [`RepoInfoItem`].

mod coerce;
mod fields;

pub use coerce::{first_count, first_text, join_text, parse_count, FieldParseError};
pub use fields::{Field, FieldKind, Fragments};

use serde::{Deserialize, Serialize};

/// Summary of the default branch's latest commit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MainBranchItem {
    #[serde(
        rename = "main_branch_commit_count",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub commit_count: Option<u64>,

    #[serde(
        rename = "main_branch_latest_commit_author",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub latest_commit_author: Option<String>,

    #[serde(
        rename = "main_branch_latest_commit_datetime",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub latest_commit_datetime: Option<String>,

    #[serde(
        rename = "main_branch_latest_commit_message",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub latest_commit_message: Option<String>,
}

impl MainBranchItem {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// The most recent release of a repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestReleaseItem {
    pub tag: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datetime: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changelog: Option<String>,
}

/// One finalized repository record
///
/// Optional fields are `None` when the source page did not carry them;
/// they are never defaulted to zero or an empty string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoInfoItem {
    pub account: String,
    pub repo: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub about: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website_link: Option<String>,

    pub stars: u64,
    pub forks: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watching: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_branch: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_count: Option<u64>,

    #[serde(flatten)]
    pub main_branch_info: MainBranchItem,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_release: Option<LatestReleaseItem>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scrapy_item() -> RepoInfoItem {
        RepoInfoItem {
            account: "scrapy".to_string(),
            repo: "scrapy".to_string(),
            about: Some("Scrapy, a fast high-level web crawling framework".to_string()),
            website_link: Some("https://scrapy.org".to_string()),
            stars: 45000,
            forks: 9800,
            watching: Some("1.8k".to_string()),
            main_branch: Some("master".to_string()),
            release_count: None,
            main_branch_info: MainBranchItem {
                commit_count: Some(10234),
                latest_commit_author: Some("Gallaecio".to_string()),
                latest_commit_datetime: None,
                latest_commit_message: None,
            },
            latest_release: None,
        }
    }

    #[test]
    fn test_serializes_flat_main_branch_fields() {
        let json = serde_json::to_value(scrapy_item()).unwrap();

        assert_eq!(json["account"], "scrapy");
        assert_eq!(json["stars"], 45000);
        assert_eq!(json["main_branch_commit_count"], 10234);
        assert_eq!(json["main_branch_latest_commit_author"], "Gallaecio");
        assert!(json.get("main_branch_info").is_none());
    }

    #[test]
    fn test_absent_fields_are_omitted() {
        let json = serde_json::to_value(scrapy_item()).unwrap();

        assert!(json.get("release_count").is_none());
        assert!(json.get("latest_release").is_none());
        assert!(json.get("main_branch_latest_commit_message").is_none());
    }

    #[test]
    fn test_deserializes_what_it_serializes() {
        let mut item = scrapy_item();
        item.latest_release = Some(LatestReleaseItem {
            tag: "2.11.0".to_string(),
            datetime: Some("2023-09-18T10:00:00Z".to_string()),
            changelog: None,
        });

        let text = serde_json::to_string(&item).unwrap();
        let back: RepoInfoItem = serde_json::from_str(&text).unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn test_main_branch_is_empty() {
        assert!(MainBranchItem::default().is_empty());
        assert!(!scrapy_item().main_branch_info.is_empty());
    }
}
