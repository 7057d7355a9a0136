//! SQLite record store
//!
//! This module provides a SQLite-based implementation of the RecordStore
//! trait, used for offline runs and the CLI query modes.

use crate::items::{LatestReleaseItem, MainBranchItem, RepoInfoItem};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{RecordStore, StoreResult};
use crate::storage::{AccountStats, StoreOverview};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// SQLite storage backend
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens or creates the database at `path`
    pub fn new(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every stored record of one account, ordered by repository name
    pub fn records_for(&self, account: &str) -> StoreResult<Vec<RepoInfoItem>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT account, repo, about, website_link, stars, forks, watching, main_branch,
                    release_count, main_branch_commit_count, main_branch_latest_commit_author,
                    main_branch_latest_commit_datetime, main_branch_latest_commit_message,
                    latest_release_tag, latest_release_datetime, latest_release_changelog
             FROM repos WHERE account = ?1 ORDER BY repo, id",
        )?;

        let records = stmt
            .query_map(params![account], row_to_item)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}

fn row_to_item(row: &Row<'_>) -> rusqlite::Result<RepoInfoItem> {
    let tag: Option<String> = row.get(13)?;
    let latest_release = match tag {
        Some(tag) => Some(LatestReleaseItem {
            tag,
            datetime: row.get(14)?,
            changelog: row.get(15)?,
        }),
        None => None,
    };

    Ok(RepoInfoItem {
        account: row.get(0)?,
        repo: row.get(1)?,
        about: row.get(2)?,
        website_link: row.get(3)?,
        stars: row.get::<_, i64>(4)? as u64,
        forks: row.get::<_, i64>(5)? as u64,
        watching: row.get(6)?,
        main_branch: row.get(7)?,
        release_count: row.get::<_, Option<i64>>(8)?.map(|n| n as u64),
        main_branch_info: MainBranchItem {
            commit_count: row.get::<_, Option<i64>>(9)?.map(|n| n as u64),
            latest_commit_author: row.get(10)?,
            latest_commit_datetime: row.get(11)?,
            latest_commit_message: row.get(12)?,
        },
        latest_release,
    })
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn delete_record(&self, account: &str, repo: &str) -> StoreResult<u64> {
        let removed = self.conn().execute(
            "DELETE FROM repos WHERE account = ?1 AND repo = ?2",
            params![account, repo],
        )?;
        Ok(removed as u64)
    }

    async fn create_record(&self, item: &RepoInfoItem) -> StoreResult<()> {
        let release = item.latest_release.as_ref();
        let branch = &item.main_branch_info;

        self.conn().execute(
            "INSERT INTO repos (
                account, repo, about, website_link, stars, forks, watching, main_branch,
                release_count, main_branch_commit_count, main_branch_latest_commit_author,
                main_branch_latest_commit_datetime, main_branch_latest_commit_message,
                latest_release_tag, latest_release_datetime, latest_release_changelog, stored_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
            params![
                item.account,
                item.repo,
                item.about,
                item.website_link,
                item.stars as i64,
                item.forks as i64,
                item.watching,
                item.main_branch,
                item.release_count.map(|n| n as i64),
                branch.commit_count.map(|n| n as i64),
                branch.latest_commit_author,
                branch.latest_commit_datetime,
                branch.latest_commit_message,
                release.map(|r| r.tag.as_str()),
                release.and_then(|r| r.datetime.as_deref()),
                release.and_then(|r| r.changelog.as_deref()),
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    async fn list_accounts(&self) -> StoreResult<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT DISTINCT account FROM repos ORDER BY account")?;
        let accounts = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(accounts)
    }

    async fn account_stats(&self, account: &str) -> StoreResult<AccountStats> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT repo, main_branch_commit_count, stars FROM repos WHERE account = ?1",
        )?;
        let rows = stmt
            .query_map(params![account], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<i64>>(1)?.map(|n| n as u64),
                    row.get::<_, Option<i64>>(2)?.map(|n| n as u64),
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(AccountStats::from_rows(
            rows.iter()
                .map(|(repo, commits, stars)| (repo.as_str(), *commits, *stars)),
        ))
    }

    async fn overview(&self) -> StoreResult<StoreOverview> {
        let (accounts, repos): (i64, i64) = self.conn().query_row(
            "SELECT COUNT(DISTINCT account), COUNT(*) FROM repos",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(StoreOverview::new(accounts as u64, repos as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn item(account: &str, repo: &str, stars: u64, commits: Option<u64>) -> RepoInfoItem {
        RepoInfoItem {
            account: account.to_string(),
            repo: repo.to_string(),
            about: Some("About text".to_string()),
            website_link: None,
            stars,
            forks: 1,
            watching: Some("12".to_string()),
            main_branch: Some("main".to_string()),
            release_count: None,
            main_branch_info: MainBranchItem {
                commit_count: commits,
                ..MainBranchItem::default()
            },
            latest_release: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_read_back() {
        let store = SqliteStore::in_memory().unwrap();
        let mut record = item("scrapy", "scrapy", 45000, Some(10234));
        record.latest_release = Some(LatestReleaseItem {
            tag: "2.11.0".to_string(),
            datetime: None,
            changelog: Some("Highlights".to_string()),
        });

        store.create_record(&record).await.unwrap();

        let stored = store.records_for("scrapy").unwrap();
        assert_eq!(stored, vec![record]);
    }

    #[tokio::test]
    async fn test_delete_then_create_replaces() {
        let store = SqliteStore::in_memory().unwrap();
        store.create_record(&item("scrapy", "scrapy", 1, None)).await.unwrap();

        let removed = store.delete_record("scrapy", "scrapy").await.unwrap();
        assert_eq!(removed, 1);
        store.create_record(&item("scrapy", "scrapy", 2, None)).await.unwrap();

        let stored = store.records_for("scrapy").unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].stars, 2);
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_an_error() {
        let store = SqliteStore::in_memory().unwrap();
        assert_eq!(store.delete_record("nobody", "nothing").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_list_accounts_sorted_distinct() {
        let store = SqliteStore::in_memory().unwrap();
        store.create_record(&item("tokio-rs", "tokio", 1, None)).await.unwrap();
        store.create_record(&item("scrapy", "scrapy", 1, None)).await.unwrap();
        store.create_record(&item("scrapy", "parsel", 1, None)).await.unwrap();

        assert_eq!(
            store.list_accounts().await.unwrap(),
            vec!["scrapy".to_string(), "tokio-rs".to_string()]
        );
    }

    #[tokio::test]
    async fn test_account_stats_and_overview() {
        let store = SqliteStore::in_memory().unwrap();
        store.create_record(&item("scrapy", "scrapy", 300, Some(50))).await.unwrap();
        store.create_record(&item("scrapy", "parsel", 100, Some(50))).await.unwrap();
        store.create_record(&item("scrapy", "w3lib", 200, None)).await.unwrap();
        store.create_record(&item("tokio-rs", "tokio", 10, Some(1))).await.unwrap();

        let stats = store.account_stats("scrapy").await.unwrap();
        assert_eq!(stats.commit_count, Some(50));
        assert_eq!(stats.top_repos_by_commit_count, vec!["parsel", "scrapy"]);
        assert_eq!(stats.avg_stars_count, Some(200.0));

        let missing = store.account_stats("nobody").await.unwrap();
        assert!(!missing.has_data());

        let overview = store.overview().await.unwrap();
        assert_eq!(overview.account_count, 2);
        assert_eq!(overview.repo_count, 4);
        assert_eq!(overview.avg_repo_count, 2.0);
    }

    #[tokio::test]
    async fn test_file_database_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("repos.db");

        {
            let store = SqliteStore::new(&path).unwrap();
            store.create_record(&item("scrapy", "scrapy", 1, None)).await.unwrap();
        }

        let reopened = SqliteStore::new(&path).unwrap();
        assert_eq!(reopened.list_accounts().await.unwrap(), vec!["scrapy"]);
    }
}
