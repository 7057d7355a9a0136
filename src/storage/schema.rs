//! Database schema definitions
//!
//! This module contains the SQL schema for the local record store.

/// SQL schema for the database
///
/// `(account, repo)` is deliberately not unique: replacing a record is a
/// delete followed by an insert, the same contract the remote ingestion
/// API offers.
pub const SCHEMA_SQL: &str = r#"
-- One row per finalized repository record
CREATE TABLE IF NOT EXISTS repos (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    account TEXT NOT NULL,
    repo TEXT NOT NULL,
    about TEXT,
    website_link TEXT,
    stars INTEGER NOT NULL,
    forks INTEGER NOT NULL,
    watching TEXT,
    main_branch TEXT,
    release_count INTEGER,
    main_branch_commit_count INTEGER,
    main_branch_latest_commit_author TEXT,
    main_branch_latest_commit_datetime TEXT,
    main_branch_latest_commit_message TEXT,
    latest_release_tag TEXT,
    latest_release_datetime TEXT,
    latest_release_changelog TEXT,
    stored_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_repos_account ON repos(account);
CREATE INDEX IF NOT EXISTS idx_repos_account_repo ON repos(account, repo);
"#;

/// Initializes the database schema
///
/// Safe to call on an existing database.
pub fn initialize_schema(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)
}
