//! HTTP client for the remote ingestion API
//!
//! | Operation | Request |
//! |-----------|---------|
//! | delete | `DELETE {base}/repos/{account}/{repo}/` |
//! | create | `POST {base}/add/` with the record as JSON |
//! | accounts | `GET {base}/accounts/` |
//! | account stats | `POST {base}/stats/` with `{"account": ...}` |
//! | overview | `GET {base}/stats/` |

use crate::config::UserAgentConfig;
use crate::items::RepoInfoItem;
use crate::storage::traits::{RecordStore, StoreError, StoreResult};
use crate::storage::{AccountStats, StoreOverview};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

#[derive(Debug, Deserialize)]
struct AccountList {
    accounts: Vec<String>,
}

/// Record store backed by the ingestion API
#[derive(Debug, Clone)]
pub struct IngestionClient {
    client: Client,
    base: Url,
}

impl IngestionClient {
    pub fn new(base_url: &str, user_agent: &UserAgentConfig) -> StoreResult<Self> {
        let client = Client::builder()
            .user_agent(user_agent.header_value())
            .timeout(Duration::from_secs(30))
            .build()?;
        Self::with_client(client, base_url)
    }

    pub fn with_client(client: Client, base_url: &str) -> StoreResult<Self> {
        // A trailing slash makes relative joins append instead of replace
        let with_slash = format!("{}/", base_url.trim_end_matches('/'));
        let base = Url::parse(&with_slash)
            .map_err(|e| StoreError::InvalidLocation(format!("{}: {}", base_url, e)))?;
        Ok(Self { client, base })
    }

    fn endpoint(&self, path: &str) -> StoreResult<Url> {
        self.base
            .join(path)
            .map_err(|e| StoreError::InvalidLocation(format!("{}{}: {}", self.base, path, e)))
    }

    fn repo_endpoint(&self, account: &str, repo: &str) -> StoreResult<Url> {
        let mut url = self.endpoint("repos/")?;
        url.path_segments_mut()
            .map_err(|_| StoreError::InvalidLocation(self.base.to_string()))?
            .pop_if_empty()
            .extend([account, repo, ""]);
        Ok(url)
    }
}

fn check(response: Response, endpoint: &Url) -> StoreResult<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(StoreError::Status {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
        })
    }
}

#[async_trait]
impl RecordStore for IngestionClient {
    async fn delete_record(&self, account: &str, repo: &str) -> StoreResult<u64> {
        let url = self.repo_endpoint(account, repo)?;
        let response = self.client.delete(url.clone()).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(0);
        }
        check(response, &url)?;
        Ok(1)
    }

    async fn create_record(&self, item: &RepoInfoItem) -> StoreResult<()> {
        let url = self.endpoint("add/")?;
        let response = self.client.post(url.clone()).json(item).send().await?;
        check(response, &url)?;
        Ok(())
    }

    async fn list_accounts(&self) -> StoreResult<Vec<String>> {
        let url = self.endpoint("accounts/")?;
        let response = check(self.client.get(url.clone()).send().await?, &url)?;
        let list: AccountList = response.json().await?;

        let mut accounts = list.accounts;
        accounts.sort();
        accounts.dedup();
        Ok(accounts)
    }

    async fn account_stats(&self, account: &str) -> StoreResult<AccountStats> {
        let url = self.endpoint("stats/")?;
        let response = self
            .client
            .post(url.clone())
            .json(&serde_json::json!({ "account": account }))
            .send()
            .await?;
        let body = check(response, &url)?.bytes().await?;

        // An account that was never crawled is answered with a plain message
        match serde_json::from_slice::<serde_json::Value>(&body)? {
            value @ serde_json::Value::Object(_) => Ok(serde_json::from_value(value)?),
            _ => Ok(AccountStats::default()),
        }
    }

    async fn overview(&self) -> StoreResult<StoreOverview> {
        let url = self.endpoint("stats/")?;
        let response = check(self.client.get(url.clone()).send().await?, &url)?;
        Ok(response.json().await?)
    }
}
