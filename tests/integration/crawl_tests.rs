//! Integration tests for the crawler
//!
//! These tests use wiremock to serve a small account (pages shaped like the
//! real site's markup) and run the full crawl cycle end-to-end into a
//! record store.

use ghub_scraper::config::{
    Config, CrawlerConfig, DispatcherConfig, OutputConfig, StoreKind, UserAgentConfig,
};
use ghub_scraper::crawler::{Coordinator, DiscardReason};
use ghub_scraper::items::Field;
use ghub_scraper::storage::{IngestionClient, RecordStore, SqliteStore};
use ghub_scraper::CrawlState;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration crawling the given seeds
fn create_test_config(seeds: Vec<String>, retry_limit: u32) -> Config {
    Config {
        seeds,
        crawler: CrawlerConfig {
            worker_count: 4,
            fetch_timeout_ms: 2_000,
            retry_limit,
            retry_delay_ms: 10,
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        output: OutputConfig {
            store: StoreKind::Sqlite,
            database_path: ":memory:".to_string(),
            ingestion_url: String::new(),
            delivery_retry_limit: 2,
        },
        dispatcher: DispatcherConfig::default(),
    }
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(format!("<html><body>{}</body></html>", body))
        .insert_header("content-type", "text/html; charset=utf-8")
}

fn account_page(account: &str) -> String {
    format!(
        r#"<nav>
             <a class="UnderlineNav-item" href="/{0}">Overview</a>
             <a class="UnderlineNav-item" href="/orgs/{0}/repositories">Repositories</a>
           </nav>"#,
        account
    )
}

fn repo_links(account: &str, repos: &[&str]) -> String {
    repos
        .iter()
        .map(|repo| {
            format!(
                r#"<a data-hovercard-type="repository" href="/{}/{}">{}</a>"#,
                account, repo, repo
            )
        })
        .collect()
}

fn repo_page(stars: &str, forks: &str, releases: Option<&str>) -> String {
    let releases_link = match releases {
        Some(href) => format!(r#"<a href="{}">Releases <span class="Counter">3</span></a>"#, href),
        None => String::new(),
    };
    format!(
        r#"<div id="branch-select-menu"><span class="css-truncate-target">main</span></div>
           <span id="repo-stars-counter-star" title="{}">x</span>
           <span id="repo-network-counter" title="{}">x</span>
           <a href="/watchers-of-repo/watchers"><strong>42</strong> watching</a>
           <p class="f4 my-3">
             A   repository
           </p>
           {}"#,
        stars, forks, releases_link
    )
}

async fn mount_page(server: &MockServer, at: &str, body: String, expected: u64) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(html(&body))
        .expect(expected)
        .mount(server)
        .await;
}

/// Serves account `scrapy`:
/// - list page 1: scrapy (twice), parsel, next -> page 2
/// - list page 2: w3lib, next -> back to page 1
/// - scrapy has no releases; parsel has one; w3lib has an empty release list
async fn mount_scrapy_account(server: &MockServer) {
    mount_page(server, "/scrapy", account_page("scrapy"), 1).await;

    Mock::given(method("GET"))
        .and(path("/orgs/scrapy/repositories"))
        .and(query_param("page", "2"))
        .respond_with(html(&format!(
            r#"{}<a class="next_page" rel="next" href="/orgs/scrapy/repositories">Next</a>"#,
            repo_links("scrapy", &["w3lib"])
        )))
        .with_priority(1)
        .expect(1)
        .mount(server)
        .await;

    mount_page(
        server,
        "/orgs/scrapy/repositories",
        format!(
            r#"{}<a class="next_page" rel="next" href="/orgs/scrapy/repositories?page=2">Next</a>"#,
            repo_links("scrapy", &["scrapy", "parsel", "scrapy"])
        ),
        1,
    )
    .await;

    mount_page(server, "/scrapy/scrapy", repo_page("45,000", "9,800", None), 1).await;

    mount_page(
        server,
        "/scrapy/parsel",
        repo_page("1,024", "200", Some("/scrapy/parsel/releases")),
        1,
    )
    .await;
    mount_page(
        server,
        "/scrapy/parsel/releases",
        r#"<a href="/scrapy/parsel/releases/tag/v1.8.1">v1.8.1</a>
           <a href="/scrapy/parsel/releases/tag/v1.8.0">v1.8.0</a>"#
            .to_string(),
        1,
    )
    .await;
    mount_page(
        server,
        "/scrapy/parsel/releases/tag/v1.8.1",
        r#"<relative-time datetime="2023-04-18T09:00:00Z">Apr 18</relative-time>
           <div data-test-selector="body-content">
             <p>Fix  </p><p>regressions</p>
           </div>"#
            .to_string(),
        1,
    )
    .await;

    mount_page(
        server,
        "/scrapy/w3lib",
        repo_page("350", "100", Some("/scrapy/w3lib/releases")),
        1,
    )
    .await;
    mount_page(
        server,
        "/scrapy/w3lib/releases",
        "<p>There aren't any releases here</p>".to_string(),
        1,
    )
    .await;
}

#[tokio::test]
async fn test_full_crawl_single_account() {
    let server = MockServer::start().await;
    mount_scrapy_account(&server).await;

    let store = Arc::new(SqliteStore::in_memory().unwrap());
    let config = create_test_config(vec![format!("{}/scrapy", server.uri())], 0);
    let coordinator = Coordinator::new(config, store.clone()).unwrap();

    let report = coordinator.run().await;

    assert_eq!(report.records_finalized, 3);
    assert_eq!(report.records_delivered, 3);
    assert_eq!(report.records_discarded(), 0);
    assert_eq!(report.urls_abandoned, 0);
    assert_eq!(report.pages_by_state[&CrawlState::RepoListPage], 2);
    assert_eq!(report.pages_by_state[&CrawlState::RepoDetailPage], 3);
    assert_eq!(report.pages_by_state[&CrawlState::ReleaseDetailPage], 1);

    let records = store.records_for("scrapy").unwrap();
    let repos: Vec<&str> = records.iter().map(|r| r.repo.as_str()).collect();
    assert_eq!(repos, vec!["parsel", "scrapy", "w3lib"]);

    let scrapy = &records[1];
    assert_eq!(scrapy.account, "scrapy");
    assert_eq!(scrapy.stars, 45000);
    assert_eq!(scrapy.forks, 9800);
    assert_eq!(scrapy.release_count, None);
    assert_eq!(scrapy.latest_release, None);
    assert_eq!(scrapy.about.as_deref(), Some("A   repository"));
    assert_eq!(scrapy.watching.as_deref(), Some("42"));
    assert_eq!(scrapy.main_branch.as_deref(), Some("main"));

    let parsel = &records[0];
    assert_eq!(parsel.stars, 1024);
    assert_eq!(parsel.release_count, Some(3));
    let release = parsel.latest_release.as_ref().unwrap();
    assert_eq!(release.tag, "v1.8.1");
    assert_eq!(release.datetime.as_deref(), Some("2023-04-18T09:00:00Z"));
    assert_eq!(release.changelog.as_deref(), Some("Fix  regressions"));

    let w3lib = &records[2];
    assert_eq!(w3lib.release_count, Some(3));
    assert_eq!(w3lib.latest_release, None);
}

#[tokio::test]
async fn test_equivalent_seeds_are_fetched_once() {
    let server = MockServer::start().await;
    mount_scrapy_account(&server).await;

    let store = Arc::new(SqliteStore::in_memory().unwrap());
    let uri = server.uri();
    let config = create_test_config(
        vec![
            format!("{}/scrapy", uri),
            format!("{}/scrapy/", uri),
            format!("{}/scrapy", uri.replacen("http:", "https:", 1)),
        ],
        0,
    );
    let coordinator = Coordinator::new(config, store.clone()).unwrap();

    let report = coordinator.run().await;

    assert_eq!(report.seeds_accepted, 1);
    assert_eq!(report.records_delivered, 3);
}

#[tokio::test]
async fn test_transport_failures_are_retried_then_abandoned() {
    let server = MockServer::start().await;
    mount_page(&server, "/acme", account_page("acme"), 1).await;
    mount_page(
        &server,
        "/orgs/acme/repositories",
        repo_links("acme", &["ok", "broken", "flaky"]),
        1,
    )
    .await;
    mount_page(&server, "/acme/ok", repo_page("1", "1", None), 1).await;

    // Retryable: tried 1 + retry_limit times
    Mock::given(method("GET"))
        .and(path("/acme/broken"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    // Not retryable: abandoned after one try, taking its record with it
    mount_page(
        &server,
        "/acme/flaky",
        repo_page("5", "5", Some("/acme/flaky/releases")),
        1,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/acme/flaky/releases"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(SqliteStore::in_memory().unwrap());
    let config = create_test_config(vec![format!("{}/acme", server.uri())], 2);
    let coordinator = Coordinator::new(config, store.clone()).unwrap();

    let report = coordinator.run().await;

    assert_eq!(report.urls_abandoned, 2);
    assert_eq!(report.records_delivered, 1);
    assert_eq!(report.records_discarded(), 1);
    assert!(matches!(
        report.discarded[0].reason,
        DiscardReason::ChainAbandoned(ref url) if url.ends_with("/acme/flaky/releases")
    ));

    let records = store.records_for("acme").unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].repo, "ok");
}

#[tokio::test]
async fn test_missing_repositories_link_halts_only_that_account() {
    let server = MockServer::start().await;
    mount_scrapy_account(&server).await;

    // No navigation at all: nothing past the account page is requested
    mount_page(&server, "/ghost", "<p>Nothing to see</p>".to_string(), 1).await;
    Mock::given(method("GET"))
        .and(path("/orgs/ghost/repositories"))
        .respond_with(html(""))
        .expect(0)
        .mount(&server)
        .await;

    let store = Arc::new(SqliteStore::in_memory().unwrap());
    let config = create_test_config(
        vec![
            format!("{}/ghost", server.uri()),
            format!("{}/scrapy", server.uri()),
        ],
        0,
    );
    let coordinator = Coordinator::new(config, store.clone()).unwrap();

    let report = coordinator.run().await;

    assert_eq!(report.structure_failures, 1);
    assert_eq!(report.records_delivered, 3);
    assert_eq!(store.list_accounts().await.unwrap(), vec!["scrapy"]);
}

#[tokio::test]
async fn test_invalid_required_field_discards_record() {
    let server = MockServer::start().await;
    mount_page(&server, "/acme", account_page("acme"), 1).await;
    mount_page(
        &server,
        "/orgs/acme/repositories",
        repo_links("acme", &["good", "bad"]),
        1,
    )
    .await;
    mount_page(&server, "/acme/good", repo_page("7", "1", None), 1).await;
    mount_page(&server, "/acme/bad", repo_page("lots", "1", None), 1).await;

    let store = Arc::new(SqliteStore::in_memory().unwrap());
    let config = create_test_config(vec![format!("{}/acme", server.uri())], 0);
    let coordinator = Coordinator::new(config, store.clone()).unwrap();

    let report = coordinator.run().await;

    assert_eq!(report.field_parse_failures, 1);
    assert_eq!(report.records_finalized, 1);
    assert_eq!(report.records_discarded(), 1);
    assert!(matches!(
        report.discarded[0].reason,
        DiscardReason::InvalidRequired(ref e) if e.field == Field::Stars
    ));

    let records = store.records_for("acme").unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].repo, "good");
}

#[tokio::test]
async fn test_records_delivered_to_ingestion_api() {
    let server = MockServer::start().await;
    mount_page(&server, "/acme", account_page("acme"), 1).await;
    mount_page(
        &server,
        "/orgs/acme/repositories",
        repo_links("acme", &["tool"]),
        1,
    )
    .await;
    mount_page(&server, "/acme/tool", repo_page("2,500", "40", None), 1).await;

    Mock::given(method("DELETE"))
        .and(path("/api/repos/acme/tool/"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/add/"))
        .and(wiremock::matchers::body_partial_json(serde_json::json!({
            "account": "acme",
            "repo": "tool",
            "stars": 2500,
            "forks": 40
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(
        IngestionClient::with_client(reqwest::Client::new(), &format!("{}/api", server.uri()))
            .unwrap(),
    );
    let config = create_test_config(vec![format!("{}/acme", server.uri())], 0);
    let coordinator = Coordinator::new(config, store).unwrap();

    let report = coordinator.run().await;

    assert_eq!(report.records_delivered, 1);
    assert_eq!(report.delivery_failures, 0);
}

#[tokio::test]
async fn test_delivery_failure_is_reported() {
    let server = MockServer::start().await;
    mount_page(&server, "/acme", account_page("acme"), 1).await;
    mount_page(
        &server,
        "/orgs/acme/repositories",
        repo_links("acme", &["tool"]),
        1,
    )
    .await;
    mount_page(&server, "/acme/tool", repo_page("1", "1", None), 1).await;

    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/add/"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let store = Arc::new(
        IngestionClient::with_client(reqwest::Client::new(), &format!("{}/api", server.uri()))
            .unwrap(),
    );
    let config = create_test_config(vec![format!("{}/acme", server.uri())], 0);
    let coordinator = Coordinator::new(config, store).unwrap();

    let report = coordinator.run().await;

    assert_eq!(report.records_finalized, 1);
    assert_eq!(report.records_delivered, 0);
    assert_eq!(report.delivery_failures, 1);
}

#[tokio::test]
async fn test_recrawl_replaces_previous_records() {
    let server = MockServer::start().await;
    mount_page(&server, "/acme", account_page("acme"), 2).await;
    mount_page(
        &server,
        "/orgs/acme/repositories",
        repo_links("acme", &["tool", "lib"]),
        2,
    )
    .await;
    mount_page(&server, "/acme/tool", repo_page("10", "2", None), 2).await;
    mount_page(&server, "/acme/lib", repo_page("20", "4", None), 2).await;

    let store = Arc::new(SqliteStore::in_memory().unwrap());
    for _ in 0..2 {
        let config = create_test_config(vec![format!("{}/acme", server.uri())], 0);
        let coordinator = Coordinator::new(config, store.clone()).unwrap();
        let report = coordinator.run().await;
        assert_eq!(report.records_delivered, 2);
    }

    let records = store.records_for("acme").unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(store.overview().await.unwrap().repo_count, 2);

    let stats = store.account_stats("acme").await.unwrap();
    assert_eq!(stats.avg_stars_count, Some(15.0));
}

#[tokio::test]
async fn test_same_coordinator_crawls_again() {
    let server = MockServer::start().await;
    mount_page(&server, "/acme", account_page("acme"), 2).await;
    mount_page(
        &server,
        "/orgs/acme/repositories",
        repo_links("acme", &["tool"]),
        2,
    )
    .await;
    mount_page(&server, "/acme/tool", repo_page("10", "2", None), 2).await;

    let store = Arc::new(SqliteStore::in_memory().unwrap());
    let config = create_test_config(vec![format!("{}/acme", server.uri())], 0);
    let coordinator = Coordinator::new(config, store.clone()).unwrap();

    let first = coordinator.run().await;
    let second = coordinator.run().await;

    assert_eq!(first.pages_fetched(), 3);
    assert_eq!(second.seeds_accepted, 1);
    assert_eq!(second.pages_fetched(), 3);
    assert_eq!(second.records_delivered, 1);
    assert_eq!(store.records_for("acme").unwrap().len(), 1);
}

#[tokio::test]
async fn test_abort_applies_to_one_run_only() {
    let server = MockServer::start().await;
    mount_page(&server, "/acme", account_page("acme"), 1).await;
    mount_page(
        &server,
        "/orgs/acme/repositories",
        repo_links("acme", &["tool"]),
        1,
    )
    .await;
    mount_page(&server, "/acme/tool", repo_page("10", "2", None), 1).await;

    let store = Arc::new(SqliteStore::in_memory().unwrap());
    let config = create_test_config(vec![format!("{}/acme", server.uri())], 0);
    let coordinator = Coordinator::new(config, store.clone()).unwrap();

    coordinator.abort_handle().abort();
    let aborted = coordinator.run().await;
    assert!(aborted.aborted);
    assert_eq!(aborted.pages_fetched(), 0);

    let report = coordinator.run().await;
    assert!(!report.aborted);
    assert_eq!(report.records_delivered, 1);
}

#[tokio::test]
async fn test_abort_discards_records_in_progress() {
    let server = MockServer::start().await;
    mount_page(&server, "/acme", account_page("acme"), 1).await;
    mount_page(
        &server,
        "/orgs/acme/repositories",
        repo_links("acme", &["tool", "lib"]),
        1,
    )
    .await;
    mount_page(
        &server,
        "/acme/tool",
        repo_page("10", "2", Some("/acme/tool/releases")),
        1,
    )
    .await;
    mount_page(
        &server,
        "/acme/lib",
        repo_page("20", "4", Some("/acme/lib/releases")),
        1,
    )
    .await;

    // Slow enough to abort while it is in flight
    Mock::given(method("GET"))
        .and(path("/acme/tool/releases"))
        .respond_with(
            html(r#"<a href="/acme/tool/releases/tag/v1.0">v1.0</a>"#)
                .set_delay(Duration::from_millis(500)),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/acme/tool/releases/tag/v1.0"))
        .respond_with(html(""))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/acme/lib/releases"))
        .respond_with(html(""))
        .expect(0)
        .mount(&server)
        .await;

    // One worker keeps the queue order fixed: tool, lib, tool releases, lib releases
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    let mut config = create_test_config(vec![format!("{}/acme", server.uri())], 0);
    config.crawler.worker_count = 1;
    let coordinator = Coordinator::new(config, store.clone()).unwrap();
    let abort = coordinator.abort_handle();

    let run = tokio::spawn(async move { coordinator.run().await });

    let mut in_flight = false;
    for _ in 0..200 {
        let requests = server.received_requests().await.unwrap_or_default();
        if requests.iter().any(|r| r.url.path() == "/acme/tool/releases") {
            in_flight = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(in_flight);
    abort.abort();

    let report = run.await.unwrap();

    assert!(report.aborted);
    assert_eq!(report.records_finalized, 0);
    assert_eq!(report.records_delivered, 0);

    let mut discarded: Vec<&str> = report
        .discarded
        .iter()
        .map(|d| {
            assert!(matches!(d.reason, DiscardReason::Cancelled));
            d.key.repo.as_str()
        })
        .collect();
    discarded.sort();
    assert_eq!(discarded, vec!["lib", "tool"]);

    assert!(store.records_for("acme").unwrap().is_empty());
}
