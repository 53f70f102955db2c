//! Integration tests for the harvest pipeline
//!
//! These tests use wiremock to create mock HTTP servers and run jobs
//! end-to-end: scheduling, fetching, extraction, storage and export.

use futures::StreamExt;
use page_harvest::config::UserAgentConfig;
use page_harvest::crawler::{build_http_client, harvest, Job, JobConfig, Scheduler};
use page_harvest::output::{export, read_csv, read_json, summarize, ExportFormat, SummaryOptions};
use page_harvest::storage::{RecordStore, SqliteStore};
use page_harvest::{Record, ScrapeStatus};
use std::time::{Duration, Instant};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_scheduler() -> Scheduler {
    let user_agent = UserAgentConfig {
        crawler_name: "TestBot".to_string(),
        crawler_version: "1.0.0".to_string(),
        contact_url: "https://example.com/contact".to_string(),
        contact_email: "test@example.com".to_string(),
    };
    Scheduler::new(build_http_client(&user_agent).expect("Failed to build client"))
}

/// No delay, short timeout, no retries
fn fast_config() -> JobConfig {
    JobConfig {
        delay: Duration::ZERO,
        timeout: Duration::from_millis(500),
        max_retries: 0,
        retry_delay: Duration::ZERO,
    }
}

async fn mount_page(server: &MockServer, page: &str, html: &str) {
    Mock::given(method("GET"))
        .and(path(page))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(html)
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_success_then_timeout_with_politeness_delay() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(&mock_server, "/a", "<title>Hi</title><p>hello world</p>").await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&mock_server)
        .await;

    let job = Job::new(
        [format!("{}/a", base_url), format!("{}/b", base_url)],
        JobConfig {
            delay: Duration::from_secs_f64(2.0),
            timeout: Duration::from_millis(300),
            max_retries: 0,
            retry_delay: Duration::ZERO,
        },
    );

    let start = Instant::now();
    let records: Vec<Record> = test_scheduler().run(job).collect().await;
    let elapsed = start.elapsed();

    assert_eq!(records.len(), 2);

    let a = &records[0];
    assert_eq!(a.url, format!("{}/a", base_url));
    assert_eq!(a.status, ScrapeStatus::Success);
    assert_eq!(a.title.as_deref(), Some("Hi"));
    assert_eq!(a.text.as_deref(), Some("hello world"));
    assert_eq!(a.http_code, Some(200));

    let b = &records[1];
    assert_eq!(b.url, format!("{}/b", base_url));
    assert_eq!(b.status, ScrapeStatus::Timeout);
    assert_eq!(b.text, None);
    assert_eq!(b.http_code, None);

    // B was not issued until 2s after A was issued
    assert!(elapsed >= Duration::from_secs(2), "elapsed {:?}", elapsed);
    assert!(b.fetched_at - a.fetched_at >= chrono::Duration::seconds(2));
}

#[tokio::test]
async fn test_retries_respect_politeness_delay() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/unavailable"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&mock_server)
        .await;
    mount_page(&mock_server, "/next", "<p>next page</p>").await;

    let job = Job::new(
        [format!("{}/unavailable", base_url), format!("{}/next", base_url)],
        JobConfig {
            delay: Duration::from_secs(1),
            timeout: Duration::from_millis(500),
            max_retries: 2,
            retry_delay: Duration::ZERO,
        },
    );

    let start = Instant::now();
    let records: Vec<Record> = test_scheduler().run(job).collect().await;
    let elapsed = start.elapsed();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].status, ScrapeStatus::HttpError);
    assert_eq!(records[0].http_code, Some(503));
    assert_eq!(records[1].status, ScrapeStatus::Success);

    // Three attempts on the first URL and one on the second, a second apart
    assert!(elapsed >= Duration::from_secs(3), "elapsed {:?}", elapsed);

    let received = mock_server
        .received_requests()
        .await
        .expect("Request recording enabled");
    assert_eq!(received.len(), 4);
}

#[tokio::test]
async fn test_n_urls_yield_n_records_in_order() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(&mock_server, "/ok", "<html><body>fine</body></html>").await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/empty"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let urls = vec![
        format!("{}/missing", base_url),
        "definitely not a url".to_string(),
        format!("{}/ok", base_url),
        format!("{}/broken", base_url),
        format!("{}/empty", base_url),
    ];
    let job = Job::new(urls.clone(), fast_config());

    let records: Vec<Record> = test_scheduler().run(job).collect().await;

    assert_eq!(records.len(), urls.len());
    let statuses: Vec<ScrapeStatus> = records.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        vec![
            ScrapeStatus::HttpError,
            ScrapeStatus::InvalidUrl,
            ScrapeStatus::Success,
            ScrapeStatus::HttpError,
            ScrapeStatus::ParseError,
        ]
    );
    assert_eq!(records[0].http_code, Some(404));
    assert_eq!(records[1].url, "definitely not a url");
    assert_eq!(records[3].http_code, Some(500));
    assert_eq!(records[4].http_code, Some(200));

    for record in &records {
        assert!(record.check_invariants().is_ok());
    }
}

#[tokio::test]
async fn test_dropping_stream_stops_fetching() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<p>page</p>"))
        .mount(&mock_server)
        .await;

    let job = Job::new(
        (1..=3).map(|i| format!("{}/page{}", base_url, i)),
        fast_config(),
    );

    let first: Vec<Record> = test_scheduler().run(job).take(1).collect().await;
    assert_eq!(first.len(), 1);

    let received = mock_server
        .received_requests()
        .await
        .expect("Request recording enabled");
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].url.path(), "/page1");
}

#[tokio::test]
async fn test_harvest_deduplicates_and_exports() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(
        &mock_server,
        "/",
        r#"<html lang="en"><head><title>Home</title>
           <meta name="description" content="The home page"></head>
           <body><h1>Welcome</h1><p>Crabs love Rust. Rust loves crabs.</p>
           <script>tracking()</script></body></html>"#,
    )
    .await;
    mount_page(
        &mock_server,
        "/about",
        "<html><head><title>About</title></head><body>About the crabs</body></html>",
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(410))
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("harvest.db");
    let store = SqliteStore::open(&db_path).unwrap();
    let scheduler = test_scheduler();

    // The same pages spelled several ways map to one record each
    let urls = vec![
        format!("{}/", base_url),
        format!("{}/about", base_url),
        format!("{}/about/?utm_source=newsletter#team", base_url),
        format!("{}/gone", base_url),
        "ftp://example.com/file".to_string(),
    ];

    let report = harvest(&scheduler, &store, Job::new(urls.clone(), fast_config()), "hash-1")
        .await
        .unwrap();

    assert_eq!(report.total_urls, 5);
    assert_eq!(report.successful(), 3);
    assert_eq!(report.failed(), 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(store.count().unwrap(), 3);

    // A second run replaces every row with a newer fetch
    let second = harvest(&scheduler, &store, Job::new(urls, fast_config()), "hash-2")
        .await
        .unwrap();
    assert_eq!(second.stale, 0);
    assert_eq!(store.count().unwrap(), 3);
    assert_eq!(store.sessions().unwrap().len(), 2);
    assert_eq!(store.latest_session().unwrap().unwrap().config_hash, "hash-2");

    let home = store.get(&format!("{}/", base_url)).unwrap().unwrap();
    assert_eq!(home.title.as_deref(), Some("Home"));
    assert_eq!(
        home.text.as_deref(),
        Some("Welcome Crabs love Rust. Rust loves crabs.")
    );
    assert_eq!(
        home.metadata.get("description").map(String::as_str),
        Some("The home page")
    );

    let gone = store.get(&format!("{}/gone", base_url)).unwrap().unwrap();
    assert_eq!(gone.status, ScrapeStatus::HttpError);
    assert_eq!(gone.http_code, Some(410));

    // Exports of the snapshot round-trip exactly
    let snapshot = store.all().unwrap();
    assert_eq!(snapshot.len(), 3);

    let mut csv = Vec::new();
    export(snapshot.records(), ExportFormat::Csv, &mut csv).unwrap();
    assert_eq!(read_csv(csv.as_slice()).unwrap(), snapshot.records());

    let mut json = Vec::new();
    export(snapshot.records(), ExportFormat::Json, &mut json).unwrap();
    assert_eq!(read_json(json.as_slice()).unwrap(), snapshot.records());

    // Statistics over the same snapshot
    let stats = summarize(&snapshot, &SummaryOptions::default());
    assert_eq!(stats.total_records, 3);
    assert_eq!(stats.count_by_status[&ScrapeStatus::Success], 2);
    assert_eq!(stats.count_by_status[&ScrapeStatus::HttpError], 1);
    assert_eq!(stats.top_words[0], ("crabs".to_string(), 3));
    assert_eq!(stats.unique_domains, 1);

    // Data survives reopening the store
    drop(store);
    let reopened = SqliteStore::open(&db_path).unwrap();
    assert_eq!(reopened.count().unwrap(), 3);
}

#[tokio::test]
async fn test_concurrent_jobs_share_store() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<p>shared</p>"))
        .mount(&mock_server)
        .await;

    let store = SqliteStore::open_in_memory().unwrap();
    let scheduler = test_scheduler();

    let job_a = Job::new(
        (0..5).map(|i| format!("{}/a/{}", base_url, i)),
        fast_config(),
    );
    let job_b = Job::new(
        (0..5)
            .map(|i| format!("{}/b/{}", base_url, i))
            .chain(std::iter::once(format!("{}/a/0", base_url))),
        fast_config(),
    );

    let (report_a, report_b) = tokio::join!(
        harvest(&scheduler, &store, job_a, "a"),
        harvest(&scheduler, &store, job_b, "b"),
    );

    assert_eq!(report_a.unwrap().successful(), 5);
    assert_eq!(report_b.unwrap().successful(), 6);
    assert_eq!(store.count().unwrap(), 10);
    assert_eq!(store.sessions().unwrap().len(), 2);
}
