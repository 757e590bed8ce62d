//! HTTP backend retries and the orchestrator loop against a mock server

use crate::common::{html_page, CountingWriter, Recorder};
use tempfile::TempDir;
use template_scraper::config::{FetchConfig, OutputMode};
use template_scraper::crawler::{parse_url_list, CancelFlag, Orchestrator, RunObserver};
use template_scraper::extract::Extractor;
use template_scraper::fetch::{FetchBackend, FetchError, HttpBackend, RetryPolicy};
use template_scraper::output::ErrorLog;
use template_scraper::Template;
use url::Url;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn backend(attempts: u32) -> HttpBackend {
    let config = FetchConfig {
        rotate_user_agent: false,
        timeout_secs: 5,
        ..FetchConfig::default()
    };
    HttpBackend::new(&config)
        .unwrap()
        .with_retry_policy(RetryPolicy::immediate(attempts))
}

#[tokio::test]
async fn test_503_then_200_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_string(html_page("<h1>Back</h1>")))
        .mount(&server)
        .await;

    let url = Url::parse(&format!("{}/flaky", server.uri())).unwrap();
    let observer = Recorder::default();
    let snapshots = backend(3).fetch(&url, &observer).await.unwrap();

    assert_eq!(snapshots.len(), 1);
    assert!(snapshots[0].html.contains("Back"));
    assert!(observer.contains("Request error on attempt 1"));
}

#[tokio::test]
async fn test_404_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let url = Url::parse(&format!("{}/gone", server.uri())).unwrap();
    let err = backend(3).fetch(&url, &Recorder::default()).await.unwrap_err();
    assert!(matches!(err, FetchError::Status { status: 404 }));
}

#[tokio::test]
async fn test_transient_errors_exhaust_the_budget() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(502))
        .expect(3)
        .mount(&server)
        .await;

    let url = Url::parse(&format!("{}/down", server.uri())).unwrap();
    let err = backend(3).fetch(&url, &Recorder::default()).await.unwrap_err();
    assert!(matches!(err, FetchError::Exhausted { attempts: 3, .. }));
}

#[tokio::test]
async fn test_empty_content_shares_the_budget() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/blank"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body>  </body></html>"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/blank"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/blank"))
        .respond_with(ResponseTemplate::new(200).set_body_string(html_page("<p>text</p>")))
        .mount(&server)
        .await;

    let url = Url::parse(&format!("{}/blank", server.uri())).unwrap();
    let observer = Recorder::default();

    let err = backend(2).fetch(&url, &observer).await.unwrap_err();
    assert!(matches!(err, FetchError::Exhausted { attempts: 2, .. }));
    assert!(observer.contains("Empty content on attempt 1, retrying..."));

    let snapshots = backend(2).fetch(&url, &observer).await.unwrap();
    assert!(snapshots[0].html.contains("text"));
}

#[tokio::test]
async fn test_empty_page_reports_empty_content() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/blank"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .expect(2)
        .mount(&server)
        .await;

    let url = Url::parse(&format!("{}/blank", server.uri())).unwrap();
    let err = backend(2).fetch(&url, &Recorder::default()).await.unwrap_err();
    assert!(matches!(err, FetchError::EmptyContent { attempts: 2 }));
}

#[tokio::test]
async fn test_250_urls_checkpoint_three_times() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/item/\d+$"))
        .respond_with(ResponseTemplate::new(200).set_body_string(html_page("<h1>Item</h1>")))
        .mount(&server)
        .await;

    let list: Vec<String> = (1..=250)
        .map(|i| format!("{}/item/{}", server.uri(), i))
        .collect();
    let entries = parse_url_list(&list.join("\n"));

    let dir = TempDir::new().unwrap();
    let template = Template::from_json_str(r#"{"selectors": {"title": "h1"}}"#).unwrap();
    let writer = CountingWriter::default();
    let mut orchestrator = Orchestrator::new(
        Box::new(backend(1)),
        Extractor::new(&template, OutputMode::TextOnly),
        Box::new(writer.clone()),
        ErrorLog::new(dir.path().join("errors.txt")),
    );

    let stats = orchestrator
        .run(&entries, &Recorder::default())
        .await
        .unwrap();

    assert_eq!(stats.succeeded, 250);
    assert_eq!(*writer.flushed.lock().unwrap(), vec![100, 100, 50]);
}

#[tokio::test]
async fn test_cancel_mid_run_keeps_processed_urls() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/item/\d+$"))
        .respond_with(ResponseTemplate::new(200).set_body_string(html_page("<h1>Item</h1>")))
        .mount(&server)
        .await;

    let list: Vec<String> = (1..=250)
        .map(|i| format!("{}/item/{}", server.uri(), i))
        .collect();
    let entries = parse_url_list(&list.join("\n"));

    let dir = TempDir::new().unwrap();
    let template = Template::from_json_str(r#"{"selectors": {"title": "h1"}}"#).unwrap();
    let writer = CountingWriter::default();
    let cancel = CancelFlag::new();
    let mut orchestrator = Orchestrator::new(
        Box::new(CancellingBackend {
            inner: backend(1),
            after: 150,
            seen: 0,
            cancel: cancel.clone(),
        }),
        Extractor::new(&template, OutputMode::TextOnly),
        Box::new(writer.clone()),
        ErrorLog::new(dir.path().join("errors.txt")),
    );

    let observer = Recorder {
        cancel,
        ..Recorder::default()
    };
    let stats = orchestrator.run(&entries, &observer).await.unwrap();

    assert!(stats.cancelled);
    assert_eq!(stats.processed, 150);
    assert_eq!(*writer.flushed.lock().unwrap(), vec![100, 50]);
    assert!(observer.contains("cancelled"));
}

/// Wraps the HTTP backend and raises the cancel flag after `after` fetches
struct CancellingBackend {
    inner: HttpBackend,
    after: usize,
    seen: usize,
    cancel: CancelFlag,
}

#[async_trait::async_trait]
impl FetchBackend for CancellingBackend {
    fn name(&self) -> &'static str {
        "cancelling"
    }

    async fn fetch(
        &mut self,
        url: &Url,
        observer: &dyn RunObserver,
    ) -> Result<Vec<template_scraper::fetch::PageSnapshot>, FetchError> {
        self.seen += 1;
        let result = self.inner.fetch(url, observer).await;
        if self.seen >= self.after {
            self.cancel.cancel();
        }
        result
    }
}
