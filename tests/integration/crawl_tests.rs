//! End-to-end runs through `run_scrape`

use crate::common::{html_page, write_run, Recorder};
use tempfile::TempDir;
use template_scraper::crawler::run_scrape;
use template_scraper::output::{read_array, MetadataTable};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_page(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(html_page(body))
                .insert_header("content-type", "text/html; charset=utf-8"),
        )
        .mount(server)
        .await;
}

async fn mount_robots(server: &MockServer, status: u16, body: &str) {
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(server)
        .await;
}

const ARTICLE_TEMPLATE: &str = r#"{"selectors": {
    "title": "h1",
    "paragraphs": "//div[@class='content']/p",
    "author": ".author",
    "ads_excluded": ".ad"
}}"#;

#[tokio::test]
async fn test_text_only_run() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_robots(&server, 200, "User-agent: *\nAllow: /").await;
    mount_page(
        &server,
        "/article",
        "<h1>Hello</h1><div class='content'><p>One</p><p class='ad'>Buy!</p><p>Two</p></div>",
    )
    .await;

    let dir = TempDir::new().unwrap();
    let config = write_run(
        &dir,
        "text_only",
        ARTICLE_TEMPLATE,
        &[format!("{}/article", base)],
        "",
    );
    let observer = Recorder::default();
    let stats = run_scrape(&config, &observer).await.unwrap();

    assert_eq!(stats.succeeded, 1);
    assert_eq!(stats.flushes, 1);

    let items = read_array(&dir.path().join("out/test.json")).unwrap();
    assert_eq!(items.len(), 1);
    let record = &items[0];
    assert_eq!(record["url"], format!("{}/article", base));
    assert_eq!(record["title"], "Hello");
    assert_eq!(record["paragraphs"], serde_json::json!(["One", "Two"]));
    assert!(record["author"].is_null());
    assert!(record.get("ads_excluded").is_none());

    let keys: Vec<&String> = record.as_object().unwrap().keys().collect();
    assert_eq!(keys, vec!["url", "title", "paragraphs", "author"]);
}

#[tokio::test]
async fn test_robots_disallow_becomes_error_record() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_robots(&server, 200, "User-agent: *\nDisallow: /private/").await;
    mount_page(&server, "/public", "<h1>Open</h1>").await;
    Mock::given(method("GET"))
        .and(path("/private/page"))
        .respond_with(ResponseTemplate::new(200).set_body_string(html_page("<h1>Secret</h1>")))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = write_run(
        &dir,
        "text_only",
        r#"{"selectors": {"title": "h1"}}"#,
        &[format!("{}/private/page", base), format!("{}/public", base)],
        "",
    );
    let stats = run_scrape(&config, &Recorder::default()).await.unwrap();

    assert_eq!(stats.robots_blocked, 1);
    assert_eq!(stats.succeeded, 1);

    let items = read_array(&dir.path().join("out/test.json")).unwrap();
    assert_eq!(items[0]["error"], "Disallowed by robots.txt");
    assert_eq!(items[1]["title"], "Open");

    let log = std::fs::read_to_string(dir.path().join("out/test_errors.txt")).unwrap();
    assert_eq!(
        log,
        format!("{}/private/page\tDisallowed by robots.txt\n", base)
    );
}

#[tokio::test]
async fn test_robots_server_error_fails_open() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_robots(&server, 500, "oops").await;
    mount_page(&server, "/page", "<h1>Fine</h1>").await;

    let dir = TempDir::new().unwrap();
    let config = write_run(
        &dir,
        "text_only",
        r#"{"selectors": {"title": "h1"}}"#,
        &[format!("{}/page", base)],
        "",
    );
    let stats = run_scrape(&config, &Recorder::default()).await.unwrap();

    assert_eq!(stats.succeeded, 1);
    assert_eq!(stats.robots_blocked, 0);
}

#[tokio::test]
async fn test_robots_forbidden_disallows_everything() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_robots(&server, 403, "").await;
    mount_page(&server, "/page", "<h1>Fine</h1>").await;

    let dir = TempDir::new().unwrap();
    let config = write_run(
        &dir,
        "text_only",
        r#"{"selectors": {"title": "h1"}}"#,
        &[format!("{}/page", base)],
        "",
    );
    let stats = run_scrape(&config, &Recorder::default()).await.unwrap();

    assert_eq!(stats.robots_blocked, 1);
}

#[tokio::test]
async fn test_robots_can_be_ignored() {
    let server = MockServer::start().await;
    let base = server.uri();
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /"))
        .expect(0)
        .mount(&server)
        .await;
    mount_page(&server, "/page", "<h1>Fine</h1>").await;

    let dir = TempDir::new().unwrap();
    let config = write_run(
        &dir,
        "text_only",
        r#"{"selectors": {"title": "h1"}}"#,
        &[format!("{}/page", base)],
        "respect-robots = false",
    );
    let stats = run_scrape(&config, &Recorder::default()).await.unwrap();
    assert_eq!(stats.succeeded, 1);
}

#[tokio::test]
async fn test_urls_only_run_resolves_and_dedups_links() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_robots(&server, 404, "").await;
    mount_page(
        &server,
        "/list/1",
        "<ul class='items'><li><a href='../item/a'>A</a></li><li><a href='/item/b'>B</a></li>\
         <li><a href='mailto:x@y.z'>mail</a></li></ul>",
    )
    .await;
    mount_page(
        &server,
        "/list/2",
        "<ul class='items'><li><a href='/item/b'>B</a></li><li><a href='item/c'>C</a></li></ul>",
    )
    .await;

    let dir = TempDir::new().unwrap();
    let config = write_run(
        &dir,
        "urls_only",
        r#"{"selectors": {"items": "ul.items li"}}"#,
        &[
            format!("view-source:{}/list/1", base),
            format!("{}/list/2", base),
            format!("{}/missing", base),
        ],
        "",
    );
    let stats = run_scrape(&config, &Recorder::default()).await.unwrap();
    assert_eq!(stats.succeeded, 2);
    assert_eq!(stats.failed, 1);

    let content = std::fs::read_to_string(dir.path().join("out/test.txt")).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(
        lines,
        vec![
            format!("{}/item/a", base),
            format!("{}/item/b", base),
            format!("{}/list/item/c", base),
        ]
    );

    let log = std::fs::read_to_string(dir.path().join("out/test_errors.txt")).unwrap();
    assert!(log.starts_with(&format!("{}/missing\tHTTP status 404", base)));
}

#[tokio::test]
async fn test_text_metadata_run() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_robots(&server, 404, "").await;
    mount_page(
        &server,
        "/a",
        "<h1>First</h1><div class='content'><p>Alpha</p><p>Beta</p></div><span class='author'>Ann</span>",
    )
    .await;

    let dir = TempDir::new().unwrap();
    let mut config = write_run(
        &dir,
        "text_metadata",
        ARTICLE_TEMPLATE,
        &[format!("{}/a", base), format!("{}/gone", base)],
        "",
    );
    config.run.main_tags = vec!["title".to_string(), "paragraphs".to_string()];

    let stats = run_scrape(&config, &Recorder::default()).await.unwrap();
    assert_eq!(stats.processed, 2);

    let export = dir.path().join("out/test");
    assert_eq!(
        std::fs::read_to_string(export.join("1.txt")).unwrap(),
        "First\n\nAlpha\n\nBeta"
    );
    assert!(!export.join("2.txt").exists());

    let table = MetadataTable::load(&export.join("metadata.csv"));
    assert_eq!(table.row_count(), 2);
    assert_eq!(table.cell(0, "file_name"), Some("1.txt"));
    assert_eq!(table.cell(0, "author"), Some("Ann"));
    assert_eq!(table.cell(1, "file_name"), Some("ERROR"));

    let items = read_array(&export.join("scraped_data.json")).unwrap();
    assert_eq!(items.len(), 2);
}

#[tokio::test]
async fn test_previous_output_is_reset() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_robots(&server, 404, "").await;
    mount_page(&server, "/page", "<h1>Fresh</h1>").await;

    let dir = TempDir::new().unwrap();
    let config = write_run(
        &dir,
        "text_only",
        r#"{"selectors": {"title": "h1"}}"#,
        &[format!("{}/page", base)],
        "",
    );
    std::fs::create_dir_all(dir.path().join("out")).unwrap();
    std::fs::write(dir.path().join("out/test.json"), r#"[{"url": "old"}]"#).unwrap();
    std::fs::write(dir.path().join("out/test_errors.txt"), "old\terror\n").unwrap();

    run_scrape(&config, &Recorder::default()).await.unwrap();

    let items = read_array(&dir.path().join("out/test.json")).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["title"], "Fresh");
    assert!(!dir.path().join("out/test_errors.txt").exists());
}

#[tokio::test]
async fn test_invalid_template_aborts_before_fetching() {
    let dir = TempDir::new().unwrap();
    let config = write_run(
        &dir,
        "text_only",
        r#"{"title": "h1"}"#,
        &["https://example.com/".to_string()],
        "",
    );
    let err = run_scrape(&config, &Recorder::default()).await.unwrap_err();
    assert!(matches!(err, template_scraper::ScrapeError::Template(_)));
}
