//! Integration tests for the crawler
//!
//! These tests use wiremock to stand in for both the aggregator and the wider
//! web, and run whole poll cycles end-to-end against a temporary directory.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};
use ycrawler::config::Config;
use ycrawler::crawler::{CycleStatus, PollScheduler};
use ycrawler::item::ItemId;
use ycrawler::storage::{self, STAGING_DIR};

/// Creates a test configuration pointing at the mock aggregator
fn create_test_config(site: &MockServer, data_dir: &Path) -> Config {
    let mut config = Config::default();
    config.source.base_url = site.uri();
    config.output.data_dir = data_dir.to_path_buf();
    config.crawler.poll_interval = 1;
    config.crawler.fetch_timeout = 5;
    config.crawler.shutdown_grace = 1;
    config
}

fn html(body: impl Into<String>) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(body.into())
        .insert_header("content-type", "text/html; charset=utf-8")
}

/// Front page listing one row per id, each linking to `<web>/story/<id>`
fn front_page(web: &str, ids: &[&str]) -> String {
    let rows: String = ids
        .iter()
        .map(|id| {
            format!(
                r#"<tr class="athing" id="{id}">
                  <td class="title"><span class="titleline"><a href="{web}/story/{id}">Story {id}</a></span></td>
                </tr>
                <tr><td class="subtext"><a href="item?id={id}">discuss</a></td></tr>"#,
                id = id,
                web = web
            )
        })
        .collect();
    format!("<html><body><table>{}</table></body></html>", rows)
}

/// Discussion page whose comments link to each of `links`
fn discussion(links: &[String]) -> String {
    let comments: String = links
        .iter()
        .map(|link| {
            format!(
                r#"<tr class="athing comtr"><td><div class="comment">
                  <div class="commtext">see <a href="{}">this</a></div>
                  <div class="reply"><a href="reply?id=1">reply</a></div>
                </div></td></tr>"#,
                link
            )
        })
        .collect();
    format!("<html><body><table>{}</table></body></html>", comments)
}

async fn mount_front_page(site: &MockServer, web: &MockServer, ids: &[&str]) {
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(front_page(&web.uri(), ids)))
        .mount(site)
        .await;
}

async fn mount_stories(web: &MockServer) {
    Mock::given(method("GET"))
        .and(path_regex(r"^/story/[0-9]+$"))
        .respond_with(html("<html><body><p>A story</p></body></html>"))
        .mount(web)
        .await;
}

fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .expect("Failed to read item directory")
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn id(raw: &str) -> ItemId {
    ItemId::parse(raw).expect("Invalid test id")
}

#[tokio::test]
async fn test_cycle_skips_processed_items() {
    let site = MockServer::start().await;
    let web = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    // Item 2 was archived by an earlier run
    std::fs::create_dir(dir.path().join("2")).unwrap();

    mount_front_page(&site, &web, &["1", "2", "3"]).await;
    Mock::given(method("GET"))
        .and(path("/item"))
        .and(query_param("id", "2"))
        .respond_with(html(discussion(&[])))
        .expect(0)
        .mount(&site)
        .await;
    Mock::given(method("GET"))
        .and(path("/item"))
        .respond_with(html(discussion(&[])))
        .mount(&site)
        .await;
    Mock::given(method("GET"))
        .and(path("/story/2"))
        .respond_with(html("<p>story</p>"))
        .expect(0)
        .mount(&web)
        .await;
    mount_stories(&web).await;

    let config = create_test_config(&site, dir.path());
    let scheduler = PollScheduler::from_config(&config, CancellationToken::new())
        .expect("Failed to build scheduler");

    let report = scheduler.poll_once().await;

    assert_eq!(report.status, CycleStatus::Completed);
    assert_eq!(report.listed, 3);
    assert_eq!(report.dispatched, vec![id("1"), id("3")]);
    assert_eq!(report.items_downloaded(), 2);

    {
        let store = storage::lock(scheduler.store());
        for raw in ["1", "2", "3"] {
            assert!(store.is_processed(&id(raw)), "item {} not processed", raw);
        }
        assert_eq!(store.processed_count(), 3);
    }

    for raw in ["1", "3"] {
        let files = files_in(&dir.path().join(raw));
        assert_eq!(files, vec!["article.html".to_string()]);
    }
    assert!(files_in(&dir.path().join("2")).is_empty());
}

#[tokio::test]
async fn test_links_saved_next_to_article() {
    let site = MockServer::start().await;
    let web = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_front_page(&site, &web, &["4"]).await;
    Mock::given(method("GET"))
        .and(path("/item"))
        .and(query_param("id", "4"))
        .respond_with(html(discussion(&[
            format!("{}/paper.pdf", web.uri()),
            format!("{}/blog#section-2", web.uri()),
            format!("{}/user?id=someone", site.uri()),
        ])))
        .mount(&site)
        .await;
    mount_stories(&web).await;
    Mock::given(method("GET"))
        .and(path("/paper.pdf"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"%PDF-1.4".to_vec())
                .insert_header("content-type", "application/pdf"),
        )
        .expect(1)
        .mount(&web)
        .await;
    Mock::given(method("GET"))
        .and(path("/blog"))
        .respond_with(html("<p>blog</p>"))
        .expect(1)
        .mount(&web)
        .await;

    let config = create_test_config(&site, dir.path());
    let scheduler = PollScheduler::from_config(&config, CancellationToken::new()).unwrap();
    let report = scheduler.poll_once().await;

    assert_eq!(report.status, CycleStatus::Completed);
    assert_eq!(report.links_found(), 2);
    assert_eq!(report.links_saved(), 2);

    let files = files_in(&dir.path().join("4"));
    assert_eq!(files.len(), 3);
    assert!(files.contains(&"article.html".to_string()));
    let links: Vec<&String> = files.iter().filter(|f| f.starts_with("link-")).collect();
    assert_eq!(links.len(), 2);
    assert!(links.iter().any(|f| f.ends_with(".pdf")));
    assert!(links.iter().any(|f| f.ends_with(".html")));
}

#[tokio::test]
async fn test_discussion_failure_keeps_article() {
    let site = MockServer::start().await;
    let web = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_front_page(&site, &web, &["5"]).await;
    Mock::given(method("GET"))
        .and(path("/item"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&site)
        .await;
    mount_stories(&web).await;

    let config = create_test_config(&site, dir.path());
    let scheduler = PollScheduler::from_config(&config, CancellationToken::new()).unwrap();
    let report = scheduler.poll_once().await;

    assert_eq!(report.status, CycleStatus::Completed);
    assert_eq!(report.outcomes.len(), 1);
    assert!(report.outcomes[0].article_saved);
    assert!(!report.outcomes[0].discussion_fetched);
    assert!(storage::lock(scheduler.store()).is_processed(&id("5")));

    let files = files_in(&dir.path().join("5"));
    assert_eq!(files, vec!["article.html".to_string()]);
}

#[tokio::test]
async fn test_listing_failure_dispatches_nothing() {
    let site = MockServer::start().await;
    let web = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&site)
        .await;

    let config = create_test_config(&site, dir.path());
    let scheduler = PollScheduler::from_config(&config, CancellationToken::new()).unwrap();
    let report = scheduler.poll_once().await;

    assert_eq!(report.status, CycleStatus::ListingFailed);
    assert!(report.dispatched.is_empty());
    assert!(report.outcomes.is_empty());
    assert_eq!(storage::lock(scheduler.store()).processed_count(), 0);

    let requests = web.received_requests().await.unwrap_or_default();
    assert!(requests.is_empty());
}

#[tokio::test]
async fn test_restart_skips_archived_items() {
    let site = MockServer::start().await;
    let web = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_front_page(&site, &web, &["1", "2"]).await;
    Mock::given(method("GET"))
        .and(path("/item"))
        .respond_with(html(discussion(&[])))
        .expect(2)
        .mount(&site)
        .await;
    mount_stories(&web).await;

    let config = create_test_config(&site, dir.path());

    let first = PollScheduler::from_config(&config, CancellationToken::new()).unwrap();
    let report = first.poll_once().await;
    assert_eq!(report.dispatched.len(), 2);
    drop(first);

    // A crash left a half-written item behind
    let stale = dir.path().join(STAGING_DIR).join("9");
    std::fs::create_dir_all(&stale).unwrap();
    std::fs::write(stale.join("article.html"), "partial").unwrap();

    let second = PollScheduler::from_config(&config, CancellationToken::new()).unwrap();
    assert!(!stale.exists());
    {
        let store = storage::lock(second.store());
        assert_eq!(store.processed_count(), 2);
        assert!(!store.is_processed(&id("9")));
    }

    let report = second.poll_once().await;
    assert_eq!(report.status, CycleStatus::Completed);
    assert_eq!(report.listed, 2);
    assert!(report.dispatched.is_empty());
}

#[tokio::test]
async fn test_shutdown_mid_cycle_leaves_item_unprocessed() {
    let site = MockServer::start().await;
    let web = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_front_page(&site, &web, &["6"]).await;
    Mock::given(method("GET"))
        .and(path("/item"))
        .respond_with(html(discussion(&[])))
        .mount(&site)
        .await;
    Mock::given(method("GET"))
        .and(path("/story/6"))
        .respond_with(html("<p>slow</p>").set_delay(Duration::from_secs(30)))
        .mount(&web)
        .await;

    let mut config = create_test_config(&site, dir.path());
    config.crawler.fetch_timeout = 60;

    let token = CancellationToken::new();
    let scheduler = PollScheduler::from_config(&config, token.clone()).unwrap();

    let canceller = async {
        tokio::time::sleep(Duration::from_millis(300)).await;
        token.cancel();
    };
    let (report, _) = tokio::time::timeout(
        Duration::from_secs(10),
        async { tokio::join!(scheduler.poll_once(), canceller) },
    )
    .await
    .expect("Cycle did not stop after the grace period");

    assert_eq!(report.status, CycleStatus::Interrupted);
    assert_eq!(report.dispatched, vec![id("6")]);
    assert_eq!(report.launched, 1);
    assert!(report.outcomes.is_empty());
    assert!(!storage::lock(scheduler.store()).is_processed(&id("6")));
    assert!(!dir.path().join("6").exists());
    assert_eq!(scheduler.gate().in_flight(), 0);
}

#[tokio::test]
async fn test_shutdown_counts_items_never_started() {
    let site = MockServer::start().await;
    let web = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_front_page(&site, &web, &["10", "11"]).await;
    Mock::given(method("GET"))
        .and(path("/item"))
        .respond_with(html(discussion(&[])))
        .mount(&site)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/story/[0-9]+$"))
        .respond_with(html("<p>slow</p>").set_delay(Duration::from_secs(30)))
        .mount(&web)
        .await;

    let mut config = create_test_config(&site, dir.path());
    config.crawler.fetch_timeout = 60;
    config.crawler.max_concurrent_items = 1;

    let token = CancellationToken::new();
    let scheduler = PollScheduler::from_config(&config, token.clone()).unwrap();

    let canceller = async {
        tokio::time::sleep(Duration::from_millis(300)).await;
        token.cancel();
    };
    let (report, _) = tokio::time::timeout(Duration::from_secs(10), async {
        tokio::join!(scheduler.poll_once(), canceller)
    })
    .await
    .expect("Cycle did not stop after the grace period");

    assert_eq!(report.status, CycleStatus::Interrupted);
    assert_eq!(report.dispatched, vec![id("10"), id("11")]);
    assert_eq!(report.launched, 1);
    assert!(report.outcomes.is_empty());
    assert_eq!(storage::lock(scheduler.store()).processed_count(), 0);
}

/// Counts requests being served at the same moment
#[derive(Default)]
struct ConcurrencyTracker {
    current: AtomicUsize,
    peak: AtomicUsize,
    total: AtomicUsize,
}

impl ConcurrencyTracker {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.total.fetch_add(1, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Bare HTTP/1.1 server holding every request for `delay` before answering
///
/// `pages` maps request targets (path and query) to HTML bodies; any other
/// target gets a small default page.
async fn serve_slowly(
    listener: TcpListener,
    pages: HashMap<String, String>,
    tracker: Arc<ConcurrencyTracker>,
    delay: Duration,
) {
    let pages = Arc::new(pages);
    while let Ok((mut socket, _)) = listener.accept().await {
        let pages = pages.clone();
        let tracker = tracker.clone();
        tokio::spawn(async move {
            let mut request = Vec::new();
            let mut chunk = [0u8; 1024];
            while !request.windows(4).any(|w: &[u8]| w == b"\r\n\r\n") {
                match socket.read(&mut chunk).await {
                    Ok(0) | Err(_) => return,
                    Ok(n) => request.extend_from_slice(&chunk[..n]),
                }
            }
            let head = String::from_utf8_lossy(&request).into_owned();
            let target = head.split_whitespace().nth(1).unwrap_or("/").to_string();

            tracker.enter();
            tokio::time::sleep(delay).await;
            tracker.leave();

            let body = pages
                .get(&target)
                .cloned()
                .unwrap_or_else(|| "<p>page</p>".to_string());
            let response = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: text/html\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        });
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_gate_bounds_fetches_across_items_and_links() {
    let site_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let web_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let site_uri = format!("http://{}", site_listener.local_addr().unwrap());
    let web_uri = format!("http://{}", web_listener.local_addr().unwrap());

    let ids = ["1", "2", "3"];
    let mut site_pages = HashMap::new();
    site_pages.insert("/".to_string(), front_page(&web_uri, &ids));
    for item in ids {
        site_pages.insert(
            format!("/item?id={}", item),
            discussion(&[
                format!("{}/link/{}-a", web_uri, item),
                format!("{}/link/{}-b", web_uri, item),
            ]),
        );
    }

    let tracker = Arc::new(ConcurrencyTracker::default());
    let delay = Duration::from_millis(50);
    tokio::spawn(serve_slowly(site_listener, site_pages, tracker.clone(), delay));
    tokio::spawn(serve_slowly(web_listener, HashMap::new(), tracker.clone(), delay));

    let dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.source.base_url = site_uri;
    config.output.data_dir = dir.path().to_path_buf();
    config.crawler.max_concurrent_fetches = 1;

    let scheduler = PollScheduler::from_config(&config, CancellationToken::new()).unwrap();
    let report = scheduler.poll_once().await;

    assert_eq!(report.status, CycleStatus::Completed);
    assert_eq!(report.items_downloaded(), 3);
    assert_eq!(report.links_found(), 6);
    assert_eq!(report.links_saved(), 6);

    // Listing, then a discussion, an article and two links per item
    assert_eq!(tracker.total.load(Ordering::SeqCst), 13);
    assert_eq!(tracker.peak.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_run_stops_on_shutdown() {
    let site = MockServer::start().await;
    let web = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_front_page(&site, &web, &["8"]).await;
    Mock::given(method("GET"))
        .and(path("/item"))
        .respond_with(html(discussion(&[])))
        .mount(&site)
        .await;
    mount_stories(&web).await;

    let config = create_test_config(&site, dir.path());
    let token = CancellationToken::new();
    let scheduler = PollScheduler::from_config(&config, token.clone()).unwrap();

    let stopper = async {
        while !storage::lock(scheduler.store()).is_processed(&id("8")) {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        token.cancel();
    };

    tokio::time::timeout(Duration::from_secs(10), async {
        tokio::join!(scheduler.run(), stopper)
    })
    .await
    .expect("Scheduler did not stop on shutdown");

    assert!(dir.path().join("8").join("article.html").exists());
}
