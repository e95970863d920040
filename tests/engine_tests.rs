//! Crawl-engine behavior against a scripted transport: traversal order,
//! deduplication, batching, partial failure, recovery and cancellation.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use tokio::sync::mpsc;

use webgather::engine::{CancelFlag, CrawlEngine, CrawlSummary};
use webgather::fetcher::{FetchedBody, PageFetcher, RawFetch};
use webgather::{ConnectorConfig, CrawlError, CrawlResult, DocumentBatch};

const SCOPE: &str = "https://example.com/manual/100/";

/// One scripted response for a URL.
#[derive(Clone)]
enum PageScript {
    /// Serve HTML, optionally under a different canonical URL.
    Html {
        final_url: Option<String>,
        status: u16,
        html: String,
    },
    /// Fail the navigation, as a wedged browser would.
    NavFail(String),
}

/// Transport stub driven by a URL-to-script table, recording every call.
#[derive(Default)]
struct ScriptedFetcher {
    pages: HashMap<String, PageScript>,
    fetch_log: Arc<Mutex<Vec<String>>>,
    recycles: Arc<AtomicUsize>,
    shutdowns: Arc<AtomicUsize>,
}

impl ScriptedFetcher {
    fn new(pages: Vec<(&str, PageScript)>) -> Self {
        Self {
            pages: pages
                .into_iter()
                .map(|(url, script)| (url.to_string(), script))
                .collect(),
            ..Self::default()
        }
    }

    fn probes(&self) -> (Arc<Mutex<Vec<String>>>, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        (
            Arc::clone(&self.fetch_log),
            Arc::clone(&self.recycles),
            Arc::clone(&self.shutdowns),
        )
    }
}

impl PageFetcher for ScriptedFetcher {
    async fn fetch(&mut self, url: &str) -> CrawlResult<RawFetch> {
        self.fetch_log.lock().unwrap().push(url.to_string());
        match self.pages.get(url) {
            Some(PageScript::Html {
                final_url,
                status,
                html,
            }) => Ok(RawFetch {
                requested_url: url.to_string(),
                final_url: final_url.clone().unwrap_or_else(|| url.to_string()),
                status: Some(*status),
                body: FetchedBody::Html(html.clone()),
                last_modified: None,
            }),
            Some(PageScript::NavFail(reason)) => Err(CrawlError::Navigation {
                url: url.to_string(),
                reason: reason.clone(),
            }),
            None => Err(CrawlError::Fetch {
                url: url.to_string(),
                reason: "no script for URL".to_string(),
            }),
        }
    }

    fn recycle(&mut self) {
        self.recycles.fetch_add(1, Ordering::SeqCst);
    }

    async fn shutdown(&mut self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

fn page(title: &str, links: &[&str]) -> PageScript {
    let anchors: String = links
        .iter()
        .map(|link| format!(r#"<a href="{link}">{link}</a>"#))
        .collect();
    PageScript::Html {
        final_url: None,
        status: 200,
        html: format!(
            "<html><head><title>{title}</title></head>\
             <body><p>{title} body text.</p>{anchors}</body></html>"
        ),
    }
}

fn redirecting_page(title: &str, final_url: &str) -> PageScript {
    PageScript::Html {
        final_url: Some(final_url.to_string()),
        status: 200,
        html: format!("<html><body><p>{title} body text.</p></body></html>"),
    }
}

fn config(seeds: &[&str], batch_size: usize) -> ConnectorConfig {
    ConnectorConfig::builder()
        .seed_urls(seeds.to_vec())
        .recursive(true)
        .batch_size(batch_size)
        .dns_check(false)
        .build()
        .unwrap()
}

/// Run a crawl over the scripted fetcher, collecting every emitted batch.
async fn run_crawl(
    config: ConnectorConfig,
    fetcher: ScriptedFetcher,
) -> (CrawlResult<CrawlSummary>, Vec<DocumentBatch>) {
    let _ = env_logger::builder().is_test(true).try_init();
    let (sink, mut stream) = mpsc::channel(32);
    let result = CrawlEngine::with_fetcher(config, fetcher)
        .run(sink, CancelFlag::new())
        .await;
    let mut batches = Vec::new();
    while let Ok(batch) = stream.try_recv() {
        batches.push(batch);
    }
    (result, batches)
}

fn url(path: &str) -> String {
    format!("{SCOPE}{path}")
}

#[tokio::test]
async fn cyclic_site_is_fetched_exactly_once_per_page() {
    let a = url("a");
    let b = url("b");
    let fetcher = ScriptedFetcher::new(vec![
        (SCOPE, page("home", &[&a, &b])),
        (&a, page("a", &[&b, SCOPE])),
        (&b, page("b", &[&a, SCOPE])),
    ]);
    let (log, ..) = fetcher.probes();

    let (result, _) = run_crawl(config(&[SCOPE], 16), fetcher).await;
    let summary = result.unwrap();

    assert_eq!(summary.documents_emitted, 3);
    let log = log.lock().unwrap();
    assert_eq!(log.len(), 3);
    let unique: std::collections::HashSet<_> = log.iter().collect();
    assert_eq!(unique.len(), 3);
}

#[tokio::test]
async fn newest_links_are_explored_first() {
    let a = url("a");
    let b = url("b");
    let deep = url("b/deep");
    let fetcher = ScriptedFetcher::new(vec![
        (SCOPE, page("home", &[&a, &b])),
        (&a, page("a", &[])),
        (&b, page("b", &[&deep])),
        (&deep, page("deep", &[])),
    ]);
    let (log, ..) = fetcher.probes();

    let (result, _) = run_crawl(config(&[SCOPE], 16), fetcher).await;
    result.unwrap();

    // Depth-first: the most recently discovered link is visited next.
    assert_eq!(
        *log.lock().unwrap(),
        [SCOPE.to_string(), b.clone(), deep, a]
    );
}

#[tokio::test]
async fn batches_fill_to_the_configured_size() {
    let pages: Vec<String> = (1..=4).map(|n| url(&format!("p{n}"))).collect();
    let links: Vec<&str> = pages.iter().map(String::as_str).collect();
    let mut scripts = vec![(SCOPE, page("home", &links))];
    for (n, page_url) in pages.iter().enumerate() {
        scripts.push((page_url.as_str(), page(&format!("p{n}"), &[])));
    }
    let fetcher = ScriptedFetcher::new(scripts);

    let (result, batches) = run_crawl(config(&[SCOPE], 2), fetcher).await;
    let summary = result.unwrap();

    assert_eq!(summary.documents_emitted, 5);
    assert_eq!(summary.batches_emitted, 3);
    assert_eq!(
        batches.iter().map(Vec::len).collect::<Vec<_>>(),
        [2, 2, 1]
    );
}

#[tokio::test]
async fn out_of_scope_links_are_never_followed() {
    let inside = url("inside");
    let fetcher = ScriptedFetcher::new(vec![(
        SCOPE,
        page(
            "home",
            &[
                &inside,
                "https://example.com/manual/99/other-version",
                "https://elsewhere.example.org/page",
            ],
        ),
    ), (&inside, page("inside", &[]))]);
    let (log, ..) = fetcher.probes();

    let (result, _) = run_crawl(config(&[SCOPE], 16), fetcher).await;
    result.unwrap();

    assert_eq!(*log.lock().unwrap(), [SCOPE.to_string(), inside]);
}

#[tokio::test]
async fn failed_pages_are_skipped_without_aborting_the_run() {
    let good = url("good");
    let hollow = url("hollow");
    let fetcher = ScriptedFetcher::new(vec![
        (SCOPE, page("home", &[&good, &hollow])),
        (&good, page("good", &[])),
        // Nothing but chrome: cleans down to empty content.
        (
            &hollow,
            PageScript::Html {
                final_url: None,
                status: 200,
                html: "<html><body><script>x()</script></body></html>".to_string(),
            },
        ),
    ]);

    let (result, batches) = run_crawl(config(&[SCOPE], 16), fetcher).await;
    let summary = result.unwrap();

    assert_eq!(summary.documents_emitted, 2);
    assert_eq!(summary.pages_skipped, 1);
    assert_eq!(batches.len(), 1);
}

#[tokio::test]
async fn run_with_no_documents_is_an_error_and_emits_nothing() {
    let fetcher = ScriptedFetcher::new(vec![(
        SCOPE,
        PageScript::NavFail("net::ERR_CONNECTION_RESET".to_string()),
    )]);
    let (_, _, shutdowns) = fetcher.probes();

    let (result, batches) = run_crawl(config(&[SCOPE], 16), fetcher).await;

    assert!(matches!(result, Err(CrawlError::NoDocuments(_))));
    assert!(batches.is_empty());
    assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn error_status_pages_contribute_no_links() {
    let gone = url("gone");
    let orphan = url("orphan");
    let fetcher = ScriptedFetcher::new(vec![
        (SCOPE, page("home", &[&gone])),
        (
            &gone,
            PageScript::Html {
                final_url: None,
                status: 404,
                html: format!(
                    r#"<html><body><p>Not found.</p><a href="{orphan}">x</a></body></html>"#
                ),
            },
        ),
        (&orphan, page("orphan", &[])),
    ]);
    let (log, ..) = fetcher.probes();

    let (result, _) = run_crawl(config(&[SCOPE], 16), fetcher).await;
    let summary = result.unwrap();

    assert_eq!(summary.documents_emitted, 1);
    assert_eq!(summary.pages_skipped, 1);
    assert!(!log.lock().unwrap().contains(&orphan));
}

#[tokio::test]
async fn redirect_to_visited_page_is_not_indexed_twice() {
    let canonical = url("intro");
    let alias = url("intro-alias");
    // LIFO frontier visits the last seed first.
    let fetcher = ScriptedFetcher::new(vec![
        (&canonical, page("intro", &[])),
        (&alias, redirecting_page("alias", &canonical)),
    ]);
    let (log, ..) = fetcher.probes();

    let (result, batches) =
        run_crawl(config(&[alias.as_str(), canonical.as_str()], 16), fetcher).await;
    let summary = result.unwrap();

    assert_eq!(log.lock().unwrap().len(), 2);
    assert_eq!(summary.documents_emitted, 1);
    assert_eq!(summary.pages_skipped, 1);
    assert_eq!(batches.concat().len(), 1);
}

#[tokio::test]
async fn navigation_failure_recycles_the_session_and_continues() {
    let wedged = url("wedged");
    let after = url("after");
    let fetcher = ScriptedFetcher::new(vec![
        (SCOPE, page("home", &[&after, &wedged])),
        (&wedged, PageScript::NavFail("timed out after 30s".to_string())),
        (&after, page("after", &[])),
    ]);
    let (log, recycles, _) = fetcher.probes();

    let (result, _) = run_crawl(config(&[SCOPE], 16), fetcher).await;
    let summary = result.unwrap();

    assert_eq!(recycles.load(Ordering::SeqCst), 1);
    assert_eq!(summary.documents_emitted, 2);
    assert!(log.lock().unwrap().contains(&after));
}

#[tokio::test]
async fn transport_failure_also_marks_the_session_for_restart() {
    let good = url("good");
    let torn = url("torn.pdf");
    // No script for the PDF: the fetch fails at the transport level rather
    // than as a navigation error.
    let fetcher = ScriptedFetcher::new(vec![
        (SCOPE, page("home", &[&good, &torn])),
        (&good, page("good", &[])),
    ]);
    let (_, recycles, _) = fetcher.probes();

    let (result, _) = run_crawl(config(&[SCOPE], 16), fetcher).await;
    let summary = result.unwrap();

    assert_eq!(recycles.load(Ordering::SeqCst), 1);
    assert_eq!(summary.documents_emitted, 2);
    assert_eq!(summary.pages_skipped, 1);
}

#[tokio::test]
async fn cancellation_stops_the_crawl_and_releases_the_session() {
    let fetcher = ScriptedFetcher::new(vec![(SCOPE, page("home", &[]))]);
    let (log, _, shutdowns) = fetcher.probes();

    let (sink, _stream) = mpsc::channel(32);
    let cancel = CancelFlag::new();
    cancel.cancel();
    let result = CrawlEngine::with_fetcher(config(&[SCOPE], 16), fetcher)
        .run(sink, cancel)
        .await;

    assert!(matches!(result, Err(CrawlError::Cancelled)));
    assert!(log.lock().unwrap().is_empty());
    assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn dropped_consumer_aborts_the_crawl() {
    let fetcher = ScriptedFetcher::new(vec![(SCOPE, page("home", &[]))]);
    let (_, _, shutdowns) = fetcher.probes();

    let (sink, stream) = mpsc::channel(1);
    drop(stream);
    let result = CrawlEngine::with_fetcher(config(&[SCOPE], 1), fetcher)
        .run(sink, CancelFlag::new())
        .await;

    assert!(matches!(result, Err(CrawlError::ConsumerGone)));
    assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
}
