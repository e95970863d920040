//! The crawl engine: frontier management, visit bookkeeping, batching.
//!
//! The engine owns the traversal state and talks to the transport layer only
//! through [`PageFetcher`]. Per-page failures are recorded and skipped; the
//! run as a whole fails only when cancelled, when the batch consumer goes
//! away, or when not a single document could be produced.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info, warn};
use tokio::sync::mpsc;

use crate::config::ConnectorConfig;
use crate::document::{Document, DocumentBatch};
use crate::error::{CrawlError, CrawlResult};
use crate::fetcher::{FetchedBody, PageFetcher, SessionFetcher};
use crate::links::LinkExtractor;
use crate::normalize::DocumentNormalizer;
use crate::url_guard::UrlGuard;

/// Cooperative cancellation handle, checked between frontier iterations.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Final accounting for a completed crawl.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    /// URLs popped from the frontier and attempted.
    pub pages_visited: usize,
    /// Pages attempted but not turned into documents.
    pub pages_skipped: usize,
    pub documents_emitted: usize,
    pub batches_emitted: usize,
}

/// Why one page produced no document.
enum SkipReason {
    RedirectAlreadyVisited(String),
    Rejected(CrawlError),
}

/// Result of visiting one frontier URL.
enum PageOutcome {
    Crawled(Box<Document>, Vec<String>),
    Skipped(SkipReason),
}

/// Depth-first crawl over one URL scope, generic over the transport.
pub struct CrawlEngine<F: PageFetcher> {
    config: ConnectorConfig,
    fetcher: F,
    guard: UrlGuard,
    links: LinkExtractor,
    normalizer: DocumentNormalizer,
}

impl CrawlEngine<SessionFetcher> {
    /// Start a rendering session and build the engine around it.
    pub async fn start(config: ConnectorConfig) -> CrawlResult<Self> {
        let fetcher = SessionFetcher::start(&config).await?;
        Ok(Self::with_fetcher(config, fetcher))
    }
}

impl<F: PageFetcher> CrawlEngine<F> {
    /// Build an engine over an already-running fetcher. The first seed URL
    /// defines the crawl scope.
    #[must_use]
    pub fn with_fetcher(config: ConnectorConfig, fetcher: F) -> Self {
        let scope = config.seed_urls()[0].clone();
        let guard = UrlGuard::new(config.blocked_hosts().to_vec(), config.dns_check());
        let links = LinkExtractor::new(
            scope,
            config.recursive(),
            config.excluded_element_classes().to_vec(),
        );
        let normalizer =
            DocumentNormalizer::new(config.source(), config.excluded_element_classes().to_vec());
        Self {
            config,
            fetcher,
            guard,
            links,
            normalizer,
        }
    }

    /// Run the crawl to completion, emitting full batches through `sink` as
    /// they fill and the final partial batch at the end.
    ///
    /// A full channel blocks the crawl until the consumer catches up. The
    /// fetcher is shut down on every exit path, including errors.
    pub async fn run(
        mut self,
        sink: mpsc::Sender<DocumentBatch>,
        cancel: CancelFlag,
    ) -> CrawlResult<CrawlSummary> {
        let outcome = self.run_inner(&sink, &cancel).await;
        self.fetcher.shutdown().await;
        outcome
    }

    async fn run_inner(
        &mut self,
        sink: &mpsc::Sender<DocumentBatch>,
        cancel: &CancelFlag,
    ) -> CrawlResult<CrawlSummary> {
        let mut frontier: Vec<String> = self.config.seed_urls().to_vec();
        let mut visited: HashSet<String> = HashSet::new();
        let mut batch: DocumentBatch = Vec::new();
        let mut summary = CrawlSummary::default();
        let mut last_error: Option<CrawlError> = None;

        info!(
            "starting crawl of {} seed(s), scope {}",
            frontier.len(),
            self.links.scope()
        );

        while let Some(url) = frontier.pop() {
            if cancel.is_cancelled() {
                info!("crawl cancelled after {} page(s)", summary.pages_visited);
                return Err(CrawlError::Cancelled);
            }
            if !visited.insert(url.clone()) {
                continue;
            }
            summary.pages_visited += 1;

            match self.visit(&url, &mut visited).await {
                PageOutcome::Crawled(document, new_links) => {
                    for link in new_links {
                        if !visited.contains(&link) {
                            frontier.push(link);
                        }
                    }
                    batch.push(*document);
                    summary.documents_emitted += 1;
                    if batch.len() >= self.config.batch_size() {
                        send_batch(sink, std::mem::take(&mut batch), &mut summary).await?;
                    }
                }
                PageOutcome::Skipped(reason) => {
                    summary.pages_skipped += 1;
                    match reason {
                        SkipReason::RedirectAlreadyVisited(target) => {
                            debug!("{url} redirected to already-visited {target}");
                        }
                        SkipReason::Rejected(error) => {
                            warn!("skipping {url}: {error}");
                            last_error = Some(error);
                        }
                    }
                }
            }
        }

        if !batch.is_empty() {
            send_batch(sink, std::mem::take(&mut batch), &mut summary).await?;
        }

        if summary.documents_emitted == 0 {
            let detail = match last_error {
                Some(error) => error.to_string(),
                None => "no valid pages found".to_string(),
            };
            return Err(CrawlError::NoDocuments(detail));
        }

        info!(
            "crawl finished: {} page(s) visited, {} document(s) in {} batch(es), {} skipped",
            summary.pages_visited,
            summary.documents_emitted,
            summary.batches_emitted,
            summary.pages_skipped
        );
        Ok(summary)
    }

    /// Visit one URL: guard, fetch, redirect bookkeeping, status check, link
    /// extraction, normalization. Every failure is a skip, never a run abort.
    async fn visit(&mut self, url: &str, visited: &mut HashSet<String>) -> PageOutcome {
        if let Err(error) = self.guard.validate(url).await {
            return PageOutcome::Skipped(SkipReason::Rejected(error));
        }

        let fetch = match self.fetcher.fetch(url).await {
            Ok(fetch) => fetch,
            Err(error) => {
                // Any failed fetch may leave the session wedged, not just a
                // failed navigation.
                self.fetcher.recycle();
                return PageOutcome::Skipped(SkipReason::Rejected(error));
            }
        };

        // Redirect targets count as visits of their own, or the same page
        // would be indexed once per alias.
        if fetch.final_url != url {
            if let Err(error) = self.guard.validate(&fetch.final_url).await {
                return PageOutcome::Skipped(SkipReason::Rejected(error));
            }
            if !visited.insert(fetch.final_url.clone()) {
                return PageOutcome::Skipped(SkipReason::RedirectAlreadyVisited(
                    fetch.final_url.clone(),
                ));
            }
        }

        // Failed responses contribute neither documents nor frontier links.
        if let Some(status) = fetch.status
            && status >= 400
        {
            return PageOutcome::Skipped(SkipReason::Rejected(CrawlError::HttpStatus {
                url: fetch.final_url.clone(),
                status,
            }));
        }

        let new_links = match &fetch.body {
            FetchedBody::Html(html) => self.links.extract(html, &fetch.final_url),
            FetchedBody::Pdf(_) => Vec::new(),
        };

        match self.normalizer.normalize(&fetch) {
            Ok(document) => PageOutcome::Crawled(Box::new(document), new_links),
            Err(error) => PageOutcome::Skipped(SkipReason::Rejected(error)),
        }
    }
}

async fn send_batch(
    sink: &mpsc::Sender<DocumentBatch>,
    batch: DocumentBatch,
    summary: &mut CrawlSummary,
) -> CrawlResult<()> {
    debug!("emitting batch of {} document(s)", batch.len());
    sink.send(batch)
        .await
        .map_err(|_| CrawlError::ConsumerGone)?;
    summary.batches_emitted += 1;
    Ok(())
}
