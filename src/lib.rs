//! webgather crawls a scoped website through a headless rendering session
//! and turns every reachable page into a normalized document batch.
//!
//! The crawl starts from one or more seed URLs, follows internal links
//! depth-first within the scope defined by the first seed, and hands
//! documents to the consumer in bounded batches over a channel. HTML pages
//! render in the browser session (with configurable session cookies, for
//! sites gated behind access cookies); PDF documents are fetched directly
//! over HTTP and text-extracted.
//!
//! ```no_run
//! use webgather::{ConnectorConfig, crawl_collect};
//!
//! # async fn run() -> webgather::CrawlResult<()> {
//! let config = ConnectorConfig::builder()
//!     .seed_url("https://example.com/manual/100/")
//!     .recursive(true)
//!     .build()?;
//! let (summary, batches) = crawl_collect(config).await?;
//! println!("{} documents", summary.documents_emitted);
//! # let _ = batches;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod fetcher;
pub mod links;
pub mod manual_site;
pub mod normalize;
pub mod session;
pub mod url_guard;

pub use config::{ConnectorConfig, ConnectorConfigBuilder, CookieSpec};
pub use document::{Document, DocumentBatch, Section};
pub use engine::{CancelFlag, CrawlEngine, CrawlSummary};
pub use error::{CrawlError, CrawlResult};
pub use fetcher::{FetchedBody, PageFetcher, RawFetch, SessionFetcher};
pub use links::LinkExtractor;
pub use normalize::DocumentNormalizer;
pub use session::{RenderedPage, RenderingSession, SessionOptions};
pub use url_guard::UrlGuard;

use tokio::sync::mpsc;

/// How many batches may sit unconsumed before the crawl blocks.
const BATCH_CHANNEL_CAPACITY: usize = 4;

/// Run a crawl, streaming document batches through `sink`.
///
/// Convenience wrapper over [`CrawlEngine::start`] and [`CrawlEngine::run`].
pub async fn crawl(
    config: ConnectorConfig,
    sink: mpsc::Sender<DocumentBatch>,
    cancel: CancelFlag,
) -> CrawlResult<CrawlSummary> {
    let engine = CrawlEngine::start(config).await?;
    engine.run(sink, cancel).await
}

/// Run a crawl and collect every emitted batch in memory.
///
/// Suited to small scopes; large crawls should consume the stream through
/// [`crawl`] instead.
pub async fn crawl_collect(
    config: ConnectorConfig,
) -> CrawlResult<(CrawlSummary, Vec<DocumentBatch>)> {
    let (sink, mut stream) = mpsc::channel(BATCH_CHANNEL_CAPACITY);
    let collector = tokio::spawn(async move {
        let mut batches = Vec::new();
        while let Some(batch) = stream.recv().await {
            batches.push(batch);
        }
        batches
    });

    let summary = crawl(config, sink, CancelFlag::new()).await;
    let batches = collector.await.unwrap_or_default();
    Ok((summary?, batches))
}
