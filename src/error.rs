//! Error taxonomy for crawl runs.
//!
//! Per-URL errors are recorded and converted to skips inside the crawl loop;
//! only the aggregate "nothing succeeded" condition reaches the caller.

use thiserror::Error;

/// All failure modes a crawl run can encounter.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// The configuration could not be assembled.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// URL rejected by the safety policy. Recorded per URL, never fatal.
    #[error("unsafe URL {url}: {reason}")]
    UnsafeUrl { url: String, reason: String },

    /// The rendering engine could not be launched or re-launched.
    #[error("rendering session failed to start: {0}")]
    SessionStart(String),

    /// A navigation inside the rendering session failed. The session may be
    /// left in an unusable state, so callers recycle it before the next fetch.
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    /// The connectivity probe failed before any fetch was attempted.
    /// Distinct from HTTP-level failure so callers can reason about retries.
    #[error("connectivity check failed for {url}: {reason}")]
    Connectivity { url: String, reason: String },

    /// A one-shot HTTP retrieval failed at the transport level.
    #[error("fetch of {url} failed: {reason}")]
    Fetch { url: String, reason: String },

    /// The server answered with an error status. The page is skipped.
    #[error("skipped {url}: HTTP {status} response")]
    HttpStatus { url: String, status: u16 },

    /// Cleanup left zero text sections; the page contributes nothing.
    #[error("no extractable content at {0}")]
    EmptyContent(String),

    /// Raised at drain time only, when the whole run produced zero documents.
    /// Carries the last recorded per-URL error as its diagnostic.
    #[error("crawl produced no documents: {0}")]
    NoDocuments(String),

    /// The caller signalled cancellation between frontier iterations.
    #[error("crawl cancelled")]
    Cancelled,

    /// The batch consumer dropped its receiver mid-run.
    #[error("batch consumer went away")]
    ConsumerGone,
}

/// Convenience alias for Result with [`CrawlError`].
pub type CrawlResult<T> = Result<T, CrawlError>;
