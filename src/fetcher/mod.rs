//! Content retrieval: rendering-session navigation for HTML, one-shot HTTP
//! for binary documents.
//!
//! The dispatch rule is by final path segment: a known binary extension
//! (PDF) goes through a direct `reqwest` GET and the type-specific text
//! extractor, everything else through the rendering session — script
//! execution and link discovery need a live DOM, binary payloads do not.

use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info};
use url::Url;

use crate::config::ConnectorConfig;
use crate::error::{CrawlError, CrawlResult};
use crate::session::{RenderingSession, SessionOptions};

/// Raw payload of one fetched URL.
#[derive(Debug, Clone)]
pub enum FetchedBody {
    /// Rendered DOM of an HTML page.
    Html(String),
    /// Raw bytes of a binary document.
    Pdf(Vec<u8>),
}

/// Transport outcome for one URL.
#[derive(Debug, Clone)]
pub struct RawFetch {
    pub requested_url: String,
    /// Canonical URL after redirects.
    pub final_url: String,
    pub status: Option<u16>,
    pub body: FetchedBody,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Seam between the crawl engine and the transport layer.
///
/// The engine only ever talks to this trait; the production implementation
/// is [`SessionFetcher`], tests substitute a scripted one.
pub trait PageFetcher {
    /// Retrieve one URL.
    fn fetch(&mut self, url: &str) -> impl Future<Output = CrawlResult<RawFetch>>;

    /// Mark the underlying session for restart. The restart itself happens
    /// lazily, immediately before the next navigation attempt.
    fn recycle(&mut self);

    /// Release all transport resources. Must be safe on every exit path.
    fn shutdown(&mut self) -> impl Future<Output = ()>;
}

/// Production fetcher backed by one rendering session and one HTTP client.
pub struct SessionFetcher {
    session: RenderingSession,
    http: reqwest::Client,
    connectivity_timeout: Duration,
    needs_restart: bool,
}

impl SessionFetcher {
    /// Start the rendering session (applying the configured cookies) and
    /// build the HTTP client for the binary fetch path.
    pub async fn start(config: &ConnectorConfig) -> CrawlResult<Self> {
        let session = RenderingSession::start(
            config.cookies().to_vec(),
            SessionOptions {
                headless: config.headless(),
                navigation_timeout: Duration::from_secs(config.navigation_timeout_secs()),
            },
        )
        .await?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| CrawlError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            session,
            http,
            connectivity_timeout: Duration::from_secs(config.connectivity_timeout_secs()),
            needs_restart: false,
        })
    }

    async fn fetch_binary(&self, url: &str) -> CrawlResult<RawFetch> {
        fetch_binary_document(&self.http, url).await
    }
}

impl PageFetcher for SessionFetcher {
    async fn fetch(&mut self, url: &str) -> CrawlResult<RawFetch> {
        probe_connectivity(&self.http, url, self.connectivity_timeout).await?;

        if self.needs_restart {
            self.session.restart().await?;
            self.needs_restart = false;
        }

        if is_binary_document(url) {
            debug!("binary fetch path for {url}");
            return self.fetch_binary(url).await;
        }

        let page = self.session.navigate(url).await?;
        Ok(RawFetch {
            requested_url: page.requested_url,
            final_url: page.final_url,
            status: page.status,
            last_modified: page
                .last_modified
                .as_deref()
                .and_then(parse_http_date),
            body: FetchedBody::Html(page.html),
        })
    }

    fn recycle(&mut self) {
        info!("rendering session marked for restart");
        self.needs_restart = true;
    }

    async fn shutdown(&mut self) {
        self.session.stop().await;
    }
}

/// Best-effort reachability probe for the URL's origin.
///
/// Any HTTP response proves the host is reachable; only transport-level
/// failures and timeouts surface, as [`CrawlError::Connectivity`], distinct
/// from per-page HTTP failures.
pub async fn probe_connectivity(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> CrawlResult<()> {
    let target = Url::parse(url)
        .map(|u| u.origin().ascii_serialization())
        .unwrap_or_else(|_| url.to_string());

    match tokio::time::timeout(timeout, client.head(&target).send()).await {
        Ok(Ok(_)) => Ok(()),
        Ok(Err(e)) => Err(CrawlError::Connectivity {
            url: url.to_string(),
            reason: e.to_string(),
        }),
        Err(_) => Err(CrawlError::Connectivity {
            url: url.to_string(),
            reason: format!("no response within {}s", timeout.as_secs()),
        }),
    }
}

/// One-shot retrieval of a binary document, bypassing the rendering session.
pub async fn fetch_binary_document(client: &reqwest::Client, url: &str) -> CrawlResult<RawFetch> {
    let fetch_err = |reason: String| CrawlError::Fetch {
        url: url.to_string(),
        reason,
    };

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| fetch_err(e.to_string()))?;

    let status = response.status().as_u16();
    let final_url = response.url().to_string();
    let last_modified = response
        .headers()
        .get(reqwest::header::LAST_MODIFIED)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_http_date);

    let bytes = response
        .bytes()
        .await
        .map_err(|e| fetch_err(format!("failed to read body: {e}")))?;

    Ok(RawFetch {
        requested_url: url.to_string(),
        final_url,
        status: Some(status),
        body: FetchedBody::Pdf(bytes.to_vec()),
        last_modified,
    })
}

/// Whether the URL's final path segment names a binary document type.
#[must_use]
pub fn is_binary_document(url: &str) -> bool {
    let path = Url::parse(url).map_or_else(|_| url.to_string(), |u| u.path().to_string());
    path.rsplit('/')
        .next()
        .and_then(|segment| segment.rsplit_once('.'))
        .is_some_and(|(_, ext)| ext.eq_ignore_ascii_case("pdf"))
}

/// Parse an HTTP `Last-Modified` header (RFC 1123/2822 date) into UTC.
#[must_use]
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn binary_dispatch_matches_final_path_segment() {
        assert!(is_binary_document("https://example.com/manual/handbook.pdf"));
        assert!(is_binary_document("https://example.com/a/B.PDF?download=1"));
        assert!(!is_binary_document("https://example.com/manual/pdf/"));
        assert!(!is_binary_document("https://example.com/manual/intro"));
        assert!(!is_binary_document("https://example.com/pdf.generator"));
    }

    #[test]
    fn http_date_parses_rfc1123() {
        let parsed = parse_http_date("Wed, 21 Oct 2015 07:28:00 GMT").unwrap();
        assert_eq!(parsed.year(), 2015);
        assert_eq!(parsed.month(), 10);
        assert_eq!(parsed.day(), 21);
    }

    #[test]
    fn http_date_rejects_garbage() {
        assert!(parse_http_date("not a date").is_none());
        assert!(parse_http_date("").is_none());
    }
}
