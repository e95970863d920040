//! Lifecycle management for the headless rendering session.
//!
//! One [`RenderingSession`] owns one live browser process plus the task that
//! drives its CDP connection. The session moves through
//! `Stopped -> Starting -> Ready -> Navigating -> Ready` and back to
//! `Stopped`; [`RenderingSession::restart`] is the recovery primitive the
//! crawl engine invokes after a failed navigation, since a single wedged
//! page can leave the whole session unusable.

mod launch;

use std::path::PathBuf;
use std::time::Duration;

use chromiumoxide::browser::Browser;
use chromiumoxide::cdp::browser_protocol::network::{
    CookieParam, EventResponseReceived, Headers,
};
use chromiumoxide::listeners::EventStream;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::CookieSpec;
use crate::error::{CrawlError, CrawlResult};

/// How long to drain buffered network events for the main document response
/// after navigation has already completed.
const RESPONSE_SCAN_TIMEOUT: Duration = Duration::from_millis(750);

/// Tunables for one rendering session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub headless: bool,
    /// Deadline for one navigation (goto + load + DOM serialization).
    pub navigation_timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            headless: true,
            navigation_timeout: Duration::from_secs(30),
        }
    }
}

/// Rendered DOM plus the transport metadata of the main document response.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub requested_url: String,
    /// Post-redirect URL reported by the browser.
    pub final_url: String,
    /// HTTP status of the main document, when the CDP stream surfaced it.
    pub status: Option<u16>,
    /// Serialized DOM after script execution.
    pub html: String,
    /// Raw `Last-Modified` header value, unparsed.
    pub last_modified: Option<String>,
}

struct SessionInner {
    browser: Browser,
    handler_task: JoinHandle<()>,
    user_data_dir: PathBuf,
}

/// Owning handle for one browser-like rendering session.
pub struct RenderingSession {
    inner: Option<SessionInner>,
    cookies: Vec<CookieSpec>,
    options: SessionOptions,
}

impl RenderingSession {
    fn new(cookies: Vec<CookieSpec>, options: SessionOptions) -> Self {
        Self {
            inner: None,
            cookies,
            options,
        }
    }

    /// Launch a session and apply the supplied cookies before any navigation.
    pub async fn start(cookies: Vec<CookieSpec>, options: SessionOptions) -> CrawlResult<Self> {
        let mut session = Self::new(cookies, options);
        session.launch().await?;
        Ok(session)
    }

    async fn launch(&mut self) -> CrawlResult<()> {
        let (browser, handler_task, user_data_dir) =
            launch::launch_browser(self.options.headless, self.options.navigation_timeout)
                .await
                .map_err(|e| CrawlError::SessionStart(format!("{e:#}")))?;
        self.inner = Some(SessionInner {
            browser,
            handler_task,
            user_data_dir,
        });
        self.apply_cookies().await?;
        info!("rendering session ready");
        Ok(())
    }

    /// Cookies set through `Network.setCookies` are browser-context wide, so
    /// a scratch page is enough to install them for all later navigations.
    async fn apply_cookies(&self) -> CrawlResult<()> {
        if self.cookies.is_empty() {
            return Ok(());
        }
        let inner = self.inner()?;
        let params = self.cookie_params()?;

        let page = inner
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| CrawlError::SessionStart(format!("cookie bootstrap page: {e}")))?;
        page.set_cookies(params)
            .await
            .map_err(|e| CrawlError::SessionStart(format!("failed to set cookies: {e}")))?;
        if let Err(e) = page.close().await {
            debug!("failed to close cookie bootstrap page: {e}");
        }
        debug!("applied {} session cookie(s)", self.cookies.len());
        Ok(())
    }

    /// Navigate to a URL and return the rendered page.
    ///
    /// The whole operation runs under the configured deadline; a hung
    /// navigation surfaces as a [`CrawlError::Navigation`] like any other
    /// failure, leaving the caller free to restart the session.
    pub async fn navigate(&self, url: &str) -> CrawlResult<RenderedPage> {
        let inner = self.inner()?;
        match tokio::time::timeout(
            self.options.navigation_timeout,
            navigate_once(&inner.browser, url),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(CrawlError::Navigation {
                url: url.to_string(),
                reason: format!(
                    "timed out after {}s",
                    self.options.navigation_timeout.as_secs()
                ),
            }),
        }
    }

    /// Tear down a possibly-wedged session and start a fresh one with the
    /// same cookie set.
    pub async fn restart(&mut self) -> CrawlResult<()> {
        info!("restarting rendering session");
        self.stop().await;
        self.launch().await
    }

    /// Release all session resources. Safe to call repeatedly, and safe to
    /// call on a session that never fully started.
    pub async fn stop(&mut self) {
        let Some(mut inner) = self.inner.take() else {
            return;
        };
        if let Err(e) = inner.browser.close().await {
            warn!("browser close failed: {e}");
        }
        if let Err(e) = inner.browser.wait().await {
            warn!("browser did not exit cleanly: {e}");
        }
        inner.handler_task.abort();
        if let Err(e) = tokio::fs::remove_dir_all(&inner.user_data_dir).await {
            debug!(
                "failed to remove session data dir {}: {e}",
                inner.user_data_dir.display()
            );
        }
        debug!("rendering session stopped");
    }

    /// Whether a live browser is currently attached.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.is_some()
    }

    /// CDP cookie parameters built from the retained cookie set. The set
    /// outlives the browser process, so every relaunch applies the exact
    /// cookies the session started with.
    fn cookie_params(&self) -> CrawlResult<Vec<CookieParam>> {
        self.cookies.iter().map(cookie_param).collect()
    }

    fn inner(&self) -> CrawlResult<&SessionInner> {
        self.inner
            .as_ref()
            .ok_or_else(|| CrawlError::SessionStart("session is stopped".to_string()))
    }
}

async fn navigate_once(browser: &Browser, url: &str) -> CrawlResult<RenderedPage> {
    let nav_err = |reason: String| CrawlError::Navigation {
        url: url.to_string(),
        reason,
    };

    let page = browser
        .new_page("about:blank")
        .await
        .map_err(|e| nav_err(format!("failed to open page: {e}")))?;

    // Listen before goto so the main document response is never missed.
    let mut responses = page
        .event_listener::<EventResponseReceived>()
        .await
        .map_err(|e| nav_err(format!("failed to attach response listener: {e}")))?;

    page.goto(url)
        .await
        .map_err(|e| nav_err(e.to_string()))?;
    page.wait_for_navigation()
        .await
        .map_err(|e| nav_err(format!("load did not complete: {e}")))?;

    let final_url = page
        .url()
        .await
        .map_err(|e| nav_err(format!("failed to read final URL: {e}")))?
        .unwrap_or_else(|| url.to_string());

    let (status, last_modified) = main_document_response(&mut responses, url, &final_url).await;

    let html = page
        .content()
        .await
        .map_err(|e| nav_err(format!("failed to serialize DOM: {e}")))?;

    if let Err(e) = page.close().await {
        debug!("failed to close page for {url}: {e}");
    }

    Ok(RenderedPage {
        requested_url: url.to_string(),
        final_url,
        status,
        html,
        last_modified,
    })
}

/// Scan the buffered response events for the main document, skipping
/// subresources. Navigation already finished, so the event is either
/// buffered or never coming; bounded by a short drain timeout.
async fn main_document_response(
    events: &mut EventStream<EventResponseReceived>,
    requested_url: &str,
    final_url: &str,
) -> (Option<u16>, Option<String>) {
    let scan = async {
        while let Some(event) = events.next().await {
            let response_url = event.response.url.as_str();
            if response_url == requested_url || response_url == final_url {
                let status = u16::try_from(event.response.status).ok();
                let last_modified = header_value(&event.response.headers, "last-modified");
                return (status, last_modified);
            }
        }
        (None, None)
    };
    match tokio::time::timeout(RESPONSE_SCAN_TIMEOUT, scan).await {
        Ok(found) => found,
        Err(_) => {
            debug!("no main document response event for {final_url}");
            (None, None)
        }
    }
}

/// Case-insensitive header lookup in the CDP headers object.
fn header_value(headers: &Headers, name: &str) -> Option<String> {
    headers
        .inner()
        .as_object()?
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .and_then(|(_, value)| value.as_str())
        .map(ToString::to_string)
}

fn cookie_param(spec: &CookieSpec) -> CrawlResult<CookieParam> {
    let mut builder = CookieParam::builder()
        .name(spec.name.clone())
        .value(spec.value.clone());
    if let Some(domain) = &spec.domain {
        builder = builder.domain(domain.clone());
    }
    if let Some(path) = &spec.path {
        builder = builder.path(path.clone());
    }
    builder
        .build()
        .map_err(|e| CrawlError::SessionStart(format!("invalid cookie '{}': {e}", spec.name)))
}
