//! Typestate builder for [`ConnectorConfig`].
//!
//! The builder refuses to expose `build()` until at least one seed URL has
//! been supplied, so a configuration without seeds is a compile error rather
//! than a runtime surprise.

use std::marker::PhantomData;

use super::{ConnectorConfig, CookieSpec, DEFAULT_BATCH_SIZE, DEFAULT_EXCLUDED_CLASSES};
use crate::error::{CrawlError, CrawlResult};

/// Marker state: at least one seed URL has been provided.
pub struct Seeded;

pub struct ConnectorConfigBuilder<State = ()> {
    seed_urls: Vec<String>,
    recursive: bool,
    batch_size: usize,
    cookies: Vec<CookieSpec>,
    source: String,
    headless: bool,
    navigation_timeout_secs: u64,
    connectivity_timeout_secs: u64,
    excluded_element_classes: Vec<String>,
    blocked_hosts: Vec<String>,
    dns_check: bool,
    _state: PhantomData<State>,
}

impl Default for ConnectorConfigBuilder<()> {
    fn default() -> Self {
        Self {
            seed_urls: Vec::new(),
            recursive: false,
            batch_size: DEFAULT_BATCH_SIZE,
            cookies: Vec::new(),
            source: "web".to_string(),
            headless: true,
            navigation_timeout_secs: 30,
            connectivity_timeout_secs: 5,
            excluded_element_classes: DEFAULT_EXCLUDED_CLASSES
                .iter()
                .map(ToString::to_string)
                .collect(),
            blocked_hosts: Vec::new(),
            dns_check: true,
            _state: PhantomData,
        }
    }
}

impl<State> ConnectorConfigBuilder<State> {
    fn transition<Next>(self) -> ConnectorConfigBuilder<Next> {
        ConnectorConfigBuilder {
            seed_urls: self.seed_urls,
            recursive: self.recursive,
            batch_size: self.batch_size,
            cookies: self.cookies,
            source: self.source,
            headless: self.headless,
            navigation_timeout_secs: self.navigation_timeout_secs,
            connectivity_timeout_secs: self.connectivity_timeout_secs,
            excluded_element_classes: self.excluded_element_classes,
            blocked_hosts: self.blocked_hosts,
            dns_check: self.dns_check,
            _state: PhantomData,
        }
    }

    /// Add one seed URL. The first seed also fixes the crawl scope.
    #[must_use]
    pub fn seed_url(mut self, url: impl Into<String>) -> ConnectorConfigBuilder<Seeded> {
        self.seed_urls.push(url.into());
        self.transition()
    }

    /// Add several seed URLs at once.
    #[must_use]
    pub fn seed_urls<I, S>(mut self, urls: I) -> ConnectorConfigBuilder<Seeded>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.seed_urls.extend(urls.into_iter().map(Into::into));
        self.transition()
    }

    #[must_use]
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    #[must_use]
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Add one cookie to the session cookie set.
    #[must_use]
    pub fn cookie(mut self, cookie: CookieSpec) -> Self {
        self.cookies.push(cookie);
        self
    }

    #[must_use]
    pub fn cookies(mut self, cookies: Vec<CookieSpec>) -> Self {
        self.cookies = cookies;
        self
    }

    #[must_use]
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    #[must_use]
    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    #[must_use]
    pub fn navigation_timeout_secs(mut self, secs: u64) -> Self {
        self.navigation_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn connectivity_timeout_secs(mut self, secs: u64) -> Self {
        self.connectivity_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn excluded_element_classes(mut self, classes: Vec<String>) -> Self {
        self.excluded_element_classes = classes;
        self
    }

    #[must_use]
    pub fn blocked_hosts(mut self, hosts: Vec<String>) -> Self {
        self.blocked_hosts = hosts;
        self
    }

    #[must_use]
    pub fn dns_check(mut self, enabled: bool) -> Self {
        self.dns_check = enabled;
        self
    }
}

impl ConnectorConfigBuilder<Seeded> {
    /// Validate and freeze the configuration.
    pub fn build(self) -> CrawlResult<ConnectorConfig> {
        if self.batch_size == 0 {
            return Err(CrawlError::Config(
                "batch size must be at least 1".to_string(),
            ));
        }
        for seed in &self.seed_urls {
            if seed.trim().is_empty() {
                return Err(CrawlError::Config("seed URL is empty".to_string()));
            }
        }

        Ok(ConnectorConfig {
            seed_urls: self.seed_urls,
            recursive: self.recursive,
            batch_size: self.batch_size,
            cookies: self.cookies,
            source: self.source,
            headless: self.headless,
            navigation_timeout_secs: self.navigation_timeout_secs,
            connectivity_timeout_secs: self.connectivity_timeout_secs,
            excluded_element_classes: self.excluded_element_classes,
            blocked_hosts: self.blocked_hosts,
            dns_check: self.dns_check,
        })
    }
}
