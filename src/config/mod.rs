//! Connector configuration for a single crawl run.
//!
//! The configuration is assembled through the typestate builder in
//! [`builder`], which guarantees at compile time that a seed URL is present.

mod builder;

pub use builder::{ConnectorConfigBuilder, Seeded};

use serde::{Deserialize, Serialize};

/// Default documents-per-batch hand-off size.
pub const DEFAULT_BATCH_SIZE: usize = 16;

/// Navigation chrome pruned before link extraction and text cleanup.
pub const DEFAULT_EXCLUDED_CLASSES: &[&str] = &["m-controlButtons__item__print"];

/// One cookie injected into the rendering session before navigation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieSpec {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
}

/// Immutable configuration for one crawl run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorConfig {
    pub(crate) seed_urls: Vec<String>,
    pub(crate) recursive: bool,
    pub(crate) batch_size: usize,
    pub(crate) cookies: Vec<CookieSpec>,
    pub(crate) source: String,
    pub(crate) headless: bool,
    pub(crate) navigation_timeout_secs: u64,
    pub(crate) connectivity_timeout_secs: u64,
    pub(crate) excluded_element_classes: Vec<String>,
    pub(crate) blocked_hosts: Vec<String>,
    pub(crate) dns_check: bool,
}

impl ConnectorConfig {
    /// Start building a configuration. A seed URL is required before `build()`.
    #[must_use]
    pub fn builder() -> ConnectorConfigBuilder {
        ConnectorConfigBuilder::default()
    }

    /// Seed URLs pushed onto the frontier at crawl start, in order.
    #[must_use]
    pub fn seed_urls(&self) -> &[String] {
        &self.seed_urls
    }

    /// Whether internal links are followed beyond the seeds.
    #[must_use]
    pub fn recursive(&self) -> bool {
        self.recursive
    }

    /// Documents accumulated before a batch is handed to the consumer.
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Cookies applied to the rendering session before first navigation and
    /// re-applied identically after every session restart.
    #[must_use]
    pub fn cookies(&self) -> &[CookieSpec] {
        &self.cookies
    }

    /// Source-system tag stamped on every emitted document.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn headless(&self) -> bool {
        self.headless
    }

    /// Deadline for a single `page.goto` + load, in seconds. A hung
    /// navigation fails like any other navigation error once this elapses.
    #[must_use]
    pub fn navigation_timeout_secs(&self) -> u64 {
        self.navigation_timeout_secs
    }

    /// Deadline for the pre-fetch connectivity probe, in seconds.
    #[must_use]
    pub fn connectivity_timeout_secs(&self) -> u64 {
        self.connectivity_timeout_secs
    }

    /// Element classes treated as non-content chrome. Anchors and text under
    /// these elements never reach the frontier or the indexed text.
    #[must_use]
    pub fn excluded_element_classes(&self) -> &[String] {
        &self.excluded_element_classes
    }

    /// Extra hosts rejected by the URL guard on top of the built-in
    /// private-network policy.
    #[must_use]
    pub fn blocked_hosts(&self) -> &[String] {
        &self.blocked_hosts
    }

    /// Whether the URL guard resolves hostnames and checks the resulting
    /// addresses. Disabled for hermetic tests and air-gapped runs.
    #[must_use]
    pub fn dns_check(&self) -> bool {
        self.dns_check
    }
}
