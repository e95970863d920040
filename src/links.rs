//! Internal-link extraction from rendered pages.

use std::collections::HashSet;

use log::{debug, warn};
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Extracts same-scope links from rendered HTML.
///
/// Recursion is crawl-level policy: a non-recursive extractor always returns
/// an empty set. Anchors under chrome elements on the exclusion list (print
/// controls and similar) never reach the frontier.
#[derive(Debug, Clone)]
pub struct LinkExtractor {
    scope: String,
    recursive: bool,
    excluded_classes: Vec<String>,
}

impl LinkExtractor {
    #[must_use]
    pub fn new(scope: impl Into<String>, recursive: bool, excluded_classes: Vec<String>) -> Self {
        Self {
            scope: scope.into(),
            recursive,
            excluded_classes,
        }
    }

    /// The URL prefix defining which links count as internal.
    #[must_use]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Absolute, fragment-stripped, in-scope links found on the page,
    /// deduplicated, in document order.
    #[must_use]
    pub fn extract(&self, html: &str, current_url: &str) -> Vec<String> {
        if !self.recursive {
            return Vec::new();
        }
        let Ok(base) = Url::parse(current_url) else {
            warn!("cannot resolve links against unparseable URL {current_url}");
            return Vec::new();
        };
        let Ok(anchor_selector) = Selector::parse("a[href]") else {
            return Vec::new();
        };

        let document = Html::parse_document(html);
        let mut seen = HashSet::new();
        let mut links = Vec::new();

        for anchor in document.select(&anchor_selector) {
            if self.in_excluded_subtree(anchor) {
                continue;
            }
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            let Ok(mut resolved) = base.join(href) else {
                continue;
            };
            // Fragments are client-side markers, not distinct resources.
            resolved.set_fragment(None);
            if !matches!(resolved.scheme(), "http" | "https") {
                continue;
            }
            let resolved = resolved.to_string();
            if resolved.starts_with(&self.scope) && seen.insert(resolved.clone()) {
                links.push(resolved);
            }
        }

        debug!(
            "found {} internal link(s) on {current_url}",
            links.len()
        );
        links
    }

    /// True when the element or any ancestor carries an excluded chrome class.
    fn in_excluded_subtree(&self, element: ElementRef<'_>) -> bool {
        std::iter::successors(Some(element), |el| {
            el.parent().and_then(ElementRef::wrap)
        })
        .any(|el| {
            el.value()
                .classes()
                .any(|class| self.excluded_classes.iter().any(|ex| ex == class))
        })
    }
}
