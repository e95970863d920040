//! Conversion of fetched content into the canonical document shape.
//!
//! Title resolution follows a fixed precedence: breadcrumb trail, then the
//! title embedded in the cleaned content, then the URL itself. Chrome
//! elements on the exclusion list are stripped before any text is collected
//! so UI controls never leak into indexed text.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use log::debug;
use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

use crate::document::{Document, Section};
use crate::error::{CrawlError, CrawlResult};
use crate::fetcher::{FetchedBody, RawFetch};

/// Breadcrumb trail container inside the article header.
const BREADCRUMB_SELECTOR: &str = "#article #headerSide__nav__breadCrumbs li.b-breadCrumbs__item";

/// Main article body on pages that render their content into a hidden
/// container; falls back to the whole document when absent.
const CONTENT_ROOT_SELECTOR: &str = "#hiddenContent";

const BREADCRUMB_SEPARATOR: &str = " → ";

/// Converts fetched HTML or PDF content into [`Document`] records.
#[derive(Debug, Clone)]
pub struct DocumentNormalizer {
    source: String,
    excluded_classes: Vec<String>,
}

impl DocumentNormalizer {
    #[must_use]
    pub fn new(source: impl Into<String>, excluded_classes: Vec<String>) -> Self {
        Self {
            source: source.into(),
            excluded_classes,
        }
    }

    /// Normalize one fetch result. The canonical (post-redirect) URL becomes
    /// the document identifier.
    pub fn normalize(&self, fetch: &RawFetch) -> CrawlResult<Document> {
        match &fetch.body {
            FetchedBody::Html(html) => {
                self.normalize_html(html, &fetch.final_url, fetch.last_modified)
            }
            FetchedBody::Pdf(bytes) => {
                self.normalize_pdf(bytes, &fetch.final_url, fetch.last_modified)
            }
        }
    }

    fn normalize_html(
        &self,
        html: &str,
        url: &str,
        updated_at: Option<DateTime<Utc>>,
    ) -> CrawlResult<Document> {
        let parsed = Html::parse_document(html);

        let title = breadcrumb_title(&parsed)
            .or_else(|| self.content_title(&parsed))
            .unwrap_or_else(|| url.to_string());

        let root = content_root(&parsed);
        let text = self.collect_clean_text(root);
        if text.is_empty() {
            return Err(CrawlError::EmptyContent(url.to_string()));
        }

        Ok(Document {
            id: url.to_string(),
            sections: vec![Section {
                link: url.to_string(),
                text,
            }],
            source: self.source.clone(),
            semantic_identifier: title,
            metadata: HashMap::new(),
            updated_at,
        })
    }

    fn normalize_pdf(
        &self,
        bytes: &[u8],
        url: &str,
        updated_at: Option<DateTime<Utc>>,
    ) -> CrawlResult<Document> {
        let text = pdf_extract::extract_text_from_mem(bytes).map_err(|e| CrawlError::Fetch {
            url: url.to_string(),
            reason: format!("PDF text extraction failed: {e}"),
        })?;
        let text = squash_whitespace(&text);
        if text.is_empty() {
            return Err(CrawlError::EmptyContent(url.to_string()));
        }

        let filename = file_name(url);
        let mut metadata = HashMap::new();
        metadata.insert("content_type".to_string(), "application/pdf".to_string());
        metadata.insert("file_name".to_string(), filename.clone());

        Ok(Document {
            id: url.to_string(),
            sections: vec![Section {
                link: url.to_string(),
                text,
            }],
            source: self.source.clone(),
            semantic_identifier: filename,
            metadata,
            updated_at,
        })
    }

    /// Walk the content subtree, skipping excluded chrome and non-content
    /// elements, and normalize the surviving whitespace.
    fn collect_clean_text(&self, root: ElementRef<'_>) -> String {
        let mut raw = String::new();
        self.push_text(root, &mut raw);
        squash_whitespace(&raw)
    }

    fn push_text(&self, element: ElementRef<'_>, out: &mut String) {
        if self.is_excluded(element) {
            return;
        }
        for child in element.children() {
            match child.value() {
                Node::Text(text) => out.push_str(text),
                Node::Element(_) => {
                    if let Some(child_el) = ElementRef::wrap(child) {
                        self.push_text(child_el, out);
                    }
                }
                _ => {}
            }
        }
        if is_block_element(element.value().name()) {
            out.push('\n');
        }
    }

    fn is_excluded(&self, element: ElementRef<'_>) -> bool {
        if matches!(element.value().name(), "script" | "style" | "noscript") {
            return true;
        }
        element
            .value()
            .classes()
            .any(|class| self.excluded_classes.iter().any(|ex| ex == class))
    }

    fn in_excluded_subtree(&self, element: ElementRef<'_>) -> bool {
        std::iter::successors(Some(element), |el| el.parent().and_then(ElementRef::wrap))
            .any(|el| self.is_excluded(el))
    }

    /// Fallback title embedded in the cleaned content: `<title>`, then the
    /// first `<h1>` that is not chrome.
    fn content_title(&self, document: &Html) -> Option<String> {
        for raw in ["title", "h1"] {
            let Ok(selector) = Selector::parse(raw) else {
                continue;
            };
            for element in document.select(&selector) {
                if self.in_excluded_subtree(element) {
                    continue;
                }
                let text = collapse_inline(&self.collect_clean_text(element));
                if !text.is_empty() {
                    return Some(text);
                }
            }
        }
        None
    }
}

/// Reconstruct the breadcrumb trail title, when the page has one.
fn breadcrumb_title(document: &Html) -> Option<String> {
    let selector = Selector::parse(BREADCRUMB_SELECTOR).ok()?;
    let parts: Vec<String> = document
        .select(&selector)
        .map(|item| collapse_inline(&item.text().collect::<String>()))
        .filter(|part| !part.is_empty())
        .collect();
    if parts.is_empty() {
        debug!("no breadcrumb trail on page");
        None
    } else {
        Some(parts.join(BREADCRUMB_SEPARATOR))
    }
}

fn content_root(document: &Html) -> ElementRef<'_> {
    Selector::parse(CONTENT_ROOT_SELECTOR)
        .ok()
        .and_then(|selector| document.select(&selector).next())
        .unwrap_or_else(|| document.root_element())
}

fn is_block_element(name: &str) -> bool {
    matches!(
        name,
        "p" | "div"
            | "li"
            | "ul"
            | "ol"
            | "table"
            | "tr"
            | "br"
            | "section"
            | "article"
            | "header"
            | "footer"
            | "blockquote"
            | "pre"
            | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
    )
}

/// Collapse each line to single-spaced words and drop blank lines.
fn squash_whitespace(raw: &str) -> String {
    raw.lines()
        .map(collapse_inline)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn collapse_inline(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn file_name(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut segments| segments.next_back())
                .map(ToString::to_string)
        })
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| url.to_string())
}
