//! Canonical document shape handed to the indexing pipeline.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One contiguous span of extracted text together with its source link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub link: String,
    pub text: String,
}

/// A normalized document produced by one crawled page.
///
/// Invariants enforced by the normalizer: `id` is the canonical (post-redirect)
/// source URL, and `sections` is never empty for an emitted document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Stable identifier, equal to the canonical source URL.
    pub id: String,
    /// Ordered text sections. Never empty.
    pub sections: Vec<Section>,
    /// Source-system tag stamped from the connector configuration.
    pub source: String,
    /// Human-readable title, resolved by the title precedence policy.
    pub semantic_identifier: String,
    /// Open key/value metadata. Empty for plain HTML pages.
    pub metadata: HashMap<String, String>,
    /// Derived from the `Last-Modified` response header when present.
    pub updated_at: Option<DateTime<Utc>>,
}

/// A bounded group of documents handed to the consumer as one unit.
pub type DocumentBatch = Vec<Document>;
