//! Site-specific adjustments applied to freshly extracted pages.
//!
//! Adapters form a closed, statically ordered list. The first adapter whose
//! [`SiteAdapter::can_handle`] accepts the page URL is applied; the others
//! are ignored.

use crate::parsers::text;
use crate::results::{ContentType, PageRecord};
use serde_json::Value;

/// Metadata key holding the article publish time, when the page declares one
const PUBLISHED_TIME_META: &str = "article:published_time";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteAdapter {
    /// News article pages (`/news/` in the URL)
    News,
    /// Endpoints that render a JSON payload (`/ajax/` in the URL)
    Ajax,
}

/// Adapters in selection order
pub const ADAPTERS: &[SiteAdapter] = &[SiteAdapter::News, SiteAdapter::Ajax];

impl SiteAdapter {
    pub fn name(&self) -> &'static str {
        match self {
            SiteAdapter::News => "news",
            SiteAdapter::Ajax => "ajax",
        }
    }

    pub fn can_handle(&self, url: &str) -> bool {
        let url = url.to_lowercase();
        match self {
            SiteAdapter::News => url.contains("/news/"),
            SiteAdapter::Ajax => url.contains("/ajax/"),
        }
    }

    /// Adjusts `record`. `raw_text` is the uncleaned root text the record
    /// was built from.
    pub fn apply(&self, record: PageRecord, raw_text: &str) -> PageRecord {
        match self {
            SiteAdapter::News => {
                let published = record.metadata().get(PUBLISHED_TIME_META).cloned();
                let record = record
                    .with_content_type(ContentType::Article)
                    .with_metadata("type", "news");
                match published {
                    Some(published) => record.with_metadata("published", published),
                    None => record,
                }
            }
            SiteAdapter::Ajax => {
                let Ok(payload) = serde_json::from_str::<Value>(raw_text.trim()) else {
                    ::log::debug!("Body of {} is not JSON, leaving page as is", record.url());
                    return record;
                };

                let mut leaves = Vec::new();
                collect_string_leaves(&payload, &mut leaves);
                let body_text = leaves.join(" ");
                record
                    .with_body_text(body_text)
                    .with_fragments(leaves)
                    .with_metadata("format", "json")
            }
        }
    }
}

/// Returns the first adapter that handles `url`
pub fn select(url: &str) -> Option<SiteAdapter> {
    ADAPTERS.iter().copied().find(|adapter| adapter.can_handle(url))
}

/// Collects every non-empty string in a JSON document, depth first
fn collect_string_leaves(value: &Value, leaves: &mut Vec<String>) {
    match value {
        Value::String(s) => {
            let cleaned = text::clean(s);
            if !cleaned.is_empty() {
                leaves.push(cleaned);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_string_leaves(item, leaves);
            }
        }
        Value::Object(map) => {
            for item in map.values() {
                collect_string_leaves(item, leaves);
            }
        }
        _ => {}
    }
}
