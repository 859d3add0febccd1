use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Coarse classification of what a page contains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Article,
    Product,
    List,
    Form,
    General,
    Unknown,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Article => "article",
            ContentType::Product => "product",
            ContentType::List => "list",
            ContentType::Form => "form",
            ContentType::General => "general",
            ContentType::Unknown => "unknown",
        }
    }
}

/// Normalized extraction result for exactly one rendered page.
///
/// Records are immutable once built; the `with_*` methods return a new
/// record and are only used while a page is still being assembled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    url: String,
    title: String,
    body_text: String,
    fragments: Vec<String>,
    links: BTreeSet<String>,
    metadata: BTreeMap<String, String>,
    content_type: ContentType,
    fetched_at: DateTime<Utc>,
}

impl PageRecord {
    /// Create a new page record
    pub fn new(
        url: String,
        title: String,
        body_text: String,
        fragments: Vec<String>,
        links: BTreeSet<String>,
        metadata: BTreeMap<String, String>,
        content_type: ContentType,
        fetched_at: DateTime<Utc>,
    ) -> Self {
        Self {
            url,
            title,
            body_text,
            fragments,
            links,
            metadata,
            content_type,
            fetched_at,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn body_text(&self) -> &str {
        &self.body_text
    }

    pub fn fragments(&self) -> &[String] {
        &self.fragments
    }

    pub fn links(&self) -> &BTreeSet<String> {
        &self.links
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    pub fn content_type(&self) -> ContentType {
        self.content_type
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    pub fn with_content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = content_type;
        self
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<String>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn with_fragments(mut self, fragments: Vec<String>) -> Self {
        self.fragments = fragments;
        self
    }

    pub fn with_body_text(mut self, body_text: impl Into<String>) -> Self {
        self.body_text = body_text.into();
        self
    }
}

/// Merged result across all pages of one paginated traversal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// URL of the first page
    pub url: String,

    /// Title of the first page
    pub title: String,

    /// Body text of every page in fetch order, separated by a blank line
    pub body_text: String,

    /// Fragments of every page in fetch order
    pub fragments: Vec<String>,

    /// Union of all links found on any page
    pub links: BTreeSet<String>,

    /// Metadata of the first page
    pub metadata: BTreeMap<String, String>,

    /// Classification of the first page
    pub content_type: ContentType,

    /// Number of pages merged
    pub page_count: usize,

    /// True when more than one page was merged
    pub is_paginated: bool,

    /// URLs of the merged pages in fetch order
    pub page_urls: Vec<String>,

    /// When the first page was fetched
    pub fetched_at: DateTime<Utc>,

    /// When the merge happened
    pub merged_at: DateTime<Utc>,
}
