//! Folding the pages of one traversal into a single document.

use crate::results::{DocumentRecord, PageRecord};
use chrono::Utc;
use std::collections::BTreeSet;

/// Separator placed between the body texts of consecutive pages
pub const PAGE_SEPARATOR: &str = "\n\n";

/// Merges pages, given in fetch order, into one document.
///
/// Identity fields (url, title, metadata, classification, fetch time) come
/// from the first page. Bodies are joined in order, skipping empty ones;
/// fragments are concatenated without deduplication; links are unioned.
/// Returns `None` for an empty sequence.
pub fn merge(pages: &[PageRecord]) -> Option<DocumentRecord> {
    let first = pages.first()?;

    let body_text = pages
        .iter()
        .map(PageRecord::body_text)
        .filter(|body| !body.is_empty())
        .collect::<Vec<_>>()
        .join(PAGE_SEPARATOR);

    let fragments = pages
        .iter()
        .flat_map(|page| page.fragments().iter().cloned())
        .collect::<Vec<_>>();

    let links = pages
        .iter()
        .flat_map(|page| page.links().iter().cloned())
        .collect::<BTreeSet<_>>();

    let page_urls = pages
        .iter()
        .map(|page| page.url().to_string())
        .collect::<Vec<_>>();

    ::log::debug!(
        "Merged {} pages of {} ({} fragments, {} links)",
        pages.len(),
        first.url(),
        fragments.len(),
        links.len()
    );

    Some(DocumentRecord {
        url: first.url().to_string(),
        title: first.title().to_string(),
        body_text,
        fragments,
        links,
        metadata: first.metadata().clone(),
        content_type: first.content_type(),
        page_count: pages.len(),
        is_paginated: pages.len() > 1,
        page_urls,
        fetched_at: first.fetched_at(),
        merged_at: Utc::now(),
    })
}
