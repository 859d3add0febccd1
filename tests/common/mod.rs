#![allow(dead_code)]

use page_trail::config::{CrawlOptions, PacingRange};
use page_trail::crawlers::extractor::ExtractOptions;
use page_trail::renderer::scripted::ScriptedPage;
use std::time::Duration;

pub fn page_url(n: usize) -> String {
    format!("https://shop.example.com/catalog?page={}", n)
}

/// A catalog page linking to `next` through a "Next" anchor
pub fn catalog_page(n: usize, next: Option<usize>) -> ScriptedPage {
    let link = next
        .map(|next| format!(r#"<a class="pager" href="/catalog?page={}">Next &raquo;</a>"#, next))
        .unwrap_or_default();
    let source = format!(
        r#"<html><head><title>Catalog</title></head>
        <body><h1>Catalog page {n}</h1><p>Item {n}a</p><p>Item {n}b</p>{link}</body></html>"#
    );
    ScriptedPage::new(&page_url(n), &source)
}

/// Options with no pacing and near-zero waits
pub fn fast_options(max_depth: usize, retry_count: usize) -> CrawlOptions {
    CrawlOptions {
        max_depth,
        retry_count,
        pacing: PacingRange::none(),
        handle_pagination: true,
        extract: ExtractOptions {
            element_wait: Duration::from_millis(10),
            scroll_pause: Duration::ZERO,
            max_scroll_rounds: 2,
        },
        retry_delay: Duration::from_millis(1),
    }
}
