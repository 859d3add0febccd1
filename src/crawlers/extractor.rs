use crate::crawlers::resolver::absolutize;
use crate::errors::{CrawlError, CrawlResult, RenderError};
use crate::parsers::{self, PageShape, text};
use crate::plugins;
use crate::renderer::Renderer;
use crate::results::PageRecord;
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

/// Meta tags copied into a page record's metadata
pub const META_NAMES: [&str; 7] = [
    "description",
    "keywords",
    "author",
    "og:title",
    "og:type",
    "og:description",
    "article:published_time",
];

/// Bounds for extracting one rendered page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractOptions {
    /// How long to wait for the root content element
    pub element_wait: Duration,
    /// Pause after each scroll before measuring the page again
    pub scroll_pause: Duration,
    /// Hard cap on scroll rounds for pages that keep growing
    pub max_scroll_rounds: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            element_wait: Duration::from_secs(10),
            scroll_pause: Duration::from_secs(1),
            max_scroll_rounds: 5,
        }
    }
}

/// Extracts the page currently shown by `renderer` into a [`PageRecord`].
///
/// Fails with [`CrawlError::Extraction`] if the root content element does
/// not show up within the wait budget. Scroll failures only cost the lazily
/// loaded content and are logged.
pub async fn extract(renderer: &dyn Renderer, options: &ExtractOptions) -> CrawlResult<PageRecord> {
    let url = renderer.current_url().await?;

    let initial_text = match renderer.find_root_text(options.element_wait).await {
        Ok(text) => text,
        Err(RenderError::Timeout { .. }) => {
            return Err(CrawlError::Extraction {
                url,
                reason: format!(
                    "root content not available after {:?}",
                    options.element_wait
                ),
            });
        }
        Err(e) => return Err(e.into()),
    };

    match reveal_lazy_content(renderer, options).await {
        Ok(rounds) => ::log::debug!("Scrolled {} in {} rounds", url, rounds),
        Err(e) => ::log::warn!("Scrolling {} failed, keeping visible content: {}", url, e),
    }

    // Lazy content may have extended the root after scrolling
    let root_text = renderer
        .find_root_text(options.element_wait)
        .await
        .unwrap_or(initial_text);

    let title = text::normalize_whitespace(&renderer.title().await?);
    let body_text = text::clean(&root_text);

    let fragments = renderer
        .find_text_leaves()
        .await?
        .iter()
        .map(|leaf| text::clean(leaf))
        .filter(|leaf| !leaf.is_empty())
        .collect::<Vec<_>>();

    let links = renderer
        .find_links()
        .await?
        .iter()
        .filter_map(|href| absolutize(&url, href))
        .collect::<BTreeSet<_>>();

    let mut metadata = BTreeMap::new();
    for name in META_NAMES {
        if let Some(value) = renderer.find_meta(name).await? {
            let value = text::normalize_whitespace(&value);
            if !value.is_empty() {
                metadata.insert(name.to_string(), value);
            }
        }
    }

    let shape = PageShape {
        fragments: fragments.len(),
        list_items: renderer.count_elements("li").await?,
        forms: renderer.count_elements("form").await?,
    };
    let content_type = parsers::classify(&url, shape);

    ::log::info!(
        "Extracted {} ({:?}, {} fragments, {} links)",
        url,
        content_type,
        fragments.len(),
        links.len()
    );

    let record = PageRecord::new(
        url,
        title,
        body_text,
        fragments,
        links,
        metadata,
        content_type,
        Utc::now(),
    );

    Ok(match plugins::select(record.url()) {
        Some(adapter) => {
            ::log::debug!("Applying {} adapter to {}", adapter.name(), record.url());
            adapter.apply(record, &root_text)
        }
        None => record,
    })
}

/// Scrolls to the bottom until the page height stops changing.
///
/// Returns the number of scroll rounds performed.
async fn reveal_lazy_content(
    renderer: &dyn Renderer,
    options: &ExtractOptions,
) -> Result<usize, RenderError> {
    let mut last_height = renderer.scroll_height().await?;

    for round in 1..=options.max_scroll_rounds {
        renderer.scroll_to_bottom().await?;
        tokio::time::sleep(options.scroll_pause).await;

        let height = renderer.scroll_height().await?;
        ::log::trace!("Scroll round {}: height {} -> {}", round, last_height, height);
        if height == last_height {
            return Ok(round);
        }
        last_height = height;
    }

    ::log::debug!(
        "Page still growing after {} scroll rounds, stopping",
        options.max_scroll_rounds
    );
    Ok(options.max_scroll_rounds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::scripted::{ScriptedPage, ScriptedRenderer, ScriptedSite};
    use crate::results::ContentType;
    use std::sync::Arc;

    fn fast_options() -> ExtractOptions {
        ExtractOptions {
            element_wait: Duration::from_millis(10),
            scroll_pause: Duration::ZERO,
            max_scroll_rounds: 5,
        }
    }

    async fn extract_page(page: ScriptedPage, url: &str) -> CrawlResult<PageRecord> {
        let renderer = ScriptedRenderer::new(Arc::new(ScriptedSite::new().with_page(page)));
        renderer.open(url).await?;
        extract(&renderer, &fast_options()).await
    }

    #[tokio::test]
    async fn test_extracts_article_page() {
        let url = "https://example.com/blog/rust-tips";
        let source = r#"<html>
            <head>
                <title>  Rust   tips </title>
                <meta name="description" content="Handy tips">
                <meta property="og:type" content="article">
                <style>body { color: red; }</style>
            </head>
            <body>
                <h1>Rust tips!!!</h1>
                <p>Write to me at someone@example.com &amp; enjoy.</p>
                <script>var x = 1;</script>
                <a href="/blog/other#comments">Other</a>
                <a href="mailto:someone@example.com">Mail</a>
                <a href="https://external.org/page">External</a>
            </body>
        </html>"#;

        let record = extract_page(ScriptedPage::new(url, source), url).await.unwrap();

        assert_eq!(record.url(), url);
        assert_eq!(record.title(), "Rust tips");
        assert_eq!(record.content_type(), ContentType::Article);
        assert_eq!(
            record.fragments(),
            &[
                "Rust tips!".to_string(),
                "Write to me at [EMAIL] & enjoy.".to_string(),
                "Other".to_string(),
                "Mail".to_string(),
                "External".to_string(),
            ]
        );
        assert!(!record.body_text().contains("var x"));
        assert!(record.links().contains("https://example.com/blog/other"));
        assert!(record.links().contains("https://external.org/page"));
        assert_eq!(record.links().len(), 2);
        assert_eq!(
            record.metadata().get("description").map(String::as_str),
            Some("Handy tips")
        );
        assert_eq!(
            record.metadata().get("og:type").map(String::as_str),
            Some("article")
        );
    }

    #[tokio::test]
    async fn test_missing_root_is_extraction_error() {
        let url = "https://example.com/slow";
        let page = ScriptedPage::new(url, "<body><p>late</p></body>").without_root();

        let err = extract_page(page, url).await.unwrap_err();
        assert!(matches!(err, CrawlError::Extraction { .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_empty_page_is_unknown() {
        let url = "https://example.com/blog/empty";
        let record = extract_page(ScriptedPage::new(url, "<body></body>"), url)
            .await
            .unwrap();

        assert!(record.fragments().is_empty());
        assert_eq!(record.content_type(), ContentType::Unknown);
    }

    #[tokio::test]
    async fn test_scrolling_stops_when_height_is_stable() {
        let url = "https://example.com/feed";
        let site = Arc::new(ScriptedSite::new().with_page(
            ScriptedPage::new(url, "<body><p>feed</p></body>")
                .with_scroll_heights(vec![1000, 2000, 3000, 3000]),
        ));
        let renderer = ScriptedRenderer::new(site);
        renderer.open(url).await.unwrap();

        let rounds = reveal_lazy_content(&renderer, &fast_options()).await.unwrap();
        assert_eq!(rounds, 3);
    }

    #[tokio::test]
    async fn test_scrolling_is_capped() {
        let url = "https://example.com/endless";
        let site = Arc::new(ScriptedSite::new().with_page(
            ScriptedPage::new(url, "<body><p>feed</p></body>")
                .with_scroll_heights((1..=100).map(|n| n * 1000).collect()),
        ));
        let renderer = ScriptedRenderer::new(site);
        renderer.open(url).await.unwrap();

        let rounds = reveal_lazy_content(&renderer, &fast_options()).await.unwrap();
        assert_eq!(rounds, 5);
    }

    #[tokio::test]
    async fn test_news_adapter_is_applied() {
        let url = "https://example.com/news/2024/launch";
        let source = r#"<head><meta property="article:published_time" content="2024-01-02"></head>
            <body><p>Launch day</p></body>"#;

        let record = extract_page(ScriptedPage::new(url, source), url).await.unwrap();
        assert_eq!(record.metadata().get("type").map(String::as_str), Some("news"));
        assert_eq!(
            record.metadata().get("published").map(String::as_str),
            Some("2024-01-02")
        );
    }

    #[tokio::test]
    async fn test_ajax_adapter_sees_uncleaned_json() {
        let url = "https://example.com/ajax/items";
        let source =
            r#"<body>{"items":[{"name":"First","link":"https://example.com/a"}]}</body>"#;

        let record = extract_page(ScriptedPage::new(url, source), url).await.unwrap();
        assert_eq!(record.metadata().get("format").map(String::as_str), Some("json"));
        let mut fragments = record.fragments().to_vec();
        fragments.sort();
        assert_eq!(fragments, vec!["First".to_string(), text::URL_TOKEN.to_string()]);
        assert!(!record.body_text().contains('{'));
    }
}
