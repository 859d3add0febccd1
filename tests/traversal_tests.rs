mod common;

use common::{catalog_page, fast_options, page_url};
use page_trail::crawlers::pagination::{self, Termination, Traversal};
use page_trail::renderer::scripted::{
    ScriptedFactory, ScriptedFailure, ScriptedRenderer, ScriptedSite,
};
use page_trail::{PageTrail, merge};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_three_page_chain_within_depth() {
    let site = Arc::new(
        ScriptedSite::new()
            .with_page(catalog_page(1, Some(2)))
            .with_page(catalog_page(2, Some(3)))
            .with_page(catalog_page(3, None)),
    );
    let renderer = ScriptedRenderer::new(Arc::clone(&site));

    let options = fast_options(5, 0).traversal_options();
    let mut traversal = Traversal::new(&renderer, &page_url(1), options);
    let pages = traversal.traverse_all().await;

    let urls = pages.iter().map(|p| p.url().to_string()).collect::<Vec<_>>();
    assert_eq!(urls, vec![page_url(1), page_url(2), page_url(3)]);
    assert!(matches!(traversal.termination(), Some(Termination::NoNextLink)));

    let document = merge(&pages).unwrap();
    assert_eq!(document.page_count, 3);
    assert!(document.is_paginated);
    assert_eq!(document.page_urls, urls);
    assert_eq!(
        document.body_text,
        "Catalog page 1 Item 1a Item 1b Next »\n\n\
         Catalog page 2 Item 2a Item 2b Next »\n\n\
         Catalog page 3 Item 3a Item 3b"
    );
}

#[tokio::test]
async fn test_exhausted_retries_keep_earlier_pages() {
    let site = Arc::new(
        ScriptedSite::new()
            .with_page(catalog_page(1, Some(2)))
            .with_page(catalog_page(2, Some(3)).failing(ScriptedFailure::Timeout, usize::MAX))
            .with_page(catalog_page(3, None)),
    );
    let renderer = ScriptedRenderer::new(Arc::clone(&site));

    let options = fast_options(5, 2).traversal_options();
    let mut traversal = Traversal::new(&renderer, &page_url(1), options);
    let pages = traversal.traverse_all().await;

    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].url(), page_url(1));
    assert_eq!(site.attempts(&page_url(2)), 3);
    assert_eq!(site.attempts(&page_url(3)), 0);
    assert!(matches!(
        traversal.termination(),
        Some(Termination::RetriesExhausted(_))
    ));
}

#[tokio::test]
async fn test_depth_one_stops_after_start_page() {
    let site = Arc::new(
        ScriptedSite::new()
            .with_page(catalog_page(1, Some(2)))
            .with_page(catalog_page(2, None)),
    );
    let renderer = ScriptedRenderer::new(Arc::clone(&site));

    let options = fast_options(1, 0).traversal_options();
    let mut traversal = Traversal::new(&renderer, &page_url(1), options);
    let pages = traversal.traverse_all().await;

    assert_eq!(pages.len(), 1);
    assert_eq!(site.attempts(&page_url(2)), 0);
    assert!(matches!(traversal.termination(), Some(Termination::DepthLimit)));
}

#[tokio::test]
async fn test_cycle_is_cut_by_depth_cap() {
    let site = Arc::new(
        ScriptedSite::new()
            .with_page(catalog_page(1, Some(2)))
            .with_page(catalog_page(2, Some(1))),
    );
    let renderer = ScriptedRenderer::new(Arc::clone(&site));

    let options = fast_options(5, 0).traversal_options();
    let mut traversal = Traversal::new(&renderer, &page_url(1), options);
    let pages = traversal.traverse_all().await;

    let urls = pages.iter().map(|p| p.url().to_string()).collect::<Vec<_>>();
    assert_eq!(
        urls,
        vec![page_url(1), page_url(2), page_url(1), page_url(2), page_url(1)]
    );
    assert!(matches!(traversal.termination(), Some(Termination::DepthLimit)));
}

#[tokio::test]
async fn test_pagination_disabled_fetches_one_page() {
    let site = Arc::new(
        ScriptedSite::new()
            .with_page(catalog_page(1, Some(2)))
            .with_page(catalog_page(2, None)),
    );
    let renderer = ScriptedRenderer::new(Arc::clone(&site));

    let mut options = fast_options(5, 0);
    options.handle_pagination = false;
    let mut traversal = Traversal::new(&renderer, &page_url(1), options.traversal_options());

    assert_eq!(traversal.traverse_all().await.len(), 1);
    assert_eq!(site.attempts(&page_url(2)), 0);
}

#[tokio::test]
async fn test_streaming_crawl_yields_pages_in_order() {
    let factory = Arc::new(ScriptedFactory::new(
        ScriptedSite::new()
            .with_page(catalog_page(1, Some(2)))
            .with_page(catalog_page(2, None)),
    ));

    let mut rx = PageTrail::new(&page_url(1))
        .with_options(fast_options(5, 0))
        .with_renderer_factory(factory.clone())
        .generate()
        .unwrap();

    let mut urls = Vec::new();
    while let Some(page) = rx.recv().await {
        urls.push(page.url().to_string());
    }

    assert_eq!(urls, vec![page_url(1), page_url(2)]);
    assert_eq!(factory.site().sessions_opened(), 1);
    assert_eq!(factory.site().sessions_closed(), 1);
}

#[tokio::test]
async fn test_abandoned_stream_releases_session() {
    let factory = Arc::new(ScriptedFactory::new(
        ScriptedSite::new()
            .with_page(catalog_page(1, Some(2)))
            .with_page(catalog_page(2, Some(1))),
    ));

    let mut options = fast_options(1000, 0);
    options.pacing = page_trail::config::PacingRange::new(0.05, 0.05);
    let mut rx = pagination::start(factory.clone(), &page_url(1), options.traversal_options());

    let first = rx.recv().await.unwrap();
    assert_eq!(first.url(), page_url(1));
    drop(rx);

    let mut released = false;
    for _ in 0..100 {
        if factory.site().sessions_closed() == 1 {
            released = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(released, "session was not closed after the receiver was dropped");
    assert_eq!(factory.site().sessions_opened(), 1);
}

#[test]
fn test_invalid_start_url_is_rejected() {
    let result = PageTrail::new("mailto:someone@example.com").generate();
    assert!(result.is_err());
}
