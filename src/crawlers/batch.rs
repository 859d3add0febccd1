use crate::config::CrawlOptions;
use crate::crawlers::pagination::{Termination, Traversal};
use crate::errors::{CrawlError, CrawlResult};
use crate::merge::merge;
use crate::parsers::text;
use crate::renderer::{RendererFactory, RendererSession};
use crate::results::DocumentRecord;
use crate::retry::RetryPolicy;
use crate::utils::validate_url;
use scraper::Selector;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Result of crawling one URL of a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum UrlOutcome {
    Success { document: DocumentRecord },
    Error { message: String },
}

impl UrlOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, UrlOutcome::Success { .. })
    }
}

impl From<CrawlResult<DocumentRecord>> for UrlOutcome {
    fn from(result: CrawlResult<DocumentRecord>) -> Self {
        match result {
            Ok(document) => UrlOutcome::Success { document },
            Err(e) => UrlOutcome::Error {
                message: e.to_string(),
            },
        }
    }
}

/// Crawls `url` (following pagination unless disabled) on a fresh session
/// and merges the pages into one document.
///
/// Pages fetched before a failure are kept. When not even the first page
/// could be produced, the failure is returned.
pub async fn crawl_document(
    factory: &dyn RendererFactory,
    url: &str,
    options: &CrawlOptions,
) -> CrawlResult<DocumentRecord> {
    let url = validate_url(url)?;
    let session = RendererSession::acquire(factory).await?;

    let mut traversal = Traversal::new(&*session, &url, options.traversal_options());
    let pages = traversal.traverse_all().await;
    let termination = traversal.into_termination();
    session.close().await;

    match merge(&pages) {
        Some(document) => {
            ::log::info!(
                "Crawled {} ({} pages, stopped: {:?})",
                url,
                document.page_count,
                termination
            );
            Ok(document)
        }
        None => match termination {
            Some(Termination::RetriesExhausted(e)) => Err(e),
            _ => Err(CrawlError::EmptyResult(url)),
        },
    }
}

/// Text found under a CSS selector on a single page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedText {
    pub url: String,
    pub title: String,
    pub text_content: String,
}

/// Loads `url` on a fresh session and returns the cleaned text of every
/// element matching `selector`, one element per line.
///
/// Pagination is not followed. A selector matching nothing yields empty
/// text.
pub async fn crawl_selected_text(
    factory: &dyn RendererFactory,
    url: &str,
    selector: &str,
    options: &CrawlOptions,
) -> CrawlResult<SelectedText> {
    let url = validate_url(url)?;
    if let Err(e) = Selector::parse(selector) {
        return Err(CrawlError::InvalidSelector(format!("{}: {}", selector, e)));
    }

    let session = RendererSession::acquire(factory).await?;
    let renderer = &*session;
    let policy = RetryPolicy::with_retries(options.retry_count, options.retry_delay);

    let result = policy
        .run(
            |attempt| {
                let url = url.clone();
                async move {
                    ::log::debug!("Loading {} for selector text (attempt {})", url, attempt);
                    renderer.open(&url).await?;
                    let title = text::normalize_whitespace(&renderer.title().await?);
                    let texts = renderer.find_text_by_css(selector).await?;
                    Ok::<_, CrawlError>((title, texts))
                }
            },
            CrawlError::is_retryable,
        )
        .await;
    session.close().await;

    let (title, texts) = result?;
    let text_content = texts
        .iter()
        .map(|t| text::clean(t))
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    ::log::info!(
        "Extracted {} matches of {:?} from {}",
        texts.len(),
        selector,
        url
    );
    Ok(SelectedText {
        url,
        title,
        text_content,
    })
}

/// Crawls every URL with at most `max_concurrency` crawls in flight.
///
/// Each URL gets its own session and its own outcome; a failing URL never
/// affects the others. Duplicate URLs are crawled once.
pub async fn crawl_batch(
    factory: Arc<dyn RendererFactory>,
    urls: &[String],
    options: CrawlOptions,
    max_concurrency: usize,
) -> BTreeMap<String, UrlOutcome> {
    let semaphore = Arc::new(Semaphore::new(max_concurrency.max(1)));
    let mut unique = urls.to_vec();
    unique.sort();
    unique.dedup();

    ::log::info!(
        "Starting batch of {} URLs with concurrency {}",
        unique.len(),
        max_concurrency.max(1)
    );

    let mut outcomes = unique
        .iter()
        .map(|url| {
            let pending = UrlOutcome::Error {
                message: "crawl task did not finish".to_string(),
            };
            (url.clone(), pending)
        })
        .collect::<BTreeMap<_, _>>();

    // Dropping the set (e.g. when a job is aborted) cancels every crawl
    let mut tasks = JoinSet::new();
    for url in unique {
        let factory = Arc::clone(&factory);
        let semaphore = Arc::clone(&semaphore);
        tasks.spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                let cancelled = UrlOutcome::Error {
                    message: "batch cancelled".to_string(),
                };
                return (url, cancelled);
            };
            let outcome = UrlOutcome::from(crawl_document(factory.as_ref(), &url, &options).await);
            if let UrlOutcome::Error { message } = &outcome {
                ::log::error!("Failed to crawl {}: {}", url, message);
            }
            (url, outcome)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((url, outcome)) => {
                outcomes.insert(url, outcome);
            }
            Err(e) => ::log::error!("Crawl task did not finish: {}", e),
        }
    }

    let succeeded = outcomes.values().filter(|o| o.is_success()).count();
    ::log::info!(
        "Batch finished: {} succeeded, {} failed",
        succeeded,
        outcomes.len() - succeeded
    );
    outcomes
}
