//! Following "next page" links from a start URL.
//!
//! A [`Traversal`] produces one [`PageRecord`] per call, in fetch order:
//!
//! 1. fetch and extract the current URL under the retry policy
//! 2. hand the page to the caller
//! 3. resolve the next-page link; stop when there is none
//! 4. wait a random pacing delay before the next fetch
//!
//! It stops after `max_depth` pages, or when a page still fails once its
//! retries are spent. In that case the pages already produced stand as a
//! partial result and the failure is reported through
//! [`Traversal::termination`] instead of being raised. A chain of pages that
//! links back to itself is only stopped by the depth cap.

use crate::config::PacingRange;
use crate::crawlers::extractor::{ExtractOptions, extract};
use crate::crawlers::resolver::resolve_next;
use crate::errors::CrawlError;
use crate::renderer::{Renderer, RendererFactory, RendererSession};
use crate::results::PageRecord;
use crate::retry::RetryPolicy;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Buffered pages between a streaming traversal and its consumer
const PAGE_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraversalOptions {
    /// Maximum number of pages to produce
    pub max_depth: usize,
    pub retry: RetryPolicy,
    /// Delay between two fetches
    pub pacing: PacingRange,
    pub extract: ExtractOptions,
}

/// Why a traversal stopped
#[derive(Debug)]
pub enum Termination {
    /// The last page had no usable next-page link
    NoNextLink,
    /// `max_depth` pages were produced
    DepthLimit,
    /// A page could not be fetched or extracted; earlier pages stand
    RetriesExhausted(CrawlError),
}

/// Lazily walks a paginated sequence on one renderer session
pub struct Traversal<'r> {
    renderer: &'r dyn Renderer,
    options: TraversalOptions,
    current_url: Option<String>,
    visited_count: usize,
    termination: Option<Termination>,
}

impl<'r> Traversal<'r> {
    pub fn new(renderer: &'r dyn Renderer, start_url: &str, options: TraversalOptions) -> Self {
        Self {
            renderer,
            options,
            current_url: Some(start_url.to_string()),
            visited_count: 0,
            termination: None,
        }
    }

    /// Number of pages produced so far
    pub fn visited_count(&self) -> usize {
        self.visited_count
    }

    /// Why the traversal stopped, once it has
    pub fn termination(&self) -> Option<&Termination> {
        self.termination.as_ref()
    }

    pub fn into_termination(self) -> Option<Termination> {
        self.termination
    }

    /// Fetches the next page of the sequence, or `None` once it is over
    pub async fn next_page(&mut self) -> Option<PageRecord> {
        if self.termination.is_some() {
            return None;
        }

        let Some(url) = self.current_url.take() else {
            return None;
        };

        if self.visited_count >= self.options.max_depth {
            self.finish(Termination::DepthLimit);
            return None;
        }

        if self.visited_count > 0 {
            let delay = self.options.pacing.sample();
            ::log::debug!("Waiting {:?} before fetching {}", delay, url);
            tokio::time::sleep(delay).await;
        }

        let record = match self.fetch(&url).await {
            Ok(record) => record,
            Err(e) => {
                ::log::error!(
                    "Stopping pagination at page {} ({}): {}",
                    self.visited_count + 1,
                    url,
                    e
                );
                self.finish(Termination::RetriesExhausted(e));
                return None;
            }
        };

        self.visited_count += 1;
        ::log::info!("Fetched page {}: {}", self.visited_count, url);

        if self.visited_count >= self.options.max_depth {
            self.finish(Termination::DepthLimit);
        } else {
            match resolve_next(self.renderer).await {
                Some(next) => self.current_url = Some(next),
                None => self.finish(Termination::NoNextLink),
            }
        }

        Some(record)
    }

    /// Drains the remaining pages in order
    pub async fn traverse_all(&mut self) -> Vec<PageRecord> {
        let mut pages = Vec::new();
        while let Some(page) = self.next_page().await {
            pages.push(page);
        }
        pages
    }

    async fn fetch(&self, url: &str) -> Result<PageRecord, CrawlError> {
        let renderer = self.renderer;
        let extract_options = self.options.extract;

        self.options
            .retry
            .run(
                |attempt| {
                    let url = url.to_string();
                    async move {
                        ::log::debug!("Loading {} (attempt {})", url, attempt);
                        renderer.open(&url).await?;
                        extract(renderer, &extract_options).await
                    }
                },
                CrawlError::is_retryable,
            )
            .await
    }

    fn finish(&mut self, termination: Termination) {
        ::log::debug!(
            "Traversal finished after {} pages: {:?}",
            self.visited_count,
            termination
        );
        self.current_url = None;
        self.termination = Some(termination);
    }
}

/// Starts a traversal on its own renderer session and returns a receiver
/// that yields pages as they are fetched.
///
/// The session is released when the traversal ends or when the receiver is
/// dropped, whichever comes first.
pub fn start(
    factory: Arc<dyn RendererFactory>,
    start_url: &str,
    options: TraversalOptions,
) -> mpsc::Receiver<PageRecord> {
    let (page_tx, page_rx) = mpsc::channel::<PageRecord>(PAGE_CHANNEL_CAPACITY);
    let start_url = start_url.to_string();

    tokio::spawn(async move {
        ::log::info!("Starting paginated crawl of {}", start_url);

        let session = match RendererSession::acquire(factory.as_ref()).await {
            Ok(session) => session,
            Err(e) => {
                ::log::error!("Failed to open renderer session for {}: {}", start_url, e);
                return;
            }
        };

        let mut traversal = Traversal::new(&*session, &start_url, options);
        loop {
            let page = tokio::select! {
                page = traversal.next_page() => page,
                _ = page_tx.closed() => {
                    ::log::info!("Receiver dropped, abandoning crawl of {}", start_url);
                    break;
                }
            };

            let Some(page) = page else {
                break;
            };
            if page_tx.send(page).await.is_err() {
                ::log::info!("Receiver dropped, abandoning crawl of {}", start_url);
                break;
            }
        }

        ::log::info!(
            "Crawl of {} ended after {} pages",
            start_url,
            traversal.visited_count()
        );
        session.close().await;
    });

    page_rx
}
