#![allow(clippy::too_many_arguments)]

// Re-export modules
pub mod config;
pub mod crawlers;
pub mod errors;
pub mod jobs;
pub mod merge;
pub mod output;
pub mod parsers;
pub mod plugins;
pub mod renderer;
pub mod results;
pub mod retry;
pub mod server;
pub mod utils;

// Re-export commonly used types for convenience
pub use config::{CrawlOptions, CrawlerConfig};
pub use crawlers::batch::{UrlOutcome, crawl_batch, crawl_document};
pub use errors::{CrawlError, CrawlResult};
pub use merge::merge;
pub use results::{ContentType, DocumentRecord, PageRecord};

use renderer::RendererFactory;
use renderer::webdriver::{WebDriverFactory, WebDriverSettings};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Builder for a paginated crawl that yields pages as they are fetched
pub struct PageTrail {
    start_url: String,
    config: CrawlerConfig,
    options: CrawlOptions,
    factory: Option<Arc<dyn RendererFactory>>,
}

impl PageTrail {
    /// Create a new builder for the given start URL with default settings
    pub fn new(start_url: &str) -> Self {
        let config = CrawlerConfig::default();
        Self {
            start_url: start_url.to_string(),
            options: config.crawl_options(),
            config,
            factory: None,
        }
    }

    /// Set the configuration. Resets per-crawl options to the config's
    /// values, so call this before the other `with_*` methods.
    pub fn with_config(mut self, config: CrawlerConfig) -> Self {
        self.options = config.crawl_options();
        self.config = config;
        self
    }

    /// Load configuration from a file
    pub fn with_config_file(self, path: impl AsRef<std::path::Path>) -> CrawlResult<Self> {
        let config = CrawlerConfig::from_file(path)?;
        config.validate()?;
        Ok(self.with_config(config))
    }

    /// Load configuration from a string
    pub fn with_config_str(self, config_str: &str) -> CrawlResult<Self> {
        let config: CrawlerConfig = serde_json::from_str(config_str)?;
        config.validate()?;
        Ok(self.with_config(config))
    }

    /// Set the maximum number of pages to follow
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.options.max_depth = max_depth;
        self
    }

    /// Follow next-page links (on by default)
    pub fn with_pagination(mut self, handle_pagination: bool) -> Self {
        self.options.handle_pagination = handle_pagination;
        self
    }

    pub fn with_options(mut self, options: CrawlOptions) -> Self {
        self.options = options;
        self
    }

    /// Use `factory` for renderer sessions instead of a WebDriver server
    pub fn with_renderer_factory(mut self, factory: Arc<dyn RendererFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Start the crawl and get a receiver for pages
    pub fn generate(self) -> CrawlResult<mpsc::Receiver<PageRecord>> {
        let start_url = utils::validate_url(&self.start_url)?;

        let factory = match self.factory {
            Some(factory) => factory,
            None => {
                let settings = WebDriverSettings::from(&self.config);
                Arc::new(WebDriverFactory::new(settings)) as Arc<dyn RendererFactory>
            }
        };

        Ok(crawlers::pagination::start(
            factory,
            &start_url,
            self.options.traversal_options(),
        ))
    }
}
