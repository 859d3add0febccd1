use crate::crawlers::extractor::ExtractOptions;
use crate::crawlers::pagination::TraversalOptions;
use crate::errors::{CrawlError, CrawlResult};
use crate::renderer::SessionOverrides;
use crate::retry::RetryPolicy;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Browser driven through WebDriver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserKind {
    Chrome,
    Firefox,
}

impl std::str::FromStr for BrowserKind {
    type Err = CrawlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "chrome" => Ok(BrowserKind::Chrome),
            "firefox" => Ok(BrowserKind::Firefox),
            other => Err(CrawlError::Config(format!("unsupported browser: {}", other))),
        }
    }
}

/// Bounds of the random delay between two page fetches, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PacingRange {
    pub min_secs: f64,
    pub max_secs: f64,
}

impl PacingRange {
    pub fn new(min_secs: f64, max_secs: f64) -> Self {
        Self { min_secs, max_secs }
    }

    /// No delay at all
    pub fn none() -> Self {
        Self::new(0.0, 0.0)
    }

    /// Draws a delay uniformly from `[min, max]`
    pub fn sample(&self) -> Duration {
        if self.max_secs <= self.min_secs {
            return secs(self.min_secs);
        }
        secs(rand::thread_rng().gen_range(self.min_secs..=self.max_secs))
    }

    fn validate(&self) -> CrawlResult<()> {
        if !is_valid_secs(self.min_secs) || !is_valid_secs(self.max_secs) {
            return Err(CrawlError::Config(
                "pacing bounds must be non-negative numbers".to_string(),
            ));
        }
        if self.min_secs > self.max_secs {
            return Err(CrawlError::Config(format!(
                "pacing minimum {}s exceeds maximum {}s",
                self.min_secs, self.max_secs
            )));
        }
        Ok(())
    }
}

impl Default for PacingRange {
    fn default() -> Self {
        Self::new(1.0, 3.0)
    }
}

/// Process-wide crawler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// URL for the WebDriver instance
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,

    #[serde(default = "default_browser")]
    pub browser: BrowserKind,

    #[serde(default = "default_true")]
    pub headless: bool,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_page_load_timeout")]
    pub page_load_timeout_secs: u64,

    #[serde(default = "default_element_wait_timeout")]
    pub element_wait_timeout_secs: u64,

    /// Retries after the first failed attempt of a page
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Base delay of the linear retry backoff
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: f64,

    #[serde(default)]
    pub pacing: PacingRange,

    #[serde(default = "default_scroll_pause")]
    pub scroll_pause_secs: f64,

    #[serde(default = "default_max_scroll_rounds")]
    pub max_scroll_rounds: usize,

    /// Maximum number of pages followed from one start URL
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Maximum number of start URLs crawled at the same time
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default = "default_output_formats")]
    pub output_formats: Vec<String>,

    #[serde(default = "default_api_host")]
    pub api_host: String,

    #[serde(default = "default_api_port")]
    pub api_port: u16,
}

/// Default value for webdriver_url
fn default_webdriver_url() -> String {
    "http://localhost:4444".to_string()
}

fn default_browser() -> BrowserKind {
    BrowserKind::Chrome
}

fn default_true() -> bool {
    true
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/91.0.4472.124 Safari/537.36"
        .to_string()
}

fn default_page_load_timeout() -> u64 {
    30
}

fn default_element_wait_timeout() -> u64 {
    10
}

fn default_max_retries() -> usize {
    3
}

fn default_retry_delay() -> f64 {
    2.0
}

fn default_scroll_pause() -> f64 {
    1.0
}

fn default_max_scroll_rounds() -> usize {
    5
}

fn default_max_depth() -> usize {
    10
}

/// Default value for max_concurrency
fn default_max_concurrency() -> usize {
    4
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_output_formats() -> Vec<String> {
    vec!["txt".to_string(), "json".to_string()]
}

fn default_api_host() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    5000
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            webdriver_url: default_webdriver_url(),
            browser: default_browser(),
            headless: true,
            user_agent: default_user_agent(),
            page_load_timeout_secs: default_page_load_timeout(),
            element_wait_timeout_secs: default_element_wait_timeout(),
            max_retries: default_max_retries(),
            retry_delay_secs: default_retry_delay(),
            pacing: PacingRange::default(),
            scroll_pause_secs: default_scroll_pause(),
            max_scroll_rounds: default_max_scroll_rounds(),
            max_depth: default_max_depth(),
            max_concurrency: default_max_concurrency(),
            output_dir: default_output_dir(),
            output_formats: default_output_formats(),
            api_host: default_api_host(),
            api_port: default_api_port(),
        }
    }
}

impl CrawlerConfig {
    /// Load configuration from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> CrawlResult<Self> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        let config: Self = serde_json::from_str(&contents)?;
        Ok(config)
    }

    /// Loads the file when given (defaults otherwise), applies environment
    /// overrides and validates the result
    pub fn load(path: Option<&Path>) -> CrawlResult<Self> {
        let mut config = match path {
            Some(path) => {
                ::log::info!("Loading configuration from {}", path.display());
                Self::from_file(path)?
            }
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Applies overrides from the process environment
    pub fn apply_env_overrides(&mut self) -> CrawlResult<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides looked up through `lookup`. Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> CrawlResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(value) = get("WEBDRIVER_URL") {
            self.webdriver_url = value;
        }
        if let Some(value) = get("SELENIUM_BROWSER") {
            self.browser = value.parse()?;
        }
        if let Some(value) = get("SELENIUM_HEADLESS") {
            self.headless = value.trim().eq_ignore_ascii_case("true");
        }
        if let Some(value) = get("USER_AGENT") {
            self.user_agent = value;
        }
        if let Some(value) = get("PAGE_LOAD_TIMEOUT") {
            self.page_load_timeout_secs = parse_var("PAGE_LOAD_TIMEOUT", &value)?;
        }
        if let Some(value) = get("ELEMENT_WAIT_TIMEOUT") {
            self.element_wait_timeout_secs = parse_var("ELEMENT_WAIT_TIMEOUT", &value)?;
        }
        if let Some(value) = get("MAX_RETRIES") {
            self.max_retries = parse_var("MAX_RETRIES", &value)?;
        }
        if let Some(value) = get("RETRY_DELAY") {
            self.retry_delay_secs = parse_var("RETRY_DELAY", &value)?;
        }
        if let Some(value) = get("API_HOST") {
            self.api_host = value;
        }
        if let Some(value) = get("API_PORT") {
            self.api_port = parse_var("API_PORT", &value)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> CrawlResult<()> {
        if url::Url::parse(&self.webdriver_url).is_err() {
            return Err(CrawlError::Config(format!(
                "invalid webdriver_url: {}",
                self.webdriver_url
            )));
        }
        if self.max_concurrency == 0 {
            return Err(CrawlError::Config(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        if !is_valid_secs(self.retry_delay_secs) || !is_valid_secs(self.scroll_pause_secs) {
            return Err(CrawlError::Config(
                "retry_delay_secs and scroll_pause_secs must be non-negative numbers".to_string(),
            ));
        }
        self.pacing.validate()
    }

    pub fn extract_options(&self) -> ExtractOptions {
        ExtractOptions {
            element_wait: Duration::from_secs(self.element_wait_timeout_secs),
            scroll_pause: secs(self.scroll_pause_secs),
            max_scroll_rounds: self.max_scroll_rounds,
        }
    }

    /// Per-request options seeded from this configuration
    pub fn crawl_options(&self) -> CrawlOptions {
        CrawlOptions {
            max_depth: self.max_depth,
            retry_count: self.max_retries,
            pacing: self.pacing,
            handle_pagination: true,
            extract: self.extract_options(),
            retry_delay: secs(self.retry_delay_secs),
        }
    }
}

/// Options for crawling one start URL
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrawlOptions {
    pub max_depth: usize,
    /// Retries after the first failed attempt of a page
    pub retry_count: usize,
    pub pacing: PacingRange,
    /// Follow next-page links (otherwise only the start page is fetched)
    pub handle_pagination: bool,
    pub extract: ExtractOptions,
    pub retry_delay: Duration,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        CrawlerConfig::default().crawl_options()
    }
}

impl CrawlOptions {
    pub fn traversal_options(&self) -> TraversalOptions {
        TraversalOptions {
            max_depth: if self.handle_pagination {
                self.max_depth
            } else {
                self.max_depth.min(1)
            },
            retry: RetryPolicy::with_retries(self.retry_count, self.retry_delay),
            pacing: self.pacing,
            extract: self.extract,
        }
    }
}

/// Per-request overrides accepted by the HTTP API and the job registry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlOverrides {
    pub max_depth: Option<usize>,
    pub retry_count: Option<usize>,
    pub handle_pagination: Option<bool>,
    pub min_delay_secs: Option<f64>,
    pub max_delay_secs: Option<f64>,
    pub browser: Option<BrowserKind>,
    pub headless: Option<bool>,
}

impl CrawlOverrides {
    /// Browser settings requested for this crawl's sessions
    pub fn session(&self) -> SessionOverrides {
        SessionOverrides {
            browser: self.browser,
            headless: self.headless,
        }
    }

    /// Applies the overrides on top of `base`
    pub fn apply(&self, base: CrawlOptions) -> CrawlResult<CrawlOptions> {
        let mut options = base;
        if let Some(max_depth) = self.max_depth {
            options.max_depth = max_depth;
        }
        if let Some(retry_count) = self.retry_count {
            options.retry_count = retry_count;
        }
        if let Some(handle_pagination) = self.handle_pagination {
            options.handle_pagination = handle_pagination;
        }
        if let Some(min) = self.min_delay_secs {
            options.pacing.min_secs = min;
        }
        if let Some(max) = self.max_delay_secs {
            options.pacing.max_secs = max;
        }
        options.pacing.validate()?;
        Ok(options)
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> CrawlResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| CrawlError::Config(format!("invalid value for {}: {}", key, value)))
}

fn is_valid_secs(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}

/// Converts seconds to a duration, treating invalid values as zero
fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}
