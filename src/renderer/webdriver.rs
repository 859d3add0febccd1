use crate::config::{BrowserKind, CrawlerConfig};
use crate::crawlers::resolver::LinkPattern;
use crate::errors::RenderError;
use crate::renderer::{ClickableRef, Renderer, RendererFactory, SessionOverrides};
use async_trait::async_trait;
use fantoccini::error::CmdError;
use fantoccini::wd::TimeoutConfiguration;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

/// Alternative endpoints tried when the configured WebDriver is unreachable
const FALLBACK_WEBDRIVER_URLS: [&str; 3] = [
    "http://localhost:9515", // ChromeDriver default
    "http://localhost:4444", // Selenium / geckodriver default
    "http://127.0.0.1:4444", // Try with IP instead of localhost
];

/// Collects non-empty text nodes outside non-content elements
const TEXT_LEAVES_SCRIPT: &str = r#"
    const skip = new Set(['SCRIPT', 'STYLE', 'META', 'LINK', 'NOSCRIPT']);
    const root = document.body;
    if (!root) { return []; }
    const walker = document.createTreeWalker(root, NodeFilter.SHOW_TEXT);
    const out = [];
    while (walker.nextNode()) {
        const node = walker.currentNode;
        const parent = node.parentElement;
        if (parent && skip.has(parent.tagName)) { continue; }
        const text = node.textContent.replace(/\s+/g, ' ').trim();
        if (text) { out.push(text); }
    }
    return out;
"#;

const SCROLL_HEIGHT_SCRIPT: &str = "return document.body ? document.body.scrollHeight : 0;";

const SCROLL_TO_BOTTOM_SCRIPT: &str =
    "window.scrollTo(0, document.body ? document.body.scrollHeight : 0);";

/// Settings needed to open WebDriver sessions
#[derive(Debug, Clone)]
pub struct WebDriverSettings {
    pub webdriver_url: String,
    pub browser: BrowserKind,
    pub headless: bool,
    pub user_agent: String,
    pub page_load_timeout: Duration,
}

impl From<&CrawlerConfig> for WebDriverSettings {
    fn from(config: &CrawlerConfig) -> Self {
        Self {
            webdriver_url: config.webdriver_url.clone(),
            browser: config.browser,
            headless: config.headless,
            user_agent: config.user_agent.clone(),
            page_load_timeout: Duration::from_secs(config.page_load_timeout_secs),
        }
    }
}

impl WebDriverSettings {
    /// Copy of these settings with the request's browser choices applied
    pub fn with_overrides(&self, overrides: &SessionOverrides) -> Self {
        Self {
            browser: overrides.browser.unwrap_or(self.browser),
            headless: overrides.headless.unwrap_or(self.headless),
            ..self.clone()
        }
    }

    /// Builds the W3C capabilities for the configured browser
    pub fn capabilities(&self) -> Map<String, Value> {
        let mut caps = Map::new();
        caps.insert("pageLoadStrategy".to_string(), json!("eager"));

        match self.browser {
            BrowserKind::Chrome => {
                let mut args = vec![
                    format!("--user-agent={}", self.user_agent),
                    "--disable-gpu".to_string(),
                    "--no-sandbox".to_string(),
                    "--disable-dev-shm-usage".to_string(),
                    "--window-size=1920,1080".to_string(),
                    "--disable-extensions".to_string(),
                    "--disable-notifications".to_string(),
                    "--disable-infobars".to_string(),
                ];
                if self.headless {
                    args.push("--headless=new".to_string());
                }
                caps.insert("browserName".to_string(), json!("chrome"));
                caps.insert("goog:chromeOptions".to_string(), json!({ "args": args }));
            }
            BrowserKind::Firefox => {
                let mut args = vec!["--width=1920".to_string(), "--height=1080".to_string()];
                if self.headless {
                    args.push("-headless".to_string());
                }
                caps.insert("browserName".to_string(), json!("firefox"));
                caps.insert(
                    "moz:firefoxOptions".to_string(),
                    json!({
                        "args": args,
                        "prefs": {
                            "general.useragent.override": self.user_agent,
                            "dom.webnotifications.enabled": false,
                            "dom.push.enabled": false
                        }
                    }),
                );
            }
        }

        caps
    }
}

/// Opens one WebDriver session per [`RendererFactory::connect`] call
#[derive(Debug, Clone)]
pub struct WebDriverFactory {
    settings: WebDriverSettings,
}

impl WebDriverFactory {
    pub fn new(settings: WebDriverSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &WebDriverSettings {
        &self.settings
    }

    async fn connect_to(&self, url: &str) -> Result<Client, String> {
        ClientBuilder::native()
            .capabilities(self.settings.capabilities())
            .connect(url)
            .await
            .map_err(|e| e.to_string())
    }
}

#[async_trait]
impl RendererFactory for WebDriverFactory {
    async fn connect(&self) -> Result<Box<dyn Renderer>, RenderError> {
        let primary = self.settings.webdriver_url.as_str();

        let client = match self.connect_to(primary).await {
            Ok(client) => {
                ::log::debug!("Connected to WebDriver at {}", primary);
                Some(client)
            }
            Err(e) => {
                ::log::error!("Failed to connect to WebDriver at {}: {}", primary, e);
                let mut fallback = None;
                for url in FALLBACK_WEBDRIVER_URLS.iter().filter(|u| **u != primary) {
                    ::log::info!("Trying fallback WebDriver URL: {}", url);
                    if let Ok(client) = self.connect_to(url).await {
                        ::log::debug!("Connected to fallback WebDriver at {}", url);
                        fallback = Some(client);
                        break;
                    }
                }
                fallback
            }
        };

        let Some(client) = client else {
            ::log::error!(
                "Make sure a WebDriver server is running or set the WEBDRIVER_URL environment variable"
            );
            return Err(RenderError::Session(format!(
                "failed to connect to any WebDriver server (tried {})",
                primary
            )));
        };

        let timeouts = TimeoutConfiguration::new(
            Some(self.settings.page_load_timeout),
            Some(self.settings.page_load_timeout),
            Some(Duration::ZERO),
        );
        if let Err(e) = client.update_timeouts(timeouts).await {
            ::log::warn!("Failed to set WebDriver timeouts: {}", e);
        }

        Ok(Box::new(WebDriverRenderer {
            client: Some(client),
            page_load_timeout: self.settings.page_load_timeout,
        }))
    }

    fn with_overrides(&self, overrides: &SessionOverrides) -> Option<Arc<dyn RendererFactory>> {
        let settings = self.settings.with_overrides(overrides);
        ::log::debug!(
            "Using {:?} (headless: {}) for this request",
            settings.browser,
            settings.headless
        );
        Some(Arc::new(WebDriverFactory::new(settings)))
    }
}

/// A renderer backed by a live WebDriver session
pub struct WebDriverRenderer {
    client: Option<Client>,
    page_load_timeout: Duration,
}

impl WebDriverRenderer {
    fn client(&self) -> Result<&Client, RenderError> {
        self.client
            .as_ref()
            .ok_or_else(|| RenderError::Session("session already closed".to_string()))
    }

    async fn script(&self, script: &str) -> Result<Value, RenderError> {
        self.client()?
            .execute(script, Vec::new())
            .await
            .map_err(|e| RenderError::Script(e.to_string()))
    }
}

/// Maps a WebDriver command failure during navigation to a render error
fn navigation_error(error: CmdError, url: &str) -> RenderError {
    let message = error.to_string();
    let lowered = message.to_lowercase();
    if lowered.contains("unable to find session") || lowered.contains("invalid session") {
        ::log::warn!("Lost session while accessing {}", url);
        RenderError::Session(message)
    } else if lowered.contains("timeout") || lowered.contains("timed out") {
        RenderError::Timeout {
            url: url.to_string(),
        }
    } else {
        RenderError::Navigation {
            url: url.to_string(),
            message,
        }
    }
}

fn query_error(error: CmdError) -> RenderError {
    RenderError::Query(error.to_string())
}

#[async_trait]
impl Renderer for WebDriverRenderer {
    async fn open(&self, url: &str) -> Result<(), RenderError> {
        let client = self.client()?;
        // Guard against drivers that ignore their own page-load timeout
        let budget = self.page_load_timeout + Duration::from_secs(15);

        match timeout(budget, client.goto(url)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(navigation_error(e, url)),
            Err(_) => {
                ::log::error!("Timeout loading: {}", url);
                Err(RenderError::Timeout {
                    url: url.to_string(),
                })
            }
        }
    }

    async fn title(&self) -> Result<String, RenderError> {
        self.client()?.title().await.map_err(query_error)
    }

    async fn current_url(&self) -> Result<String, RenderError> {
        self.client()?
            .current_url()
            .await
            .map(|u| u.to_string())
            .map_err(query_error)
    }

    async fn find_root_text(&self, wait: Duration) -> Result<String, RenderError> {
        let client = self.client()?;
        let body = match client.wait().at_most(wait).for_element(Locator::Css("body")).await {
            Ok(body) => body,
            Err(e) if is_wait_timeout(&e) => {
                let url = client
                    .current_url()
                    .await
                    .map(|u| u.to_string())
                    .unwrap_or_default();
                return Err(RenderError::Timeout { url });
            }
            Err(e) => return Err(query_error(e)),
        };
        body.text().await.map_err(query_error)
    }

    async fn find_text_leaves(&self) -> Result<Vec<String>, RenderError> {
        match self.script(TEXT_LEAVES_SCRIPT).await? {
            Value::Array(items) => Ok(items
                .into_iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect()),
            other => Err(RenderError::Script(format!(
                "expected an array of text leaves, got {}",
                other
            ))),
        }
    }

    async fn find_links(&self) -> Result<Vec<String>, RenderError> {
        let anchors = self
            .client()?
            .find_all(Locator::Css("a[href]"))
            .await
            .map_err(query_error)?;

        let mut links = Vec::with_capacity(anchors.len());
        for anchor in anchors {
            // The property is already resolved against the document URL
            if let Ok(Some(href)) = anchor.prop("href").await {
                links.push(href);
            }
        }
        Ok(links)
    }

    async fn find_meta(&self, name: &str) -> Result<Option<String>, RenderError> {
        let escaped = name.replace('"', "\\\"");
        let selector = format!(r#"meta[name="{0}"], meta[property="{0}"]"#, escaped);
        let metas = self
            .client()?
            .find_all(Locator::Css(&selector))
            .await
            .map_err(query_error)?;

        match metas.into_iter().next() {
            Some(meta) => meta.attr("content").await.map_err(query_error),
            None => Ok(None),
        }
    }

    async fn count_elements(&self, css: &str) -> Result<usize, RenderError> {
        self.client()?
            .find_all(Locator::Css(css))
            .await
            .map(|elements| elements.len())
            .map_err(query_error)
    }

    async fn find_text_by_css(&self, css: &str) -> Result<Vec<String>, RenderError> {
        let elements = self
            .client()?
            .find_all(Locator::Css(css))
            .await
            .map_err(query_error)?;

        let mut texts = Vec::with_capacity(elements.len());
        for element in elements {
            texts.push(element.text().await.map_err(query_error)?);
        }
        Ok(texts)
    }

    async fn scroll_height(&self) -> Result<i64, RenderError> {
        let value = self.script(SCROLL_HEIGHT_SCRIPT).await?;
        value
            .as_i64()
            .or_else(|| value.as_f64().map(|f| f as i64))
            .ok_or_else(|| RenderError::Script(format!("unexpected scroll height {}", value)))
    }

    async fn scroll_to_bottom(&self) -> Result<(), RenderError> {
        self.script(SCROLL_TO_BOTTOM_SCRIPT).await.map(|_| ())
    }

    async fn find_first_matching(
        &self,
        patterns: &[LinkPattern],
    ) -> Result<Option<ClickableRef>, RenderError> {
        let client = self.client()?;
        for pattern in patterns {
            let xpath = pattern.to_xpath();
            let elements = client
                .find_all(Locator::XPath(&xpath))
                .await
                .map_err(query_error)?;

            if let Some(element) = elements.into_iter().next() {
                ::log::trace!("Next-link pattern matched: {}", xpath);
                let displayed = element.is_displayed().await.unwrap_or(false);
                let enabled = element.is_enabled().await.unwrap_or(false);
                let href = element.prop("href").await.unwrap_or(None);
                return Ok(Some(ClickableRef {
                    href,
                    displayed,
                    enabled,
                }));
            }
        }
        Ok(None)
    }

    async fn close(&mut self) -> Result<(), RenderError> {
        match self.client.take() {
            Some(client) => client
                .close()
                .await
                .map_err(|e| RenderError::Session(e.to_string())),
            None => Ok(()),
        }
    }
}

/// Whether a wait failed because the element never showed up
fn is_wait_timeout(error: &CmdError) -> bool {
    let message = error.to_string().to_lowercase();
    message.contains("timeout") || message.contains("timed out") || message.contains("no such element")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(browser: BrowserKind, headless: bool) -> WebDriverSettings {
        WebDriverSettings {
            webdriver_url: "http://localhost:4444".to_string(),
            browser,
            headless,
            user_agent: "test-agent".to_string(),
            page_load_timeout: Duration::from_secs(30),
        }
    }

    #[test]
    fn test_chrome_capabilities() {
        let caps = settings(BrowserKind::Chrome, true).capabilities();
        assert_eq!(caps["browserName"], "chrome");
        assert_eq!(caps["pageLoadStrategy"], "eager");

        let args = caps["goog:chromeOptions"]["args"].as_array().unwrap();
        assert!(args.contains(&json!("--headless=new")));
        assert!(args.contains(&json!("--user-agent=test-agent")));
    }

    #[test]
    fn test_firefox_capabilities_without_headless() {
        let caps = settings(BrowserKind::Firefox, false).capabilities();
        assert_eq!(caps["browserName"], "firefox");

        let options = &caps["moz:firefoxOptions"];
        assert!(!options["args"].as_array().unwrap().contains(&json!("-headless")));
        assert_eq!(options["prefs"]["general.useragent.override"], "test-agent");
    }

    #[test]
    fn test_request_overrides_reach_settings() {
        let base = settings(BrowserKind::Chrome, true);
        let overrides = SessionOverrides {
            browser: Some(BrowserKind::Firefox),
            headless: Some(false),
        };

        let overridden = base.with_overrides(&overrides);
        assert_eq!(overridden.browser, BrowserKind::Firefox);
        assert!(!overridden.headless);
        assert_eq!(overridden.user_agent, base.user_agent);
        assert_eq!(overridden.capabilities()["browserName"], "firefox");

        // Unset fields keep the configured value
        let partial = base.with_overrides(&SessionOverrides {
            browser: None,
            headless: Some(false),
        });
        assert_eq!(partial.browser, BrowserKind::Chrome);
        assert!(!partial.headless);

        let factory = WebDriverFactory::new(base);
        assert!(factory.with_overrides(&overrides).is_some());
        assert_eq!(factory.settings().browser, BrowserKind::Chrome);
    }
}
