//! In-memory renderer serving pre-registered HTML pages.
//!
//! Pages can be told to fail a number of times before loading, to report a
//! growing scroll height (lazy-loaded content), or to never expose their
//! root element. The site also counts sessions and load attempts so callers
//! can check how a crawl behaved without a browser.

use crate::crawlers::resolver::LinkPattern;
use crate::errors::RenderError;
use crate::renderer::html::HtmlPage;
use crate::renderer::{ClickableRef, Renderer, RendererFactory, SessionOverrides};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// How a scripted page fails to load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptedFailure {
    Timeout,
    Navigation,
    SessionLost,
}

/// A page registered with a [`ScriptedSite`]
#[derive(Debug)]
pub struct ScriptedPage {
    html: HtmlPage,
    failure: Option<ScriptedFailure>,
    failures_left: AtomicUsize,
    heights: Vec<i64>,
    root_missing: bool,
    attempts: AtomicUsize,
}

impl ScriptedPage {
    pub fn new(url: &str, source: &str) -> Self {
        Self {
            html: HtmlPage::new(url, source),
            failure: None,
            failures_left: AtomicUsize::new(0),
            heights: vec![1000],
            root_missing: false,
            attempts: AtomicUsize::new(0),
        }
    }

    /// Fails the next `times` loads with `failure` (`usize::MAX` = always)
    pub fn failing(mut self, failure: ScriptedFailure, times: usize) -> Self {
        self.failure = Some(failure);
        self.failures_left = AtomicUsize::new(times);
        self
    }

    /// Reports these heights on successive measurements, repeating the last
    pub fn with_scroll_heights(mut self, heights: Vec<i64>) -> Self {
        if !heights.is_empty() {
            self.heights = heights;
        }
        self
    }

    /// Never exposes a root content element
    pub fn without_root(mut self) -> Self {
        self.root_missing = true;
        self
    }
}

/// A set of scripted pages shared by every session of one factory
#[derive(Debug, Default)]
pub struct ScriptedSite {
    pages: HashMap<String, Arc<ScriptedPage>>,
    sessions_opened: AtomicUsize,
    sessions_closed: AtomicUsize,
    session_overrides: Mutex<Vec<SessionOverrides>>,
}

impl ScriptedSite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, page: ScriptedPage) -> Self {
        self.pages
            .insert(page.html.url().to_string(), Arc::new(page));
        self
    }

    /// Shorthand for registering a plain page
    pub fn with_html(self, url: &str, source: &str) -> Self {
        self.with_page(ScriptedPage::new(url, source))
    }

    /// Number of times `url` was requested
    pub fn attempts(&self, url: &str) -> usize {
        self.pages
            .get(url)
            .map(|p| p.attempts.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    pub fn sessions_opened(&self) -> usize {
        self.sessions_opened.load(Ordering::SeqCst)
    }

    pub fn sessions_closed(&self) -> usize {
        self.sessions_closed.load(Ordering::SeqCst)
    }

    /// Browser overrides each session was opened with, in opening order
    pub fn session_overrides(&self) -> Vec<SessionOverrides> {
        self.session_overrides
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }
}

/// Factory handing out sessions over a shared [`ScriptedSite`]
#[derive(Debug, Clone)]
pub struct ScriptedFactory {
    site: Arc<ScriptedSite>,
    overrides: SessionOverrides,
}

impl ScriptedFactory {
    pub fn new(site: ScriptedSite) -> Self {
        Self {
            site: Arc::new(site),
            overrides: SessionOverrides::default(),
        }
    }

    pub fn site(&self) -> &ScriptedSite {
        &self.site
    }
}

#[async_trait]
impl RendererFactory for ScriptedFactory {
    async fn connect(&self) -> Result<Box<dyn Renderer>, RenderError> {
        self.site.sessions_opened.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut log) = self.site.session_overrides.lock() {
            log.push(self.overrides);
        }
        Ok(Box::new(ScriptedRenderer::new(Arc::clone(&self.site))))
    }

    fn with_overrides(&self, overrides: &SessionOverrides) -> Option<Arc<dyn RendererFactory>> {
        Some(Arc::new(Self {
            site: Arc::clone(&self.site),
            overrides: *overrides,
        }))
    }
}

/// One session over a [`ScriptedSite`]
#[derive(Debug)]
pub struct ScriptedRenderer {
    site: Arc<ScriptedSite>,
    current: Mutex<Option<Arc<ScriptedPage>>>,
    scroll_round: AtomicUsize,
    closed: bool,
}

impl ScriptedRenderer {
    pub fn new(site: Arc<ScriptedSite>) -> Self {
        Self {
            site,
            current: Mutex::new(None),
            scroll_round: AtomicUsize::new(0),
            closed: false,
        }
    }

    fn page(&self) -> Result<Arc<ScriptedPage>, RenderError> {
        if self.closed {
            return Err(RenderError::Session("session already closed".to_string()));
        }
        self.slot()?
            .clone()
            .ok_or_else(|| RenderError::Session("no page loaded".to_string()))
    }

    fn slot(&self) -> Result<std::sync::MutexGuard<'_, Option<Arc<ScriptedPage>>>, RenderError> {
        self.current
            .lock()
            .map_err(|_| RenderError::Session("renderer state poisoned".to_string()))
    }
}

#[async_trait]
impl Renderer for ScriptedRenderer {
    async fn open(&self, url: &str) -> Result<(), RenderError> {
        if self.closed {
            return Err(RenderError::Session("session already closed".to_string()));
        }

        let Some(page) = self.site.pages.get(url) else {
            return Err(RenderError::Navigation {
                url: url.to_string(),
                message: "unknown host".to_string(),
            });
        };
        page.attempts.fetch_add(1, Ordering::SeqCst);

        if let Some(failure) = page.failure {
            let remaining = page.failures_left.load(Ordering::SeqCst);
            if remaining > 0 {
                if remaining != usize::MAX {
                    page.failures_left.fetch_sub(1, Ordering::SeqCst);
                }
                *self.slot()? = None;
                return Err(match failure {
                    ScriptedFailure::Timeout => RenderError::Timeout {
                        url: url.to_string(),
                    },
                    ScriptedFailure::Navigation => RenderError::Navigation {
                        url: url.to_string(),
                        message: "connection reset".to_string(),
                    },
                    ScriptedFailure::SessionLost => {
                        RenderError::Session("invalid session id".to_string())
                    }
                });
            }
        }

        *self.slot()? = Some(Arc::clone(page));
        self.scroll_round.store(0, Ordering::SeqCst);
        Ok(())
    }

    async fn title(&self) -> Result<String, RenderError> {
        Ok(self.page()?.html.title())
    }

    async fn current_url(&self) -> Result<String, RenderError> {
        Ok(self.page()?.html.url().to_string())
    }

    async fn find_root_text(&self, _wait: Duration) -> Result<String, RenderError> {
        let page = self.page()?;
        if page.root_missing {
            return Err(RenderError::Timeout {
                url: page.html.url().to_string(),
            });
        }
        page.html.root_text().ok_or_else(|| RenderError::Timeout {
            url: page.html.url().to_string(),
        })
    }

    async fn find_text_leaves(&self) -> Result<Vec<String>, RenderError> {
        Ok(self.page()?.html.text_leaves())
    }

    async fn find_links(&self) -> Result<Vec<String>, RenderError> {
        Ok(self.page()?.html.links())
    }

    async fn find_meta(&self, name: &str) -> Result<Option<String>, RenderError> {
        Ok(self.page()?.html.meta(name))
    }

    async fn count_elements(&self, css: &str) -> Result<usize, RenderError> {
        self.page()?.html.count(css)
    }

    async fn find_text_by_css(&self, css: &str) -> Result<Vec<String>, RenderError> {
        self.page()?.html.select_text(css)
    }

    async fn scroll_height(&self) -> Result<i64, RenderError> {
        let page = self.page()?;
        let round = self.scroll_round.load(Ordering::SeqCst);
        let index = round.min(page.heights.len() - 1);
        Ok(page.heights[index])
    }

    async fn scroll_to_bottom(&self) -> Result<(), RenderError> {
        self.page()?;
        self.scroll_round.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn find_first_matching(
        &self,
        patterns: &[LinkPattern],
    ) -> Result<Option<ClickableRef>, RenderError> {
        Ok(self.page()?.html.first_matching(patterns))
    }

    async fn close(&mut self) -> Result<(), RenderError> {
        if !self.closed {
            self.closed = true;
            *self.slot()? = None;
            self.site.sessions_closed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}
