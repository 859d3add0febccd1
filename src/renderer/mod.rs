//! Page renderer capability.
//!
//! A [`Renderer`] is one exclusive browser session: it loads a URL and
//! answers queries about the page it currently shows. Sessions are handed
//! out by a [`RendererFactory`] and wrapped in a [`RendererSession`] guard
//! so they are released on every exit path.

pub mod html;
pub mod scripted;
pub mod webdriver;

use crate::config::BrowserKind;
use crate::crawlers::resolver::LinkPattern;
use crate::errors::RenderError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::Duration;

/// A matched element that can be followed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickableRef {
    /// Target of the element, if it has one
    pub href: Option<String>,
    /// Whether the element is visually displayed
    pub displayed: bool,
    /// Whether the element is enabled
    pub enabled: bool,
}

impl ClickableRef {
    pub fn is_actionable(&self) -> bool {
        self.displayed && self.enabled
    }
}

/// One renderer session showing (at most) one page at a time
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Navigates to `url` and waits for the page load
    async fn open(&self, url: &str) -> Result<(), RenderError>;

    async fn title(&self) -> Result<String, RenderError>;

    async fn current_url(&self) -> Result<String, RenderError>;

    /// Returns the text of the root content element, waiting at most `wait`
    /// for it to appear
    async fn find_root_text(&self, wait: Duration) -> Result<String, RenderError>;

    /// Returns the text of every non-empty leaf text node outside
    /// script/style/meta/link elements, in document order
    async fn find_text_leaves(&self) -> Result<Vec<String>, RenderError>;

    /// Returns the href of every anchor, in document order
    async fn find_links(&self) -> Result<Vec<String>, RenderError>;

    /// Returns the content of the `meta` element named `name`
    async fn find_meta(&self, name: &str) -> Result<Option<String>, RenderError>;

    /// Counts the elements matching a CSS selector
    async fn count_elements(&self, css: &str) -> Result<usize, RenderError>;

    /// Returns the text of every element matching a CSS selector, in
    /// document order
    async fn find_text_by_css(&self, css: &str) -> Result<Vec<String>, RenderError>;

    async fn scroll_height(&self) -> Result<i64, RenderError>;

    async fn scroll_to_bottom(&self) -> Result<(), RenderError>;

    /// Returns the first element matching the earliest pattern in
    /// `patterns` that matches anything
    async fn find_first_matching(
        &self,
        patterns: &[LinkPattern],
    ) -> Result<Option<ClickableRef>, RenderError>;

    /// Ends the session
    async fn close(&mut self) -> Result<(), RenderError>;
}

/// Browser settings a single request may change
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionOverrides {
    pub browser: Option<BrowserKind>,
    pub headless: Option<bool>,
}

impl SessionOverrides {
    pub fn is_empty(&self) -> bool {
        self.browser.is_none() && self.headless.is_none()
    }
}

/// Hands out exclusive renderer sessions
#[async_trait]
pub trait RendererFactory: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn Renderer>, RenderError>;

    /// Returns a factory whose sessions apply `overrides`, or `None` when
    /// this factory has no browser settings to change
    fn with_overrides(&self, _overrides: &SessionOverrides) -> Option<Arc<dyn RendererFactory>> {
        None
    }
}

/// Picks the factory serving one request: `factory` itself unless the
/// request changes browser settings it knows about
pub fn factory_for(
    factory: &Arc<dyn RendererFactory>,
    overrides: &SessionOverrides,
) -> Arc<dyn RendererFactory> {
    if overrides.is_empty() {
        return Arc::clone(factory);
    }
    factory
        .with_overrides(overrides)
        .unwrap_or_else(|| Arc::clone(factory))
}

/// Scoped ownership of a renderer session.
///
/// Call [`RendererSession::close`] when done. If the guard is dropped
/// without it (early abandonment, a panic, an aborted task) the session is
/// closed on a background task.
pub struct RendererSession {
    inner: Option<Box<dyn Renderer>>,
}

impl RendererSession {
    pub fn new(renderer: Box<dyn Renderer>) -> Self {
        Self {
            inner: Some(renderer),
        }
    }

    /// Acquires a new session from `factory`
    pub async fn acquire(factory: &dyn RendererFactory) -> Result<Self, RenderError> {
        let renderer = factory.connect().await?;
        ::log::debug!("Renderer session acquired");
        Ok(Self::new(renderer))
    }

    /// Closes the session, logging (not returning) close failures
    pub async fn close(mut self) {
        if let Some(mut renderer) = self.inner.take() {
            if let Err(e) = renderer.close().await {
                ::log::warn!("Failed to close renderer session: {}", e);
            } else {
                ::log::debug!("Renderer session closed");
            }
        }
    }
}

impl Deref for RendererSession {
    type Target = dyn Renderer;

    fn deref(&self) -> &Self::Target {
        match &self.inner {
            Some(renderer) => renderer.as_ref(),
            None => unreachable!("renderer session used after close"),
        }
    }
}

impl DerefMut for RendererSession {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match &mut self.inner {
            Some(renderer) => renderer.as_mut(),
            None => unreachable!("renderer session used after close"),
        }
    }
}

impl Drop for RendererSession {
    fn drop(&mut self) {
        let Some(mut renderer) = self.inner.take() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                ::log::debug!("Renderer session dropped without close, closing in background");
                handle.spawn(async move {
                    if let Err(e) = renderer.close().await {
                        ::log::warn!("Failed to close abandoned renderer session: {}", e);
                    }
                });
            }
            Err(_) => {
                ::log::warn!("Renderer session dropped outside a runtime, session not closed");
            }
        }
    }
}
