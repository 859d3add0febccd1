use crate::crawlers::resolver::LinkPattern;
use crate::errors::RenderError;
use crate::renderer::ClickableRef;
use scraper::{ElementRef, Html, Node, Selector};

/// Elements whose text never counts as page content
const NON_CONTENT_TAGS: [&str; 5] = ["script", "style", "meta", "link", "noscript"];

/// A static HTML document answering the same queries a browser session does.
///
/// The source is re-parsed for every query so the page stays `Send`.
#[derive(Debug, Clone)]
pub struct HtmlPage {
    url: String,
    source: String,
}

impl HtmlPage {
    pub fn new(url: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            source: source.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn document(&self) -> Html {
        Html::parse_document(&self.source)
    }

    pub fn title(&self) -> String {
        let doc = self.document();
        let selector = Selector::parse("title").unwrap();
        doc.select(&selector)
            .next()
            .map(|e| e.text().collect::<String>().trim().to_string())
            .unwrap_or_default()
    }

    /// Text of the `body` element, or `None` when the document has none
    pub fn root_text(&self) -> Option<String> {
        let doc = self.document();
        let selector = Selector::parse("body").unwrap();
        doc.select(&selector).next().map(|body| {
            let mut parts = Vec::new();
            collect_text(body, &mut parts);
            parts.join(" ")
        })
    }

    pub fn text_leaves(&self) -> Vec<String> {
        let doc = self.document();
        let selector = Selector::parse("body").unwrap();
        let mut leaves = Vec::new();
        if let Some(body) = doc.select(&selector).next() {
            collect_text(body, &mut leaves);
        }
        leaves
    }

    pub fn links(&self) -> Vec<String> {
        let doc = self.document();
        let selector = Selector::parse("a").unwrap();
        let links = doc
            .select(&selector)
            .filter_map(|e| e.value().attr("href"))
            .map(|s| s.to_string())
            .collect::<Vec<String>>();

        ::log::debug!("HTML page {} has {} links", self.url, links.len());
        links
    }

    pub fn meta(&self, name: &str) -> Option<String> {
        let doc = self.document();
        let selector = Selector::parse("meta").unwrap();
        doc.select(&selector)
            .find(|e| {
                let el = e.value();
                el.attr("name") == Some(name) || el.attr("property") == Some(name)
            })
            .and_then(|e| e.value().attr("content"))
            .map(|s| s.to_string())
    }

    pub fn count(&self, css: &str) -> Result<usize, RenderError> {
        let selector = Selector::parse(css)
            .map_err(|e| RenderError::Query(format!("invalid selector {}: {}", css, e)))?;
        Ok(self.document().select(&selector).count())
    }

    /// Text of every element matching `css`, in document order
    pub fn select_text(&self, css: &str) -> Result<Vec<String>, RenderError> {
        let selector = Selector::parse(css)
            .map_err(|e| RenderError::Query(format!("invalid selector {}: {}", css, e)))?;
        Ok(self
            .document()
            .select(&selector)
            .map(|element| {
                let mut parts = Vec::new();
                collect_text(element, &mut parts);
                parts.join(" ")
            })
            .collect())
    }

    pub fn first_matching(&self, patterns: &[LinkPattern]) -> Option<ClickableRef> {
        let doc = self.document();
        for pattern in patterns {
            let selector = Selector::parse(pattern.tag()).unwrap();
            if let Some(element) = doc.select(&selector).find(|e| pattern_matches(pattern, e)) {
                return Some(ClickableRef {
                    href: element.value().attr("href").map(|s| s.to_string()),
                    displayed: is_displayed(&element),
                    enabled: is_enabled(&element),
                });
            }
        }
        None
    }
}

/// Collects the normalized text of every non-empty text node under `element`
fn collect_text(element: ElementRef<'_>, out: &mut Vec<String>) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
                if !normalized.is_empty() {
                    out.push(normalized);
                }
            }
            Node::Element(el) if NON_CONTENT_TAGS.contains(&el.name()) => {}
            Node::Element(_) => {
                if let Some(child_ref) = ElementRef::wrap(child) {
                    collect_text(child_ref, out);
                }
            }
            _ => {}
        }
    }
}

fn pattern_matches(pattern: &LinkPattern, element: &ElementRef<'_>) -> bool {
    let el = element.value();
    match pattern {
        LinkPattern::AnchorText(needle) | LinkPattern::ButtonText(needle) => {
            element.text().collect::<String>().contains(needle)
        }
        LinkPattern::AnchorClass(needle) => el.attr("class").is_some_and(|v| v.contains(needle)),
        LinkPattern::AnchorRel(needle) => el.attr("rel").is_some_and(|v| v.contains(needle)),
        LinkPattern::AnchorAriaLabel(needle) => {
            el.attr("aria-label").is_some_and(|v| v.contains(needle))
        }
    }
}

/// Static approximation of visibility: no `hidden`, `aria-hidden` or
/// inline `display:none` / `visibility:hidden`
fn is_displayed(element: &ElementRef<'_>) -> bool {
    let el = element.value();
    if el.attr("hidden").is_some() || el.attr("aria-hidden") == Some("true") {
        return false;
    }
    let style = el
        .attr("style")
        .map(|s| s.replace(' ', "").to_lowercase())
        .unwrap_or_default();
    !(style.contains("display:none") || style.contains("visibility:hidden"))
}

fn is_enabled(element: &ElementRef<'_>) -> bool {
    let el = element.value();
    el.attr("disabled").is_none() && el.attr("aria-disabled") != Some("true")
}
