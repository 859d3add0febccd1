use crate::renderer::Renderer;
use url::Url;

/// One way a "next page" control can be recognized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkPattern {
    /// Anchor whose text contains the needle
    AnchorText(&'static str),
    /// Anchor whose `class` contains the needle
    AnchorClass(&'static str),
    /// Anchor whose `rel` contains the needle
    AnchorRel(&'static str),
    /// Anchor whose `aria-label` contains the needle
    AnchorAriaLabel(&'static str),
    /// Button whose text contains the needle
    ButtonText(&'static str),
}

/// Next-page patterns in priority order. The first actionable match wins.
pub const NEXT_PAGE_PATTERNS: &[LinkPattern] = &[
    LinkPattern::AnchorText("下一页"),
    LinkPattern::AnchorText("Next"),
    LinkPattern::AnchorClass("next"),
    LinkPattern::AnchorRel("next"),
    LinkPattern::AnchorAriaLabel("Next"),
    LinkPattern::ButtonText("下一页"),
    LinkPattern::ButtonText("Next"),
];

impl LinkPattern {
    /// Element name the pattern applies to
    pub fn tag(&self) -> &'static str {
        match self {
            LinkPattern::ButtonText(_) => "button",
            _ => "a",
        }
    }

    pub fn to_xpath(&self) -> String {
        let (tag, test) = match self {
            LinkPattern::AnchorText(needle) | LinkPattern::ButtonText(needle) => {
                (self.tag(), format!("contains(., {})", xpath_literal(needle)))
            }
            LinkPattern::AnchorClass(needle) => {
                ("a", format!("contains(@class, {})", xpath_literal(needle)))
            }
            LinkPattern::AnchorRel(needle) => {
                ("a", format!("contains(@rel, {})", xpath_literal(needle)))
            }
            LinkPattern::AnchorAriaLabel(needle) => {
                ("a", format!("contains(@aria-label, {})", xpath_literal(needle)))
            }
        };
        format!("//{}[{}]", tag, test)
    }
}

/// Quotes a string for use inside an XPath expression
fn xpath_literal(value: &str) -> String {
    if !value.contains('\'') {
        format!("'{}'", value)
    } else if !value.contains('"') {
        format!("\"{}\"", value)
    } else {
        let parts = value
            .split('\'')
            .map(|p| format!("'{}'", p))
            .collect::<Vec<_>>()
            .join(", \"'\", ");
        format!("concat({})", parts)
    }
}

/// Returns the URL of the next page in a paginated sequence, if any.
///
/// Patterns are tried in [`NEXT_PAGE_PATTERNS`] order. A match that is
/// hidden or disabled is skipped; the first displayed and enabled match
/// decides the result, even when it carries no href. Renderer failures end
/// the sequence rather than the crawl.
pub async fn resolve_next(renderer: &dyn Renderer) -> Option<String> {
    for pattern in NEXT_PAGE_PATTERNS {
        let candidate = match renderer.find_first_matching(std::slice::from_ref(pattern)).await {
            Ok(Some(candidate)) => candidate,
            Ok(None) => continue,
            Err(e) => {
                ::log::warn!("Failed to look for next page link: {}", e);
                return None;
            }
        };

        if !candidate.is_actionable() {
            ::log::trace!("Skipping hidden or disabled match for {:?}", pattern);
            continue;
        }

        let Some(href) = candidate.href else {
            ::log::debug!("Next page control for {:?} has no href", pattern);
            return None;
        };

        let resolved = match renderer.current_url().await {
            Ok(base) => absolutize(&base, &href),
            Err(_) => Some(href),
        };
        ::log::debug!("Next page link via {:?}: {:?}", pattern, resolved);
        return resolved;
    }

    None
}

/// Resolves `href` against `base`, dropping the fragment.
///
/// Only http(s) targets are kept; `javascript:` or `mailto:` hrefs yield
/// `None`.
pub fn absolutize(base: &str, href: &str) -> Option<String> {
    let joined = match Url::parse(base) {
        Ok(base) => base.join(href).ok()?,
        Err(_) => Url::parse(href).ok()?,
    };

    if !matches!(joined.scheme(), "http" | "https") {
        return None;
    }

    let mut normalized = joined;
    normalized.set_fragment(None);
    Some(normalized.to_string())
}
