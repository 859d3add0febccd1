pub mod text;

#[cfg(test)]
mod tests;

use crate::results::ContentType;

/// URL substrings that mark a page as an article
const ARTICLE_MARKERS: [&str; 4] = ["article", "post", "blog", "news"];

/// URL substrings that mark a page as a product page
const PRODUCT_MARKERS: [&str; 6] = ["product", "item", "shop", "store", "buy", "price"];

/// A page with more list items than this is classified as a list
pub const LIST_ITEM_THRESHOLD: usize = 10;

/// Structural counts gathered from a rendered page for classification
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageShape {
    /// Number of non-empty text fragments
    pub fragments: usize,
    /// Number of `li` elements
    pub list_items: usize,
    /// Number of `form` elements
    pub forms: usize,
}

/// Classifies a page using a fixed priority list of heuristics.
///
/// A page without any text fragment is `Unknown`. Otherwise URL markers are
/// checked first (article before product), then the page structure.
pub fn classify(url: &str, shape: PageShape) -> ContentType {
    if shape.fragments == 0 {
        ::log::debug!("Classifying as Unknown (no text): {}", url);
        return ContentType::Unknown;
    }

    let url = url.to_lowercase();
    let content_type = if ARTICLE_MARKERS.iter().any(|m| url.contains(m)) {
        ContentType::Article
    } else if PRODUCT_MARKERS.iter().any(|m| url.contains(m)) {
        ContentType::Product
    } else if shape.list_items > LIST_ITEM_THRESHOLD {
        ContentType::List
    } else if shape.forms > 0 {
        ContentType::Form
    } else {
        ContentType::General
    };

    ::log::debug!("Classifying as {:?}: {}", content_type, url);
    content_type
}
