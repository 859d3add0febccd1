use crate::parsers::{PageShape, classify};
use crate::results::ContentType;

fn shape(fragments: usize, list_items: usize, forms: usize) -> PageShape {
    PageShape {
        fragments,
        list_items,
        forms,
    }
}

#[test]
fn test_url_markers_take_priority() {
    // Article markers win even on a page full of list items and forms
    assert_eq!(
        classify("https://example.com/blog/2024/hello", shape(3, 50, 2)),
        ContentType::Article
    );
    assert_eq!(
        classify("https://example.com/News/today", shape(1, 0, 0)),
        ContentType::Article
    );

    // Product markers come after article markers
    assert_eq!(
        classify("https://shop.example.com/catalog", shape(3, 50, 2)),
        ContentType::Product
    );
    assert_eq!(
        classify("https://example.com/product/post-it", shape(3, 0, 0)),
        ContentType::Article
    );
}

#[test]
fn test_structure_heuristics() {
    let url = "https://example.com/catalog";

    assert_eq!(classify(url, shape(5, 11, 1)), ContentType::List);
    // Exactly ten list items is not enough
    assert_eq!(classify(url, shape(5, 10, 0)), ContentType::General);
    assert_eq!(classify(url, shape(5, 10, 1)), ContentType::Form);
    assert_eq!(classify(url, shape(5, 0, 0)), ContentType::General);
}

#[test]
fn test_empty_page_is_unknown() {
    assert_eq!(
        classify("https://example.com/news/empty", shape(0, 20, 1)),
        ContentType::Unknown
    );
}
