pub mod batch;
pub mod extractor;
pub mod pagination;
pub mod resolver;
