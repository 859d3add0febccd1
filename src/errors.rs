use thiserror::Error;

/// Failures raised by a renderer session
#[derive(Debug, Error)]
pub enum RenderError {
    /// The page did not finish loading (or an element did not appear) in time
    #[error("timed out loading {url}")]
    Timeout { url: String },

    /// The browser could not navigate to the page
    #[error("navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    /// The WebDriver session could not be created or was lost
    #[error("renderer session error: {0}")]
    Session(String),

    /// A script executed in the page failed or returned an unexpected value
    #[error("script error: {0}")]
    Script(String),

    /// An element query failed for a reason other than "not found"
    #[error("element query failed: {0}")]
    Query(String),
}

impl RenderError {
    /// Whether trying the same page again may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Navigation { .. })
    }
}

/// Top-level error type for crawling operations
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error(transparent)]
    Render(#[from] RenderError),

    /// Page content was not available after the wait budget
    #[error("could not extract content from {url}: {reason}")]
    Extraction { url: String, reason: String },

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("invalid CSS selector: {0}")]
    InvalidSelector(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A crawl finished without producing a single page
    #[error("no content extracted from {0}")]
    EmptyResult(String),
}

impl CrawlError {
    /// Failure kinds eligible for the capped retry policy
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Render(err) => err.is_transient(),
            Self::Extraction { .. } => true,
            _ => false,
        }
    }
}

pub type CrawlResult<T> = Result<T, CrawlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let timeout = CrawlError::from(RenderError::Timeout {
            url: "https://example.com".to_string(),
        });
        assert!(timeout.is_retryable());

        let extraction = CrawlError::Extraction {
            url: "https://example.com".to_string(),
            reason: "body missing".to_string(),
        };
        assert!(extraction.is_retryable());

        let session = CrawlError::from(RenderError::Session("gone".to_string()));
        assert!(!session.is_retryable());

        assert!(!CrawlError::InvalidUrl("nope".to_string()).is_retryable());
    }

    #[test]
    fn test_render_error_is_transparent() {
        let err = CrawlError::from(RenderError::Navigation {
            url: "https://example.com".to_string(),
            message: "dns".to_string(),
        });
        assert_eq!(err.to_string(), "navigation to https://example.com failed: dns");
    }
}
