use crate::errors::{CrawlError, CrawlResult};
use std::time::Duration;
use url::Url;

/// Longest file stem produced by [`sanitize_filename`], in characters
const MAX_FILENAME_CHARS: usize = 100;

/// Convert a page title to a sanitized filename stem
pub fn sanitize_filename(title: &str) -> String {
    let name = title
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect::<String>();
    let name = name.trim();

    if name.is_empty() {
        return "untitled".to_string();
    }

    // Limit filename length
    name.chars().take(MAX_FILENAME_CHARS).collect()
}

/// Local time formatted for file names, e.g. `20240131_235959`
pub fn get_timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Formats a duration as `HH:MM:SS`
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let (hours, rest) = (total / 3600, total % 3600);
    format!("{:02}:{:02}:{:02}", hours, rest / 60, rest % 60)
}

/// Checks that `url` is an absolute http(s) URL with a host
pub fn validate_url(url: &str) -> CrawlResult<String> {
    let trimmed = url.trim();
    let parsed = Url::parse(trimmed).map_err(|e| CrawlError::InvalidUrl(format!("{}: {}", trimmed, e)))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(CrawlError::InvalidUrl(format!(
            "{}: unsupported scheme {}",
            trimmed,
            parsed.scheme()
        )));
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(CrawlError::InvalidUrl(format!("{}: missing host", trimmed)));
    }

    Ok(trimmed.to_string())
}
