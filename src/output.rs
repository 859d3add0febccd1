use crate::errors::CrawlResult;
use crate::results::DocumentRecord;
use crate::utils::{get_timestamp, sanitize_filename};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Writes `document` into `dir` once per requested format (`txt`, `json`).
///
/// Files are named `<sanitized title>_<YYYYmmdd_HHMMSS>.<format>`. Unknown
/// formats are skipped with a warning. Returns the written path per format.
pub fn save_document(
    document: &DocumentRecord,
    dir: &Path,
    formats: &[String],
) -> CrawlResult<BTreeMap<String, PathBuf>> {
    fs::create_dir_all(dir)?;
    let stem = format!("{}_{}", sanitize_filename(&document.title), get_timestamp());

    let mut written = BTreeMap::new();
    for format in formats {
        let format = format.trim().to_lowercase();
        let contents = match format.as_str() {
            "txt" => render_text(document),
            "json" => serde_json::to_string_pretty(document)?,
            other => {
                ::log::warn!("Skipping unsupported output format: {}", other);
                continue;
            }
        };

        let path = dir.join(format!("{}.{}", stem, format));
        fs::write(&path, contents)?;
        ::log::info!("Saved {} as {}", document.url, path.display());
        written.insert(format, path);
    }

    Ok(written)
}

fn render_text(document: &DocumentRecord) -> String {
    format!(
        "Title: {}\nURL: {}\nPages: {}\nFetched: {}\nMerged: {}\n{}\n\n{}\n",
        document.title,
        document.url,
        document.page_count,
        document.fetched_at.format("%Y-%m-%d %H:%M:%S"),
        document.merged_at.format("%Y-%m-%d %H:%M:%S"),
        "-".repeat(80),
        document.body_text
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::ContentType;
    use chrono::Utc;
    use std::collections::BTreeSet;

    fn document() -> DocumentRecord {
        DocumentRecord {
            url: "https://example.com/a".to_string(),
            title: "Report: Q1/Q2".to_string(),
            body_text: "first\n\nsecond".to_string(),
            fragments: vec!["first".to_string(), "second".to_string()],
            links: BTreeSet::new(),
            metadata: BTreeMap::new(),
            content_type: ContentType::General,
            page_count: 2,
            is_paginated: true,
            page_urls: vec![],
            fetched_at: Utc::now(),
            merged_at: Utc::now(),
        }
    }

    #[test]
    fn test_writes_requested_formats() {
        let dir = tempfile::tempdir().unwrap();
        let formats = vec!["txt".to_string(), "JSON".to_string(), "pdf".to_string()];

        let written = save_document(&document(), dir.path(), &formats).unwrap();
        assert_eq!(written.len(), 2);

        let txt = &written["txt"];
        let name = txt.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("Report_ Q1_Q2_"));
        assert!(name.ends_with(".txt"));

        let text = fs::read_to_string(txt).unwrap();
        assert!(text.starts_with("Title: Report: Q1/Q2\nURL: https://example.com/a\nPages: 2\n"));
        assert!(text.ends_with("first\n\nsecond\n"));

        let json = fs::read_to_string(&written["json"]).unwrap();
        let parsed: DocumentRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, document_with_times(&parsed));
    }

    fn document_with_times(other: &DocumentRecord) -> DocumentRecord {
        DocumentRecord {
            fetched_at: other.fetched_at,
            merged_at: other.merged_at,
            ..document()
        }
    }

    #[test]
    fn test_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("out").join("docs");

        let written = save_document(&document(), &nested, &["json".to_string()]).unwrap();
        assert!(written["json"].exists());
    }
}
