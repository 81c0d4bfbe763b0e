//! Helpers for URL list input, file naming, logging and output directories.

use crate::error::CrawlError;
use std::fs as stdfs;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

/// Truncate a string for logging purposes.
///
/// Long strings are cut at the last character boundary at or below `max`
/// bytes and get an ellipsis plus the number of dropped bytes appended.
///
/// # Arguments
///
/// * `s` - The string to potentially truncate
/// * `max` - Maximum number of bytes to keep
///
/// # Returns
///
/// The original string if it fits, otherwise a truncated version with
/// `"…(+N bytes)"` appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Parse a URL list: one URL per line, blank lines and `#` comments skipped.
pub fn parse_url_list(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect()
}

/// Read a URL list file (see [`parse_url_list`]).
///
/// # Arguments
///
/// * `path` - Text file with one URL per line
///
/// # Returns
///
/// The URLs in file order, or [`CrawlError::Config`] if the file cannot be
/// read.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn read_urls_from_file(path: &Path) -> Result<Vec<String>, CrawlError> {
    let raw = fs::read_to_string(path)
        .await
        .map_err(|e| CrawlError::Config(format!("cannot read URL file {}: {e}", path.display())))?;
    let urls = parse_url_list(&raw);
    info!(count = urls.len(), "Read URLs from file");
    Ok(urls)
}

/// Turn free text (a link label) into a safe file name.
///
/// Alphanumerics, spaces, dots, underscores and dashes are kept; anything
/// else becomes `_`. Surrounding whitespace is trimmed.
pub fn safe_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, ' ' | '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if it doesn't exist, then creates and removes a
/// probe file inside it.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> Result<(), CrawlError> {
    fs::create_dir_all(path)
        .await
        .map_err(|e| CrawlError::persistence(path, e))?;
    let probe_path = path.join("..__probe_write__");
    match stdfs::File::create(&probe_path) {
        Ok(_) => {
            let _ = stdfs::remove_file(&probe_path);
            info!("Output directory is writable");
            Ok(())
        }
        Err(e) => Err(CrawlError::persistence(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_for_log_short_string() {
        assert_eq!(truncate_for_log("Hello, world!", 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_respects_char_boundaries() {
        // "ế" is three bytes; cutting at 2 must back off to 1.
        let result = truncate_for_log("aếb", 2);
        assert_eq!(result, "a…(+4 bytes)");
    }

    #[test]
    fn test_parse_url_list_skips_comments_and_blanks() {
        let raw = "\n# comment\nhttps://a.example/x.html\n   \n  https://b.example/  \n#https://c.example\n";
        assert_eq!(
            parse_url_list(raw),
            vec!["https://a.example/x.html", "https://b.example/"]
        );
    }

    #[test]
    fn test_safe_file_name() {
        assert_eq!(safe_file_name("  Quy chế đào tạo (2023)/v2 "), "Quy chế đào tạo _2023__v2");
        assert_eq!(safe_file_name("report.pdf"), "report.pdf");
    }

    #[tokio::test]
    async fn test_ensure_writable_dir_creates_nested() {
        let tmp = tempfile::TempDir::new().unwrap();
        let nested = tmp.path().join("a/b/c");
        ensure_writable_dir(&nested).await.unwrap();
        assert!(nested.is_dir());
        assert!(!nested.join("..__probe_write__").exists());
    }

    #[tokio::test]
    async fn test_read_urls_from_missing_file_is_config_error() {
        let err = read_urls_from_file(Path::new("/nonexistent/urls.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, CrawlError::Config(_)));
    }
}
