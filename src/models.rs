//! Data models for crawl targets, extracted content and crawl outcomes.
//!
//! - [`CrawlTarget`]: a URL plus the directory-safe identifier derived from it
//! - [`ContentFragment`]: one ordered unit of extracted page content
//! - [`CrawlResult`]: per-URL outcome, serialized as `metadata.json`
//! - [`BatchSummary`]: attempted vs. succeeded counts for one invocation
//! - [`PdfLink`]: a discovered PDF document waiting to be downloaded

use crate::error::CrawlError;
use serde::{Deserialize, Serialize};
use url::Url;

/// Placeholder written when a page yields no extractable content.
pub const NO_CONTENT_PLACEHOLDER: &str = "No content found.";

/// Title used when a page has no `<title>` element.
pub const UNTITLED_PAGE: &str = "Untitled Page";

/// Page extensions stripped from the last path segment of an identifier.
const PAGE_EXTENSIONS: [&str; 4] = ["html", "htm", "php", "asp"];

/// A URL to crawl together with its output-directory identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTarget {
    pub url: Url,
    pub identifier: String,
}

impl CrawlTarget {
    pub fn parse(raw: &str) -> Result<Self, CrawlError> {
        let url = Url::parse(raw.trim()).map_err(|e| CrawlError::Parse {
            url: raw.to_string(),
            reason: e.to_string(),
        })?;
        let identifier = sanitize_identifier(&url);
        Ok(Self { url, identifier })
    }

    /// The identifier prefixed with the (filesystem-safe) host name.
    pub fn host_qualified_identifier(&self) -> String {
        let host = self.url.host_str().unwrap_or("page");
        format!("{}_{}", filesystem_safe(host), self.identifier)
    }
}

/// Derive a filesystem-safe directory name from a URL.
///
/// The path (without surrounding slashes) has its separators replaced by
/// underscores and a trailing `.html`/`.htm`/`.php`/`.asp` removed. Pages
/// without a path fall back to the host name.
///
/// # Examples
///
/// ```ignore
/// let url = Url::parse("https://hus.vnu.edu.vn/gioi-thieu/co-cau-to-chuc.html").unwrap();
/// assert_eq!(sanitize_identifier(&url), "gioi-thieu_co-cau-to-chuc");
/// ```
pub fn sanitize_identifier(url: &Url) -> String {
    let host = url.host_str().unwrap_or("page");
    let decoded = urlencoding::decode(url.path())
        .map(|p| p.into_owned())
        .unwrap_or_else(|_| url.path().to_string());
    let path = decoded.trim_matches('/');

    let mut name = path.replace(['/', '\\'], "_");
    if let Some((stem, ext)) = name.rsplit_once('.') {
        if PAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) {
            name = stem.to_string();
        }
    }

    let safe = filesystem_safe(&name);
    if safe.chars().all(|c| c == '.') {
        // Empty paths and bare dots would escape the output root.
        return filesystem_safe(host);
    }
    safe
}

fn filesystem_safe(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '_' | '.' | '-' | ' ') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// One classified unit of page content, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentFragment {
    /// Text of an `h1`, rendered as the page title marker.
    Heading(String),
    Paragraph(String),
    /// Blank line emitted ahead of every table.
    Separator,
    TableRow(Vec<String>),
    ImageMarker(String),
}

impl ContentFragment {
    pub fn placeholder() -> Self {
        ContentFragment::Paragraph(NO_CONTENT_PLACEHOLDER.to_string())
    }

    /// Text form written to `content.txt`; always newline-terminated.
    pub fn render(&self) -> String {
        match self {
            ContentFragment::Heading(text) => format!("Title: {text}\n"),
            ContentFragment::Paragraph(text) => format!("{text}\n"),
            ContentFragment::Separator => "\n".to_string(),
            ContentFragment::TableRow(cells) => format!("{}\n", cells.join("\t")),
            ContentFragment::ImageMarker(url) => format!("Image: {url}\n"),
        }
    }
}

/// Outcome of crawling one URL.
///
/// Serialized once as the page's `metadata.json` sidecar and never changed
/// afterwards. `success` only feeds the batch summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlResult {
    #[serde(skip)]
    pub success: bool,
    pub url: String,
    pub title: String,
    /// Local crawl time, RFC 3339.
    pub crawl_date: String,
    pub content_file: String,
    pub image_files: Vec<String>,
}

/// Attempted vs. succeeded counts for one invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub attempted: usize,
    pub succeeded: usize,
    /// Images, PDFs or links persisted during the run.
    pub assets: usize,
}

impl BatchSummary {
    pub fn record(&mut self, succeeded: bool, assets: usize) {
        self.attempted += 1;
        if succeeded {
            self.succeeded += 1;
        }
        self.assets += assets;
    }

    pub fn failed(&self) -> usize {
        self.attempted - self.succeeded
    }

    pub fn all_succeeded(&self) -> bool {
        self.succeeded == self.attempted
    }
}

/// Where a PDF link was found on its page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfLink {
    pub url: String,
    pub name: String,
    /// Container id, `iframe`, or `general`.
    pub group: String,
}
