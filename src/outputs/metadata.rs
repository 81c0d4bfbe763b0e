//! JSON sidecar (`metadata.json`) describing one crawled page.
//!
//! ```json
//! {
//!   "url": "https://hus.vnu.edu.vn/gioi-thieu.html",
//!   "title": "Giới thiệu",
//!   "crawl_date": "2025-05-06T14:30:00.123456+07:00",
//!   "content_file": "crawled_data/gioi-thieu/content.txt",
//!   "image_files": ["crawled_data/gioi-thieu/images/image_1.jpg"]
//! }
//! ```
//!
//! Output is indented with two spaces and keeps non-ASCII text as-is.

use crate::error::CrawlError;
use crate::models::CrawlResult;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

/// Write `result` as pretty JSON to `path`, replacing any existing file.
#[instrument(level = "info", skip_all, fields(path = %path.display(), url = %result.url))]
pub async fn save_metadata(result: &CrawlResult, path: &Path) -> Result<(), CrawlError> {
    let json = serde_json::to_string_pretty(result).map_err(|e| {
        CrawlError::persistence(path, std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    })?;
    fs::write(path, json)
        .await
        .map_err(|e| CrawlError::persistence(path, e))?;
    info!("Metadata saved");
    Ok(())
}
