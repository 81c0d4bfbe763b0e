//! Plain-text content file (`content.txt`).

use crate::error::CrawlError;
use crate::models::ContentFragment;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

/// Render fragments in order into a single string.
pub fn render_content(fragments: &[ContentFragment]) -> String {
    fragments.iter().map(ContentFragment::render).collect()
}

/// Write the rendered fragments to `path`, replacing any existing file.
#[instrument(level = "info", skip_all, fields(path = %path.display(), fragments = fragments.len()))]
pub async fn save_content(fragments: &[ContentFragment], path: &Path) -> Result<(), CrawlError> {
    fs::write(path, render_content(fragments))
        .await
        .map_err(|e| CrawlError::persistence(path, e))?;
    info!("Content saved");
    Ok(())
}
