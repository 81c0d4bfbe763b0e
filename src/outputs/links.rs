//! Plain-text link list, one absolute URL per line.
//!
//! Pages without links leave a `# No links found in {url}` comment line,
//! which URL-list readers skip.

use crate::error::CrawlError;
use std::path::Path;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{info, instrument};

/// Create the parent directory and, unless appending, empty the file.
#[instrument(level = "info", skip_all, fields(path = %path.display(), append))]
pub async fn prepare_link_file(path: &Path, append: bool) -> Result<(), CrawlError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| CrawlError::persistence(parent, e))?;
    }
    if !append {
        fs::write(path, "")
            .await
            .map_err(|e| CrawlError::persistence(path, e))?;
    }
    Ok(())
}

/// Render the lines written for one page.
pub fn render_links(page_url: &str, links: &[String]) -> String {
    if links.is_empty() {
        return format!("# No links found in {page_url}\n");
    }
    links.iter().map(|link| format!("{link}\n")).collect()
}

/// Append one page's links to `path`.
#[instrument(level = "info", skip_all, fields(path = %path.display(), %page_url, count = links.len()))]
pub async fn append_links(path: &Path, page_url: &str, links: &[String]) -> Result<(), CrawlError> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|e| CrawlError::persistence(path, e))?;
    file.write_all(render_links(page_url, links).as_bytes())
        .await
        .map_err(|e| CrawlError::persistence(path, e))?;
    file.flush()
        .await
        .map_err(|e| CrawlError::persistence(path, e))?;
    info!("Saved links");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_links() {
        assert_eq!(
            render_links("https://x.edu/a.html", &[]),
            "# No links found in https://x.edu/a.html\n"
        );
        let links = vec!["https://x.edu/1".to_string(), "https://x.edu/2".to_string()];
        assert_eq!(render_links("https://x.edu", &links), "https://x.edu/1\nhttps://x.edu/2\n");
    }

    #[tokio::test]
    async fn test_prepare_truncates_unless_appending() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("links/dao_tao.txt");

        prepare_link_file(&path, false).await.unwrap();
        append_links(&path, "p1", &["https://x.edu/1".to_string()]).await.unwrap();
        prepare_link_file(&path, true).await.unwrap();
        append_links(&path, "p2", &[]).await.unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "https://x.edu/1\n# No links found in p2\n"
        );

        prepare_link_file(&path, false).await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }
}
