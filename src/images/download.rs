//! Sequential, rate-limited image downloads into a page's `images/` folder.

use crate::fetch::Fetcher;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::time::sleep;
use tracing::{error, info, instrument};
use url::Url;

const KNOWN_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "gif", "webp", "svg"];

/// Download `urls` into `dir` as `image_{n}.{ext}`.
///
/// `n` is the 1-based position in `urls`, so a failed download leaves a gap
/// in the numbering. Returns the written paths in order.
#[instrument(level = "info", skip_all, fields(dir = %dir.display(), count = urls.len()))]
pub async fn download_images(
    fetcher: &Fetcher,
    urls: &[String],
    dir: &Path,
    delay: Duration,
) -> Vec<PathBuf> {
    if urls.is_empty() {
        return Vec::new();
    }
    if let Err(e) = fs::create_dir_all(dir).await {
        error!(error = %e, "Failed to create image directory");
        return Vec::new();
    }

    let mut saved = Vec::new();
    for (i, url) in urls.iter().enumerate() {
        if i > 0 {
            sleep(delay).await;
        }

        let fetched = match fetcher.fetch_bytes(url).await {
            Ok(fetched) => fetched,
            Err(e) => {
                error!(%url, error = %e, "Failed to download image");
                continue;
            }
        };

        let ext = image_extension(fetched.content_type.as_deref(), url);
        let path = dir.join(format!("image_{}.{}", i + 1, ext));
        match fs::write(&path, &fetched.bytes).await {
            Ok(()) => {
                info!(%url, path = %path.display(), "Downloaded image");
                saved.push(path);
            }
            Err(e) => error!(%url, path = %path.display(), error = %e, "Failed to save image"),
        }
    }
    saved
}

/// File extension from the declared content type, else the URL, else `jpg`.
pub fn image_extension(content_type: Option<&str>, url: &str) -> String {
    if let Some(ct) = content_type.filter(|ct| ct.to_lowercase().contains("image")) {
        let subtype = ct
            .split(';')
            .next()
            .unwrap_or_default()
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .trim()
            .to_lowercase();
        return match subtype.as_str() {
            "jpeg" | "pjpeg" => "jpg".to_string(),
            "svg+xml" => "svg".to_string(),
            "" => "jpg".to_string(),
            other => other.to_string(),
        };
    }

    let path = Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| url.to_string());
    path.rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .filter(|ext| KNOWN_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or_else(|| "jpg".to_string())
}
