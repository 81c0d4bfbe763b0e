//! Page content pipeline: fetch → clean → extract → images → persist.
//!
//! Each URL runs the whole pipeline independently and writes only inside its
//! own `{output_dir}/{identifier}/` directory, so pipelines can share a
//! worker pool without coordination. Identifiers are made unique across the
//! batch before the first request. Only a failed fetch or an unusable
//! page directory fails a URL; writing the content file, images and
//! metadata is best-effort.

use crate::config::ContentConfig;
use crate::error::CrawlError;
use crate::fetch::Fetcher;
use crate::html::{clean, extract, page_title};
use crate::images::{ImageFilter, download_images};
use crate::models::{BatchSummary, ContentFragment, CrawlResult, CrawlTarget, UNTITLED_PAGE};
use crate::outputs::content::save_content;
use crate::outputs::metadata::save_metadata;
use crate::utils::ensure_writable_dir;
use chrono::Local;
use futures::stream::{self, StreamExt};
use scraper::Html;
use std::collections::HashSet;
use tokio::fs;
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};
use url::Url;

/// Parsed page content before image filtering.
struct PageAnalysis {
    title: String,
    fragments: Vec<ContentFragment>,
    missing_body: bool,
}

/// Parse, clean and extract in one synchronous step so the DOM never lives
/// across an await point.
fn analyze(body: &str, base_url: &Url) -> PageAnalysis {
    let mut doc = Html::parse_document(body);
    let title = page_title(&doc).unwrap_or_else(|| UNTITLED_PAGE.to_string());
    clean(&mut doc);
    let extraction = extract(&doc, base_url);
    PageAnalysis {
        title,
        fragments: extraction.fragments,
        missing_body: extraction.missing_body,
    }
}

/// Drop image markers the filter rejects; return survivors and accepted URLs.
async fn retain_accepted_images(
    fragments: Vec<ContentFragment>,
    filter: &ImageFilter<'_>,
) -> (Vec<ContentFragment>, Vec<String>) {
    let mut kept = Vec::with_capacity(fragments.len());
    let mut images = Vec::new();
    for fragment in fragments {
        if let ContentFragment::ImageMarker(url) = &fragment {
            if !filter.accept(url).await {
                continue;
            }
            images.push(url.clone());
        }
        kept.push(fragment);
    }
    (kept, images)
}

/// Parse the batch and give every distinct URL its own output directory.
///
/// Repeated URLs are kept once. When a URL's identifier is already taken by
/// an earlier one, the host is prefixed, then a counter appended until the
/// name is free. Names are compared case-insensitively. Unparseable URLs stay
/// in the plan as errors so they are counted as failures.
///
/// # Arguments
///
/// * `urls` - Raw URLs in submission order
///
/// # Returns
///
/// One entry per distinct URL, in first-seen order.
pub fn plan_batch(urls: &[String]) -> Vec<(String, Result<CrawlTarget, CrawlError>)> {
    let mut seen_urls = HashSet::new();
    let mut taken = HashSet::new();
    let mut plan = Vec::with_capacity(urls.len());

    for raw in urls {
        let parsed = CrawlTarget::parse(raw);
        let key = match &parsed {
            Ok(target) => target.url.to_string(),
            Err(_) => raw.trim().to_string(),
        };
        if !seen_urls.insert(key) {
            info!(url = %raw, "Skipping repeated URL");
            continue;
        }

        let parsed = parsed.map(|mut target| {
            if !taken.insert(target.identifier.to_lowercase()) {
                let qualified = target.host_qualified_identifier();
                let mut identifier = qualified.clone();
                let mut n = 2;
                while !taken.insert(identifier.to_lowercase()) {
                    identifier = format!("{qualified}_{n}");
                    n += 1;
                }
                warn!(
                    url = %target.url,
                    from = %target.identifier,
                    to = %identifier,
                    "Identifier already used in this batch; renamed"
                );
                target.identifier = identifier;
            }
            target
        });
        plan.push((raw.clone(), parsed));
    }
    plan
}

/// Crawl a single target and write its content, images and metadata.
#[instrument(level = "info", skip_all, fields(url = %target.url, identifier = %target.identifier))]
pub async fn crawl_url(
    target: &CrawlTarget,
    config: &ContentConfig,
    fetcher: &Fetcher,
) -> Result<CrawlResult, CrawlError> {
    let page = fetcher.fetch(target.url.as_str()).await?;
    let base_url = Url::parse(&page.final_url).unwrap_or_else(|_| target.url.clone());

    let analysis = analyze(&page.body, &base_url);
    if analysis.missing_body {
        warn!("Page has no body element; no content extracted");
    }

    let page_dir = config.output_dir.join(&target.identifier);
    fs::create_dir_all(&page_dir)
        .await
        .map_err(|e| CrawlError::persistence(&page_dir, e))?;

    let filter = ImageFilter::new(config, fetcher);
    let (mut fragments, image_urls) = retain_accepted_images(analysis.fragments, &filter).await;
    if fragments.is_empty() {
        warn!("No content extracted");
        fragments.push(ContentFragment::placeholder());
    }

    let content_file = page_dir.join("content.txt");
    if let Err(e) = save_content(&fragments, &content_file).await {
        error!(error = %e, "Failed to save content");
    }

    let image_files = download_images(
        fetcher,
        &image_urls,
        &page_dir.join("images"),
        config.rate_limit_delay(),
    )
    .await;

    let result = CrawlResult {
        success: true,
        url: target.url.to_string(),
        title: analysis.title,
        crawl_date: Local::now().to_rfc3339(),
        content_file: content_file.display().to_string(),
        image_files: image_files.iter().map(|p| p.display().to_string()).collect(),
    };
    if let Err(e) = save_metadata(&result, &page_dir.join("metadata.json")).await {
        error!(error = %e, "Failed to save metadata");
    }

    info!(
        fragments = fragments.len(),
        images = result.image_files.len(),
        "Successfully crawled"
    );
    Ok(result)
}

/// Crawl every URL in `urls`, `config.workers` at a time.
///
/// Submissions are spaced by the politeness delay. A failing URL is logged
/// and counted; it never stops the rest of the batch. Repeated URLs are
/// crawled and counted once.
///
/// # Arguments
///
/// * `urls` - Page URLs in submission order
/// * `config` - Output root, image rules, delay and worker count
/// * `fetcher` - Shared HTTP client
///
/// # Returns
///
/// The batch summary, or an error for problems found before the first
/// request (no URLs, unusable output root).
#[instrument(level = "info", skip_all, fields(count = urls.len(), workers = config.workers))]
pub async fn run(
    urls: &[String],
    config: &ContentConfig,
    fetcher: &Fetcher,
) -> Result<BatchSummary, CrawlError> {
    if urls.is_empty() {
        return Err(CrawlError::Config("no URLs supplied".to_string()));
    }
    ensure_writable_dir(&config.output_dir).await?;

    let plan = plan_batch(urls);
    let delay = config.rate_limit_delay();
    let outcomes: Vec<Option<CrawlResult>> = stream::iter(plan.into_iter().enumerate())
        .then(move |(i, planned)| async move {
            if i > 0 {
                sleep(delay).await;
            }
            planned
        })
        .map(|(url, target)| async move {
            let outcome = match target {
                Ok(target) => crawl_url(&target, config, fetcher).await,
                Err(e) => Err(e),
            };
            match outcome {
                Ok(result) => Some(result),
                Err(e) => {
                    error!(%url, error = %e, "Error crawling page");
                    None
                }
            }
        })
        .buffer_unordered(config.workers.max(1))
        .collect()
        .await;

    let mut summary = BatchSummary::default();
    for outcome in &outcomes {
        match outcome {
            Some(result) => summary.record(result.success, result.image_files.len()),
            None => summary.record(false, 0),
        }
    }

    info!(
        attempted = summary.attempted,
        succeeded = summary.succeeded,
        images = summary.assets,
        output_dir = %config.output_dir.display(),
        "Crawl completed"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{serve, test_fetcher};
    use axum::Router;
    use axum::http::header::CONTENT_TYPE;
    use axum::response::Html as HtmlResponse;
    use axum::routing::get;
    use std::path::Path;

    fn test_config(output_dir: &Path) -> ContentConfig {
        ContentConfig {
            output_dir: output_dir.to_path_buf(),
            rate_limit_delay_secs: 0.0,
            workers: 2,
            ..ContentConfig::default()
        }
    }

    fn page(n: usize) -> HtmlResponse<String> {
        HtmlResponse(format!(
            "<html><head><title>Trang {n}</title></head><body><p>Nội dung {n}</p></body></html>"
        ))
    }

    #[tokio::test]
    async fn test_batch_counts_failure_and_continues() {
        let app = Router::new()
            .route("/page1.html", get(|| async { page(1) }))
            .route("/page2.html", get(|| async { page(2) }))
            .route("/page4.html", get(|| async { page(4) }))
            .route("/page5.html", get(|| async { page(5) }));
        let addr = serve(app).await;
        let tmp = tempfile::TempDir::new().unwrap();
        let config = test_config(tmp.path());

        let urls: Vec<String> = (1..=5)
            .map(|n| format!("http://{addr}/page{n}.html"))
            .collect();
        let summary = run(&urls, &config, &test_fetcher()).await.unwrap();

        assert_eq!(summary.attempted, 5);
        assert_eq!(summary.succeeded, 4);
        assert!(!summary.all_succeeded());
        for n in [1, 2, 4, 5] {
            let dir = tmp.path().join(format!("page{n}"));
            assert!(dir.join("content.txt").is_file(), "page{n}");
            assert!(dir.join("metadata.json").is_file(), "page{n}");
        }
        assert!(!tmp.path().join("page3").exists());
    }

    #[tokio::test]
    async fn test_empty_page_gets_placeholder_and_metadata() {
        let app = Router::new().route(
            "/trong.html",
            get(|| async { HtmlResponse("<html><body><nav><p>menu</p></nav></body></html>") }),
        );
        let addr = serve(app).await;
        let tmp = tempfile::TempDir::new().unwrap();
        let url = format!("http://{addr}/trong.html");

        let target = CrawlTarget::parse(&url).unwrap();
        let result = crawl_url(&target, &test_config(tmp.path()), &test_fetcher())
            .await
            .unwrap();
        assert_eq!(result.title, UNTITLED_PAGE);

        let dir = tmp.path().join("trong");
        let content = std::fs::read_to_string(dir.join("content.txt")).unwrap();
        assert_eq!(content, "No content found.\n");

        let meta: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.join("metadata.json")).unwrap())
                .unwrap();
        assert_eq!(meta["url"], url.as_str());
        let date = meta["crawl_date"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(date).is_ok());
        assert_eq!(meta["image_files"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_page_with_images_and_table() {
        let body = r#"<html><head><title>Cơ cấu tổ chức</title></head><body>
            <header class="site-header"><img src="/img/header.jpg"></header>
            <h1>Phòng ban</h1>
            <p>Danh sách phòng ban.</p>
            <img src="/img/photo.jpg">
            <img src="/img/logo.png">
            <img src="/img/tiny.jpg">
            <table><tr><td>Phòng Đào tạo</td><td>P.101</td></tr><tr><td></td></tr></table>
            <footer><p>Địa chỉ</p></footer>
        </body></html>"#;
        let app = Router::new()
            .route("/co-cau/phong-ban.html", get(move || async move { HtmlResponse(body) }))
            .route(
                "/img/photo.jpg",
                get(|| async { ([(CONTENT_TYPE, "image/jpeg")], vec![9u8; 12 * 1024]) }),
            )
            .route("/img/header.jpg", get(|| async { vec![9u8; 64 * 1024] }))
            .route("/img/logo.png", get(|| async { vec![9u8; 64 * 1024] }))
            .route("/img/tiny.jpg", get(|| async { vec![9u8; 100] }));
        let addr = serve(app).await;
        let tmp = tempfile::TempDir::new().unwrap();
        let url = format!("http://{addr}/co-cau/phong-ban.html");

        let target = CrawlTarget::parse(&url).unwrap();
        let result = crawl_url(&target, &test_config(tmp.path()), &test_fetcher())
            .await
            .unwrap();

        let dir = tmp.path().join("co-cau_phong-ban");
        assert_eq!(result.title, "Cơ cấu tổ chức");
        assert_eq!(
            result.image_files,
            vec![dir.join("images/image_1.jpg").display().to_string()]
        );

        let content = std::fs::read_to_string(dir.join("content.txt")).unwrap();
        assert_eq!(
            content,
            format!(
                "Title: Phòng ban\nDanh sách phòng ban.\nImage: http://{addr}/img/photo.jpg\n\nPhòng Đào tạo\tP.101\n"
            )
        );
    }

    #[test]
    fn test_plan_batch_dedupes_and_disambiguates() {
        let urls: Vec<String> = [
            "https://hus.vnu.edu.vn/gioi-thieu.html",
            "https://hus.vnu.edu.vn/gioi-thieu.html",
            "https://hus.vnu.edu.vn/gioi-thieu.htm",
            "https://vnu.edu.vn/gioi-thieu.php",
            "https://hus.vnu.edu.vn/Gioi-Thieu.asp",
            "not a url",
            "not a url",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let plan = plan_batch(&urls);
        assert_eq!(plan.len(), 5);
        let identifiers: Vec<&str> = plan
            .iter()
            .filter_map(|(_, target)| target.as_ref().ok())
            .map(|target| target.identifier.as_str())
            .collect();
        assert_eq!(
            identifiers,
            vec![
                "gioi-thieu",
                "hus.vnu.edu.vn_gioi-thieu",
                "vnu.edu.vn_gioi-thieu",
                "hus.vnu.edu.vn_Gioi-Thieu_2",
            ]
        );
        assert!(matches!(plan[4].1, Err(CrawlError::Parse { .. })));
    }

    #[test]
    fn test_plan_batch_numbers_repeated_host_clashes() {
        let urls: Vec<String> = [
            "http://a.edu/x.html",
            "http://a.edu/x.htm",
            "http://a.edu/x.php",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        let identifiers: Vec<String> = plan_batch(&urls)
            .into_iter()
            .map(|(_, target)| target.unwrap().identifier)
            .collect();
        assert_eq!(identifiers, vec!["x", "a.edu_x", "a.edu_x_2"]);
    }

    #[tokio::test]
    async fn test_run_keeps_clashing_pages_apart() {
        let app = Router::new()
            .route("/gioi-thieu.html", get(|| async { page(1) }))
            .route("/gioi-thieu.htm", get(|| async { page(2) }));
        let addr = serve(app).await;
        let tmp = tempfile::TempDir::new().unwrap();
        let urls = vec![
            format!("http://{addr}/gioi-thieu.html"),
            format!("http://{addr}/gioi-thieu.htm"),
            format!("http://{addr}/gioi-thieu.html"),
        ];

        let summary = run(&urls, &test_config(tmp.path()), &test_fetcher())
            .await
            .unwrap();
        assert_eq!(summary.attempted, 2);
        assert_eq!(summary.succeeded, 2);

        let first = std::fs::read_to_string(tmp.path().join("gioi-thieu/content.txt")).unwrap();
        assert_eq!(first, "Nội dung 1\n");
        let second_dir = tmp.path().join("127.0.0.1_gioi-thieu");
        let second = std::fs::read_to_string(second_dir.join("content.txt")).unwrap();
        assert_eq!(second, "Nội dung 2\n");
        let meta = std::fs::read_to_string(second_dir.join("metadata.json")).unwrap();
        let meta: serde_json::Value = serde_json::from_str(&meta).unwrap();
        assert_eq!(meta["url"], urls[1].as_str());
    }

    #[tokio::test]
    async fn test_run_without_urls_is_config_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let err = run(&[], &test_config(tmp.path()), &test_fetcher())
            .await
            .unwrap_err();
        assert!(matches!(err, CrawlError::Config(_)));
    }
}
