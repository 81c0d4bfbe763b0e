//! PDF harvester for curriculum ("khung chương trình") pages.
//!
//! PDF links are discovered with three strategies, each tried only when the
//! previous one found nothing:
//!
//! 1. **Embedded viewers**: `iframe[src]` whose src mentions `.pdf`, named
//!    after the nearest preceding `div.tieude` heading link
//! 2. **Module containers**: `a[href$=".pdf"]` inside every `div` whose id
//!    matches the configured pattern (DNN module ids by default)
//! 3. **Whole page**: every `a[href]` ending in `.pdf`
//!
//! Relative links resolve against the site origin, not the page path.
//!
//! # Output Layout
//!
//! ```text
//! downloaded_pdfs/
//! ├── Khung CTĐT Toán học.pdf
//! └── debug_2_Khung CTĐT Vật lý.pdf.txt   # response was not a PDF
//! ```
//!
//! When a page yields more than five links spread over several groups, each
//! group gets its own sub-folder.

use crate::config::PdfConfig;
use crate::error::CrawlError;
use crate::fetch::Fetcher;
use crate::html::extract::element_text;
use crate::models::{BatchSummary, CrawlTarget, PdfLink};
use crate::utils::{ensure_writable_dir, safe_file_name};
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

static SECTION_TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("div.tieude").unwrap());
static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a").unwrap());
static ANCHOR_WITH_HREF: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());
static DIV_WITH_ID: Lazy<Selector> = Lazy::new(|| Selector::parse("div[id]").unwrap());
static FOLDER_UNSAFE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\-]").unwrap());

/// Bytes of a non-PDF response kept for inspection.
const DEBUG_SNIPPET_BYTES: usize = 1000;

/// Find the PDF links on a page, strategy by strategy, without duplicates.
pub fn discover_pdf_links(doc: &Html, page_url: &Url, div_pattern: &Regex) -> Vec<PdfLink> {
    let origin = site_origin(page_url);

    let mut links = iframe_links(doc, &origin);
    if links.is_empty() {
        links = module_links(doc, &origin, div_pattern);
    }
    if links.is_empty() {
        debug!(%page_url, "Falling back to every PDF anchor on the page");
        links = page_links(doc, &origin);
    }

    links.into_iter().unique_by(|link| link.url.clone()).collect()
}

fn iframe_links(doc: &Html, origin: &Url) -> Vec<PdfLink> {
    let mut section_title: Option<String> = None;
    let mut links = Vec::new();

    for element in doc.root_element().descendants().filter_map(ElementRef::wrap) {
        if SECTION_TITLE.matches(&element) {
            if let Some(title) = element
                .select(&ANCHOR)
                .map(element_text)
                .find(|t| !t.is_empty())
            {
                section_title = Some(title);
            }
            continue;
        }
        if element.value().name() != "iframe" {
            continue;
        }
        let Some(src) = element.value().attr("src") else {
            continue;
        };
        if !src.to_lowercase().contains(".pdf") {
            continue;
        }
        let Some(url) = resolve_against_origin(src, origin) else {
            continue;
        };
        let name = section_title
            .clone()
            .unwrap_or_else(|| decoded_file_name(&url));
        debug!(%url, %name, "Found PDF in iframe");
        links.push(PdfLink {
            url,
            name,
            group: "iframe".to_string(),
        });
    }
    links
}

fn module_links(doc: &Html, origin: &Url, div_pattern: &Regex) -> Vec<PdfLink> {
    let modules = doc
        .select(&DIV_WITH_ID)
        .filter(|div| div.value().id().is_some_and(|id| div_pattern.is_match(id)))
        .collect::<Vec<_>>();
    if modules.is_empty() {
        warn!(pattern = %div_pattern, "No div id matches the module pattern");
        return Vec::new();
    }
    debug!(count = modules.len(), "Found module containers");

    let mut links = Vec::new();
    for (k, module) in modules.iter().enumerate() {
        let group = module.value().id().unwrap_or_default().to_string();
        for anchor in module.select(&ANCHOR_WITH_HREF) {
            let Some(url) = pdf_href(anchor, origin) else {
                continue;
            };
            let name = link_label(anchor)
                .unwrap_or_else(|| format!("file_{}_div{}", links.len() + 1, k + 1));
            links.push(PdfLink {
                url,
                name,
                group: group.clone(),
            });
        }
    }
    links
}

fn page_links(doc: &Html, origin: &Url) -> Vec<PdfLink> {
    let mut links = Vec::new();
    for anchor in doc.select(&ANCHOR_WITH_HREF) {
        let Some(url) = pdf_href(anchor, origin) else {
            continue;
        };
        let name = link_label(anchor).unwrap_or_else(|| format!("file_{}", links.len() + 1));
        links.push(PdfLink {
            url,
            name,
            group: "general".to_string(),
        });
    }
    links
}

/// Absolute URL of an anchor whose href ends in `.pdf`.
fn pdf_href(anchor: ElementRef<'_>, origin: &Url) -> Option<String> {
    let href = anchor.value().attr("href")?.trim();
    if !href.to_lowercase().ends_with(".pdf") {
        return None;
    }
    resolve_against_origin(href, origin)
}

fn link_label(anchor: ElementRef<'_>) -> Option<String> {
    Some(element_text(anchor)).filter(|t| !t.is_empty())
}

fn site_origin(page_url: &Url) -> Url {
    page_url.join("/").unwrap_or_else(|_| page_url.clone())
}

fn resolve_against_origin(href: &str, origin: &Url) -> Option<String> {
    let href = href.trim();
    if href.starts_with("http") {
        return Some(href.to_string());
    }
    origin.join(href).ok().map(String::from)
}

/// Last path segment of `url`, percent-decoded.
fn decoded_file_name(url: &str) -> String {
    let segment = Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .unwrap_or_default();
    let decoded = urlencoding::decode(&segment)
        .map(|s| s.into_owned())
        .unwrap_or(segment);
    if decoded.is_empty() {
        "document.pdf".to_string()
    } else {
        decoded
    }
}

/// Safe `.pdf` file name for a link label.
pub fn pdf_file_name(name: &str, index: usize) -> String {
    let mut file_name = safe_file_name(name);
    if file_name.is_empty() {
        file_name = format!("file_{index}");
    }
    if !file_name.to_lowercase().ends_with(".pdf") {
        file_name.push_str(".pdf");
    }
    file_name
}

/// Output path for every link, in link order.
pub fn plan_targets(links: &[PdfLink], output_dir: &Path) -> Vec<PathBuf> {
    let group_count = links.iter().map(|link| &link.group).unique().count();
    let use_subfolders = group_count > 1 && links.len() > 5;

    links
        .iter()
        .enumerate()
        .map(|(i, link)| {
            let dir = if use_subfolders {
                output_dir.join(&*FOLDER_UNSAFE.replace_all(&link.group, "_"))
            } else {
                output_dir.to_path_buf()
            };
            dir.join(pdf_file_name(&link.name, i + 1))
        })
        .collect()
}

fn looks_like_pdf(content_type: Option<&str>, url: &str) -> bool {
    let content_type = content_type.unwrap_or_default().to_lowercase();
    content_type.contains("application/pdf")
        || content_type.contains("application/octet-stream")
        || url.to_lowercase().ends_with(".pdf")
}

/// Download `links` one after another.
///
/// A response counts as a PDF when its content type says so or the URL ends
/// in `.pdf`. Anything else is kept as a `debug_{n}_{name}.txt` snippet.
///
/// # Arguments
///
/// * `fetcher` - Shared HTTP client
/// * `links` - Discovered links, in page order
/// * `output_dir` - Root the planned paths are built under
/// * `delay` - Pause between consecutive requests
///
/// # Returns
///
/// How many PDFs are on disk afterwards, counting files that already existed.
#[instrument(level = "info", skip_all, fields(count = links.len(), dir = %output_dir.display()))]
pub async fn download_pdfs(
    fetcher: &Fetcher,
    links: &[PdfLink],
    output_dir: &Path,
    delay: Duration,
) -> usize {
    let total = links.len();
    let mut present = 0;
    let mut requested = false;

    for (i, (link, path)) in links
        .iter()
        .zip(plan_targets(links, output_dir))
        .enumerate()
    {
        let n = i + 1;
        let dir = path.parent().unwrap_or(output_dir).to_path_buf();
        if let Err(e) = fs::create_dir_all(&dir).await {
            error!(dir = %dir.display(), error = %e, "Failed to create PDF directory");
            continue;
        }
        if fs::try_exists(&path).await.unwrap_or(false) {
            info!(n, total, path = %path.display(), "File already exists");
            present += 1;
            continue;
        }

        if requested {
            sleep(delay).await;
        }
        requested = true;

        info!(n, total, url = %link.url, "Downloading");
        let fetched = match fetcher.fetch_bytes(&link.url).await {
            Ok(fetched) => fetched,
            Err(e) => {
                error!(n, total, url = %link.url, error = %e, "Failed to download PDF");
                continue;
            }
        };

        if looks_like_pdf(fetched.content_type.as_deref(), &link.url) {
            match fs::write(&path, &fetched.bytes).await {
                Ok(()) => {
                    info!(n, total, path = %path.display(), "Downloaded PDF");
                    present += 1;
                }
                Err(e) => error!(path = %path.display(), error = %e, "Failed to save PDF"),
            }
        } else {
            let file_name = path
                .file_name()
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_default();
            let debug_path = dir.join(format!("debug_{n}_{file_name}.txt"));
            let snippet = &fetched.bytes[..fetched.bytes.len().min(DEBUG_SNIPPET_BYTES)];
            warn!(
                n,
                total,
                url = %link.url,
                content_type = fetched.content_type.as_deref().unwrap_or(""),
                "Response is not a PDF"
            );
            if let Err(e) = fs::write(&debug_path, snippet).await {
                error!(path = %debug_path.display(), error = %e, "Failed to save debug snippet");
            } else {
                info!(path = %debug_path.display(), "Saved start of response");
            }
        }
    }
    present
}

/// Harvest the PDFs linked from one page.
#[instrument(level = "info", skip(config, fetcher, div_pattern))]
pub async fn harvest_page(
    url: &str,
    config: &PdfConfig,
    fetcher: &Fetcher,
    div_pattern: &Regex,
) -> Result<usize, CrawlError> {
    let target = CrawlTarget::parse(url)?;
    let page = fetcher.fetch(target.url.as_str()).await?;
    let page_url = Url::parse(&page.final_url).unwrap_or(target.url);

    let links = {
        let doc = Html::parse_document(&page.body);
        discover_pdf_links(&doc, &page_url, div_pattern)
    };
    if links.is_empty() {
        warn!("No PDF links found");
        return Ok(0);
    }
    info!(count = links.len(), "Found PDF links");

    let present = download_pdfs(fetcher, &links, &config.output_dir, config.delay()).await;
    info!(present, total = links.len(), "Finished page");
    Ok(present)
}

/// Harvest PDFs from every page, `config.workers` pages at a time.
#[instrument(level = "info", skip_all, fields(count = urls.len(), workers = config.workers))]
pub async fn run(
    urls: &[String],
    config: &PdfConfig,
    fetcher: &Fetcher,
) -> Result<BatchSummary, CrawlError> {
    if urls.is_empty() {
        return Err(CrawlError::Config("no URLs supplied".to_string()));
    }
    let div_pattern = Regex::new(&config.div_pattern)
        .map_err(|e| CrawlError::Config(format!("invalid div pattern: {e}")))?;
    ensure_writable_dir(&config.output_dir).await?;

    let outcomes: Vec<Option<usize>> = stream::iter(urls)
        .map(|url| {
            let div_pattern = &div_pattern;
            async move {
                match harvest_page(url, config, fetcher, div_pattern).await {
                    Ok(count) => Some(count),
                    Err(e) => {
                        error!(%url, error = %e, "Error harvesting PDFs");
                        None
                    }
                }
            }
        })
        .buffer_unordered(config.workers.max(1))
        .collect()
        .await;

    let mut summary = BatchSummary::default();
    for outcome in outcomes {
        summary.record(outcome.is_some(), outcome.unwrap_or_default());
    }
    info!(
        pages = summary.attempted,
        succeeded = summary.succeeded,
        pdfs = summary.assets,
        output_dir = %config.output_dir.display(),
        "PDF harvest completed"
    );
    Ok(summary)
}
