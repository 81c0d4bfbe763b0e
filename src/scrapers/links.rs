//! Menu link harvester.
//!
//! Collects the navigation links of a section page (the accordion menu on
//! faculty sites, or a news listing when `item_class` is set) and writes
//! them, one absolute URL per line, to a single list file. The list is the
//! usual input for a later `content` run.
//!
//! Pages are visited one at a time after a random pause, and a failed fetch
//! is followed by a longer pause before the next page.

use crate::config::LinksConfig;
use crate::error::CrawlError;
use crate::fetch::Fetcher;
use crate::models::{BatchSummary, CrawlTarget};
use crate::outputs::links::{append_links, prepare_link_file};
use once_cell::sync::Lazy;
use rand::{Rng, rng};
use scraper::{CaseSensitivity, ElementRef, Html, Selector};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

static DIV_WITH_ID: Lazy<Selector> = Lazy::new(|| Selector::parse("div[id]").unwrap());
static DIV: Lazy<Selector> = Lazy::new(|| Selector::parse("div").unwrap());
static ANCHOR_WITH_HREF: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());

/// Links inside the first container found, in document order.
///
/// Containers are tried in `container_ids` order. With `item_class`, only
/// anchors inside `div.{item_class}` descendants of the container count.
pub fn extract_menu_links(
    doc: &Html,
    page_url: &Url,
    container_ids: &[String],
    item_class: Option<&str>,
) -> Vec<String> {
    let Some(container) = container_ids.iter().find_map(|id| {
        doc.select(&DIV_WITH_ID)
            .find(|div| div.value().id() == Some(id.as_str()))
    }) else {
        warn!(%page_url, ids = ?container_ids, "No menu container found");
        return Vec::new();
    };

    let anchors: Vec<ElementRef<'_>> = match item_class {
        Some(class) => container
            .select(&DIV)
            .filter(|div| div.value().has_class(class, CaseSensitivity::CaseSensitive))
            .flat_map(|item| item.select(&ANCHOR_WITH_HREF))
            .collect(),
        None => container.select(&ANCHOR_WITH_HREF).collect(),
    };

    anchors
        .into_iter()
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| resolve_menu_link(href, page_url))
        .collect()
}

/// Keep absolute http(s) links, anchor root-relative ones to the page's
/// origin, and drop the rest (`#`, `javascript:`, page-relative paths).
pub fn resolve_menu_link(href: &str, page_url: &Url) -> Option<String> {
    let href = href.trim();
    if href.starts_with("http://") || href.starts_with("https://") {
        return Some(href.to_string());
    }
    if href.starts_with('/') {
        return page_url.join(href).ok().map(String::from);
    }
    debug!(%href, "Skipping non-absolute link");
    None
}

fn politeness_delay(config: &LinksConfig) -> Duration {
    let (min, max) = (config.min_delay_secs, config.max_delay_secs);
    if max <= min {
        return Duration::from_secs_f64(min.max(0.0));
    }
    Duration::from_secs_f64(rng().random_range(min..=max))
}

/// Fetch one page and append its menu links to the output file.
#[instrument(level = "info", skip(config, fetcher))]
pub async fn harvest_page(
    url: &str,
    config: &LinksConfig,
    fetcher: &Fetcher,
) -> Result<usize, CrawlError> {
    let delay = politeness_delay(config);
    debug!(delay_secs = delay.as_secs_f64(), "Waiting before request");
    sleep(delay).await;

    let target = CrawlTarget::parse(url)?;
    let page = fetcher.fetch(target.url.as_str()).await?;
    let page_url = Url::parse(&page.final_url).unwrap_or(target.url);

    let links = {
        let doc = Html::parse_document(&page.body);
        extract_menu_links(
            &doc,
            &page_url,
            &config.container_ids,
            config.item_class.as_deref(),
        )
    };
    append_links(&config.output_file, url, &links).await?;
    info!(count = links.len(), "Saved links");
    Ok(links.len())
}

/// Harvest links from every page in order into `config.output_file`.
#[instrument(level = "info", skip_all, fields(count = urls.len(), output = %config.output_file.display()))]
pub async fn run(
    urls: &[String],
    config: &LinksConfig,
    fetcher: &Fetcher,
) -> Result<BatchSummary, CrawlError> {
    if urls.is_empty() {
        return Err(CrawlError::Config("no URLs supplied".to_string()));
    }
    prepare_link_file(&config.output_file, config.append).await?;

    let mut summary = BatchSummary::default();
    for (i, url) in urls.iter().enumerate() {
        match harvest_page(url, config, fetcher).await {
            Ok(count) => summary.record(true, count),
            Err(e) => {
                error!(%url, error = %e, "Error harvesting links");
                summary.record(false, 0);
                if e.is_transport() && i + 1 < urls.len() {
                    warn!(pause_secs = config.error_pause_secs, "Pausing after error");
                    sleep(Duration::from_secs_f64(config.error_pause_secs)).await;
                }
            }
        }
    }

    info!(
        pages = summary.attempted,
        succeeded = summary.succeeded,
        links = summary.assets,
        "Link harvest completed"
    );
    Ok(summary)
}
