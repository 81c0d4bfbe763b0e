//! # Campus Crawler
//!
//! A polite batch crawler for university websites. It turns a list of page
//! URLs into local, structured copies of their content.
//!
//! ## Workflows
//!
//! - `content`: strips navigation and other noise from each page, extracts
//!   headings, paragraphs, tables and content images in document order, and
//!   writes `content.txt`, `metadata.json` and the images per page
//! - `pdfs`: finds PDFs embedded in viewers or linked from module containers
//!   and downloads them
//! - `links`: collects the links of a page's navigation menu into a list
//!   file, ready to feed back into `content`
//!
//! ## Usage
//!
//! ```sh
//! campus_crawler content --urls-file links/dao_tao.txt -o crawled_data
//! ```
//!
//! ## Exit Status
//!
//! `0` when every URL succeeded, `1` when at least one failed, `2` when the
//! run could not start (bad configuration, no URLs, unwritable output).

use clap::Parser;
use std::process::ExitCode;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod error;
mod fetch;
mod html;
mod images;
mod models;
mod outputs;
mod scrapers;
#[cfg(test)]
mod test_support;
mod utils;

use cli::{Cli, Command};
use config::Config;
use error::CrawlError;
use fetch::Fetcher;
use models::BatchSummary;
use utils::truncate_for_log;

#[tokio::main]
async fn main() -> ExitCode {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("campus_crawler starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let code = match run(args).await {
        Ok(summary) => {
            info!(
                failed = summary.failed(),
                assets = summary.assets,
                "Crawl completed. Successfully crawled {}/{} URLs",
                summary.succeeded,
                summary.attempted
            );
            if summary.all_succeeded() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            }
        }
        Err(e) => {
            error!(error = %e, "Crawl could not start");
            ExitCode::from(2)
        }
    };

    info!(
        elapsed_secs = start_time.elapsed().as_secs_f64(),
        "campus_crawler finished"
    );
    code
}

/// Resolve configuration and URLs, then run the selected workflow.
#[instrument(level = "info", skip_all)]
async fn run(args: Cli) -> Result<BatchSummary, CrawlError> {
    let mut config = Config::load(args.config.as_deref())?;
    args.command.apply(&mut config);
    config.validate()?;

    let urls = args.command.source().collect().await?;
    if urls.is_empty() {
        return Err(CrawlError::Config(
            "no URLs given; use --url, --urls or --urls-file".to_string(),
        ));
    }
    info!(count = urls.len(), "Loaded URLs");
    debug!(urls = %truncate_for_log(&urls.join(" "), 500), "URL list");

    let fetcher = Fetcher::new(&config.http)?;

    match &args.command {
        Command::Content(_) => scrapers::page::run(&urls, &config.content, &fetcher).await,
        Command::Pdfs(_) => scrapers::pdfs::run(&urls, &config.pdf, &fetcher).await,
        Command::Links(_) => scrapers::links::run(&urls, &config.links, &fetcher).await,
    }
}
