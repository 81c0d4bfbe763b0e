//! Command-line interface definitions for the campus crawler.
//!
//! Every subcommand takes its URLs from any mix of `--url`, `--urls` and
//! `--urls-file`, plus the shared HTTP flags. Flags that are given override
//! the values loaded from the YAML configuration file; flags that are
//! omitted leave the file (or built-in default) untouched.

use crate::config::{Config, HttpConfig};
use crate::error::CrawlError;
use crate::utils::{parse_url_list, read_urls_from_file};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for the campus crawler.
///
/// # Examples
///
/// ```sh
/// # Crawl two pages with four workers
/// campus_crawler content -l https://hus.vnu.edu.vn/gioi-thieu.html https://hus.vnu.edu.vn/dao-tao.html -w 4
///
/// # Download curriculum PDFs listed in a file
/// campus_crawler pdfs -f urls.txt -o ./pdfs
///
/// # Harvest menu links with a config file
/// campus_crawler --config crawler.yaml links -u https://hus.vnu.edu.vn/dao-tao.html
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML configuration file
    #[arg(short, long, global = true, env = "CAMPUS_CRAWLER_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Extract page text, tables and images into per-page folders
    Content(ContentArgs),
    /// Download PDFs embedded in or linked from pages
    Pdfs(PdfArgs),
    /// Collect menu links from pages into a list file
    Links(LinksArgs),
}

impl Command {
    pub fn source(&self) -> &UrlSource {
        match self {
            Command::Content(args) => &args.source,
            Command::Pdfs(args) => &args.source,
            Command::Links(args) => &args.source,
        }
    }

    /// Write every flag that was given into `config`.
    pub fn apply(&self, config: &mut Config) {
        match self {
            Command::Content(args) => args.apply(config),
            Command::Pdfs(args) => args.apply(config),
            Command::Links(args) => args.apply(config),
        }
    }
}

/// Where to read URLs from. All given sources are combined in order.
#[derive(Args, Debug, Default)]
pub struct UrlSource {
    /// Single URL to crawl
    #[arg(short = 'u', long)]
    pub url: Option<String>,

    /// Several URLs separated by spaces
    #[arg(short = 'l', long, num_args = 1..)]
    pub urls: Vec<String>,

    /// File with one URL per line; blank lines and `#` lines are ignored
    #[arg(short = 'f', long)]
    pub urls_file: Option<PathBuf>,
}

impl UrlSource {
    pub async fn collect(&self) -> Result<Vec<String>, CrawlError> {
        let mut urls: Vec<String> = self.url.iter().cloned().collect();
        urls.extend(parse_url_list(&self.urls.join("\n")));
        if let Some(path) = &self.urls_file {
            urls.extend(read_urls_from_file(path).await?);
        }
        Ok(urls)
    }
}

/// HTTP flags shared by every subcommand.
#[derive(Args, Debug, Default)]
pub struct HttpArgs {
    /// Request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// User-Agent header sent with every request
    #[arg(long, env = "CAMPUS_CRAWLER_USER_AGENT")]
    pub user_agent: Option<String>,

    /// Accept invalid TLS certificates
    #[arg(long)]
    pub insecure: bool,

    /// Retries for timeouts, connection errors, 429 and 5xx responses
    #[arg(long)]
    pub max_retries: Option<usize>,

    /// Extra request header as `Name: value` (repeatable)
    #[arg(long = "header", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,
}

impl HttpArgs {
    fn apply(&self, http: &mut HttpConfig) {
        if let Some(timeout) = self.timeout {
            http.request_timeout_secs = timeout;
        }
        if let Some(user_agent) = &self.user_agent {
            http.user_agent = user_agent.clone();
        }
        if self.insecure {
            http.verify_tls = false;
        }
        if let Some(retries) = self.max_retries {
            http.max_retries = retries;
        }
        for (name, value) in &self.headers {
            http.headers.insert(name.clone(), value.clone());
        }
    }
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected `Name: value`, got {raw:?}"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing header name in {raw:?}"));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

#[derive(Args, Debug)]
pub struct ContentArgs {
    #[command(flatten)]
    pub source: UrlSource,

    #[command(flatten)]
    pub http: HttpArgs,

    /// Root folder for per-page output (default: crawled_data)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Minimum image size in KB
    #[arg(long = "min-img-size")]
    pub min_image_size_kb: Option<u64>,

    /// Seconds between page submissions and between image downloads
    #[arg(short, long)]
    pub delay: Option<f64>,

    /// Pages crawled concurrently
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Substring that rejects an image URL (repeatable; replaces the defaults)
    #[arg(long = "exclude-pattern")]
    pub exclude_patterns: Vec<String>,
}

impl ContentArgs {
    fn apply(&self, config: &mut Config) {
        self.http.apply(&mut config.http);
        let content = &mut config.content;
        if let Some(dir) = &self.output_dir {
            content.output_dir = dir.clone();
        }
        if let Some(kb) = self.min_image_size_kb {
            content.image_min_size_kb = kb;
        }
        if let Some(delay) = self.delay {
            content.rate_limit_delay_secs = delay;
        }
        if let Some(workers) = self.workers {
            content.workers = workers;
        }
        if !self.exclude_patterns.is_empty() {
            content.excluded_image_patterns = self.exclude_patterns.clone();
        }
    }
}

#[derive(Args, Debug)]
pub struct PdfArgs {
    #[command(flatten)]
    pub source: UrlSource,

    #[command(flatten)]
    pub http: HttpArgs,

    /// Folder for downloaded PDFs (default: downloaded_pdfs)
    #[arg(short, long, visible_alias = "output")]
    pub output_dir: Option<PathBuf>,

    /// Regex matched against div ids to find PDF containers
    #[arg(short, long)]
    pub div_pattern: Option<String>,

    /// Pages processed concurrently
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Seconds between PDF downloads
    #[arg(short = 't', long)]
    pub delay: Option<f64>,
}

impl PdfArgs {
    fn apply(&self, config: &mut Config) {
        self.http.apply(&mut config.http);
        let pdf = &mut config.pdf;
        if let Some(dir) = &self.output_dir {
            pdf.output_dir = dir.clone();
        }
        if let Some(pattern) = &self.div_pattern {
            pdf.div_pattern = pattern.clone();
        }
        if let Some(workers) = self.workers {
            pdf.workers = workers;
        }
        if let Some(delay) = self.delay {
            pdf.delay_secs = delay;
        }
    }
}

#[derive(Args, Debug)]
pub struct LinksArgs {
    #[command(flatten)]
    pub source: UrlSource,

    #[command(flatten)]
    pub http: HttpArgs,

    /// Link list file (default: links/links.txt)
    #[arg(short, long)]
    pub output_file: Option<PathBuf>,

    /// Container div id to search, in priority order (repeatable; replaces the defaults)
    #[arg(long = "container-id")]
    pub container_ids: Vec<String>,

    /// Only take links inside `div.<class>` within the container
    #[arg(long)]
    pub item_class: Option<String>,

    /// Append to the output file instead of truncating it
    #[arg(short, long)]
    pub append: bool,
}

impl LinksArgs {
    fn apply(&self, config: &mut Config) {
        self.http.apply(&mut config.http);
        let links = &mut config.links;
        if let Some(file) = &self.output_file {
            links.output_file = file.clone();
        }
        if !self.container_ids.is_empty() {
            links.container_ids = self.container_ids.clone();
        }
        if let Some(class) = &self.item_class {
            links.item_class = Some(class.clone());
        }
        if self.append {
            links.append = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_parsing_and_overrides() {
        let cli = Cli::parse_from([
            "campus_crawler",
            "content",
            "-l",
            "https://hus.vnu.edu.vn/a.html",
            "https://hus.vnu.edu.vn/b.html",
            "--output-dir",
            "/tmp/out",
            "--min-img-size",
            "20",
            "-w",
            "4",
            "--insecure",
            "--header",
            "Referer: https://hus.vnu.edu.vn/",
        ]);
        assert!(cli.config.is_none());

        let mut config = Config::default();
        cli.command.apply(&mut config);
        assert_eq!(config.content.output_dir, PathBuf::from("/tmp/out"));
        assert_eq!(config.content.image_min_size_kb, 20);
        assert_eq!(config.content.workers, 4);
        assert_eq!(config.content.rate_limit_delay_secs, 2.0);
        assert!(!config.http.verify_tls);
        assert_eq!(
            config.http.headers.get("Referer").map(String::as_str),
            Some("https://hus.vnu.edu.vn/")
        );
        assert_eq!(cli.command.source().urls.len(), 2);
    }

    #[test]
    fn test_pdf_short_flags() {
        let cli = Cli::parse_from([
            "campus_crawler",
            "--config",
            "crawler.yaml",
            "pdfs",
            "-u",
            "https://hus.vnu.edu.vn/ctdt.html",
            "-o",
            "pdfs",
            "-d",
            r"ctr\d+",
            "-t",
            "0.5",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("crawler.yaml")));

        let mut config = Config::default();
        cli.command.apply(&mut config);
        assert_eq!(config.pdf.output_dir, PathBuf::from("pdfs"));
        assert_eq!(config.pdf.div_pattern, r"ctr\d+");
        assert_eq!(config.pdf.delay_secs, 0.5);
        assert_eq!(config.pdf.workers, 3);
    }

    #[test]
    fn test_links_flags() {
        let cli = Cli::parse_from([
            "campus_crawler",
            "links",
            "-u",
            "https://hus.vnu.edu.vn/tin-tuc.html",
            "--container-id",
            "dnn_ctr10921_ModuleContent",
            "--item-class",
            "item-image",
            "--append",
        ]);
        let mut config = Config::default();
        cli.command.apply(&mut config);
        assert_eq!(config.links.container_ids, vec!["dnn_ctr10921_ModuleContent"]);
        assert_eq!(config.links.item_class.as_deref(), Some("item-image"));
        assert!(config.links.append);
    }

    #[test]
    fn test_omitted_flags_keep_config() {
        let cli = Cli::parse_from(["campus_crawler", "links", "-u", "https://x.edu"]);
        let mut config = Config::default();
        config.links.append = true;
        config.http.max_retries = 7;
        cli.command.apply(&mut config);
        assert!(config.links.append);
        assert_eq!(config.http.max_retries, 7);
        assert_eq!(config.links.container_ids.len(), 2);
    }

    #[test]
    fn test_parse_header() {
        assert_eq!(
            parse_header("Accept-Language: vi-VN, en;q=0.5"),
            Ok(("Accept-Language".to_string(), "vi-VN, en;q=0.5".to_string()))
        );
        assert!(parse_header("no colon").is_err());
        assert!(parse_header(": value").is_err());
    }

    #[tokio::test]
    async fn test_url_sources_combine() {
        let tmp = tempfile::TempDir::new().unwrap();
        let file = tmp.path().join("urls.txt");
        std::fs::write(&file, "# danh sách\nhttps://x.edu/c\n\n  https://x.edu/d  \n").unwrap();

        let source = UrlSource {
            url: Some("https://x.edu/a".to_string()),
            urls: vec!["https://x.edu/b".to_string()],
            urls_file: Some(file),
        };
        assert_eq!(
            source.collect().await.unwrap(),
            vec!["https://x.edu/a", "https://x.edu/b", "https://x.edu/c", "https://x.edu/d"]
        );
    }

    #[tokio::test]
    async fn test_missing_urls_file_is_config_error() {
        let source = UrlSource {
            urls_file: Some(PathBuf::from("/definitely/not/here.txt")),
            ..UrlSource::default()
        };
        assert!(matches!(source.collect().await, Err(CrawlError::Config(_))));
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["campus_crawler"]).is_err());
    }
}
