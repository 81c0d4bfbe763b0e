//! Typed crawler configuration.
//!
//! Values come from three layers, highest wins:
//!
//! 1. Command-line flags (see [`crate::cli`])
//! 2. An optional YAML file passed with `--config`
//! 3. The defaults below
//!
//! ```yaml
//! http:
//!   request_timeout_secs: 60
//!   verify_tls: false
//! content:
//!   output_dir: crawled_data
//!   image_min_size_kb: 20
//!   excluded_image_patterns: [".gif", "logo", "icon"]
//! pdf:
//!   workers: 4
//! ```

use crate::error::CrawlError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, instrument};

/// Upper bound for any configured delay or pause: one day.
pub const MAX_DELAY_SECS: f64 = 86_400.0;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Complete configuration for one invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub http: HttpConfig,
    pub content: ContentConfig,
    pub pdf: PdfConfig,
    pub links: LinksConfig,
}

/// Settings shared by every HTTP request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub user_agent: String,
    /// Extra request headers sent with every request.
    pub headers: BTreeMap<String, String>,
    pub request_timeout_secs: u64,
    /// When false, invalid TLS certificates are accepted.
    pub verify_tls: bool,
    pub max_redirects: usize,
    /// Retries after the first attempt for transient failures.
    pub max_retries: usize,
    pub retry_base_delay_ms: u64,
    /// Honour `HTTP_PROXY`/`HTTPS_PROXY` from the environment.
    pub use_system_proxy: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        let mut headers = BTreeMap::new();
        headers.insert(
            "Accept".to_string(),
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8".to_string(),
        );
        headers.insert(
            "Accept-Language".to_string(),
            "vi-VN,vi;q=0.9,en-US;q=0.8,en;q=0.7".to_string(),
        );
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            headers,
            request_timeout_secs: 30,
            verify_tls: true,
            max_redirects: 10,
            max_retries: 3,
            retry_base_delay_ms: 1000,
            use_system_proxy: true,
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }
}

/// Settings for the page content pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    pub output_dir: PathBuf,
    pub image_min_size_kb: u64,
    /// Politeness delay between page submissions and between image downloads.
    pub rate_limit_delay_secs: f64,
    pub workers: usize,
    /// Case-insensitive substrings that disqualify an image URL.
    pub excluded_image_patterns: Vec<String>,
    /// Image URLs that are always rejected.
    pub denied_image_urls: Vec<String>,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("crawled_data"),
            image_min_size_kb: 10,
            rate_limit_delay_secs: 2.0,
            workers: 1,
            excluded_image_patterns: [".gif", "logo", "icon", "banner", "button"]
                .into_iter()
                .map(String::from)
                .collect(),
            denied_image_urls: vec![
                "https://hus.vnu.edu.vn/DATA/VIDEO/2019/07/cuu-sinhvien.jpg".to_string(),
            ],
        }
    }
}

impl ContentConfig {
    pub fn rate_limit_delay(&self) -> Duration {
        Duration::from_secs_f64(self.rate_limit_delay_secs)
    }
}

/// Settings for the PDF harvester.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfConfig {
    pub output_dir: PathBuf,
    /// Regex searched against `div` ids to find module containers.
    pub div_pattern: String,
    pub workers: usize,
    pub delay_secs: f64,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("downloaded_pdfs"),
            div_pattern: r"dnn_ctr\d+_ModuleContent".to_string(),
            workers: 3,
            delay_secs: 1.0,
        }
    }
}

impl PdfConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_secs_f64(self.delay_secs)
    }
}

/// Settings for the menu link harvester.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinksConfig {
    pub output_file: PathBuf,
    /// Container `div` ids, tried in order.
    pub container_ids: Vec<String>,
    /// Only collect anchors inside `div.{item_class}` within the container.
    pub item_class: Option<String>,
    /// Append to the output file instead of truncating it first.
    pub append: bool,
    pub min_delay_secs: f64,
    pub max_delay_secs: f64,
    pub error_pause_secs: f64,
}

impl Default for LinksConfig {
    fn default() -> Self {
        Self {
            output_file: PathBuf::from("links/links.txt"),
            container_ids: vec![
                "jquery-accordion-menu-header".to_string(),
                "jquery-accordion-menu".to_string(),
            ],
            item_class: None,
            append: false,
            min_delay_secs: 2.0,
            max_delay_secs: 5.0,
            error_pause_secs: 30.0,
        }
    }
}

impl Config {
    /// Load configuration from an optional YAML file, falling back to defaults.
    #[instrument(level = "info")]
    pub fn load(path: Option<&Path>) -> Result<Self, CrawlError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path).map_err(|e| {
            CrawlError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        let config = Self::from_yaml(&raw)
            .map_err(|e| CrawlError::Config(format!("{}: {e}", path.display())))?;
        info!(path = %path.display(), "Loaded configuration file");
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw)
    }

    /// Reject values that would make the crawl misbehave.
    pub fn validate(&self) -> Result<(), CrawlError> {
        let bad = |msg: &str| Err(CrawlError::Config(msg.to_string()));

        if self.http.user_agent.trim().is_empty() {
            return bad("user agent must not be empty");
        }
        if self.http.request_timeout_secs == 0 {
            return bad("request timeout must be at least 1 second");
        }
        if self.content.workers == 0 || self.pdf.workers == 0 {
            return bad("worker pool size must be at least 1");
        }
        for delay in [
            self.content.rate_limit_delay_secs,
            self.pdf.delay_secs,
            self.links.min_delay_secs,
            self.links.max_delay_secs,
            self.links.error_pause_secs,
        ] {
            if !delay.is_finite() || delay < 0.0 {
                return bad("delays must be finite and non-negative");
            }
            if delay > MAX_DELAY_SECS {
                return bad("delays must not exceed one day (86400 seconds)");
            }
        }
        if self.links.min_delay_secs > self.links.max_delay_secs {
            return bad("links min delay must not exceed max delay");
        }
        if self.links.container_ids.is_empty() {
            return bad("at least one link container id is required");
        }
        Regex::new(&self.pdf.div_pattern)
            .map_err(|e| CrawlError::Config(format!("invalid div pattern: {e}")))?;
        Ok(())
    }
}
