//! Decides whether a candidate image is real page content.
//!
//! Rules, first match rejects:
//!
//! 1. Exact match against the denylist
//! 2. Case-insensitive match against an excluded substring (`logo`, `.gif`, ...)
//! 3. Empty URL or inline `data:` URI
//! 4. Size probe below the minimum, failed, or without `Content-Length`

use crate::config::ContentConfig;
use crate::fetch::Fetcher;
use std::fmt;
use tracing::debug;

/// Why an image was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    Denylisted,
    ExcludedPattern(String),
    NotFetchable,
    TooSmall { bytes: u64 },
    UnknownSize,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Denylisted => write!(f, "denylisted"),
            Rejection::ExcludedPattern(p) => write!(f, "matches excluded pattern {p:?}"),
            Rejection::NotFetchable => write!(f, "empty or inline data URI"),
            Rejection::TooSmall { bytes } => write!(f, "only {bytes} bytes"),
            Rejection::UnknownSize => write!(f, "size unknown"),
        }
    }
}

/// Image filter bound to one batch's configuration and client.
pub struct ImageFilter<'a> {
    config: &'a ContentConfig,
    fetcher: &'a Fetcher,
}

impl<'a> ImageFilter<'a> {
    pub fn new(config: &'a ContentConfig, fetcher: &'a Fetcher) -> Self {
        Self { config, fetcher }
    }

    pub async fn accept(&self, url: &str) -> bool {
        match self.check(url).await {
            Ok(()) => true,
            Err(reason) => {
                debug!(%url, %reason, "Rejected image");
                false
            }
        }
    }

    async fn check(&self, url: &str) -> Result<(), Rejection> {
        prefilter(url, self.config)?;
        let length = match self.fetcher.probe_size(url).await {
            Ok(length) => length,
            Err(e) => {
                debug!(%url, error = %e, "Could not check image size");
                None
            }
        };
        size_check(length, self.config.image_min_size_kb)
    }
}

/// Rules 1–3: checks that need no network access.
pub fn prefilter(url: &str, config: &ContentConfig) -> Result<(), Rejection> {
    if config.denied_image_urls.iter().any(|denied| denied == url) {
        return Err(Rejection::Denylisted);
    }
    let lower = url.to_lowercase();
    if let Some(pattern) = config
        .excluded_image_patterns
        .iter()
        .find(|p| lower.contains(&p.to_lowercase()))
    {
        return Err(Rejection::ExcludedPattern(pattern.clone()));
    }
    if url.trim().is_empty() || lower.starts_with("data:") {
        return Err(Rejection::NotFetchable);
    }
    Ok(())
}

/// Rule 4: unknown size rejects; known size must reach `min_kb` kilobytes.
pub fn size_check(content_length: Option<u64>, min_kb: u64) -> Result<(), Rejection> {
    match content_length {
        None => Err(Rejection::UnknownSize),
        Some(bytes) if bytes < min_kb.saturating_mul(1024) => Err(Rejection::TooSmall { bytes }),
        Some(_) => Ok(()),
    }
}
