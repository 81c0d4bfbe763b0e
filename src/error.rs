//! Error taxonomy shared by every stage of the crawl.
//!
//! Per-URL failures (transport, parse, persistence) are caught at the
//! pipeline boundary and counted; only [`CrawlError::Config`] is fatal, and
//! only before the first URL is processed.

use std::path::PathBuf;

/// Errors produced while crawling a page or persisting its results.
#[derive(Debug, thiserror::Error)]
pub enum CrawlError {
    /// Invalid or missing configuration discovered before crawling starts.
    #[error("configuration error: {0}")]
    Config(String),

    /// Network failure, timeout, or a client that could not be built.
    #[error("request to {url} failed: {reason}")]
    Transport { url: String, reason: String },

    /// The server answered with a non-2xx status.
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// The URL or document could not be interpreted.
    #[error("could not parse {url}: {reason}")]
    Parse { url: String, reason: String },

    /// A file or directory could not be written.
    #[error("failed to write {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CrawlError {
    pub fn transport(url: &str, err: impl std::fmt::Display) -> Self {
        CrawlError::Transport {
            url: url.to_string(),
            reason: err.to_string(),
        }
    }

    pub fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CrawlError::Persistence {
            path: path.into(),
            source,
        }
    }

    /// True for failures that happened on the wire (including HTTP status).
    pub fn is_transport(&self) -> bool {
        matches!(self, CrawlError::Transport { .. } | CrawlError::Status { .. })
    }
}
