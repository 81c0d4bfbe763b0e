//! Shared HTTP client for page fetches, asset downloads and size probes.
//!
//! Every request goes through one [`reqwest::Client`] built from
//! [`HttpConfig`] (headers, timeout, TLS policy, redirect limit) and one
//! [`RetryPolicy`]. Failures come back as [`CrawlError`]; nothing here
//! panics or aborts the batch.

pub mod retry;

use crate::config::HttpConfig;
use crate::error::CrawlError;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, RANGE};
use reqwest::{Client, Response, redirect};
use tracing::{debug, instrument};

pub use retry::RetryPolicy;

/// A fetched HTML page.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// URL after redirects.
    pub final_url: String,
    pub body: String,
}

/// A fetched binary resource.
#[derive(Debug, Clone)]
pub struct FetchedBytes {
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// HTTP client shared read-only by every pipeline in a batch.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    retry: RetryPolicy,
}

impl Fetcher {
    pub fn new(config: &HttpConfig) -> Result<Self, CrawlError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| CrawlError::Config(format!("invalid header name {name:?}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| CrawlError::Config(format!("invalid value for header {name}: {e}")))?;
            headers.insert(name, value);
        }

        let mut builder = Client::builder()
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .timeout(config.timeout())
            .redirect(redirect::Policy::limited(config.max_redirects))
            .danger_accept_invalid_certs(!config.verify_tls);
        if !config.use_system_proxy {
            builder = builder.no_proxy();
        }
        let client = builder
            .build()
            .map_err(|e| CrawlError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            retry: RetryPolicy::new(config.max_retries, config.retry_base_delay()),
        })
    }

    /// GET a page and return its decoded body.
    #[instrument(level = "info", skip(self))]
    pub async fn fetch(&self, url: &str) -> Result<FetchedPage, CrawlError> {
        let response = self.get(url).await?;
        let final_url = response.url().to_string();
        let body = response
            .text()
            .await
            .map_err(|e| CrawlError::transport(url, e))?;
        debug!(%final_url, bytes = body.len(), "Fetched page");
        Ok(FetchedPage { final_url, body })
    }

    /// GET a binary resource together with its declared content type.
    #[instrument(level = "debug", skip(self))]
    pub async fn fetch_bytes(&self, url: &str) -> Result<FetchedBytes, CrawlError> {
        let response = self.get(url).await?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response
            .bytes()
            .await
            .map_err(|e| CrawlError::transport(url, e))?;
        Ok(FetchedBytes {
            content_type,
            bytes: bytes.to_vec(),
        })
    }

    /// Ask for a resource's size without downloading it.
    ///
    /// Sends a HEAD request with a small `Range` and returns the
    /// `Content-Length` header, or `None` when the server omits it.
    ///
    /// # Arguments
    ///
    /// * `url` - Absolute URL of the resource
    ///
    /// # Returns
    ///
    /// The declared length in bytes. Transport failures and non-success
    /// statuses are errors.
    #[instrument(level = "debug", skip(self))]
    pub async fn probe_size(&self, url: &str) -> Result<Option<u64>, CrawlError> {
        let response = self
            .retry
            .send(url, || self.client.head(url).header(RANGE, "bytes=0-1024").send())
            .await?;
        let response = ensure_success(url, response)?;
        Ok(response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok()))
    }

    async fn get(&self, url: &str) -> Result<Response, CrawlError> {
        let response = self.retry.send(url, || self.client.get(url).send()).await?;
        ensure_success(url, response)
    }
}

fn ensure_success(url: &str, response: Response) -> Result<Response, CrawlError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(CrawlError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        })
    }
}
