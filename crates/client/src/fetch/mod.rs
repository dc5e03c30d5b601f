//! HTTP fetch pipeline with SSRF protection and robots.txt compliance.
//!
//! ### URL Canonicalization
//! - Trim whitespace, ensure scheme (default: `https`)
//! - Lowercase host, remove fragments
//! - Preserve query string
//!
//! ### SSRF & Safety Gates
//! - Deny private ranges (RFC1918, link-local, localhost, etc.)
//! - Resolve DNS and validate all A/AAAA answers are public.
//! - Max redirects: 5
//! - Max body bytes: 5MB (configurable)
//!
//! ### robots.txt Compliance
//! - Fetch and cache `robots.txt` per origin (24h cache).
//! - Evaluate `*` and current User-Agent.
//!
//! The orchestrator only sees [`PageFetcher`]: a URL goes in, context text or
//! a [`FetchFailure`] comes out.

pub mod robots;
pub mod ssrf;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode, Url, header};
use std::time::{Duration, Instant};

pub use robots::{RobotsCache, RobotsError};
pub use ssrf::{SsrfError, ensure_public_host, validate_ip};
pub use webctx_core::url::{UrlError, canonicalize};

use crate::extract::{Extractor, HtmlTextExtractor};
use webctx_core::{AppConfig, Error};

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "webctx/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 10s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,

    /// Whether to respect robots.txt (default: true)
    pub respect_robots: bool,

    /// Refuse hosts resolving to private or reserved addresses (default: true)
    pub block_private_hosts: bool,

    /// Characters of extracted text kept per page (default: 10000)
    pub max_content_chars: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "webctx/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(10_000),
            max_redirects: 5,
            respect_robots: true,
            block_private_hosts: true,
            max_content_chars: 10_000,
        }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            respect_robots: config.respect_robots,
            block_private_hosts: config.block_private_hosts,
            max_content_chars: config.max_content_chars,
            ..Self::default()
        }
    }
}

/// Response from a fetch operation.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// The canonical URL requested
    pub url: Url,
    /// The final URL after redirects
    pub final_url: Url,
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub bytes: Bytes,
    /// Time taken to fetch in milliseconds
    pub fetch_ms: u64,
}

/// Why a page produced no content.
///
/// Failures are data: the orchestrator records them per URL and moves on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchFailure {
    #[error("timed out")]
    Timeout,

    #[error("{0}")]
    Network(String),
}

impl From<Error> for FetchFailure {
    fn from(err: Error) -> Self {
        match err {
            Error::FetchTimeout(_) => FetchFailure::Timeout,
            other => FetchFailure::Network(other.to_string()),
        }
    }
}

/// Source of page text for the orchestrator.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch `url` and return its extracted text.
    async fn fetch_text(&self, url: &str) -> Result<String, FetchFailure>;
}

/// HTTP fetch client with safety checks.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
    robots_cache: RobotsCache,
    extractor: Box<dyn Extractor>,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let max_redirects = config.max_redirects;
        let block_private = config.block_private_hosts;
        let redirects = reqwest::redirect::Policy::custom(move |attempt| {
            if attempt.previous().len() >= max_redirects {
                attempt.error("too many redirects")
            } else if block_private && ssrf::is_private_literal(attempt.url()) {
                attempt.error("redirect to private address")
            } else {
                attempt.follow()
            }
        });

        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(redirects)
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::HttpError(format!("failed to build HTTP client: {}", e)))?;

        let robots_cache = RobotsCache::new(config.user_agent.clone(), http.clone());

        Ok(Self { http, config, robots_cache, extractor: Box::new(HtmlTextExtractor) })
    }

    /// Swap the text extractor.
    pub fn with_extractor(mut self, extractor: impl Extractor + 'static) -> Self {
        self.extractor = Box::new(extractor);
        self
    }

    /// Fetch a URL, returning raw bytes and metadata.
    ///
    /// Performs SSRF check, robots.txt check, and respects redirect/byte limits.
    pub async fn fetch(&self, url_str: &str) -> Result<FetchResponse, Error> {
        let start = Instant::now();
        let url = canonicalize(url_str).map_err(|e| Error::InvalidUrl(e.to_string()))?;

        if self.config.block_private_hosts {
            ensure_public_host(&url).await.map_err(|e| Error::SsrfBlocked(e.to_string()))?;
        }

        if self.config.respect_robots {
            self.robots_cache
                .check(&url)
                .await
                .map_err(|e| Error::RobotsDisallowed(e.to_string()))?;
        }

        let response = self
            .http
            .get(url.as_str())
            .header(header::ACCEPT, "text/html,application/xhtml+xml,text/plain;q=0.9,*/*;q=0.8")
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpError(format!("status {}", status.as_u16())));
        }

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let bytes = response.bytes().await.map_err(|e| transport_error(&e))?;

        if bytes.len() > self.config.max_bytes {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", bytes.len(), self.config.max_bytes)));
        }

        let fetch_ms = start.elapsed().as_millis() as u64;

        tracing::debug!("fetched {} -> {} in {}ms ({} bytes)", url, final_url, fetch_ms, bytes.len());

        Ok(FetchResponse { url, final_url, status, content_type, bytes, fetch_ms })
    }

    pub fn robots_cache(&self) -> &RobotsCache {
        &self.robots_cache
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

fn transport_error(e: &reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::FetchTimeout(e.to_string())
    } else {
        Error::HttpError(format!("network error: {}", e))
    }
}

#[async_trait]
impl PageFetcher for FetchClient {
    async fn fetch_text(&self, url: &str) -> Result<String, FetchFailure> {
        let response = self.fetch(url).await?;
        let body = String::from_utf8_lossy(&response.bytes);
        let extracted =
            self.extractor
                .extract(&body, response.content_type.as_deref(), self.config.max_content_chars)?;

        if extracted.truncated {
            tracing::debug!(url = %response.final_url, max_chars = self.config.max_content_chars, "page text truncated");
        }
        Ok(extracted.text)
    }
}
