//! Upstream HTTP transport.
//!
//! ### Key Normalization
//! - Parse as absolute http(s) URL
//! - Drop tracking parameters, sort the rest
//!
//! ### Header Forwarding
//! - Hop-by-hop headers are stripped from the inbound request
//! - Conditional headers are added by the engine, never by the caller
//!
//! ### Transport
//! - One GET per call, no retries
//! - Timeouts and network errors surface as `UpstreamUnreachable`

pub mod headers;
pub mod url;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode, Url, header};
use std::time::{Duration, Instant};

pub use headers::{header_string, sanitize_request_headers};
pub use url::{UrlError, normalize_for_cache, parse_target};

use upcache_core::{AppConfig, Error};

/// Origin the cache fetches through.
///
/// Implementations return `Err` only for transport failures; every HTTP
/// status, including errors, comes back as an `UpstreamResponse`.
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn get(&self, url: &Url, headers: header::HeaderMap) -> Result<UpstreamResponse, Error>;
}

/// Configuration for the HTTP upstream.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// User agent string (default: "upcache/0.1")
    pub user_agent: String,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self { user_agent: "upcache/0.1".to_string(), timeout: Duration::from_millis(20000), max_redirects: 5 }
    }
}

impl From<&AppConfig> for UpstreamConfig {
    fn from(config: &AppConfig) -> Self {
        Self { user_agent: config.user_agent.clone(), timeout: config.timeout(), max_redirects: config.max_redirects }
    }
}

/// Response from the upstream.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    /// HTTP status code
    pub status: StatusCode,
    /// Response headers
    pub headers: header::HeaderMap,
    /// Response body bytes
    pub body: Bytes,
}

impl UpstreamResponse {
    pub fn new(status: StatusCode, headers: header::HeaderMap, body: impl Into<Bytes>) -> Self {
        Self { status, headers, body: body.into() }
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// reqwest-backed upstream.
pub struct HttpUpstream {
    http: Client,
}

impl HttpUpstream {
    /// Create a new upstream client with the given configuration.
    pub fn new(config: &UpstreamConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::InvalidInput(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http })
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn get(&self, url: &Url, mut headers: header::HeaderMap) -> Result<UpstreamResponse, Error> {
        let start = Instant::now();

        // Bodies are stored decoded, so the client negotiates its own encoding.
        headers.remove(header::ACCEPT_ENCODING);

        let response = self
            .http
            .get(url.clone())
            .headers(headers)
            .send()
            .await
            .map_err(|e| Error::UpstreamUnreachable(format!("network error: {}", e)))?;

        let status = response.status();
        let headers = response.headers().clone();

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::UpstreamUnreachable(format!("failed to read response: {}", e)))?;

        tracing::debug!(
            "fetched {} -> {} in {}ms ({} bytes)",
            url,
            status.as_u16(),
            start.elapsed().as_millis(),
            body.len()
        );

        Ok(UpstreamResponse { status, headers, body })
    }
}
