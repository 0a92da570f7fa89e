//! Outbound response shaping.
//!
//! Every response the engine produces carries three headers:
//! `cache-control` (caller-supplied, verbatim), `x-upstream-cache` (which
//! branch served it), and `content-type`.

use std::fmt;

use reqwest::StatusCode;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use upcache_core::cache::DEFAULT_CONTENT_TYPE;

/// Observability header naming the branch that produced a response.
pub const X_UPSTREAM_CACHE: HeaderName = HeaderName::from_static("x-upstream-cache");

/// How a response was produced. Rendered verbatim into `x-upstream-cache`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CacheStatus {
    /// Served from storage inside the min-fresh window.
    #[serde(rename = "hit:fresh")]
    Fresh,
    /// Upstream answered `304`; stored body served.
    #[serde(rename = "hit:revalidated")]
    Revalidated,
    /// Upstream failed; stored body served.
    #[serde(rename = "hit:stale-if-error")]
    StaleIfError,
    /// Fetched and stored; nothing was cached before.
    #[serde(rename = "miss:cold")]
    Cold,
    /// Fetched and stored over a previous entry.
    #[serde(rename = "miss:changed")]
    Changed,
    /// Fetched but too large to store.
    #[serde(rename = "skip:body-too-large")]
    BodyTooLarge,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Fresh => "hit:fresh",
            CacheStatus::Revalidated => "hit:revalidated",
            CacheStatus::StaleIfError => "hit:stale-if-error",
            CacheStatus::Cold => "miss:cold",
            CacheStatus::Changed => "miss:changed",
            CacheStatus::BodyTooLarge => "skip:body-too-large",
        }
    }
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body handed back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResponseBody {
    Json(serde_json::Value),
    Text(String),
}

impl ResponseBody {
    /// JSON content types are parsed; a body that fails to parse is returned
    /// as text instead of raising.
    pub fn decode(body: &str, content_type: &str) -> Self {
        if content_type.contains("application/json")
            && let Ok(value) = serde_json::from_str(body)
        {
            return ResponseBody::Json(value);
        }
        ResponseBody::Text(body.to_string())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ResponseBody::Json(_) => None,
            ResponseBody::Text(text) => Some(text),
        }
    }
}

/// Finished response.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub status: StatusCode,
    pub cache_status: CacheStatus,
    pub headers: HeaderMap,
    pub body: ResponseBody,
}

impl CachedResponse {
    /// Assemble headers and decode the body.
    pub fn shape(
        status: StatusCode, cache_status: CacheStatus, cache_control: &HeaderValue, content_type: &str, body: &str,
    ) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(header::CACHE_CONTROL, cache_control.clone());
        headers.insert(X_UPSTREAM_CACHE, HeaderValue::from_static(cache_status.as_str()));
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_str(content_type).unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_CONTENT_TYPE)),
        );

        Self { status, cache_status, headers, body: ResponseBody::decode(body, content_type) }
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }
}
