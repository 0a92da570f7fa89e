//! upstream_get tool implementation.
//!
//! Serves a GET through the cache engine and reports which branch answered.

use std::collections::BTreeMap;

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use upcache_client::header::{HeaderMap, HeaderName, HeaderValue};
use upcache_client::{CacheEngine, CacheRequest, CachedResponse};
use upcache_core::{AppConfig, Error};

/// Input parameters for the upstream_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UpstreamGetParams {
    /// Absolute http(s) URL to fetch.
    pub url: String,

    /// Cache partition for TTL and eviction accounting.
    pub namespace: String,

    /// `cache-control` to emit on the response.
    /// Defaults to the namespace profile, then the configured default.
    #[serde(default)]
    pub cache_control: Option<String>,

    /// Inbound request headers to forward; hop-by-hop headers are dropped.
    #[serde(default)]
    pub headers: Option<BTreeMap<String, String>>,
}

/// Output structure for the upstream_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UpstreamGetOutput {
    /// HTTP status of the served response.
    pub status: u16,
    /// Branch that produced the response, e.g. `hit:fresh`.
    pub cache_status: String,
    /// Response headers.
    pub headers: BTreeMap<String, String>,
    /// JSON value for JSON bodies, a string otherwise.
    pub body: serde_json::Value,
}

impl TryFrom<CachedResponse> for UpstreamGetOutput {
    type Error = Error;

    fn try_from(response: CachedResponse) -> Result<Self, Self::Error> {
        let headers = response
            .headers
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.to_string(), v.to_string())))
            .collect();
        let body = serde_json::to_value(&response.body)?;

        Ok(Self { status: response.status.as_u16(), cache_status: response.cache_status.to_string(), headers, body })
    }
}

fn to_header_map(headers: &BTreeMap<String, String>) -> Result<HeaderMap, Error> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::InvalidInput(format!("invalid header name {name:?}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| Error::InvalidInput(format!("invalid value for header {name}: {e}")))?;
        map.append(name, value);
    }
    Ok(map)
}

/// Implementation of the upstream_get tool.
pub async fn upstream_get_impl(
    engine: &CacheEngine, config: &AppConfig, params: UpstreamGetParams,
) -> Result<CallToolResult, McpError> {
    if params.url.trim().is_empty() {
        return Err(Error::InvalidInput("url cannot be empty".into()).into());
    }
    if params.namespace.trim().is_empty() {
        return Err(Error::InvalidInput("namespace cannot be empty".into()).into());
    }

    let cache_control = params
        .cache_control
        .unwrap_or_else(|| config.cache_control_for(&params.namespace).to_string());
    let headers = match &params.headers {
        Some(headers) => to_header_map(headers)?,
        None => HeaderMap::new(),
    };

    let request = CacheRequest::new(params.url, params.namespace, cache_control).with_headers(headers);
    let response = engine.fetch(&request).await?;
    tracing::info!(
        url = %request.url,
        namespace = %request.namespace,
        status = response.status.as_u16(),
        cache_status = %response.cache_status,
        "served upstream_get"
    );

    let output = UpstreamGetOutput::try_from(response)?;
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
