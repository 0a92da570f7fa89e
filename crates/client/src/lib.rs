//! Client code for upcache.
//!
//! This crate provides the upstream HTTP transport, cache-key normalization,
//! and the fetch-through cache engine shared by the server.

pub mod engine;
pub mod fetch;

pub use engine::{CacheEngine, CacheRequest, CacheStatus, CachedResponse, ResponseBody};

pub use fetch::{
    HttpUpstream, Upstream, UpstreamConfig, UpstreamResponse, normalize_for_cache, sanitize_request_headers,
};

pub use reqwest::header;
