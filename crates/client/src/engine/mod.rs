//! Fetch-through cache engine.
//!
//! ### Decision per request
//! - No entry: fetch unconditionally
//! - Age below `min_fresh`: serve stored body (`hit:fresh`)
//! - Age at or past `hard_ttl`: delete, then treat as no entry
//! - Otherwise: conditional GET with the stored validators
//!
//! ### Failure policy
//! - Transport errors and unusable statuses fall back to the stored body when
//!   its age is within both `stale_if_error` and `hard_ttl`
//! - Otherwise the failure is returned to the caller unchanged
//!
//! ### Storage
//! - The namespace index is loaded and pruned on every call and persisted
//!   before returning
//! - Entry writes and index writes are always paired; eviction runs after
//!   every write
//! - No per-key locking: concurrent writers race and the last one wins

pub mod response;

use std::sync::Arc;

use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::StatusCode;
use upcache_core::cache::{
    CacheEntry, CacheIndex, CacheKey, CacheLimits, DEFAULT_CONTENT_TYPE, EntryStore, enforce_limits, prune_expired,
    remove_entry,
};
use upcache_core::{Clock, Error, KeyValueStore, SystemClock};

use crate::fetch::{Upstream, header_string, normalize_for_cache, parse_target, sanitize_request_headers};

pub use response::{CacheStatus, CachedResponse, ResponseBody, X_UPSTREAM_CACHE};

/// One inbound GET to serve through the cache.
#[derive(Debug, Clone)]
pub struct CacheRequest {
    /// Absolute target URL on the upstream.
    pub url: String,
    /// Partition for index, TTL and eviction accounting.
    pub namespace: String,
    /// Emitted verbatim as `cache-control` on the response.
    pub cache_control: String,
    /// Inbound request headers; sanitized before forwarding.
    pub headers: HeaderMap,
}

impl CacheRequest {
    pub fn new(url: impl Into<String>, namespace: impl Into<String>, cache_control: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            namespace: namespace.into(),
            cache_control: cache_control.into(),
            headers: HeaderMap::new(),
        }
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }
}

/// Per-call working set: the namespace index plus the request's own key.
struct Lookup {
    key: CacheKey,
    index: CacheIndex,
    cached: Option<CacheEntry>,
    now: i64,
}

/// Fetch-through cache over a keyed store and an upstream.
///
/// Holds no state between calls beyond what lives in the store.
#[derive(Clone)]
pub struct CacheEngine {
    store: Arc<dyn KeyValueStore>,
    upstream: Arc<dyn Upstream>,
    clock: Arc<dyn Clock>,
    limits: CacheLimits,
}

impl CacheEngine {
    pub fn new(store: Arc<dyn KeyValueStore>, upstream: Arc<dyn Upstream>, limits: CacheLimits) -> Self {
        Self { store, upstream, clock: Arc::new(SystemClock), limits }
    }

    /// Replace the wall clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    /// Serve `request` from cache, revalidating or fetching as needed.
    ///
    /// # Errors
    ///
    /// - `InvalidUrl` if the target does not parse; nothing is cached
    /// - `InvalidInput` if `cache_control` is not a valid header value
    /// - `UpstreamUnreachable` / `UpstreamStatus` when the upstream fails and
    ///   no stale copy is eligible
    /// - Store errors are returned as-is
    pub async fn fetch(&self, request: &CacheRequest) -> Result<CachedResponse, Error> {
        let cache_control = HeaderValue::from_str(&request.cache_control)
            .map_err(|e| Error::InvalidInput(format!("invalid cache_control: {e}")))?;
        let target = parse_target(&request.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let normalized = normalize_for_cache(&request.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;

        let entries = EntryStore::new(self.store.clone());
        let mut lookup = self.lookup(&entries, &request.namespace, &normalized).await?;

        if let Some(entry) = &lookup.cached
            && self.limits.is_fresh(entry.age_ms(lookup.now))
        {
            tracing::debug!(key = %lookup.key, age_ms = entry.age_ms(lookup.now), "serving fresh entry");
            lookup.index.persist(self.store.as_ref(), &request.namespace).await?;
            return Ok(CachedResponse::shape(
                StatusCode::OK,
                CacheStatus::Fresh,
                &cache_control,
                &entry.content_type,
                &entry.body,
            ));
        }

        let mut headers = sanitize_request_headers(&request.headers);
        if let Some(entry) = &lookup.cached {
            apply_validators(&mut headers, entry);
        }

        let response = match self.upstream.get(&target, headers).await {
            Ok(response) => response,
            Err(err) => return self.stale_or(lookup, &request.namespace, &cache_control, err).await,
        };

        if response.status == StatusCode::NOT_MODIFIED
            && let Some(entry) = lookup.cached.take()
        {
            let updated_at = self.clock.now_ms();
            let entry = entry.revalidated(
                header_string(&response.headers, &header::ETAG),
                header_string(&response.headers, &header::LAST_MODIFIED),
                updated_at,
            );
            self.write(&entries, &mut lookup.index, &request.namespace, lookup.key.as_str(), &entry)
                .await?;

            tracing::debug!(key = %lookup.key, "revalidated entry");
            return Ok(CachedResponse::shape(
                StatusCode::OK,
                CacheStatus::Revalidated,
                &cache_control,
                &entry.content_type,
                &entry.body,
            ));
        }

        let body = response.text();

        if !response.status.is_success() {
            let err = Error::UpstreamStatus { status: response.status.as_u16(), body };
            return self.stale_or(lookup, &request.namespace, &cache_control, err).await;
        }

        let content_type =
            header_string(&response.headers, &header::CONTENT_TYPE).unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

        if !self.limits.accepts_body(body.len() as u64) {
            tracing::debug!(
                key = %lookup.key,
                size = body.len(),
                max_body_bytes = self.limits.max_body_bytes,
                "body too large to cache"
            );
            lookup.index.persist(self.store.as_ref(), &request.namespace).await?;
            return Ok(CachedResponse::shape(
                response.status,
                CacheStatus::BodyTooLarge,
                &cache_control,
                &content_type,
                &body,
            ));
        }

        let cache_status = if lookup.cached.is_some() { CacheStatus::Changed } else { CacheStatus::Cold };
        let entry = CacheEntry {
            body,
            content_type,
            etag: header_string(&response.headers, &header::ETAG),
            last_modified: header_string(&response.headers, &header::LAST_MODIFIED),
            updated_at: self.clock.now_ms(),
        };
        self.write(&entries, &mut lookup.index, &request.namespace, lookup.key.as_str(), &entry)
            .await?;

        tracing::debug!(key = %lookup.key, status = %cache_status, size = entry.size(), "stored upstream response");
        Ok(CachedResponse::shape(response.status, cache_status, &cache_control, &entry.content_type, &entry.body))
    }

    /// Load and prune the namespace index, then load this request's entry,
    /// dropping it if it is past the hard TTL.
    async fn lookup(&self, entries: &EntryStore, namespace: &str, normalized_url: &str) -> Result<Lookup, Error> {
        let now = self.clock.now_ms();
        let key = CacheKey::new(namespace, normalized_url);

        let mut index = CacheIndex::load(self.store.as_ref(), namespace).await?;
        prune_expired(entries, &mut index, now).await?;

        let mut cached = entries.load(key.as_str()).await?;
        if let Some(entry) = &cached
            && self.limits.is_expired(entry.age_ms(now))
        {
            tracing::debug!(key = %key, age_ms = entry.age_ms(now), "dropping entry past hard ttl");
            remove_entry(entries, &mut index, key.as_str()).await?;
            cached = None;
        }

        Ok(Lookup { key, index, cached, now })
    }

    /// Store an entry, index it, evict over capacity, persist the index.
    async fn write(
        &self, entries: &EntryStore, index: &mut CacheIndex, namespace: &str, key: &str, entry: &CacheEntry,
    ) -> Result<(), Error> {
        entries.save(key, entry).await?;
        index.record(key, entry.updated_at, entry.size(), self.limits.hard_ttl_ms);
        enforce_limits(entries, index, self.limits.max_entries, self.limits.max_total_bytes).await?;
        index.persist(self.store.as_ref(), namespace).await
    }

    /// Serve the stored entry in place of `err` if it is young enough.
    async fn stale_or(
        &self, lookup: Lookup, namespace: &str, cache_control: &HeaderValue, err: Error,
    ) -> Result<CachedResponse, Error> {
        // Pruning in `lookup` already deleted entries; the index must follow.
        lookup.index.persist(self.store.as_ref(), namespace).await?;

        let Some(entry) = lookup.cached else {
            return Err(err);
        };

        let age_ms = entry.age_ms(lookup.now);
        if !self.limits.allows_stale(age_ms) {
            tracing::debug!(key = %lookup.key, age_ms, error = %err, "stale entry too old to mask failure");
            return Err(err);
        }

        tracing::warn!(key = %lookup.key, age_ms, error = %err, "upstream failed, serving stale entry");
        Ok(CachedResponse::shape(
            StatusCode::OK,
            CacheStatus::StaleIfError,
            cache_control,
            &entry.content_type,
            &entry.body,
        ))
    }
}

/// Attach stored validators as conditional request headers.
fn apply_validators(headers: &mut HeaderMap, entry: &CacheEntry) {
    if let Some(etag) = entry.etag.as_deref()
        && let Ok(value) = HeaderValue::from_str(etag)
    {
        headers.insert(header::IF_NONE_MATCH, value);
    }
    if let Some(last_modified) = entry.last_modified.as_deref()
        && let Ok(value) = HeaderValue::from_str(last_modified)
    {
        headers.insert(header::IF_MODIFIED_SINCE, value);
    }
}
