//! Cache thresholds, resolved with clamp-with-default semantics.

/// Serve-without-check window (15s).
pub const DEFAULT_MIN_FRESH_MS: u64 = 15_000;
/// Absolute expiry (6h).
pub const DEFAULT_HARD_TTL_MS: u64 = 6 * 60 * 60 * 1000;
/// Maximum age of a stale copy served on upstream failure (24h).
pub const DEFAULT_STALE_IF_ERROR_MS: u64 = 24 * 60 * 60 * 1000;
pub const DEFAULT_MAX_ENTRIES: u64 = 400;
/// 50MiB per namespace.
pub const DEFAULT_MAX_TOTAL_BYTES: u64 = 50 * 1024 * 1024;
/// 1MiB per stored body.
pub const DEFAULT_MAX_BODY_BYTES: u64 = 1024 * 1024;

/// Upper bound for any resolved value, so millisecond fields fit in `i64`.
const MAX_VALUE: u64 = i64::MAX as u64;

/// Resolve a raw configured number: missing, non-finite or non-positive
/// values fall back to `fallback`; fractions are floored.
pub fn ensure_positive(value: Option<f64>, fallback: u64) -> u64 {
    match value {
        Some(v) if v.is_finite() && v.floor() >= 1.0 => (v.floor() as u64).min(MAX_VALUE),
        _ => fallback,
    }
}

/// Resolved thresholds used by the engine, pruning and eviction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheLimits {
    pub min_fresh_ms: i64,
    pub hard_ttl_ms: i64,
    pub stale_if_error_ms: i64,
    pub max_entries: usize,
    pub max_total_bytes: u64,
    pub max_body_bytes: u64,
}

impl Default for CacheLimits {
    fn default() -> Self {
        Self::resolve(None, None, None, None, None, None)
    }
}

impl CacheLimits {
    /// Build limits from raw, possibly bogus, configured values.
    pub fn resolve(
        min_fresh_ms: Option<f64>, hard_ttl_ms: Option<f64>, stale_if_error_ms: Option<f64>,
        max_entries: Option<f64>, max_total_bytes: Option<f64>, max_body_bytes: Option<f64>,
    ) -> Self {
        Self {
            min_fresh_ms: ensure_positive(min_fresh_ms, DEFAULT_MIN_FRESH_MS) as i64,
            hard_ttl_ms: ensure_positive(hard_ttl_ms, DEFAULT_HARD_TTL_MS) as i64,
            stale_if_error_ms: ensure_positive(stale_if_error_ms, DEFAULT_STALE_IF_ERROR_MS) as i64,
            max_entries: usize::try_from(ensure_positive(max_entries, DEFAULT_MAX_ENTRIES)).unwrap_or(usize::MAX),
            max_total_bytes: ensure_positive(max_total_bytes, DEFAULT_MAX_TOTAL_BYTES),
            max_body_bytes: ensure_positive(max_body_bytes, DEFAULT_MAX_BODY_BYTES),
        }
    }

    /// Young enough to serve without contacting the upstream.
    pub fn is_fresh(&self, age_ms: i64) -> bool {
        age_ms < self.min_fresh_ms
    }

    /// Past the hard TTL; never served again.
    pub fn is_expired(&self, age_ms: i64) -> bool {
        age_ms >= self.hard_ttl_ms
    }

    /// Eligible to mask an upstream failure.
    pub fn allows_stale(&self, age_ms: i64) -> bool {
        age_ms <= self.stale_if_error_ms && age_ms <= self.hard_ttl_ms
    }

    /// Whether a body of `size` bytes may be stored.
    pub fn accepts_body(&self, size: u64) -> bool {
        size <= self.max_body_bytes
    }
}
