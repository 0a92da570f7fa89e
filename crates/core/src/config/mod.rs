//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (UPCACHE_*)
//! 2. TOML config file (if UPCACHE_CONFIG_FILE set)
//! 3. Built-in defaults
//!
//! Cache limits are never fatal: anything missing, unparsable, non-finite or
//! non-positive resolves to the built-in default.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Deserializer, Serialize};

use crate::cache::CacheLimits;
use crate::cache::limits::{
    DEFAULT_HARD_TTL_MS, DEFAULT_MAX_BODY_BYTES, DEFAULT_MAX_ENTRIES, DEFAULT_MAX_TOTAL_BYTES, DEFAULT_MIN_FRESH_MS,
    DEFAULT_STALE_IF_ERROR_MS,
};

mod validation;

pub use validation::ConfigError;

/// Keyed storage backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Sqlite,
    Memory,
}

/// Per-namespace defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceProfile {
    /// `cache-control` emitted when a call does not supply its own.
    pub cache_control: String,
}

/// Raw cache thresholds as configured.
///
/// Set via UPCACHE_CACHE__<FIELD>, e.g. UPCACHE_CACHE__MIN_FRESH_MS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    #[serde(deserialize_with = "lenient_number")]
    pub min_fresh_ms: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub hard_ttl_ms: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub stale_if_error_ms: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub max_entries: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub max_total_bytes: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub max_body_bytes: Option<f64>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            min_fresh_ms: Some(DEFAULT_MIN_FRESH_MS as f64),
            hard_ttl_ms: Some(DEFAULT_HARD_TTL_MS as f64),
            stale_if_error_ms: Some(DEFAULT_STALE_IF_ERROR_MS as f64),
            max_entries: Some(DEFAULT_MAX_ENTRIES as f64),
            max_total_bytes: Some(DEFAULT_MAX_TOTAL_BYTES as f64),
            max_body_bytes: Some(DEFAULT_MAX_BODY_BYTES as f64),
        }
    }
}

impl CacheSettings {
    /// Resolve to usable limits, substituting defaults for bad values.
    pub fn limits(&self) -> CacheLimits {
        CacheLimits::resolve(
            self.min_fresh_ms,
            self.hard_ttl_ms,
            self.stale_if_error_ms,
            self.max_entries,
            self.max_total_bytes,
            self.max_body_bytes,
        )
    }
}

/// Accept numbers, numeric strings, or anything else (as "unset").
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (UPCACHE_*)
/// 2. TOML config file (if UPCACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Storage backend: `sqlite` or `memory`.
    ///
    /// Set via UPCACHE_STORE environment variable.
    #[serde(default)]
    pub store: StoreKind,

    /// Path to SQLite store database.
    ///
    /// Set via UPCACHE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for upstream requests.
    ///
    /// Set via UPCACHE_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Upstream request timeout in milliseconds.
    ///
    /// Set via UPCACHE_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum number of redirects to follow.
    ///
    /// Set via UPCACHE_MAX_REDIRECTS environment variable.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// `cache-control` used when neither the call nor a namespace profile
    /// supplies one.
    #[serde(default = "default_cache_control")]
    pub default_cache_control: String,

    /// Cache thresholds.
    #[serde(default)]
    pub cache: CacheSettings,

    /// Namespace profiles keyed by namespace name.
    #[serde(default)]
    pub namespaces: BTreeMap<String, NamespaceProfile>,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./upcache.sqlite")
}

fn default_user_agent() -> String {
    "upcache/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_redirects() -> usize {
    5
}

fn default_cache_control() -> String {
    "public, max-age=0, s-maxage=0, must-revalidate".into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store: StoreKind::default(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_redirects: default_max_redirects(),
            default_cache_control: default_cache_control(),
            cache: CacheSettings::default(),
            namespaces: BTreeMap::new(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Resolved cache thresholds.
    pub fn cache_limits(&self) -> CacheLimits {
        self.cache.limits()
    }

    /// `cache-control` for a call that did not specify one.
    pub fn cache_control_for(&self, namespace: &str) -> &str {
        self.namespaces
            .get(namespace)
            .map(|p| p.cache_control.as_str())
            .unwrap_or(&self.default_cache_control)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `UPCACHE_`
    /// 2. TOML file from `UPCACHE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("UPCACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("UPCACHE_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.store, StoreKind::Sqlite);
        assert_eq!(config.db_path, PathBuf::from("./upcache.sqlite"));
        assert_eq!(config.user_agent, "upcache/0.1");
        assert_eq!(config.timeout_ms, 20_000);
        assert_eq!(config.max_redirects, 5);
        assert!(config.namespaces.is_empty());
        assert_eq!(config.cache_limits(), CacheLimits::default());
    }

    #[test]
    fn test_timeout_duration() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(20_000));
    }

    #[test]
    fn test_cache_control_resolution() {
        let mut config = AppConfig::default();
        config.namespaces.insert(
            "docs".into(),
            NamespaceProfile { cache_control: "public, max-age=5, s-maxage=30".into() },
        );
        assert_eq!(config.cache_control_for("docs"), "public, max-age=5, s-maxage=30");
        assert_eq!(config.cache_control_for("other"), "public, max-age=0, s-maxage=0, must-revalidate");
    }

    #[test]
    fn test_load_layers_env_over_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "upcache.toml",
                r#"
                store = "memory"
                timeout_ms = 5000

                [cache]
                min_fresh_ms = 2000
                max_entries = 10

                [namespaces.docs]
                cache_control = "public, max-age=5"
                "#,
            )?;
            jail.set_env("UPCACHE_CONFIG_FILE", "upcache.toml");
            jail.set_env("UPCACHE_TIMEOUT_MS", "7000");
            jail.set_env("UPCACHE_CACHE__MAX_BODY_BYTES", "2048");

            let config = AppConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.store, StoreKind::Memory);
            assert_eq!(config.timeout_ms, 7000);
            assert_eq!(config.cache_control_for("docs"), "public, max-age=5");

            let limits = config.cache_limits();
            assert_eq!(limits.min_fresh_ms, 2000);
            assert_eq!(limits.max_entries, 10);
            assert_eq!(limits.max_body_bytes, 2048);
            assert_eq!(limits.hard_ttl_ms, 21_600_000);
            Ok(())
        });
    }

    #[test]
    fn test_bad_cache_values_fall_back() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("UPCACHE_CACHE__MIN_FRESH_MS", "-3");
            jail.set_env("UPCACHE_CACHE__HARD_TTL_MS", "soon");
            jail.set_env("UPCACHE_CACHE__MAX_ENTRIES", "0");

            let config = AppConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.cache_limits(), CacheLimits::default());
            Ok(())
        });
    }
}
