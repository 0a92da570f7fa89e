//! URL parsing and cache-key normalization.

/// Query keys always dropped from cache keys (matched lowercased).
const TRACKING_QUERY_KEYS: &[&str] = &["gclid", "fbclid", "msclkid"];

/// Query key prefixes always dropped from cache keys (matched lowercased).
const TRACKING_QUERY_PREFIXES: &[&str] = &["utm_"];

/// Error type for URL parsing failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Parse an absolute http(s) URL.
///
/// Leading/trailing whitespace is ignored. Nothing else is rewritten.
pub fn parse_target(input: &str) -> Result<url::Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let parsed = url::Url::parse(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }
}

fn is_tracking_param(key: &str) -> bool {
    let lower = key.to_lowercase();
    TRACKING_QUERY_KEYS.contains(&lower.as_str()) || TRACKING_QUERY_PREFIXES.iter().any(|p| lower.starts_with(p))
}

/// Canonical form of a URL for cache keying.
///
/// Normalization steps:
/// 1. Parse as an absolute http(s) URL
/// 2. Drop tracking parameters (`gclid`, `fbclid`, `msclkid`, `utm_*`)
/// 3. Sort the remaining parameters by key, then by value
/// 4. Re-encode the query; drop it entirely when nothing remains
///
/// Scheme, host and path are left exactly as the parser serializes them, so
/// distinct resources never collapse onto one key.
pub fn normalize_for_cache(input: &str) -> Result<String, UrlError> {
    let mut parsed = parse_target(input)?;

    let mut params: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    params.sort();

    parsed.set_query(None);
    if !params.is_empty() {
        parsed.query_pairs_mut().extend_pairs(&params);
    }

    Ok(parsed.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_target_basic() {
        let url = parse_target("https://example.com/api").unwrap();
        assert_eq!(url.scheme(), "https");
        assert_eq!(url.host_str(), Some("example.com"));
        assert_eq!(url.path(), "/api");
    }

    #[test]
    fn test_parse_target_trim_whitespace() {
        let url = parse_target("  https://example.com  ").unwrap();
        assert_eq!(url.as_str(), "https://example.com/");
    }

    #[test]
    fn test_parse_target_requires_scheme() {
        assert!(matches!(parse_target("example.com/api"), Err(UrlError::InvalidUrl(_))));
    }

    #[test]
    fn test_parse_target_unsupported_scheme() {
        let result = parse_target("file:///etc/passwd");
        assert!(matches!(result, Err(UrlError::UnsupportedScheme(_))));
    }

    #[test]
    fn test_parse_target_empty() {
        assert!(matches!(parse_target(""), Err(UrlError::Empty)));
        assert!(matches!(parse_target("   "), Err(UrlError::Empty)));
    }

    #[test]
    fn test_normalize_sorts_params() {
        let a = normalize_for_cache("https://api.example.com/items?b=2&a=1").unwrap();
        let b = normalize_for_cache("https://api.example.com/items?a=1&b=2").unwrap();
        assert_eq!(a, "https://api.example.com/items?a=1&b=2");
        assert_eq!(a, b);
    }

    #[test]
    fn test_normalize_sorts_repeated_keys_by_value() {
        let url = normalize_for_cache("https://example.com/?tag=z&tag=a&id=3").unwrap();
        assert_eq!(url, "https://example.com/?id=3&tag=a&tag=z");
    }

    #[test]
    fn test_normalize_drops_tracking_params() {
        let url =
            normalize_for_cache("https://example.com/page?utm_source=mail&id=7&gclid=abc&UTM_Campaign=x&FBCLID=1&msclkid=2")
                .unwrap();
        assert_eq!(url, "https://example.com/page?id=7");
    }

    #[test]
    fn test_normalize_drops_empty_query() {
        assert_eq!(normalize_for_cache("https://example.com/page?utm_medium=x").unwrap(), "https://example.com/page");
        assert_eq!(normalize_for_cache("https://example.com/page?").unwrap(), "https://example.com/page");
    }

    #[test]
    fn test_normalize_keeps_path_and_host() {
        let a = normalize_for_cache("https://example.com/en/").unwrap();
        let b = normalize_for_cache("https://example.com/en").unwrap();
        assert_ne!(a, b);

        let c = normalize_for_cache("http://example.com/en/").unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_normalize_keeps_non_tracking_lookalikes() {
        let url = normalize_for_cache("https://example.com/?utm=1&my_utm_x=2").unwrap();
        assert_eq!(url, "https://example.com/?my_utm_x=2&utm=1");
    }

    #[test]
    fn test_normalize_rejects_garbage() {
        assert!(normalize_for_cache("not a url").is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn prop_normalize_idempotent(
            path in "(/[a-z0-9]{0,6}){0,3}",
            params in prop::collection::vec(("[a-zA-Z_]{1,8}", "[a-z0-9 %&=+]{0,6}"), 0..6),
        ) {
            let mut url = url::Url::parse("https://example.com").unwrap();
            url.set_path(&path);
            if !params.is_empty() {
                url.query_pairs_mut().extend_pairs(&params);
            }

            let once = normalize_for_cache(url.as_str()).unwrap();
            let twice = normalize_for_cache(&once).unwrap();
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn prop_tracking_and_order_do_not_matter(
            params in prop::collection::vec(("[a-z]{1,6}", "[a-z0-9]{0,6}"), 0..6),
            tracking in prop::collection::vec(
                (prop_oneof![Just("utm_source"), Just("gclid"), Just("fbclid"), Just("msclkid")], "[a-z0-9]{0,6}"),
                0..4,
            ),
        ) {
            let mut plain = url::Url::parse("https://example.com/list").unwrap();
            if !params.is_empty() {
                plain.query_pairs_mut().extend_pairs(&params);
            }

            let mut noisy = url::Url::parse("https://example.com/list").unwrap();
            let mut mixed: Vec<(String, String)> = params.iter().rev().cloned().collect();
            mixed.extend(tracking.iter().map(|(k, v)| (k.to_string(), v.clone())));
            if !mixed.is_empty() {
                noisy.query_pairs_mut().extend_pairs(&mixed);
            }

            prop_assert_eq!(
                normalize_for_cache(plain.as_str()).unwrap(),
                normalize_for_cache(noisy.as_str()).unwrap()
            );
        }
    }
}
