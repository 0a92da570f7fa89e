//! Header handling for requests forwarded upstream.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

/// Connection-scoped headers that must not be forwarded.
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "host",
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "content-length",
];

/// Caller-supplied conditional and range headers. Only the engine decides
/// whether a request is conditional, and a stored body is always complete.
const CALLER_CONDITIONAL_HEADERS: &[&str] =
    &["if-none-match", "if-modified-since", "if-match", "if-unmodified-since", "if-range", "range"];

/// Strip hop-by-hop, conditional and range headers from an inbound request
/// and fold repeated headers into one comma-joined value.
///
/// Values that are not visible ASCII are dropped rather than forwarded.
pub fn sanitize_request_headers(headers: &HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::new();

    for name in headers.keys() {
        if HOP_BY_HOP_HEADERS.contains(&name.as_str()) || CALLER_CONDITIONAL_HEADERS.contains(&name.as_str()) {
            continue;
        }

        let values: Vec<&str> = headers.get_all(name).iter().filter_map(|v| v.to_str().ok()).collect();
        if values.is_empty() {
            continue;
        }

        if let Ok(value) = HeaderValue::from_str(&values.join(", ")) {
            out.insert(name.clone(), value);
        }
    }

    out
}

/// Non-empty string value of a response header.
pub fn header_string(headers: &HeaderMap, name: &HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}
