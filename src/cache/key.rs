//! Cache key and category derivation
//!
//! Both functions are pure: the same request identity always maps to the same
//! storage key and expiration category.

use sha2::{Digest, Sha256};

/// Category used when a request identity has no endpoint segment
pub const DEFAULT_CATEGORY: &str = "default";

/// Number of path segments before the endpoint: host and API version
const ENDPOINT_SEGMENT_INDEX: usize = 2;

/// Removes a leading `http://` or `https://` from a request identity
pub fn strip_scheme(identity: &str) -> &str {
    identity
        .strip_prefix("https://")
        .or_else(|| identity.strip_prefix("http://"))
        .unwrap_or(identity)
}

/// Derives the storage key for a request identity
///
/// The scheme is stripped first so `http://` and `https://` variants of the
/// same request share one entry.
///
/// # Returns
/// A 64-character lowercase hex SHA-256 digest
pub fn derive_key(identity: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(strip_scheme(identity).as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Derives the expiration category for a request identity
///
/// The category is the first path segment after `host/<version>/`, with any
/// query string removed. Identities with fewer segments, or an empty segment
/// in that position, fall into [`DEFAULT_CATEGORY`].
///
/// # Examples
/// * `https://api.openf1.org/v1/laps?session_key=9636` -> `laps`
/// * `https://api.openf1.org/v1/sessions/` -> `sessions`
/// * `https://api.openf1.org/v1?year=2024` -> `default`
pub fn derive_category(identity: &str) -> String {
    let without_scheme = strip_scheme(identity);
    let path = without_scheme
        .split_once('?')
        .map_or(without_scheme, |(path, _)| path);

    match path.split('/').nth(ENDPOINT_SEGMENT_INDEX) {
        Some(segment) if !segment.is_empty() => segment.to_string(),
        _ => DEFAULT_CATEGORY.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_ignores_scheme() {
        assert_eq!(
            derive_key("https://x/v1/laps?a=1"),
            derive_key("http://x/v1/laps?a=1")
        );
        assert_eq!(derive_key("https://x/v1/laps?a=1"), derive_key("x/v1/laps?a=1"));
    }

    #[test]
    fn test_key_distinguishes_parameters() {
        assert_ne!(
            derive_key("https://x/v1/laps?a=1"),
            derive_key("https://x/v1/laps?a=2")
        );
        assert_ne!(
            derive_key("https://x/v1/laps?a=1&b=2"),
            derive_key("https://x/v1/laps?b=2&a=1")
        );
    }

    #[test]
    fn test_key_is_hex_sha256() {
        let key = derive_key("https://api.openf1.org/v1/laps?session_key=9636");
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_category_from_endpoint() {
        assert_eq!(
            derive_category("https://api.openf1.org/v1/laps?session_key=9636"),
            "laps"
        );
        assert_eq!(
            derive_category("http://api.openf1.org/v1/session_result?session_key=1"),
            "session_result"
        );
    }

    #[test]
    fn test_category_without_query_string() {
        assert_eq!(derive_category("https://api.openf1.org/v1/meetings"), "meetings");
    }

    #[test]
    fn test_category_with_trailing_slash() {
        assert_eq!(derive_category("https://api.openf1.org/v1/sessions/"), "sessions");
    }

    #[test]
    fn test_category_short_paths_use_default() {
        assert_eq!(derive_category("https://api.openf1.org/v1"), DEFAULT_CATEGORY);
        assert_eq!(derive_category("https://api.openf1.org/v1/"), DEFAULT_CATEGORY);
        assert_eq!(derive_category("https://api.openf1.org/v1?year=2024"), DEFAULT_CATEGORY);
        assert_eq!(derive_category("https://example.com/data"), DEFAULT_CATEGORY);
        assert_eq!(derive_category(""), DEFAULT_CATEGORY);
    }

    #[test]
    fn test_category_ignores_slashes_in_query() {
        assert_eq!(
            derive_category("https://x/v1?next=/v1/laps"),
            DEFAULT_CATEGORY
        );
    }

    #[test]
    fn test_category_without_scheme() {
        assert_eq!(derive_category("127.0.0.1:8080/v1/stints?x=1"), "stints");
    }

    #[test]
    fn test_strip_scheme() {
        assert_eq!(strip_scheme("https://a/b"), "a/b");
        assert_eq!(strip_scheme("http://a/b"), "a/b");
        assert_eq!(strip_scheme("a/b"), "a/b");
    }
}
