//! Utility functions for indexpilot-core

use std::collections::HashSet;

use chrono::{DateTime, SecondsFormat, Utc};
use url::Url;

/// Format a timestamp for storage.
///
/// Fixed microsecond precision keeps the TEXT column lexicographically
/// ordered, which the "latest row per url" queries rely on.
pub fn db_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Result of cleaning a caller-provided URL list
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NormalizedUrls {
    /// Valid, deduplicated URLs in first-seen order
    pub valid: Vec<String>,
    /// Entries that are not absolute http(s) URLs
    pub invalid: Vec<String>,
}

/// Trim, drop blanks, deduplicate and validate a batch of URLs.
///
/// # Example
/// ```
/// use indexpilot_core::utils::normalize_urls;
///
/// let urls = normalize_urls(["https://a.test/x", " https://a.test/x ", "", "nope"]);
/// assert_eq!(urls.valid, vec!["https://a.test/x".to_string()]);
/// assert_eq!(urls.invalid, vec!["nope".to_string()]);
/// ```
pub fn normalize_urls<I, S>(urls: I) -> NormalizedUrls
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut out = NormalizedUrls::default();

    for raw in urls {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() || !seen.insert(trimmed.to_string()) {
            continue;
        }
        if is_http_url(trimmed) {
            out.valid.push(trimmed.to_string());
        } else {
            out.invalid.push(trimmed.to_string());
        }
    }

    out
}

/// Whether `s` parses as an absolute http or https URL with a host
pub fn is_http_url(s: &str) -> bool {
    match Url::parse(s) {
        Ok(u) => matches!(u.scheme(), "http" | "https") && u.host_str().is_some(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_db_timestamp_fixed_width() {
        let a = Utc.with_ymd_and_hms(2026, 3, 1, 9, 5, 7).unwrap();
        let b = a + chrono::Duration::microseconds(1);
        assert_eq!(db_timestamp(&a), "2026-03-01T09:05:07.000000Z");
        assert!(db_timestamp(&a) < db_timestamp(&b));
    }

    #[test]
    fn test_normalize_urls_dedup_keeps_first_order() {
        let urls = normalize_urls([
            "https://example.com/b",
            "https://example.com/a",
            "https://example.com/b",
        ]);
        assert_eq!(
            urls.valid,
            vec!["https://example.com/b".to_string(), "https://example.com/a".to_string()]
        );
        assert!(urls.invalid.is_empty());
    }

    #[test]
    fn test_normalize_urls_rejects_non_http() {
        let urls = normalize_urls(["ftp://example.com/file", "/relative/path", "   "]);
        assert!(urls.valid.is_empty());
        assert_eq!(urls.invalid.len(), 2);
    }

    #[test]
    fn test_is_http_url() {
        assert!(is_http_url("http://example.com"));
        assert!(is_http_url("https://example.com/path?q=1"));
        assert!(!is_http_url("mailto:someone@example.com"));
        assert!(!is_http_url("example.com/path"));
    }
}
