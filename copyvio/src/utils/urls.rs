//! URL helpers for candidate identity and exclusion matching.

use url::Url;

/// Query parameters that only carry tracking state.
const TRACKING_PARAMS: &[&str] = &[
    "fbclid",
    "gclid",
    "ref",
    "utm_campaign",
    "utm_content",
    "utm_medium",
    "utm_source",
    "utm_term",
];

/// Host of `raw`, lowercased and without a leading `www.`.
///
/// Returns `None` if `raw` does not parse or has no host.
#[must_use]
pub fn domain_of(raw: &str) -> Option<String> {
    let parsed = Url::parse(raw).ok()?;
    let host = parsed.host_str()?.trim_end_matches('.').to_ascii_lowercase();
    if host.is_empty() {
        return None;
    }
    Some(strip_www(&host).to_string())
}

/// Canonical form of a URL used to deduplicate search results.
///
/// Drops the fragment, default ports, tracking parameters and a trailing
/// slash, and sorts the remaining query parameters. Unparsable input is
/// returned unchanged.
#[must_use]
pub fn normalize_url(raw: &str) -> String {
    let Ok(mut parsed) = Url::parse(raw.trim()) else {
        return raw.to_string();
    };

    parsed.set_fragment(None);
    if matches!(
        (parsed.scheme(), parsed.port()),
        ("http", Some(80)) | ("https", Some(443))
    ) {
        let _ = parsed.set_port(None);
    }

    let mut params: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(key, _)| {
            TRACKING_PARAMS
                .binary_search(&key.to_ascii_lowercase().as_str())
                .is_err()
        })
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    params.sort();
    if params.is_empty() {
        parsed.set_query(None);
    } else {
        parsed.query_pairs_mut().clear().extend_pairs(params);
    }

    let path = parsed.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        parsed.set_path(&path[..path.len() - 1]);
    }

    parsed.to_string()
}

/// `raw` without its scheme and leading `www.`, lowercased.
///
/// Used to compare URLs against prefix exclusion patterns.
#[must_use]
pub fn strip_scheme(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    let rest = lowered
        .split_once("://")
        .map_or(lowered.as_str(), |(_, rest)| rest);
    strip_www(rest).to_string()
}

fn strip_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_of() {
        assert_eq!(domain_of("https://WWW.Example.org/a").as_deref(), Some("example.org"));
        assert_eq!(domain_of("http://news.example.org:8080/").as_deref(), Some("news.example.org"));
        assert_eq!(domain_of("garbage"), None);
        assert_eq!(domain_of("mailto:a@example.org"), None);
    }

    #[test]
    fn test_normalize_url_equivalents() {
        let a = normalize_url("https://Example.com:443/path/?b=2&a=1&utm_source=x#frag");
        let b = normalize_url("https://example.com/path?a=1&b=2");
        assert_eq!(a, b);
        assert_eq!(b, "https://example.com/path?a=1&b=2");
    }

    #[test]
    fn test_normalize_url_keeps_root_and_unparsable() {
        assert_eq!(normalize_url("https://example.com/"), "https://example.com/");
        assert_eq!(normalize_url("not a url"), "not a url");
    }

    #[test]
    fn test_strip_scheme() {
        assert_eq!(strip_scheme("HTTPS://www.Example.com/Wiki/X"), "example.com/wiki/x");
        assert_eq!(strip_scheme("example.com/a"), "example.com/a");
    }

    #[test]
    fn test_tracking_params_sorted() {
        let mut sorted = TRACKING_PARAMS.to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, TRACKING_PARAMS);
    }
}
