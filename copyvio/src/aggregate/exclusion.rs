//! Exclusion patterns applied to candidates before any fetch.
//!
//! Three pattern forms are accepted, all matched case-insensitively:
//!
//! - `re:<regex>` matches anywhere in the full URL.
//! - A pattern containing `/` is a URL prefix, compared with scheme and
//!   leading `www.` removed from both sides.
//! - Anything else is a domain; it matches that domain and every subdomain.
//!   A leading `*.` is accepted and ignored. Domains are normalized the way
//!   candidate hosts are, so internationalized names compare in punycode and
//!   a port is ignored.

use regex::{Regex, RegexBuilder};
use url::Url;

use crate::core::Candidate;
use crate::errors::RequestValidationError;
use crate::utils::strip_scheme;

const REGEX_PREFIX: &str = "re:";

#[derive(Debug, Clone)]
enum Rule {
    Regex(Regex),
    Prefix(String),
    Domain(String),
}

impl Rule {
    fn matches(&self, candidate: &Candidate) -> bool {
        match self {
            Self::Regex(re) => re.is_match(&candidate.url),
            Self::Prefix(prefix) => strip_scheme(&candidate.url).starts_with(prefix.as_str()),
            Self::Domain(domain) => {
                let host = candidate.domain.as_str();
                host == domain
                    || host
                        .strip_suffix(domain.as_str())
                        .is_some_and(|rest| rest.ends_with('.'))
            }
        }
    }
}

/// A compiled set of exclusion patterns.
#[derive(Debug, Clone, Default)]
pub struct ExclusionSet {
    rules: Vec<(String, Rule)>,
}

impl ExclusionSet {
    /// Compiles `patterns`, rejecting empty patterns and invalid regexes.
    pub fn compile<I, S>(patterns: I) -> Result<Self, RequestValidationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut rules = Vec::new();
        for pattern in patterns {
            let original = pattern.as_ref().trim();
            if original.is_empty() {
                return Err(RequestValidationError::new(
                    "exclusion_patterns",
                    "patterns must not be empty",
                ));
            }
            rules.push((original.to_string(), parse_rule(original)?));
        }
        Ok(Self { rules })
    }

    /// Number of patterns in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the set holds no patterns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Returns the first pattern that excludes `candidate`.
    #[must_use]
    pub fn matches(&self, candidate: &Candidate) -> Option<&str> {
        self.rules
            .iter()
            .find(|(_, rule)| rule.matches(candidate))
            .map(|(pattern, _)| pattern.as_str())
    }
}

fn parse_rule(pattern: &str) -> Result<Rule, RequestValidationError> {
    if let Some(expr) = pattern.strip_prefix(REGEX_PREFIX) {
        let re = RegexBuilder::new(expr)
            .case_insensitive(true)
            .build()
            .map_err(|e| {
                RequestValidationError::new(
                    "exclusion_patterns",
                    format!("invalid regex '{expr}': {e}"),
                )
            })?;
        return Ok(Rule::Regex(re));
    }

    if pattern.contains('/') {
        return Ok(Rule::Prefix(strip_scheme(pattern)));
    }

    let domain = pattern.strip_prefix("*.").unwrap_or(pattern);
    let host = Url::parse(&format!("http://{domain}"))
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .ok_or_else(|| {
            RequestValidationError::new(
                "exclusion_patterns",
                format!("invalid domain '{pattern}'"),
            )
        })?;
    let host = host.strip_prefix("www.").unwrap_or(&host);
    Ok(Rule::Domain(host.trim_end_matches('.').to_string()))
}

/// Splits `candidates` into kept and excluded ones.
///
/// Excluded candidates are marked `SkippedExcluded` with the matching
/// pattern. Both lists keep discovery order.
#[must_use]
pub fn filter_exclusions(
    candidates: Vec<Candidate>,
    exclusions: &ExclusionSet,
) -> (Vec<Candidate>, Vec<Candidate>) {
    if exclusions.is_empty() {
        return (candidates, Vec::new());
    }

    let mut kept = Vec::with_capacity(candidates.len());
    let mut excluded = Vec::new();
    for mut candidate in candidates {
        match exclusions.matches(&candidate).map(str::to_string) {
            Some(pattern) => {
                tracing::debug!(url = %candidate.url, pattern = %pattern, "candidate excluded");
                candidate.mark_excluded(&pattern);
                excluded.push(candidate);
            }
            None => kept.push(candidate),
        }
    }
    (kept, excluded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::CandidateStatus;

    fn candidate(url: &str) -> Candidate {
        Candidate::new(0, url).unwrap()
    }

    fn set(patterns: &[&str]) -> ExclusionSet {
        ExclusionSet::compile(patterns).unwrap()
    }

    #[test]
    fn test_domain_pattern_matches_subdomains() {
        let exclusions = set(&["wikipedia.org"]);
        assert_eq!(
            exclusions.matches(&candidate("https://en.wikipedia.org/wiki/Rust")),
            Some("wikipedia.org")
        );
        assert!(exclusions.matches(&candidate("https://wikipedia.org/")).is_some());
        assert!(exclusions.matches(&candidate("https://notwikipedia.org/")).is_none());
        assert!(exclusions.matches(&candidate("https://wikipedia.org.evil.example/")).is_none());
    }

    #[test]
    fn test_domain_pattern_accepts_wildcard_and_case() {
        let exclusions = set(&["*.Mirror.Example"]);
        assert!(exclusions.matches(&candidate("https://WWW.mirror.example/a")).is_some());
        assert!(exclusions.matches(&candidate("https://cdn.mirror.example/a")).is_some());
    }

    #[test]
    fn test_domain_pattern_is_normalized_like_hosts() {
        let exclusions = set(&["Bücher.Example", "mirror.example:8080"]);
        assert!(exclusions.matches(&candidate("https://xn--bcher-kva.example/a")).is_some());
        assert!(exclusions.matches(&candidate("https://shop.bücher.example/a")).is_some());
        assert_eq!(
            exclusions.matches(&candidate("https://mirror.example:8080/copy")),
            Some("mirror.example:8080")
        );
        assert!(exclusions.matches(&candidate("https://mirror.example/copy")).is_some());
    }

    #[test]
    fn test_prefix_pattern() {
        let exclusions = set(&["example.com/wiki/"]);
        assert!(exclusions.matches(&candidate("https://www.example.com/wiki/Page")).is_some());
        assert!(exclusions.matches(&candidate("http://example.com/wiki/")).is_some());
        assert!(exclusions.matches(&candidate("https://example.com/blog/post")).is_none());

        let with_scheme = set(&["https://Example.com/Wiki/"]);
        assert!(with_scheme.matches(&candidate("http://example.com/wiki/x")).is_some());
    }

    #[test]
    fn test_regex_pattern() {
        let exclusions = set(&[r"re:/mirror/\d+$"]);
        assert!(exclusions.matches(&candidate("https://a.example/MIRROR/42")).is_some());
        assert!(exclusions.matches(&candidate("https://a.example/mirror/42/x")).is_none());
    }

    #[test]
    fn test_invalid_patterns_rejected() {
        let err = ExclusionSet::compile(["re:(unclosed"]).unwrap_err();
        assert_eq!(err.field, "exclusion_patterns");
        assert!(err.message.contains("invalid regex"));

        assert!(ExclusionSet::compile(["  "]).is_err());

        let err = ExclusionSet::compile(["bad host"]).unwrap_err();
        assert!(err.message.contains("invalid domain"));
    }

    #[test]
    fn test_filter_exclusions_marks_and_keeps_order() {
        let candidates = Candidate::from_urls([
            "https://en.wikipedia.org/wiki/A",
            "https://a.example/1",
            "https://mirror.example/copy",
            "https://b.example/2",
        ]);
        let (kept, excluded) = filter_exclusions(candidates, &set(&["wikipedia.org", "mirror.example"]));

        let kept_indices: Vec<usize> = kept.iter().map(|c| c.index).collect();
        assert_eq!(kept_indices, vec![1, 3]);
        assert_eq!(excluded.len(), 2);
        assert!(excluded.iter().all(|c| c.status == CandidateStatus::SkippedExcluded));
        assert_eq!(
            excluded[1].failure.as_deref(),
            Some("excluded by pattern 'mirror.example'")
        );
    }

    #[test]
    fn test_empty_set_keeps_everything() {
        let candidates = Candidate::from_urls(["https://a.example/"]);
        let (kept, excluded) = filter_exclusions(candidates, &ExclusionSet::default());
        assert_eq!(kept.len(), 1);
        assert!(excluded.is_empty());
    }
}
