//! Per-call configuration for copyvio checks.
//!
//! Every check receives its full configuration explicitly; nothing here is
//! read from process-wide state. All types deserialize with serde so the
//! surrounding bot can load them from its own config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::RequestValidationError;

/// Top-level configuration for one check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckConfig {
    /// Number of concurrent workers fetching candidates.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Wall-clock budget for the whole check, in seconds.
    #[serde(default = "default_time_budget")]
    pub time_budget_seconds: f64,
    /// How long in-flight work may run past the deadline, in seconds.
    #[serde(default = "default_grace_period")]
    pub grace_period_seconds: f64,
    /// Score at or above which the best match counts as a violation.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    /// Patterns removing candidates before they are fetched.
    #[serde(default)]
    pub exclusion_patterns: Vec<String>,
    /// Fetcher configuration.
    #[serde(default)]
    pub fetch: FetchConfig,
    /// Comparator tunables.
    #[serde(default)]
    pub comparator: ComparatorConfig,
    /// Search query construction.
    #[serde(default)]
    pub queries: QueryConfig,
}

fn default_max_concurrency() -> usize {
    8
}

fn default_time_budget() -> f64 {
    30.0
}

fn default_grace_period() -> f64 {
    2.0
}

fn default_confidence_threshold() -> f64 {
    0.5
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            time_budget_seconds: default_time_budget(),
            grace_period_seconds: default_grace_period(),
            confidence_threshold: default_confidence_threshold(),
            exclusion_patterns: Vec::new(),
            fetch: FetchConfig::default(),
            comparator: ComparatorConfig::default(),
            queries: QueryConfig::default(),
        }
    }
}

impl CheckConfig {
    /// Creates a new check configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the worker pool size.
    #[must_use]
    pub fn with_max_concurrency(mut self, workers: usize) -> Self {
        self.max_concurrency = workers;
        self
    }

    /// Sets the time budget.
    #[must_use]
    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget_seconds = budget.as_secs_f64();
        self
    }

    /// Sets the grace period.
    #[must_use]
    pub fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace_period_seconds = grace.as_secs_f64();
        self
    }

    /// Sets the confidence threshold.
    #[must_use]
    pub fn with_confidence_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    /// Replaces the exclusion patterns.
    #[must_use]
    pub fn with_exclusions<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclusion_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the per-fetch timeout.
    #[must_use]
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch.timeout_seconds = timeout.as_secs_f64();
        self
    }

    /// Sets the comparator configuration.
    #[must_use]
    pub fn with_comparator(mut self, comparator: ComparatorConfig) -> Self {
        self.comparator = comparator;
        self
    }

    /// Sets the query configuration.
    #[must_use]
    pub fn with_queries(mut self, queries: QueryConfig) -> Self {
        self.queries = queries;
        self
    }

    /// Gets the time budget as a Duration.
    #[must_use]
    pub fn time_budget(&self) -> Duration {
        seconds_to_duration(self.time_budget_seconds)
    }

    /// Gets the grace period as a Duration.
    #[must_use]
    pub fn grace_period(&self) -> Duration {
        seconds_to_duration(self.grace_period_seconds)
    }

    /// Validates the configuration.
    ///
    /// Exclusion patterns are validated separately when they are compiled.
    pub fn validate(&self) -> Result<(), RequestValidationError> {
        if self.max_concurrency == 0 {
            return Err(RequestValidationError::new(
                "max_concurrency",
                "must be at least 1",
            ));
        }
        if !is_positive(self.time_budget_seconds) {
            return Err(RequestValidationError::new(
                "time_budget",
                "must be greater than zero",
            )
            .with_fix_hint("Pass a finite, positive budget such as 30 seconds"));
        }
        check_bounded("time_budget", self.time_budget_seconds)?;
        if !self.grace_period_seconds.is_finite() || self.grace_period_seconds < 0.0 {
            return Err(RequestValidationError::new(
                "grace_period",
                "must be a finite, non-negative duration",
            ));
        }
        check_bounded("grace_period", self.grace_period_seconds)?;
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(RequestValidationError::new(
                "confidence_threshold",
                format!("must lie in [0, 1], got {}", self.confidence_threshold),
            ));
        }
        self.fetch.validate()?;
        self.comparator.validate()?;
        self.queries.validate()
    }
}

/// Configuration for fetching candidate pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Per-fetch timeout in seconds.
    #[serde(default = "default_fetch_timeout")]
    pub timeout_seconds: f64,
    /// Maximum number of redirects to follow.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    /// User agent string.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Maximum response size in bytes.
    #[serde(default = "default_max_size")]
    pub max_response_size: usize,
}

fn default_fetch_timeout() -> f64 {
    10.0
}

fn default_max_redirects() -> usize {
    10
}

fn default_user_agent() -> String {
    concat!("copyvio/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_max_size() -> usize {
    4 * 1024 * 1024 // 4MB
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_fetch_timeout(),
            max_redirects: default_max_redirects(),
            user_agent: default_user_agent(),
            max_response_size: default_max_size(),
        }
    }
}

impl FetchConfig {
    /// Creates a new fetch configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the timeout.
    #[must_use]
    pub fn with_timeout(mut self, seconds: f64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    /// Sets the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Sets the response size cap.
    #[must_use]
    pub fn with_max_response_size(mut self, bytes: usize) -> Self {
        self.max_response_size = bytes;
        self
    }

    /// Gets timeout as Duration.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        seconds_to_duration(self.timeout_seconds)
    }

    fn validate(&self) -> Result<(), RequestValidationError> {
        if !is_positive(self.timeout_seconds) {
            return Err(RequestValidationError::new(
                "fetch.timeout",
                "must be greater than zero",
            ));
        }
        check_bounded("fetch.timeout", self.timeout_seconds)?;
        if self.max_response_size == 0 {
            return Err(RequestValidationError::new(
                "fetch.max_response_size",
                "must be at least one byte",
            ));
        }
        Ok(())
    }
}

/// Tunables of the similarity comparator.
///
/// See [`crate::compare`] for the exact formula these feed into.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComparatorConfig {
    /// Word n-gram size used for shingling.
    #[serde(default = "default_ngram_size")]
    pub ngram_size: usize,
    /// Per-segment similarities below this count as zero.
    #[serde(default = "default_noise_floor")]
    pub noise_floor: f64,
}

fn default_ngram_size() -> usize {
    3
}

fn default_noise_floor() -> f64 {
    0.15
}

impl Default for ComparatorConfig {
    fn default() -> Self {
        Self {
            ngram_size: default_ngram_size(),
            noise_floor: default_noise_floor(),
        }
    }
}

impl ComparatorConfig {
    /// Sets the n-gram size.
    #[must_use]
    pub const fn with_ngram_size(mut self, n: usize) -> Self {
        self.ngram_size = n;
        self
    }

    /// Sets the noise floor.
    #[must_use]
    pub const fn with_noise_floor(mut self, floor: f64) -> Self {
        self.noise_floor = floor;
        self
    }

    fn validate(&self) -> Result<(), RequestValidationError> {
        if self.ngram_size == 0 {
            return Err(RequestValidationError::new(
                "comparator.ngram_size",
                "must be at least 1",
            ));
        }
        if !(0.0..=1.0).contains(&self.noise_floor) {
            return Err(RequestValidationError::new(
                "comparator.noise_floor",
                "must lie in [0, 1]",
            ));
        }
        Ok(())
    }
}

/// Controls how source text is turned into search queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Maximum number of queries sent to the search provider.
    #[serde(default = "default_max_queries")]
    pub max_queries: usize,
    /// Queries are cut to at most this many words.
    #[serde(default = "default_max_query_words")]
    pub max_query_words: usize,
    /// Segments with fewer words are not used as queries.
    #[serde(default = "default_min_query_words")]
    pub min_query_words: usize,
}

fn default_max_queries() -> usize {
    8
}

fn default_max_query_words() -> usize {
    32
}

fn default_min_query_words() -> usize {
    5
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_queries: default_max_queries(),
            max_query_words: default_max_query_words(),
            min_query_words: default_min_query_words(),
        }
    }
}

impl QueryConfig {
    fn validate(&self) -> Result<(), RequestValidationError> {
        if self.max_queries == 0 || self.max_query_words == 0 {
            return Err(RequestValidationError::new(
                "queries",
                "max_queries and max_query_words must be at least 1",
            ));
        }
        Ok(())
    }
}

fn is_positive(seconds: f64) -> bool {
    seconds.is_finite() && seconds > 0.0
}

/// Upper bound for every configured duration.
const MAX_DURATION_SECONDS: f64 = 7.0 * 24.0 * 3600.0;

fn check_bounded(field: &str, seconds: f64) -> Result<(), RequestValidationError> {
    if seconds > MAX_DURATION_SECONDS {
        return Err(RequestValidationError::new(
            field,
            format!("must not exceed {MAX_DURATION_SECONDS} seconds, got {seconds}"),
        ));
    }
    Ok(())
}

fn seconds_to_duration(seconds: f64) -> Duration {
    Duration::try_from_secs_f64(seconds).unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = CheckConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.time_budget(), Duration::from_secs(30));
        assert_eq!(config.fetch.timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_builders() {
        let config = CheckConfig::new()
            .with_max_concurrency(3)
            .with_time_budget(Duration::from_millis(2500))
            .with_confidence_threshold(0.75)
            .with_exclusions(["mirror.example", "re:^https?://cache\\."]);

        assert_eq!(config.max_concurrency, 3);
        assert_eq!(config.time_budget(), Duration::from_millis(2500));
        assert_eq!(config.exclusion_patterns.len(), 2);
    }

    #[test]
    fn test_nested_builders() {
        let config = CheckConfig::new()
            .with_comparator(ComparatorConfig::default().with_ngram_size(4))
            .with_fetch_timeout(Duration::from_secs(3));
        assert_eq!(config.comparator.ngram_size, 4);
        assert_eq!(config.fetch.timeout(), Duration::from_secs(3));

        let fetch = FetchConfig::new().with_timeout(2.5).with_user_agent("checker/1.0");
        assert_eq!(fetch.timeout(), Duration::from_millis(2500));
        assert_eq!(fetch.user_agent, "checker/1.0");

        let zero_ngrams = ComparatorConfig::default().with_ngram_size(0);
        assert!(CheckConfig::new().with_comparator(zero_ngrams).validate().is_err());
    }

    #[test]
    fn test_zero_budget_rejected() {
        let config = CheckConfig::new().with_time_budget(Duration::ZERO);
        let err = config.validate().unwrap_err();
        assert_eq!(err.field, "time_budget");
    }

    #[test]
    fn test_threshold_out_of_range_rejected() {
        for threshold in [-0.1, 1.5, f64::NAN] {
            let config = CheckConfig::new().with_confidence_threshold(threshold);
            assert_eq!(config.validate().unwrap_err().field, "confidence_threshold");
        }
    }

    #[test]
    fn test_unrepresentable_durations_rejected() {
        let config = CheckConfig::new().with_time_budget(Duration::MAX);
        assert_eq!(config.validate().unwrap_err().field, "time_budget");

        let config = CheckConfig::new().with_grace_period(Duration::from_secs(u64::MAX / 2));
        assert_eq!(config.validate().unwrap_err().field, "grace_period");

        let config = CheckConfig::new().with_fetch_timeout(Duration::MAX);
        assert_eq!(config.validate().unwrap_err().field, "fetch.timeout");

        let config = CheckConfig::new().with_time_budget(Duration::from_secs(3600));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let config = CheckConfig::new().with_max_concurrency(0);
        assert_eq!(config.validate().unwrap_err().field, "max_concurrency");
    }

    #[test]
    fn test_negative_budget_does_not_panic() {
        let config = CheckConfig {
            time_budget_seconds: -4.0,
            ..Default::default()
        };
        assert_eq!(config.time_budget(), Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_partial() {
        let config: CheckConfig = serde_json::from_value(serde_json::json!({
            "max_concurrency": 4,
            "exclusion_patterns": ["wikipedia.org"],
            "comparator": {"ngram_size": 2}
        }))
        .unwrap();

        assert_eq!(config.max_concurrency, 4);
        assert_eq!(config.comparator.ngram_size, 2);
        assert!((config.comparator.noise_floor - 0.15).abs() < f64::EPSILON);
        assert!((config.confidence_threshold - 0.5).abs() < f64::EPSILON);
    }
}
