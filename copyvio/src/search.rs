//! Query building and candidate discovery.
//!
//! Sentence-sized snippets of the source text are sent to a
//! [`SearchProvider`] as exact-phrase queries. The URLs returned for every
//! query are merged, in query order then rank order, into one de-duplicated
//! candidate list.

use async_trait::async_trait;
use std::collections::HashSet;

use crate::cancellation::CancellationToken;
use crate::config::QueryConfig;
use crate::core::Candidate;
use crate::errors::SearchError;
use crate::scheduler::Deadline;
use crate::text::Segment;
use crate::utils::normalize_url;

/// Turns a text snippet into ranked candidate URLs.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Searches for `query` and returns URLs, most relevant first.
    async fn search(&self, query: &str) -> Result<Vec<String>, SearchError>;
}

/// Returns the same URLs for every query.
///
/// For callers that already hold their candidate list.
#[derive(Debug, Clone, Default)]
pub struct StaticSearchProvider {
    urls: Vec<String>,
}

impl StaticSearchProvider {
    /// Creates a provider answering every query with `urls`.
    #[must_use]
    pub fn new<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            urls: urls.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl SearchProvider for StaticSearchProvider {
    async fn search(&self, _query: &str) -> Result<Vec<String>, SearchError> {
        Ok(self.urls.clone())
    }
}

/// Picks up to `max_queries` snippets spread evenly over the text.
///
/// Segments shorter than `min_query_words` are skipped unless no segment is
/// long enough. Each query is cut to `max_query_words` words and stripped of
/// double quotes, since providers search it as an exact phrase.
#[must_use]
pub fn build_queries(segments: &[Segment], config: &QueryConfig) -> Vec<String> {
    let word_count = |s: &&Segment| s.text.split_whitespace().count();
    let mut eligible: Vec<&Segment> = segments
        .iter()
        .filter(|s| word_count(s) >= config.min_query_words)
        .collect();
    if eligible.is_empty() {
        eligible = segments.iter().collect();
    }

    let total = eligible.len();
    let picks: Vec<&Segment> = if total <= config.max_queries {
        eligible
    } else {
        (0..config.max_queries)
            .map(|i| eligible[i * total / config.max_queries])
            .collect()
    };

    let mut seen = HashSet::new();
    picks
        .into_iter()
        .map(|segment| {
            segment
                .text
                .split_whitespace()
                .map(|word| word.replace('"', ""))
                .filter(|word| !word.is_empty())
                .take(config.max_query_words)
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|query| !query.is_empty() && seen.insert(query.clone()))
        .collect()
}

/// A query the provider could not answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryFailure {
    /// The query text.
    pub query: String,
    /// What went wrong.
    pub error: SearchError,
}

/// Candidates found for one check.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    /// De-duplicated candidates in discovery order.
    pub candidates: Vec<Candidate>,
    /// Number of queries sent.
    pub queries_sent: usize,
    /// Queries that failed.
    pub failures: Vec<QueryFailure>,
}

impl Discovery {
    /// Whether queries were sent and every one of them failed.
    #[must_use]
    pub fn all_failed(&self) -> bool {
        self.queries_sent > 0 && self.failures.len() == self.queries_sent
    }
}

/// Runs every query concurrently and merges the results.
///
/// Each query is bounded by `deadline` and by `token`; a query cut short
/// counts as a [`SearchError::Timeout`]. One failed query never fails the
/// discovery as a whole.
pub async fn discover_candidates(
    provider: &dyn SearchProvider,
    queries: &[String],
    deadline: Deadline,
    token: &CancellationToken,
) -> Discovery {
    let searches = queries.iter().map(|query| async move {
        let outcome = tokio::select! {
            result = tokio::time::timeout_at(deadline.at(), provider.search(query)) => {
                result.unwrap_or(Err(SearchError::Timeout))
            }
            () = token.cancelled() => Err(SearchError::Timeout),
        };
        (query, outcome)
    });
    let outcomes = futures::future::join_all(searches).await;

    let mut seen = HashSet::new();
    let mut urls = Vec::new();
    let mut failures = Vec::new();
    for (query, outcome) in outcomes {
        match outcome {
            Ok(found) => {
                tracing::debug!(query = %query, count = found.len(), "search returned results");
                for url in found {
                    if seen.insert(normalize_url(&url)) {
                        urls.push(url);
                    }
                }
            }
            Err(error) => {
                tracing::warn!(query = %query, error = %error, "search query failed");
                failures.push(QueryFailure {
                    query: query.clone(),
                    error,
                });
            }
        }
    }

    Discovery {
        candidates: Candidate::from_urls(urls),
        queries_sent: queries.len(),
        failures,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::segment;
    use mockall::mock;
    use mockall::predicate::eq;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    mock! {
        pub Provider {}
        #[async_trait]
        impl SearchProvider for Provider {
            async fn search(&self, query: &str) -> Result<Vec<String>, SearchError>;
        }
    }

    fn deadline() -> Deadline {
        Deadline::after(Duration::from_secs(30))
    }

    #[test]
    fn test_build_queries_skips_short_segments_and_strips_quotes() {
        let segments = segment(
            "Short one. The \"quoted\" glacier retreated across the valley floor. Tiny.",
        );
        let queries = build_queries(&segments, &QueryConfig::default());
        assert_eq!(queries, vec!["The quoted glacier retreated across the valley floor."]);
    }

    #[test]
    fn test_build_queries_falls_back_to_short_segments() {
        let queries = build_queries(&segment("Hello there."), &QueryConfig::default());
        assert_eq!(queries, vec!["Hello there."]);
    }

    #[test]
    fn test_build_queries_spreads_and_truncates() {
        let text: String = (0..10)
            .map(|i| format!("Sentence number {i} has quite a few words in it. "))
            .collect();
        let config = QueryConfig {
            max_queries: 3,
            max_query_words: 4,
            min_query_words: 5,
        };
        let queries = build_queries(&segment(&text), &config);
        assert_eq!(
            queries,
            vec![
                "Sentence number 0 has",
                "Sentence number 3 has",
                "Sentence number 6 has",
            ]
        );
    }

    #[test]
    fn test_build_queries_empty() {
        assert!(build_queries(&[], &QueryConfig::default()).is_empty());
    }

    #[tokio::test]
    async fn test_discover_merges_and_dedupes_in_order() {
        let mut provider = MockProvider::new();
        provider
            .expect_search()
            .with(eq("first query"))
            .returning(|_| Ok(vec!["https://a.example/x".into(), "https://b.example/y".into()]));
        provider
            .expect_search()
            .with(eq("second query"))
            .returning(|_| {
                Ok(vec![
                    "https://A.example/x#top".into(),
                    "https://c.example/z".into(),
                ])
            });

        let queries = vec!["first query".to_string(), "second query".to_string()];
        let discovery = discover_candidates(&provider, &queries, deadline(), &CancellationToken::new()).await;

        let urls: Vec<&str> = discovery.candidates.iter().map(|c| c.url.as_str()).collect();
        assert_eq!(
            urls,
            vec!["https://a.example/x", "https://b.example/y", "https://c.example/z"]
        );
        assert_eq!(discovery.candidates[2].index, 2);
        assert_eq!(discovery.queries_sent, 2);
        assert!(discovery.failures.is_empty());
    }

    #[tokio::test]
    async fn test_discover_tolerates_partial_failure() {
        let mut provider = MockProvider::new();
        provider
            .expect_search()
            .with(eq("bad"))
            .returning(|_| Err(SearchError::Http("503".into())));
        provider
            .expect_search()
            .with(eq("good"))
            .returning(|_| Ok(vec!["https://a.example/".into()]));

        let queries = vec!["bad".to_string(), "good".to_string()];
        let discovery = discover_candidates(&provider, &queries, deadline(), &CancellationToken::new()).await;

        assert_eq!(discovery.candidates.len(), 1);
        assert_eq!(discovery.failures.len(), 1);
        assert_eq!(discovery.failures[0].query, "bad");
        assert!(!discovery.all_failed());
    }

    #[tokio::test]
    async fn test_discover_all_failed() {
        let mut provider = MockProvider::new();
        provider
            .expect_search()
            .times(2)
            .returning(|_| Err(SearchError::Query("quota exceeded".into())));

        let queries = vec!["a".to_string(), "b".to_string()];
        let discovery = discover_candidates(&provider, &queries, deadline(), &CancellationToken::new()).await;
        assert!(discovery.all_failed());
        assert!(discovery.candidates.is_empty());
    }

    #[tokio::test]
    async fn test_static_provider() {
        let provider = StaticSearchProvider::new(["https://a.example/", "https://b.example/"]);
        let urls = provider.search("anything").await.unwrap();
        assert_eq!(urls.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_discover_bounded_by_deadline() {
        struct SlowProvider;

        #[async_trait]
        impl SearchProvider for SlowProvider {
            async fn search(&self, _query: &str) -> Result<Vec<String>, SearchError> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(vec!["https://late.example/".into()])
            }
        }

        let queries = vec!["q".to_string()];
        let discovery = discover_candidates(
            &SlowProvider,
            &queries,
            Deadline::after(Duration::from_secs(1)),
            &CancellationToken::new(),
        )
        .await;
        assert!(discovery.all_failed());
        assert_eq!(discovery.failures[0].error, SearchError::Timeout);
    }
}
