//! The check entry point.
//!
//! A check segments the source text, searches for candidate sources, drops
//! excluded candidates, fetches and compares the rest within the time
//! budget, and aggregates everything into a [`Report`]. Every check owns its
//! own queue, domain table, deadline and cancellation token; nothing is
//! shared between checks.

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::aggregate::{aggregate, filter_exclusions, ExclusionSet, ReportMeta};
use crate::cancellation::CancellationToken;
use crate::compare::Comparator;
use crate::config::CheckConfig;
use crate::core::Report;
use crate::errors::{CopyvioError, RequestValidationError};
use crate::events::{CheckEvent, EventSink, NoOpEventSink};
use crate::fetch::Fetcher;
use crate::observability::CheckSpanAttributes;
use crate::scheduler::{Deadline, Scheduler};
use crate::search::{build_queries, discover_candidates, SearchProvider};
use crate::text::segment;
use crate::utils::{generate_check_id, iso_timestamp};

/// Input of one check. Immutable once handed to the checker.
#[derive(Debug, Clone)]
pub struct CheckRequest {
    source_text: String,
    config: CheckConfig,
    cancellation: Option<Arc<CancellationToken>>,
}

impl CheckRequest {
    /// Creates a request with the default configuration.
    #[must_use]
    pub fn new(source_text: impl Into<String>) -> Self {
        Self {
            source_text: source_text.into(),
            config: CheckConfig::default(),
            cancellation: None,
        }
    }

    /// Replaces the whole configuration.
    #[must_use]
    pub fn with_config(mut self, config: CheckConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the exclusion patterns.
    #[must_use]
    pub fn with_exclusions<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config = self.config.with_exclusions(patterns);
        self
    }

    /// Sets the confidence threshold.
    #[must_use]
    pub fn with_confidence_threshold(mut self, threshold: f64) -> Self {
        self.config = self.config.with_confidence_threshold(threshold);
        self
    }

    /// Sets the time budget.
    #[must_use]
    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.config = self.config.with_time_budget(budget);
        self
    }

    /// Sets the worker pool size.
    #[must_use]
    pub fn with_max_concurrency(mut self, workers: usize) -> Self {
        self.config = self.config.with_max_concurrency(workers);
        self
    }

    /// Lets the caller abort the check early, e.g. on shutdown.
    ///
    /// Cancelling the token is treated like an early deadline: no new fetches
    /// start and the report comes back truncated.
    #[must_use]
    pub fn with_cancellation(mut self, token: Arc<CancellationToken>) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// The text being checked.
    #[must_use]
    pub fn source_text(&self) -> &str {
        &self.source_text
    }

    /// The check configuration.
    #[must_use]
    pub const fn config(&self) -> &CheckConfig {
        &self.config
    }

    /// Validates the request and compiles its exclusion patterns.
    pub fn validate(&self) -> Result<ExclusionSet, RequestValidationError> {
        if self.source_text.trim().is_empty() {
            return Err(RequestValidationError::new(
                "source_text",
                "must contain some text",
            ));
        }
        self.config.validate()?;
        ExclusionSet::compile(&self.config.exclusion_patterns)
    }
}

/// Runs copyvio checks with an injected fetcher and event sink.
pub struct CopyvioChecker {
    fetcher: Arc<dyn Fetcher>,
    sink: Arc<dyn EventSink>,
}

impl std::fmt::Debug for CopyvioChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CopyvioChecker").finish_non_exhaustive()
    }
}

impl CopyvioChecker {
    /// Creates a checker that fetches with `fetcher` and emits no events.
    #[must_use]
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            fetcher,
            sink: Arc::new(NoOpEventSink),
        }
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Creates a checker backed by [`crate::fetch::HttpFetcher`].
    #[cfg(feature = "http")]
    pub fn http(config: crate::config::FetchConfig) -> Result<Self, CopyvioError> {
        Ok(Self::new(Arc::new(crate::fetch::HttpFetcher::new(config)?)))
    }

    /// Runs one check.
    ///
    /// Only an invalid request is an `Err`; search and fetch failures are
    /// reported through the returned [`Report`].
    pub async fn check(
        &self,
        request: CheckRequest,
        provider: &dyn SearchProvider,
    ) -> Result<Report, CopyvioError> {
        let exclusions = request.validate()?;
        let CheckRequest {
            source_text,
            config,
            cancellation,
        } = request;

        let check_id = generate_check_id();
        let started_at = iso_timestamp();
        let clock = Instant::now();
        let deadline = Deadline::after(config.time_budget());
        let token = Arc::new(CancellationToken::new());
        let watcher = cancellation
            .map(|external| tokio::spawn(forward_cancel(external, Arc::clone(&token))));

        let segments = segment(&source_text);
        let source = Arc::new(Comparator::new(config.comparator).prepare(&segments));
        let queries = build_queries(&segments, &config.queries);
        info!(
            check_id = %check_id,
            segments = segments.len(),
            queries = queries.len(),
            budget_ms = config.time_budget().as_millis() as u64,
            "copyvio check started"
        );

        let discovery = discover_candidates(provider, &queries, deadline, &token).await;
        for failure in &discovery.failures {
            self.sink.try_emit(
                CheckEvent::SearchFailed.as_str(),
                Some(json!({"query": failure.query, "error": failure.error.to_string()})),
            );
        }
        let cut_during_search = deadline.is_expired() || token.is_cancelled();
        let search_failed = discovery.all_failed() && !cut_during_search;
        if search_failed {
            warn!(check_id = %check_id, queries = discovery.queries_sent, "every search query failed");
        }

        let (kept, excluded) = filter_exclusions(discovery.candidates, &exclusions);
        debug!(
            check_id = %check_id,
            kept = kept.len(),
            excluded = excluded.len(),
            "exclusions applied"
        );

        let scheduler = Scheduler::new(Arc::clone(&self.fetcher), Arc::clone(&self.sink), &config);
        let outcome = scheduler.run(kept, source, deadline, Arc::clone(&token)).await;
        if let Some(watcher) = watcher {
            watcher.abort();
        }

        let scheduled = outcome.candidates.len();
        let mut candidates = outcome.candidates;
        candidates.extend(excluded);
        let elapsed = clock.elapsed();
        let report = aggregate(
            outcome.results,
            candidates,
            outcome.truncated || cut_during_search,
            ReportMeta {
                check_id,
                confidence_threshold: config.confidence_threshold,
                queries_sent: discovery.queries_sent,
                search_failed,
                elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                started_at,
            },
        );

        let attributes = CheckSpanAttributes::new(check_id.to_string())
            .with_candidates(scheduled)
            .with_queries(report.queries_sent)
            .with_status(report.status.to_string())
            .with_duration_ms(elapsed.as_secs_f64() * 1000.0);
        self.sink
            .emit(
                CheckEvent::CheckCompleted.as_str(),
                Some(json!({
                    "check_id": check_id.to_string(),
                    "status": report.status.to_string(),
                    "best_score": report.best_score(),
                    "violation": report.violation,
                    "elapsed_ms": report.elapsed_ms,
                })),
            )
            .await;
        info!(
            attributes = ?attributes.to_attributes(),
            best_score = report.best_score(),
            violation = report.violation,
            "copyvio check finished"
        );

        Ok(report)
    }
}

/// Cancels `internal` with the caller's reason when `external` is cancelled.
async fn forward_cancel(external: Arc<CancellationToken>, internal: Arc<CancellationToken>) {
    tokio::select! {
        () = external.cancelled() => {
            let reason = external.reason().unwrap_or_else(|| "cancelled".to_string());
            internal.cancel(reason);
        }
        () = internal.cancelled() => {}
    }
}

/// Checks `source_text` against the web using the HTTP fetcher.
///
/// Candidates come from `search_provider`; candidates matching one of
/// `exclusion_patterns` are never fetched.
#[cfg(feature = "http")]
pub async fn check_copyvio(
    source_text: &str,
    exclusion_patterns: &[String],
    confidence_threshold: f64,
    time_budget: Duration,
    max_concurrency: usize,
    search_provider: &dyn SearchProvider,
) -> Result<Report, CopyvioError> {
    let config = CheckConfig::default()
        .with_exclusions(exclusion_patterns.iter().cloned())
        .with_confidence_threshold(confidence_threshold)
        .with_time_budget(time_budget)
        .with_max_concurrency(max_concurrency);
    let request = CheckRequest::new(source_text).with_config(config.clone());

    CopyvioChecker::http(config.fetch)?
        .with_sink(Arc::new(crate::events::LoggingEventSink::debug()))
        .check(request, search_provider)
        .await
}
