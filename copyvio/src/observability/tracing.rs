//! Tracing setup and span helpers for checks.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::time::Instant;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::errors::CopyvioError;

/// Default filter when `RUST_LOG` is unset.
const DEFAULT_FILTER: &str = "info,copyvio=debug";

/// Installs a global `tracing` subscriber.
///
/// The filter comes from `RUST_LOG`, falling back to `info,copyvio=debug`.
/// With `json` set, log lines are emitted as JSON objects.
pub fn init_tracing(json: bool) -> Result<(), CopyvioError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .try_init()
        .map_err(|e| CopyvioError::Config(format!("failed to install tracing subscriber: {e}")))
}

/// Span attributes describing one check.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckSpanAttributes {
    /// Check identifier.
    pub check_id: String,
    /// Number of candidates after exclusion filtering.
    pub candidates: Option<usize>,
    /// Number of search queries sent.
    pub queries: Option<usize>,
    /// Final report status.
    pub status: Option<String>,
    /// Duration in milliseconds.
    pub duration_ms: Option<f64>,
}

impl CheckSpanAttributes {
    /// Creates attributes for a check.
    #[must_use]
    pub fn new(check_id: impl Into<String>) -> Self {
        Self {
            check_id: check_id.into(),
            ..Default::default()
        }
    }

    /// Sets the candidate count.
    #[must_use]
    pub const fn with_candidates(mut self, candidates: usize) -> Self {
        self.candidates = Some(candidates);
        self
    }

    /// Sets the query count.
    #[must_use]
    pub const fn with_queries(mut self, queries: usize) -> Self {
        self.queries = Some(queries);
        self
    }

    /// Sets the final status.
    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Sets the duration.
    #[must_use]
    pub const fn with_duration_ms(mut self, duration_ms: f64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    /// Flattens the attributes into dotted keys.
    #[must_use]
    pub fn to_attributes(&self) -> HashMap<String, String> {
        let mut attrs = HashMap::new();
        attrs.insert("check.id".to_string(), self.check_id.clone());
        if let Some(v) = self.candidates {
            attrs.insert("check.candidates".to_string(), v.to_string());
        }
        if let Some(v) = self.queries {
            attrs.insert("check.queries".to_string(), v.to_string());
        }
        if let Some(ref v) = self.status {
            attrs.insert("check.status".to_string(), v.clone());
        }
        if let Some(v) = self.duration_ms {
            attrs.insert("check.duration_ms".to_string(), v.to_string());
        }
        attrs
    }
}

/// Simple span timing helper.
///
/// Uses the tokio clock so durations follow a paused test clock.
#[derive(Debug)]
pub struct SpanTimer {
    start: Instant,
    name: String,
}

impl SpanTimer {
    /// Starts a new span timer.
    #[must_use]
    pub fn start(name: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            name: name.into(),
        }
    }

    /// Returns the elapsed time in milliseconds.
    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    /// Returns the span name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Finishes the span, logs it and returns the duration in milliseconds.
    pub fn finish(self) -> f64 {
        let duration_ms = self.elapsed_ms();
        ::tracing::debug!(span_name = %self.name, duration_ms, "span finished");
        duration_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_check_span_attributes() {
        let attrs = CheckSpanAttributes::new("abc")
            .with_candidates(4)
            .with_status("completed")
            .with_duration_ms(12.5);

        let flat = attrs.to_attributes();
        assert_eq!(flat.get("check.id"), Some(&"abc".to_string()));
        assert_eq!(flat.get("check.candidates"), Some(&"4".to_string()));
        assert_eq!(flat.get("check.status"), Some(&"completed".to_string()));
        assert!(!flat.contains_key("check.queries"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_span_timer_follows_tokio_clock() {
        let timer = SpanTimer::start("fetch");
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(timer.name(), "fetch");
        let duration = timer.finish();
        assert!(duration >= 250.0);
    }

    #[test]
    fn test_init_tracing_twice_is_an_error_not_a_panic() {
        let _ = init_tracing(false);
        assert!(init_tracing(true).is_err());
    }
}
