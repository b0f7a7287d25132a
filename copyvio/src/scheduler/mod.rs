//! Domain-throttled workload scheduler.
//!
//! A fixed pool of tokio tasks pulls candidates from a shared [`WorkQueue`].
//! A worker may only fetch a candidate whose domain no other worker holds.
//! Every fetch is bounded by `min(per-fetch timeout, time remaining)`. When
//! the deadline passes the [`CancellationToken`] is cancelled, no new work is
//! dispatched, and in-flight work gets one grace period before it is
//! abandoned. Workers report back over a channel; the run loop owns all
//! candidate records.

mod deadline;
mod queue;

pub use deadline::Deadline;
pub use queue::{Claim, DomainSlot, WorkQueue};

use futures::FutureExt;
use serde_json::json;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::cancellation::CancellationToken;
use crate::compare::{Comparator, Comparison, PreparedSource};
use crate::config::CheckConfig;
use crate::core::{Candidate, CandidateStatus, ComparisonResult};
use crate::events::{CheckEvent, EventSink};
use crate::fetch::Fetcher;
use crate::observability::SpanTimer;
use crate::text::segment;

/// Cancellation reason used when the check deadline expires.
pub const DEADLINE_REASON: &str = "deadline";

/// Pages up to this many bytes are compared on the worker task itself.
const INLINE_COMPARE_LIMIT: usize = 64 * 1024;

/// What a scheduler run produced.
#[derive(Debug, Clone)]
pub struct ScheduleOutcome {
    /// One result per compared candidate, in completion order.
    pub results: Vec<ComparisonResult>,
    /// Every candidate in discovery order, each in a terminal status.
    pub candidates: Vec<Candidate>,
    /// Whether time ran out before every candidate was processed.
    pub truncated: bool,
    /// Why the run was cancelled, if it was.
    pub cancel_reason: Option<String>,
}

impl ScheduleOutcome {
    fn empty() -> Self {
        Self {
            results: Vec::new(),
            candidates: Vec::new(),
            truncated: false,
            cancel_reason: None,
        }
    }
}

/// Runs fetch-and-compare work for one check.
pub struct Scheduler {
    fetcher: Arc<dyn Fetcher>,
    sink: Arc<dyn EventSink>,
    comparator: Comparator,
    max_concurrency: usize,
    fetch_timeout: Duration,
    grace_period: Duration,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("max_concurrency", &self.max_concurrency)
            .field("fetch_timeout", &self.fetch_timeout)
            .field("grace_period", &self.grace_period)
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    /// Creates a scheduler from a validated configuration.
    #[must_use]
    pub fn new(fetcher: Arc<dyn Fetcher>, sink: Arc<dyn EventSink>, config: &CheckConfig) -> Self {
        Self {
            fetcher,
            sink,
            comparator: Comparator::new(config.comparator),
            max_concurrency: config.max_concurrency.max(1),
            fetch_timeout: config.fetch.timeout(),
            grace_period: config.grace_period(),
        }
    }

    /// Fetches and compares `candidates` until done or out of time.
    ///
    /// `token` is cancelled when `deadline` expires; callers may cancel it
    /// earlier to stop the run. Every returned candidate is terminal.
    pub async fn run(
        &self,
        candidates: Vec<Candidate>,
        source: Arc<PreparedSource>,
        deadline: Deadline,
        token: Arc<CancellationToken>,
    ) -> ScheduleOutcome {
        if candidates.is_empty() {
            return ScheduleOutcome::empty();
        }

        let mut records: BTreeMap<usize, Candidate> =
            candidates.iter().map(|c| (c.index, c.clone())).collect();
        let queue = WorkQueue::new(candidates);
        let timer = tokio::spawn(expire_at(deadline, Arc::clone(&token)));

        let context = Arc::new(WorkerContext {
            fetcher: Arc::clone(&self.fetcher),
            comparator: self.comparator,
            source,
            deadline,
            fetch_timeout: self.fetch_timeout,
            token: Arc::clone(&token),
        });
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut workers = JoinSet::new();
        let worker_count = self.max_concurrency.min(records.len());
        for worker in 0..worker_count {
            workers.spawn(run_worker(
                worker,
                Arc::clone(&context),
                Arc::clone(&queue),
                tx.clone(),
            ));
        }
        drop(tx);
        debug!(workers = worker_count, candidates = records.len(), "scheduler started");

        let mut results = Vec::new();
        let mut hard_stop = deadline.at() + self.grace_period;
        let mut cancel_seen = false;
        let mut abandoned = false;

        loop {
            tokio::select! {
                event = rx.recv() => match event {
                    Some(event) => self.record(event, &mut records, &mut results),
                    None => break,
                },
                () = tokio::time::sleep_until(hard_stop) => {
                    abandoned = true;
                    break;
                }
                () = token.cancelled(), if !cancel_seen => {
                    cancel_seen = true;
                    hard_stop = hard_stop.min(Instant::now() + self.grace_period);
                }
            }
        }

        if abandoned {
            warn!(in_flight = workers.len(), "grace period expired, abandoning in-flight fetches");
        }
        workers.abort_all();
        while workers.join_next().await.is_some() {}
        timer.abort();
        while let Ok(event) = rx.try_recv() {
            self.record(event, &mut records, &mut results);
        }

        let cancel_reason = token.reason();
        for candidate in records.values_mut() {
            let reason = match candidate.status {
                CandidateStatus::Fetching => "abandoned after the grace period".to_string(),
                CandidateStatus::Pending => match cancel_reason.as_deref() {
                    None | Some(DEADLINE_REASON) => "not fetched before the deadline".to_string(),
                    Some(other) => format!("check cancelled: {other}"),
                },
                _ => continue,
            };
            candidate.mark_timed_out(reason);
            self.emit_candidate(CheckEvent::FetchAbandoned, candidate, None);
        }

        let candidates: Vec<Candidate> = records.into_values().collect();
        let truncated = candidates
            .iter()
            .any(|c| c.status == CandidateStatus::SkippedTimeout);
        info!(
            compared = results.len(),
            truncated,
            cancel_reason = cancel_reason.as_deref().unwrap_or("none"),
            "scheduler finished"
        );

        ScheduleOutcome {
            results,
            candidates,
            truncated,
            cancel_reason,
        }
    }

    fn record(
        &self,
        event: WorkerEvent,
        records: &mut BTreeMap<usize, Candidate>,
        results: &mut Vec<ComparisonResult>,
    ) {
        match event {
            WorkerEvent::Started { index } => {
                if let Some(candidate) = records.get_mut(&index) {
                    candidate.mark_fetching();
                    self.emit_candidate(CheckEvent::FetchStarted, candidate, None);
                }
            }
            WorkerEvent::Finished {
                candidate,
                comparison,
                elapsed_ms,
            } => {
                match candidate.status {
                    CandidateStatus::Fetched => {
                        let comparison = comparison.unwrap_or_else(Comparison::empty);
                        self.emit_candidate(
                            CheckEvent::FetchCompleted,
                            &candidate,
                            Some(json!({"score": comparison.score, "duration_ms": elapsed_ms})),
                        );
                        results.push(ComparisonResult::new(
                            &candidate,
                            comparison.score,
                            comparison.matches,
                        ));
                    }
                    CandidateStatus::SkippedTimeout => {
                        self.emit_candidate(CheckEvent::FetchAbandoned, &candidate, None);
                    }
                    _ => {
                        self.emit_candidate(
                            CheckEvent::FetchFailed,
                            &candidate,
                            Some(json!({"duration_ms": elapsed_ms})),
                        );
                    }
                }
                records.insert(candidate.index, candidate);
            }
        }
    }

    /// Reports a transition without awaiting the sink, so a slow sink
    /// cannot hold the run loop past its hard stop.
    fn emit_candidate(
        &self,
        event: CheckEvent,
        candidate: &Candidate,
        extra: Option<serde_json::Value>,
    ) {
        let mut data = json!({
            "index": candidate.index,
            "url": candidate.url,
            "domain": candidate.domain,
            "status": candidate.status.to_string(),
        });
        if let Some(reason) = &candidate.failure {
            data["reason"] = json!(reason);
        }
        if let (Some(serde_json::Value::Object(extra)), Some(map)) = (extra, data.as_object_mut()) {
            map.extend(extra);
        }
        self.sink.try_emit(event.as_str(), Some(data));
    }
}

/// Messages from workers to the run loop.
#[derive(Debug)]
enum WorkerEvent {
    Started {
        index: usize,
    },
    Finished {
        candidate: Candidate,
        comparison: Option<Comparison>,
        elapsed_ms: f64,
    },
}

/// Outcome of one bounded fetch attempt.
enum Attempt {
    Fetched(String),
    Failed(String),
    OutOfTime(String),
}

struct WorkerContext {
    fetcher: Arc<dyn Fetcher>,
    comparator: Comparator,
    source: Arc<PreparedSource>,
    deadline: Deadline,
    fetch_timeout: Duration,
    token: Arc<CancellationToken>,
}

impl WorkerContext {
    async fn fetch(&self, url: &str) -> Attempt {
        let bound = self.deadline.fetch_bound(self.fetch_timeout);
        if bound.is_zero() {
            return Attempt::OutOfTime("deadline reached before fetch".to_string());
        }
        let cut_by_deadline = bound < self.fetch_timeout;

        let fetch = AssertUnwindSafe(self.fetcher.fetch(url, bound)).catch_unwind();
        match tokio::time::timeout(bound, fetch).await {
            Ok(Ok(Ok(text))) => Attempt::Fetched(text),
            Ok(Ok(Err(e))) if e.is_timeout() && cut_by_deadline => {
                Attempt::OutOfTime(format!("deadline reached during fetch: {e}"))
            }
            Ok(Ok(Err(e))) => Attempt::Failed(e.to_string()),
            Ok(Err(_)) => Attempt::Failed("fetcher panicked".to_string()),
            Err(_) if cut_by_deadline => {
                Attempt::OutOfTime("deadline reached during fetch".to_string())
            }
            Err(_) => Attempt::Failed(format!("fetch timed out after {}ms", bound.as_millis())),
        }
    }

    async fn compare(&self, text: String) -> Result<Comparison, String> {
        if text.len() <= INLINE_COMPARE_LIMIT {
            return Ok(self.comparator.compare_prepared(&self.source, &segment(&text)));
        }
        let source = Arc::clone(&self.source);
        let comparator = self.comparator;
        tokio::task::spawn_blocking(move || comparator.compare_prepared(&source, &segment(&text)))
            .await
            .map_err(|e| format!("comparison failed: {e}"))
    }
}

async fn run_worker(
    worker: usize,
    context: Arc<WorkerContext>,
    queue: Arc<WorkQueue>,
    tx: mpsc::UnboundedSender<WorkerEvent>,
) {
    while let Some(Claim {
        mut candidate,
        slot,
    }) = queue.claim(&context.token).await
    {
        debug!(worker, url = %candidate.url, domain = %candidate.domain, "fetch started");
        if tx
            .send(WorkerEvent::Started {
                index: candidate.index,
            })
            .is_err()
        {
            break;
        }
        candidate.mark_fetching();
        let timer = SpanTimer::start(format!("fetch {}", candidate.domain));

        let attempt = context.fetch(&candidate.url).await;
        drop(slot);

        let mut comparison = None;
        match attempt {
            Attempt::Fetched(text) => {
                candidate.mark_fetched(text);
                let text = candidate.take_text().unwrap_or_default();
                match context.compare(text).await {
                    Ok(result) => comparison = Some(result),
                    Err(reason) => candidate.mark_failed(reason),
                }
            }
            Attempt::Failed(reason) => {
                debug!(worker, url = %candidate.url, %reason, "fetch failed");
                candidate.mark_failed(reason);
            }
            Attempt::OutOfTime(reason) => {
                debug!(worker, url = %candidate.url, %reason, "fetch cut short");
                candidate.mark_timed_out(reason);
            }
        }

        let elapsed_ms = timer.finish();
        let finished = WorkerEvent::Finished {
            candidate,
            comparison,
            elapsed_ms,
        };
        if tx.send(finished).is_err() {
            break;
        }
    }
}

/// Cancels `token` once `deadline` expires.
async fn expire_at(deadline: Deadline, token: Arc<CancellationToken>) {
    tokio::select! {
        () = tokio::time::sleep_until(deadline.at()) => {
            debug!("check deadline reached");
            token.cancel(DEADLINE_REASON);
        }
        () = token.cancelled() => {}
    }
}
