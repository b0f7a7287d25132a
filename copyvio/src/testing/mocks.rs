//! Scripted fetcher for tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

use crate::errors::FetchError;
use crate::fetch::Fetcher;
use crate::utils::domain_of;

#[derive(Debug, Clone)]
enum Script {
    Page { text: String, delay: Duration },
    Fail { error: FetchError, delay: Duration },
    Hang,
}

/// One fetch observed by a [`MockFetcher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRecord {
    /// The fetched URL.
    pub url: String,
    /// Domain of the URL.
    pub domain: String,
    /// When the fetch started.
    pub started: Instant,
    /// When the fetch returned or was dropped.
    pub finished: Option<Instant>,
    /// The time bound the fetcher was given.
    pub timeout: Duration,
}

impl FetchRecord {
    /// Whether this fetch ran at the same time as `other`.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        let end = |r: &Self| r.finished.unwrap_or_else(Instant::now);
        self.started < end(other) && other.started < end(self)
    }
}

#[derive(Debug, Default)]
struct Activity {
    records: Vec<FetchRecord>,
    in_flight: HashMap<String, usize>,
    peak_per_domain: HashMap<String, usize>,
    in_flight_total: usize,
    peak_total: usize,
}

/// A fetcher that serves scripted responses.
///
/// Unknown URLs fail with HTTP 404. Delayed pages honor the timeout the way
/// a real fetcher does, returning [`FetchError::Timeout`] when the delay
/// exceeds it; hanging URLs ignore the timeout entirely.
#[derive(Debug, Default)]
pub struct MockFetcher {
    scripts: HashMap<String, Script>,
    default_delay: Duration,
    activity: Mutex<Activity>,
}

impl MockFetcher {
    /// Creates an empty mock fetcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `text` for `url` immediately (plus the default delay).
    #[must_use]
    pub fn with_page(self, url: impl Into<String>, text: impl Into<String>) -> Self {
        let delay = self.default_delay;
        self.with_page_delayed(url, text, delay)
    }

    /// Serves `text` for `url` after `delay`.
    #[must_use]
    pub fn with_page_delayed(
        mut self,
        url: impl Into<String>,
        text: impl Into<String>,
        delay: Duration,
    ) -> Self {
        self.scripts.insert(
            url.into(),
            Script::Page {
                text: text.into(),
                delay,
            },
        );
        self
    }

    /// Fails `url` with `error`.
    #[must_use]
    pub fn with_failure(self, url: impl Into<String>, error: FetchError) -> Self {
        let delay = self.default_delay;
        self.with_failure_delayed(url, error, delay)
    }

    /// Fails `url` with `error` after `delay`.
    #[must_use]
    pub fn with_failure_delayed(
        mut self,
        url: impl Into<String>,
        error: FetchError,
        delay: Duration,
    ) -> Self {
        self.scripts.insert(url.into(), Script::Fail { error, delay });
        self
    }

    /// Makes `url` never return, ignoring the timeout.
    #[must_use]
    pub fn with_hang(mut self, url: impl Into<String>) -> Self {
        self.scripts.insert(url.into(), Script::Hang);
        self
    }

    /// Latency applied by `with_page` and `with_failure` calls made after this one.
    #[must_use]
    pub const fn with_default_delay(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }

    /// Number of fetches started.
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.activity.lock().records.len()
    }

    /// URLs in the order their fetches started.
    #[must_use]
    pub fn fetched_urls(&self) -> Vec<String> {
        self.activity
            .lock()
            .records
            .iter()
            .map(|r| r.url.clone())
            .collect()
    }

    /// Whether `url` was ever fetched.
    #[must_use]
    pub fn was_fetched(&self, url: &str) -> bool {
        self.activity.lock().records.iter().any(|r| r.url == url)
    }

    /// Every fetch observed so far.
    #[must_use]
    pub fn records(&self) -> Vec<FetchRecord> {
        self.activity.lock().records.clone()
    }

    /// Highest number of simultaneous fetches to `domain`.
    #[must_use]
    pub fn peak_concurrency_for(&self, domain: &str) -> usize {
        self.activity
            .lock()
            .peak_per_domain
            .get(domain)
            .copied()
            .unwrap_or(0)
    }

    /// Highest number of simultaneous fetches overall.
    #[must_use]
    pub fn peak_concurrency(&self) -> usize {
        self.activity.lock().peak_total
    }

    fn begin(&self, url: &str, timeout: Duration) -> InFlight<'_> {
        let domain = domain_of(url).unwrap_or_default();
        let mut activity = self.activity.lock();
        let record = activity.records.len();
        activity.records.push(FetchRecord {
            url: url.to_string(),
            domain: domain.clone(),
            started: Instant::now(),
            finished: None,
            timeout,
        });

        let active = activity.in_flight.entry(domain.clone()).or_default();
        *active += 1;
        let active = *active;
        let peak = activity.peak_per_domain.entry(domain.clone()).or_default();
        *peak = (*peak).max(active);
        activity.in_flight_total += 1;
        activity.peak_total = activity.peak_total.max(activity.in_flight_total);

        InFlight {
            fetcher: self,
            record,
            domain,
        }
    }
}

/// Marks a fetch finished when dropped, including when the future is aborted.
struct InFlight<'a> {
    fetcher: &'a MockFetcher,
    record: usize,
    domain: String,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut activity = self.fetcher.activity.lock();
        if let Some(record) = activity.records.get_mut(self.record) {
            record.finished = Some(Instant::now());
        }
        if let Some(active) = activity.in_flight.get_mut(&self.domain) {
            *active = active.saturating_sub(1);
        }
        activity.in_flight_total = activity.in_flight_total.saturating_sub(1);
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<String, FetchError> {
        let _in_flight = self.begin(url, timeout);

        let (result, delay) = match self.scripts.get(url) {
            None => (Err(FetchError::http(404)), self.default_delay),
            Some(Script::Hang) => {
                std::future::pending::<()>().await;
                return Err(FetchError::Timeout(timeout));
            }
            Some(Script::Page { text, delay }) => (Ok(text.clone()), *delay),
            Some(Script::Fail { error, delay }) => (Err(error.clone()), *delay),
        };

        if delay > timeout {
            tokio::time::sleep(timeout).await;
            return Err(FetchError::Timeout(timeout));
        }
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        result
    }
}
