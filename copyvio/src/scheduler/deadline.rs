//! Global check deadline.

use std::time::Duration;
use tokio::time::Instant;

/// Point in time after which no new work is dispatched.
///
/// Built on the tokio clock so tests can drive it with a paused runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    started: Instant,
    at: Instant,
}

impl Deadline {
    /// A deadline `budget` from now.
    #[must_use]
    pub fn after(budget: Duration) -> Self {
        let started = Instant::now();
        Self {
            started,
            at: started + budget,
        }
    }

    /// The instant the deadline expires.
    #[must_use]
    pub const fn at(&self) -> Instant {
        self.at
    }

    /// Time left before expiry, zero once expired.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    /// Whether the deadline has passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.at
    }

    /// Time since the deadline was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Bound for one fetch: `min(per_fetch, remaining)`.
    #[must_use]
    pub fn fetch_bound(&self, per_fetch: Duration) -> Duration {
        per_fetch.min(self.remaining())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_deadline_counts_down() {
        let deadline = Deadline::after(Duration::from_secs(2));
        assert!(!deadline.is_expired());
        assert_eq!(deadline.remaining(), Duration::from_secs(2));
        assert_eq!(deadline.fetch_bound(Duration::from_secs(10)), Duration::from_secs(2));
        assert_eq!(deadline.fetch_bound(Duration::from_millis(500)), Duration::from_millis(500));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(deadline.remaining(), Duration::from_millis(500));
        assert_eq!(deadline.elapsed(), Duration::from_millis(1500));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(deadline.is_expired());
        assert_eq!(deadline.remaining(), Duration::ZERO);
        assert_eq!(deadline.fetch_bound(Duration::from_secs(10)), Duration::ZERO);
    }
}
