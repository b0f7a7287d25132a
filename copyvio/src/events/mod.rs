//! Check lifecycle events.
//!
//! The scheduler reports every candidate transition to an injected
//! [`EventSink`]. There is no process-wide sink; each check carries its own.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

use std::fmt;

/// Event types emitted during a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckEvent {
    /// A search query failed; the check continues with the other queries.
    SearchFailed,
    /// A worker claimed a candidate and started fetching it.
    FetchStarted,
    /// A candidate was fetched and compared.
    FetchCompleted,
    /// A candidate failed to fetch.
    FetchFailed,
    /// A candidate was skipped or abandoned because time ran out.
    FetchAbandoned,
    /// The report is final.
    CheckCompleted,
}

impl CheckEvent {
    /// Dotted event type name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SearchFailed => "search.failed",
            Self::FetchStarted => "fetch.started",
            Self::FetchCompleted => "fetch.completed",
            Self::FetchFailed => "fetch.failed",
            Self::FetchAbandoned => "fetch.abandoned",
            Self::CheckCompleted => "check.completed",
        }
    }
}

impl fmt::Display for CheckEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
