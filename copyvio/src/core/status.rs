//! Candidate and report status enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a single candidate within one check.
///
/// `Pending → Fetching → Fetched | Failed | SkippedTimeout`, or
/// `Pending → SkippedExcluded | SkippedTimeout` without ever being fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateStatus {
    /// Waiting in the work queue.
    #[default]
    Pending,
    /// A worker holds the candidate's domain slot and is fetching it.
    Fetching,
    /// Fetched and compared.
    Fetched,
    /// Fetch or comparison failed.
    Failed,
    /// Removed by an exclusion pattern before any fetch.
    SkippedExcluded,
    /// Not processed before the deadline, or abandoned after the grace period.
    SkippedTimeout,
}

impl fmt::Display for CandidateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Fetching => write!(f, "fetching"),
            Self::Fetched => write!(f, "fetched"),
            Self::Failed => write!(f, "failed"),
            Self::SkippedExcluded => write!(f, "skipped_excluded"),
            Self::SkippedTimeout => write!(f, "skipped_timeout"),
        }
    }
}

impl CandidateStatus {
    /// Returns true if the status represents a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending | Self::Fetching)
    }

    /// Returns true if the candidate was never fetched to completion.
    #[must_use]
    pub const fn is_skipped(&self) -> bool {
        matches!(self, Self::SkippedExcluded | Self::SkippedTimeout)
    }
}

/// Terminal classification of a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    /// Every candidate was processed.
    Completed,
    /// The deadline (or a caller cancellation) cut the check short.
    CompletedTruncated,
    /// No candidate was left to check after exclusion filtering.
    NoCandidates,
    /// The check produced no usable comparison (all searches or all fetches failed).
    Error,
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::CompletedTruncated => write!(f, "completed_truncated"),
            Self::NoCandidates => write!(f, "no_candidates"),
            Self::Error => write!(f, "error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_status_display() {
        assert_eq!(CandidateStatus::Pending.to_string(), "pending");
        assert_eq!(CandidateStatus::SkippedTimeout.to_string(), "skipped_timeout");
        assert_eq!(CandidateStatus::SkippedExcluded.to_string(), "skipped_excluded");
    }

    #[test]
    fn test_candidate_status_is_terminal() {
        assert!(!CandidateStatus::Pending.is_terminal());
        assert!(!CandidateStatus::Fetching.is_terminal());
        assert!(CandidateStatus::Fetched.is_terminal());
        assert!(CandidateStatus::Failed.is_terminal());
        assert!(CandidateStatus::SkippedTimeout.is_terminal());
        assert!(CandidateStatus::SkippedExcluded.is_skipped());
        assert!(!CandidateStatus::Failed.is_skipped());
    }

    #[test]
    fn test_candidate_status_serialize() {
        let json = serde_json::to_string(&CandidateStatus::SkippedExcluded).unwrap();
        assert_eq!(json, r#""skipped_excluded""#);

        let deserialized: CandidateStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, CandidateStatus::SkippedExcluded);
    }

    #[test]
    fn test_report_status_serialize() {
        let json = serde_json::to_string(&ReportStatus::CompletedTruncated).unwrap();
        assert_eq!(json, r#""completed_truncated""#);
        assert_eq!(ReportStatus::NoCandidates.to_string(), "no_candidates");
    }
}
