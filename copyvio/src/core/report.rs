//! Comparison results and the final check report.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use uuid::Uuid;

use super::candidate::Candidate;
use super::status::{CandidateStatus, ReportStatus};
use crate::text::Span;

/// A source segment and the candidate segment that best explains it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedPair {
    /// Index of the source segment.
    pub source_index: usize,
    /// Index of the best candidate segment.
    pub candidate_index: usize,
    /// Shingle overlap of the pair, in `[0, 1]`.
    pub similarity: f64,
    /// Where the source segment sits in the checked text.
    pub source_span: Span,
}

/// Score of one fetched candidate against the source text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    /// Discovery index of the candidate.
    pub candidate_index: usize,
    /// The candidate URL.
    pub url: String,
    /// The candidate's domain.
    pub domain: String,
    /// Similarity score in `[0, 1]`.
    pub score: f64,
    /// Matched segment pairs above the noise floor.
    pub matches: Vec<MatchedPair>,
}

impl ComparisonResult {
    /// Creates a result for `candidate`.
    #[must_use]
    pub fn new(candidate: &Candidate, score: f64, matches: Vec<MatchedPair>) -> Self {
        Self {
            candidate_index: candidate.index,
            url: candidate.url.clone(),
            domain: candidate.domain.clone(),
            score: score.clamp(0.0, 1.0),
            matches,
        }
    }
}

/// The highest-scoring candidate of a check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestMatch {
    /// The candidate URL.
    pub url: String,
    /// The candidate's domain.
    pub domain: String,
    /// Discovery index of the candidate.
    pub candidate_index: usize,
    /// Similarity score in `[0, 1]`.
    pub score: f64,
}

impl From<&ComparisonResult> for BestMatch {
    fn from(result: &ComparisonResult) -> Self {
        Self {
            url: result.url.clone(),
            domain: result.domain.clone(),
            candidate_index: result.candidate_index,
            score: result.score,
        }
    }
}

/// Final state of one candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateOutcome {
    /// Discovery index.
    pub index: usize,
    /// The candidate URL.
    pub url: String,
    /// The candidate's domain.
    pub domain: String,
    /// Terminal status.
    pub status: CandidateStatus,
    /// Why the candidate failed or was skipped.
    pub failure: Option<String>,
}

impl From<&Candidate> for CandidateOutcome {
    fn from(candidate: &Candidate) -> Self {
        Self {
            index: candidate.index,
            url: candidate.url.clone(),
            domain: candidate.domain.clone(),
            status: candidate.status,
            failure: candidate.failure.clone(),
        }
    }
}

/// Outcome of one copyvio check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Identifier of the check, for log correlation.
    pub check_id: Uuid,
    /// Terminal classification.
    pub status: ReportStatus,
    /// Highest-scoring candidate, if any was compared.
    pub best_match: Option<BestMatch>,
    /// Results sorted by descending score, ties in discovery order.
    pub results: Vec<ComparisonResult>,
    /// Every discovered candidate, in discovery order.
    pub candidates: Vec<CandidateOutcome>,
    /// Threshold the best score was tested against.
    pub confidence_threshold: f64,
    /// Whether the best score reached the threshold.
    pub violation: bool,
    /// Number of search queries sent.
    pub queries_sent: usize,
    /// Wall-clock duration of the check.
    pub elapsed_ms: u64,
    /// When the check started (RFC3339).
    pub started_at: String,
    /// Why the check ended in `Error`.
    pub error: Option<String>,
}

impl Report {
    /// Best score, or 0 when nothing was compared.
    #[must_use]
    pub fn best_score(&self) -> f64 {
        self.best_match.as_ref().map_or(0.0, |m| m.score)
    }

    /// Number of candidates that ended in `status`.
    #[must_use]
    pub fn count(&self, status: CandidateStatus) -> usize {
        self.candidates.iter().filter(|c| c.status == status).count()
    }

    /// Looks up a candidate outcome by URL.
    #[must_use]
    pub fn candidate(&self, url: &str) -> Option<&CandidateOutcome> {
        self.candidates.iter().find(|c| c.url == url)
    }

    /// One-line, human-readable verdict suitable for a chat reply.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut out = match (&self.status, &self.best_match) {
            (ReportStatus::NoCandidates, _) => "No candidate sources to check.".to_string(),
            (ReportStatus::Error, _) => format!(
                "Check failed: {}.",
                self.error.as_deref().unwrap_or("no candidate could be compared")
            ),
            (_, None) => "No candidate could be compared.".to_string(),
            (_, Some(best)) if self.violation => format!(
                "Violation suspected: {:.1}% confidence, best match {}",
                best.score * 100.0,
                best.url
            ),
            (_, Some(best)) => format!(
                "No violation suspected: {:.1}% confidence, best match {}",
                best.score * 100.0,
                best.url
            ),
        };

        if self.status == ReportStatus::CompletedTruncated {
            let skipped = self.count(CandidateStatus::SkippedTimeout);
            let _ = write!(out, " (time budget exhausted, {skipped} candidate(s) skipped)");
        }
        let _ = write!(
            out,
            " [{} of {} candidate(s) fetched in {:.2}s]",
            self.count(CandidateStatus::Fetched),
            self.candidates.len(),
            self.elapsed_ms as f64 / 1000.0
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(status: ReportStatus, best: Option<f64>) -> Report {
        let mut fetched = Candidate::new(0, "https://a.example/page").unwrap();
        fetched.mark_fetched(String::new());
        let mut skipped = Candidate::new(1, "https://b.example/page").unwrap();
        skipped.mark_timed_out("deadline");

        Report {
            check_id: Uuid::nil(),
            status,
            best_match: best.map(|score| BestMatch {
                url: fetched.url.clone(),
                domain: fetched.domain.clone(),
                candidate_index: 0,
                score,
            }),
            results: Vec::new(),
            candidates: vec![(&fetched).into(), (&skipped).into()],
            confidence_threshold: 0.5,
            violation: best.is_some_and(|s| s >= 0.5),
            queries_sent: 1,
            elapsed_ms: 1500,
            started_at: String::new(),
            error: None,
        }
    }

    #[test]
    fn test_summary_violation() {
        let summary = report(ReportStatus::Completed, Some(0.873)).summary();
        assert!(summary.starts_with("Violation suspected: 87.3% confidence"));
        assert!(summary.contains("https://a.example/page"));
        assert!(summary.contains("[1 of 2 candidate(s) fetched in 1.50s]"));
    }

    #[test]
    fn test_summary_truncated() {
        let summary = report(ReportStatus::CompletedTruncated, Some(0.1)).summary();
        assert!(summary.starts_with("No violation suspected: 10.0%"));
        assert!(summary.contains("1 candidate(s) skipped"));
    }

    #[test]
    fn test_summary_error_and_empty() {
        let mut failed = report(ReportStatus::Error, None);
        failed.error = Some("every search query failed".to_string());
        assert!(failed.summary().starts_with("Check failed: every search query failed."));

        let empty = report(ReportStatus::NoCandidates, None);
        assert!(empty.summary().starts_with("No candidate sources"));
    }

    #[test]
    fn test_counts_and_lookup() {
        let report = report(ReportStatus::Completed, Some(1.0));
        assert_eq!(report.count(CandidateStatus::Fetched), 1);
        assert_eq!(report.count(CandidateStatus::SkippedTimeout), 1);
        assert_eq!(
            report.candidate("https://b.example/page").map(|c| c.status),
            Some(CandidateStatus::SkippedTimeout)
        );
        assert!((report.best_score() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_report_serializes_snake_case_status() {
        let json = serde_json::to_value(report(ReportStatus::CompletedTruncated, None)).unwrap();
        assert_eq!(json["status"], "completed_truncated");
        assert_eq!(json["candidates"][1]["status"], "skipped_timeout");
    }
}
