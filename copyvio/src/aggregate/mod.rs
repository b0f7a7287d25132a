//! Result aggregation and exclusion filtering.
//!
//! The scheduler reports results in completion order. Aggregation sorts
//! them into a deterministic ranking, picks the best match and classifies
//! the check.

mod exclusion;

pub use exclusion::{filter_exclusions, ExclusionSet};

use std::cmp::Ordering;
use uuid::Uuid;

use crate::core::{
    BestMatch, Candidate, CandidateOutcome, CandidateStatus, ComparisonResult, Report,
    ReportStatus,
};

/// Check-level facts that are not derived from candidates.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportMeta {
    /// Identifier of the check.
    pub check_id: Uuid,
    /// Threshold the best score is tested against.
    pub confidence_threshold: f64,
    /// Number of search queries sent.
    pub queries_sent: usize,
    /// Whether queries were sent and every one failed.
    pub search_failed: bool,
    /// Wall-clock duration of the check.
    pub elapsed_ms: u64,
    /// When the check started.
    pub started_at: String,
}

/// Orders results by descending score, then by discovery index.
pub fn rank_results(results: &mut [ComparisonResult]) {
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then(a.candidate_index.cmp(&b.candidate_index))
    });
}

/// Builds the final report.
///
/// `candidates` holds every discovered candidate, excluded ones included,
/// each in a terminal status. `truncated` is set when time ran out before
/// every candidate was processed.
#[must_use]
pub fn aggregate(
    mut results: Vec<ComparisonResult>,
    mut candidates: Vec<Candidate>,
    truncated: bool,
    meta: ReportMeta,
) -> Report {
    rank_results(&mut results);
    candidates.sort_by_key(|c| c.index);

    let best_match = results.first().map(BestMatch::from);
    let violation = best_match
        .as_ref()
        .is_some_and(|best| best.score >= meta.confidence_threshold);

    let scheduled: Vec<&Candidate> = candidates
        .iter()
        .filter(|c| c.status != CandidateStatus::SkippedExcluded)
        .collect();
    let all_failed =
        !scheduled.is_empty() && scheduled.iter().all(|c| c.status == CandidateStatus::Failed);

    let (status, error) = if meta.search_failed {
        (
            ReportStatus::Error,
            Some(format!("all {} search queries failed", meta.queries_sent)),
        )
    } else if scheduled.is_empty() {
        (ReportStatus::NoCandidates, None)
    } else if all_failed && !truncated {
        (
            ReportStatus::Error,
            Some(format!("all {} candidate fetches failed", scheduled.len())),
        )
    } else if truncated {
        (ReportStatus::CompletedTruncated, None)
    } else {
        (ReportStatus::Completed, None)
    };

    Report {
        check_id: meta.check_id,
        status,
        best_match,
        results,
        candidates: candidates.iter().map(CandidateOutcome::from).collect(),
        confidence_threshold: meta.confidence_threshold,
        violation,
        queries_sent: meta.queries_sent,
        elapsed_ms: meta.elapsed_ms,
        started_at: meta.started_at,
        error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn meta() -> ReportMeta {
        ReportMeta {
            check_id: Uuid::nil(),
            confidence_threshold: 0.5,
            queries_sent: 3,
            search_failed: false,
            elapsed_ms: 10,
            started_at: String::new(),
        }
    }

    fn fetched(index: usize, url: &str) -> Candidate {
        let mut candidate = Candidate::new(index, url).unwrap();
        candidate.mark_fetched(String::new());
        candidate
    }

    fn failed(index: usize, url: &str) -> Candidate {
        let mut candidate = Candidate::new(index, url).unwrap();
        candidate.mark_failed("HTTP error: status 500");
        candidate
    }

    fn result(candidate: &Candidate, score: f64) -> ComparisonResult {
        ComparisonResult::new(candidate, score, Vec::new())
    }

    #[test]
    fn test_ranking_breaks_ties_by_discovery_order() {
        let a = fetched(0, "https://a.example/");
        let b = fetched(1, "https://b.example/");
        let c = fetched(2, "https://c.example/");
        let results = vec![result(&c, 0.4), result(&b, 0.9), result(&a, 0.4)];

        let report = aggregate(results, vec![c, a, b], false, meta());

        let order: Vec<usize> = report.results.iter().map(|r| r.candidate_index).collect();
        assert_eq!(order, vec![1, 0, 2]);
        assert_eq!(report.best_match.as_ref().map(|m| m.candidate_index), Some(1));
        assert!(report.violation);
        assert_eq!(report.status, ReportStatus::Completed);

        let indices: Vec<usize> = report.candidates.iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let a = fetched(0, "https://a.example/");
        let report = aggregate(vec![result(&a, 0.5)], vec![a.clone()], false, meta());
        assert!(report.violation);

        let report = aggregate(vec![result(&a, 0.49)], vec![a], false, meta());
        assert!(!report.violation);
    }

    #[test]
    fn test_no_candidates_after_exclusion() {
        let mut excluded = Candidate::new(0, "https://wikipedia.org/").unwrap();
        excluded.mark_excluded("wikipedia.org");

        let report = aggregate(Vec::new(), vec![excluded], false, meta());
        assert_eq!(report.status, ReportStatus::NoCandidates);
        assert_eq!(report.candidates.len(), 1);
        assert!(report.best_match.is_none());
        assert!(!report.violation);
    }

    #[test]
    fn test_all_fetches_failed_is_error() {
        let candidates = vec![failed(0, "https://a.example/"), failed(1, "https://b.example/")];
        let report = aggregate(Vec::new(), candidates, false, meta());
        assert_eq!(report.status, ReportStatus::Error);
        assert_eq!(report.error.as_deref(), Some("all 2 candidate fetches failed"));
    }

    #[test]
    fn test_search_failure_is_error() {
        let report = aggregate(
            Vec::new(),
            Vec::new(),
            false,
            ReportMeta {
                search_failed: true,
                ..meta()
            },
        );
        assert_eq!(report.status, ReportStatus::Error);
        assert_eq!(report.error.as_deref(), Some("all 3 search queries failed"));
    }

    #[test]
    fn test_truncated_wins_over_partial_failure() {
        let mut skipped = Candidate::new(1, "https://b.example/").unwrap();
        skipped.mark_timed_out("not fetched before the deadline");
        let candidates = vec![failed(0, "https://a.example/"), skipped];

        let report = aggregate(Vec::new(), candidates, true, meta());
        assert_eq!(report.status, ReportStatus::CompletedTruncated);
        assert!(report.error.is_none());
    }
}
