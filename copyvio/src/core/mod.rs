//! Core domain model types for copyvio checks.
//!
//! - Candidate and report status enums
//! - Candidates proposed by the search provider
//! - Comparison results and the final report

mod candidate;
mod report;
mod status;

pub use candidate::Candidate;
pub use report::{BestMatch, CandidateOutcome, ComparisonResult, MatchedPair, Report};
pub use status::{CandidateStatus, ReportStatus};
