//! # Copyvio
//!
//! A copy-violation detection engine.
//!
//! Given a piece of text, copyvio searches for pages that may contain it,
//! fetches them concurrently under a hard time budget and scores how much of
//! the text each page reproduces. It provides:
//!
//! - **Domain-throttled scheduling**: at most one in-flight fetch per domain,
//!   with a fixed worker pool and a per-check deadline
//! - **Content fetching**: HTTP fetching with size and content-type limits and
//!   boilerplate-free text extraction
//! - **Segment comparison**: sentence segmentation and word-shingle overlap,
//!   robust to whitespace, case and punctuation differences
//! - **Deterministic reports**: ranked results, exclusion filtering and a
//!   truncation flag when the budget runs out
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use copyvio::prelude::*;
//! use std::time::Duration;
//!
//! let provider = StaticSearchProvider::new(["https://example.com/article"]);
//! let report = check_copyvio(
//!     "Text suspected of being copied.",
//!     &["wikipedia.org".to_string()],
//!     0.5,
//!     Duration::from_secs(30),
//!     8,
//!     &provider,
//! )
//! .await?;
//! println!("{}", report.summary());
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod aggregate;
pub mod cancellation;
pub mod check;
pub mod compare;
pub mod config;
pub mod core;
pub mod errors;
pub mod events;
pub mod fetch;
pub mod observability;
pub mod scheduler;
pub mod search;
pub mod testing;
pub mod text;
pub mod utils;

#[cfg(feature = "http")]
pub use check::check_copyvio;
pub use check::{CheckRequest, CopyvioChecker};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::aggregate::{filter_exclusions, ExclusionSet};
    pub use crate::cancellation::CancellationToken;
    #[cfg(feature = "http")]
    pub use crate::check::check_copyvio;
    pub use crate::check::{CheckRequest, CopyvioChecker};
    pub use crate::compare::{Comparator, Comparison};
    pub use crate::config::{CheckConfig, ComparatorConfig, FetchConfig, QueryConfig};
    pub use crate::core::{
        BestMatch, Candidate, CandidateOutcome, CandidateStatus, ComparisonResult, Report,
        ReportStatus,
    };
    pub use crate::errors::{CopyvioError, FetchError, RequestValidationError, SearchError};
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::fetch::Fetcher;
    #[cfg(feature = "http")]
    pub use crate::fetch::HttpFetcher;
    pub use crate::search::{SearchProvider, StaticSearchProvider};
    pub use crate::text::{segment, Segment, Span};
}
