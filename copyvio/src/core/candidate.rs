//! Candidate sources proposed for a check.

use serde::{Deserialize, Serialize};

use super::status::CandidateStatus;
use crate::utils::urls::domain_of;

/// A URL proposed as a possible source of the checked text.
///
/// Owned by the scheduler for the lifetime of one check. The fetched text is
/// kept only until the candidate has been compared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// Discovery order, used to break score ties deterministically.
    pub index: usize,
    /// The candidate URL.
    pub url: String,
    /// Host the URL points at, lowercased and without a leading `www.`.
    pub domain: String,
    /// Current lifecycle status.
    pub status: CandidateStatus,
    /// Plain text of the page once fetched.
    #[serde(skip)]
    pub text: Option<String>,
    /// Why the candidate failed or was skipped.
    pub failure: Option<String>,
}

impl Candidate {
    /// Creates a pending candidate.
    ///
    /// Returns `None` if the URL cannot be parsed or has no host.
    #[must_use]
    pub fn new(index: usize, url: impl Into<String>) -> Option<Self> {
        let url = url.into();
        let domain = domain_of(&url)?;
        Some(Self {
            index,
            url,
            domain,
            status: CandidateStatus::Pending,
            text: None,
            failure: None,
        })
    }

    /// Builds candidates from URLs in discovery order, dropping unparsable ones.
    #[must_use]
    pub fn from_urls<I, S>(urls: I) -> Vec<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        urls.into_iter()
            .filter_map(|url| {
                let url = url.into();
                let candidate = Self::new(0, url.clone());
                if candidate.is_none() {
                    tracing::debug!(url = %url, "dropping candidate without a host");
                }
                candidate
            })
            .enumerate()
            .map(|(index, mut candidate)| {
                candidate.index = index;
                candidate
            })
            .collect()
    }

    /// Marks the candidate as being fetched.
    pub fn mark_fetching(&mut self) {
        self.status = CandidateStatus::Fetching;
    }

    /// Marks the candidate as fetched with its plain text.
    pub fn mark_fetched(&mut self, text: String) {
        self.status = CandidateStatus::Fetched;
        self.text = Some(text);
        self.failure = None;
    }

    /// Takes the fetched text out, leaving `None`.
    pub fn take_text(&mut self) -> Option<String> {
        self.text.take()
    }

    /// Marks the candidate as failed.
    pub fn mark_failed(&mut self, reason: impl Into<String>) {
        self.status = CandidateStatus::Failed;
        self.failure = Some(reason.into());
    }

    /// Marks the candidate as excluded before fetching.
    pub fn mark_excluded(&mut self, pattern: &str) {
        self.status = CandidateStatus::SkippedExcluded;
        self.failure = Some(format!("excluded by pattern '{pattern}'"));
    }

    /// Marks the candidate as skipped because time ran out.
    pub fn mark_timed_out(&mut self, reason: impl Into<String>) {
        self.status = CandidateStatus::SkippedTimeout;
        self.failure = Some(reason.into());
    }
}
