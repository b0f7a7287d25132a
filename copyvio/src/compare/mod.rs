//! Similarity comparator.
//!
//! Scores how much of a source text is explained by a candidate text. The
//! comparison is asymmetric: it asks "could the source have been copied from
//! this page", so only source coverage matters.
//!
//! # Formula
//!
//! For every source segment `s` with tokens `t(s)`:
//!
//! 1. `k = min(ngram_size, |t(s)|)` and `S` is the set of contiguous
//!    `k`-token shingles of `s`.
//! 2. For every candidate segment `c`, `C_k` is the set of its `k`-token
//!    shingles and `sim(s, c) = |S ∩ C_k| / |S|`.
//! 3. `best(s) = max_c sim(s, c)`, replaced by `0` when below `noise_floor`.
//! 4. `weight(s)` is the number of non-stop-word tokens of `s`. When every
//!    source segment has weight `0`, raw token counts are used instead.
//!
//! `score = Σ weight(s) * best(s) / Σ weight(s)` (or `0` if the denominator
//! is `0`). Comparing a text with itself yields exactly `1.0`, and a source
//! whose sentences of equal weight are half copied verbatim (with no
//! incidental overlap above the noise floor) yields exactly `0.5`.

use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};

use crate::config::ComparatorConfig;
use crate::core::MatchedPair;
use crate::text::{is_stop_word, segment, tokenize, Segment, Span};

/// Outcome of comparing a source text with one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    /// Weighted coverage of the source by the candidate, in `[0, 1]`.
    pub score: f64,
    /// Best-matching candidate segment for every source segment above the noise floor.
    pub matches: Vec<MatchedPair>,
}

impl Comparison {
    /// A comparison with no overlap.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            score: 0.0,
            matches: Vec::new(),
        }
    }
}

/// A source segment prepared for repeated comparisons.
#[derive(Debug, Clone)]
struct PreparedSegment {
    index: usize,
    span: Span,
    shingle_size: usize,
    shingles: HashSet<u64>,
    weight: usize,
}

/// Source text tokenized and shingled once, reused for every candidate.
#[derive(Debug, Clone)]
pub struct PreparedSource {
    segments: Vec<PreparedSegment>,
    total_weight: usize,
}

impl PreparedSource {
    /// Number of segments in the source.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Sum of segment weights.
    #[must_use]
    pub const fn total_weight(&self) -> usize {
        self.total_weight
    }

    /// Whether there is nothing to compare.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// Token-overlap comparator.
#[derive(Debug, Clone, Copy, Default)]
pub struct Comparator {
    config: ComparatorConfig,
}

impl Comparator {
    /// Creates a comparator with the given tunables.
    #[must_use]
    pub const fn new(config: ComparatorConfig) -> Self {
        Self { config }
    }

    /// Gets the configuration.
    #[must_use]
    pub const fn config(&self) -> &ComparatorConfig {
        &self.config
    }

    /// Compares two segmented texts.
    #[must_use]
    pub fn compare(&self, source: &[Segment], candidate: &[Segment]) -> Comparison {
        self.compare_prepared(&self.prepare(source), candidate)
    }

    /// Segments and compares two raw texts.
    #[must_use]
    pub fn compare_texts(&self, source: &str, candidate: &str) -> Comparison {
        self.compare(&segment(source), &segment(candidate))
    }

    /// Tokenizes and shingles the source once.
    #[must_use]
    pub fn prepare(&self, source: &[Segment]) -> PreparedSource {
        let n = self.config.ngram_size.max(1);
        let tokenized: Vec<(&Segment, Vec<&str>)> = source
            .iter()
            .map(|seg| (seg, tokenize(&seg.normalized)))
            .filter(|(_, tokens)| !tokens.is_empty())
            .collect();

        let content_weights: Vec<usize> = tokenized
            .iter()
            .map(|(_, tokens)| tokens.iter().filter(|t| !is_stop_word(t)).count())
            .collect();
        let use_raw_counts = content_weights.iter().all(|&w| w == 0);

        let segments: Vec<PreparedSegment> = tokenized
            .iter()
            .zip(content_weights)
            .map(|((seg, tokens), content_weight)| {
                let k = n.min(tokens.len());
                PreparedSegment {
                    index: seg.index,
                    span: seg.span,
                    shingle_size: k,
                    shingles: shingles(tokens, k).collect(),
                    weight: if use_raw_counts {
                        tokens.len()
                    } else {
                        content_weight
                    },
                }
            })
            .collect();

        let total_weight = segments.iter().map(|s| s.weight).sum();
        PreparedSource {
            segments,
            total_weight,
        }
    }

    /// Compares a prepared source with a segmented candidate.
    #[must_use]
    pub fn compare_prepared(&self, source: &PreparedSource, candidate: &[Segment]) -> Comparison {
        if source.is_empty() || source.total_weight == 0 || candidate.is_empty() {
            return Comparison::empty();
        }

        let candidate_tokens: Vec<(usize, Vec<&str>)> = candidate
            .iter()
            .map(|seg| (seg.index, tokenize(&seg.normalized)))
            .collect();
        let mut indexes: HashMap<usize, ShingleIndex> = HashMap::new();

        let mut weighted = 0.0;
        let mut matches = Vec::new();

        for seg in &source.segments {
            if seg.shingles.is_empty() {
                continue;
            }
            let index = indexes
                .entry(seg.shingle_size)
                .or_insert_with(|| ShingleIndex::build(&candidate_tokens, seg.shingle_size));

            let Some((candidate_index, shared)) = index.best_overlap(&seg.shingles) else {
                continue;
            };
            #[allow(clippy::cast_precision_loss)]
            let similarity = shared as f64 / seg.shingles.len() as f64;
            if similarity < self.config.noise_floor || similarity <= 0.0 {
                continue;
            }

            #[allow(clippy::cast_precision_loss)]
            {
                weighted += seg.weight as f64 * similarity;
            }
            matches.push(MatchedPair {
                source_index: seg.index,
                candidate_index,
                similarity,
                source_span: seg.span,
            });
        }

        #[allow(clippy::cast_precision_loss)]
        let score = (weighted / source.total_weight as f64).clamp(0.0, 1.0);
        Comparison { score, matches }
    }
}

/// Inverted index from shingle hash to the candidate segments containing it.
#[derive(Debug, Default)]
struct ShingleIndex {
    postings: HashMap<u64, Vec<usize>>,
}

impl ShingleIndex {
    fn build(candidate: &[(usize, Vec<&str>)], k: usize) -> Self {
        let mut postings: HashMap<u64, Vec<usize>> = HashMap::new();
        for (segment_index, tokens) in candidate {
            let unique: HashSet<u64> = shingles(tokens, k).collect();
            for hash in unique {
                postings.entry(hash).or_default().push(*segment_index);
            }
        }
        Self { postings }
    }

    /// Candidate segment sharing the most shingles with `source`, lowest index on ties.
    fn best_overlap(&self, source: &HashSet<u64>) -> Option<(usize, usize)> {
        let mut counts: HashMap<usize, usize> = HashMap::new();
        for hash in source {
            if let Some(segments) = self.postings.get(hash) {
                for &segment_index in segments {
                    *counts.entry(segment_index).or_default() += 1;
                }
            }
        }
        counts
            .into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
    }
}

/// Hashes of the contiguous `k`-token windows of `tokens`.
fn shingles<'a>(tokens: &'a [&'a str], k: usize) -> impl Iterator<Item = u64> + 'a {
    // A window wider than the slice yields nothing.
    let width = if k == 0 || tokens.len() < k {
        tokens.len() + 1
    } else {
        k
    };
    tokens.windows(width).map(|window| {
        let mut hasher = DefaultHasher::new();
        window.hash(&mut hasher);
        hasher.finish()
    })
}
