//! Text segmentation and normalization.
//!
//! This module provides:
//! - Sentence segmentation with original span offsets
//! - Case folding and whitespace collapsing for matching
//! - Tokenization and stop-word detection used by the comparator

mod normalize;
mod segment;

pub use normalize::{is_stop_word, normalize, tokenize};
pub use segment::{segment, segment_bytes, Segment, Span};
