//! Sentence segmentation.
//!
//! Splits text at sentence-final punctuation and blank-line paragraph breaks.
//! A full stop is not treated as a boundary when it follows a known
//! abbreviation or a single capital letter (initials), when it is not
//! followed by whitespace (decimals, domain names), or when the next word
//! starts in lowercase (quoted questions, mid-sentence abbreviations).

use serde::{Deserialize, Serialize};

use super::normalize::normalize;

/// Lowercased abbreviations, without their final dot, that do not end a sentence.
///
/// Ordinary words that also abbreviate something ("no", "mar") are left out
/// so sentences ending in them still split.
const ABBREVIATIONS: &[&str] = &[
    "al", "approx", "apr", "aug", "ave", "b.a", "c", "ca", "capt", "cf", "co", "col", "corp",
    "dec", "dept", "dr", "e.g", "etc", "feb", "fig", "gov", "i.e", "inc", "jan", "jr", "jul",
    "jun", "lt", "ltd", "m.d", "mr", "mrs", "ms", "mt", "nov", "oct", "ph.d", "pp", "prof",
    "rev", "sen", "sept", "sgt", "sr", "st", "u.k", "u.s", "vol", "vs",
];

/// Abbreviations that only hold when a number follows, as in "No. 5".
const NUMBER_PREFIXES: &[&str] = &["no", "nos"];

/// Characters that close a quotation or parenthetical after terminal punctuation.
const CLOSERS: &[char] = &['"', '\'', '\u{201D}', '\u{2019}', ')', ']', '\u{00BB}'];

/// Byte offsets of a segment within the original text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    /// Inclusive start offset.
    pub start: usize,
    /// Exclusive end offset.
    pub end: usize,
}

impl Span {
    /// Length of the span in bytes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the span is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// A sentence-like unit of text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// Position in the segmented sequence.
    pub index: usize,
    /// The original text, trimmed.
    pub text: String,
    /// Case-folded, whitespace-collapsed form used for matching.
    pub normalized: String,
    /// Where `text` sits in the input.
    pub span: Span,
}

/// Splits `text` into ordered segments.
///
/// Whitespace-only input yields no segments. Input without any boundary
/// yields exactly one segment covering the trimmed text.
#[must_use]
pub fn segment(text: &str) -> Vec<Segment> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut segments = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < chars.len() {
        let (pos, ch) = chars[i];

        if ch == '\n' {
            let next = skip_whitespace(&chars, i + 1);
            let has_blank_line = chars[i + 1..next].iter().any(|&(_, c)| c == '\n');
            if has_blank_line {
                push_segment(&mut segments, text, start, pos);
                start = offset_at(&chars, next, text.len());
                i = next;
                continue;
            }
        }

        if is_terminal(ch) {
            let mut j = i;
            while j < chars.len() && is_terminal(chars[j].1) {
                j += 1;
            }
            let run_is_single_dot = j == i + 1 && ch == '.';
            while j < chars.len() && CLOSERS.contains(&chars[j].1) {
                j += 1;
            }
            let end = offset_at(&chars, j, text.len());

            if is_boundary(text, &chars, i, j, run_is_single_dot) {
                push_segment(&mut segments, text, start, end);
                let next = skip_whitespace(&chars, j);
                start = offset_at(&chars, next, text.len());
                i = next;
            } else {
                i = j;
            }
            continue;
        }

        i += 1;
    }

    push_segment(&mut segments, text, start, text.len());
    segments
}

/// Segments raw bytes, replacing invalid UTF-8 sequences.
///
/// Spans refer to the lossily decoded string, not to `bytes`.
#[must_use]
pub fn segment_bytes(bytes: &[u8]) -> Vec<Segment> {
    segment(&String::from_utf8_lossy(bytes))
}

fn is_terminal(ch: char) -> bool {
    matches!(ch, '.' | '!' | '?' | '\u{2026}' | '\u{3002}' | '\u{FF01}' | '\u{FF1F}')
}

fn is_fullwidth_terminal(ch: char) -> bool {
    matches!(ch, '\u{3002}' | '\u{FF01}' | '\u{FF1F}')
}

/// Decides whether the punctuation run `chars[punct..after]` ends a sentence.
fn is_boundary(
    text: &str,
    chars: &[(usize, char)],
    punct: usize,
    after: usize,
    single_dot: bool,
) -> bool {
    if after >= chars.len() {
        return true;
    }
    if !chars[after].1.is_whitespace() {
        return is_fullwidth_terminal(chars[punct].1);
    }

    let next = skip_whitespace(chars, after);
    if next >= chars.len() {
        return true;
    }
    if chars[next].1.is_lowercase() {
        return false;
    }

    if single_dot {
        let word = preceding_word(text, chars, punct);
        if is_initial(word) {
            return false;
        }
        let word = word.to_lowercase();
        if ABBREVIATIONS.binary_search(&word.as_str()).is_ok() {
            return false;
        }
        if chars[next].1.is_ascii_digit() && NUMBER_PREFIXES.contains(&word.as_str()) {
            return false;
        }
    }

    true
}

/// The word (letters, digits and inner dots) directly before `chars[punct]`.
fn preceding_word<'a>(text: &'a str, chars: &[(usize, char)], punct: usize) -> &'a str {
    let end = chars[punct].0;
    let mut k = punct;
    while k > 0 {
        let c = chars[k - 1].1;
        if c.is_alphanumeric() || c == '.' {
            k -= 1;
        } else {
            break;
        }
    }
    text[chars.get(k).map_or(end, |&(p, _)| p)..end].trim_start_matches('.')
}

fn is_initial(word: &str) -> bool {
    let mut chars = word.chars();
    matches!((chars.next(), chars.next()), (Some(c), None) if c.is_uppercase())
}

fn skip_whitespace(chars: &[(usize, char)], mut i: usize) -> usize {
    while i < chars.len() && chars[i].1.is_whitespace() {
        i += 1;
    }
    i
}

fn offset_at(chars: &[(usize, char)], i: usize, len: usize) -> usize {
    chars.get(i).map_or(len, |&(p, _)| p)
}

fn push_segment(segments: &mut Vec<Segment>, text: &str, start: usize, end: usize) {
    if start >= end {
        return;
    }
    let raw = &text[start..end];
    let trimmed_start = raw.trim_start();
    let lead = raw.len() - trimmed_start.len();
    let trimmed = trimmed_start.trim_end();
    if trimmed.is_empty() {
        return;
    }

    let span_start = start + lead;
    segments.push(Segment {
        index: segments.len(),
        text: trimmed.to_string(),
        normalized: normalize(trimmed),
        span: Span {
            start: span_start,
            end: span_start + trimmed.len(),
        },
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn texts(input: &str) -> Vec<String> {
        segment(input).into_iter().map(|s| s.text).collect()
    }

    #[test]
    fn test_splits_simple_sentences() {
        assert_eq!(
            texts("The cat sat. The dog ran! Did it rain?"),
            vec!["The cat sat.", "The dog ran!", "Did it rain?"]
        );
    }

    #[test]
    fn test_empty_and_whitespace_input() {
        assert!(segment("").is_empty());
        assert!(segment("   \n\t ").is_empty());
    }

    #[test]
    fn test_no_boundary_yields_single_segment() {
        let segments = segment("  just some words without punctuation  ");
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "just some words without punctuation");
        assert_eq!(segments[0].span, Span { start: 2, end: 37 });
    }

    #[test]
    fn test_single_word() {
        let segments = segment("Hello");
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].normalized, "hello");
    }

    #[test]
    fn test_abbreviations_do_not_split() {
        assert_eq!(
            texts("Mr. Smith met Dr. Jones in St. Louis. They talked."),
            vec!["Mr. Smith met Dr. Jones in St. Louis.", "They talked."]
        );
        assert_eq!(
            texts("Bring fruit, e.g. Apples and pears. Then leave."),
            vec!["Bring fruit, e.g. Apples and pears.", "Then leave."]
        );
    }

    #[test]
    fn test_sentence_final_common_words_split() {
        assert_eq!(
            texts("He said no. Then he left the building."),
            vec!["He said no.", "Then he left the building."]
        );
        assert_eq!(
            texts("The vote was in Mar. Nobody objected."),
            vec!["The vote was in Mar.", "Nobody objected."]
        );
    }

    #[test]
    fn test_number_prefix_before_digit() {
        assert_eq!(
            texts("She lived at No. 5 Baker Street. It was small."),
            vec!["She lived at No. 5 Baker Street.", "It was small."]
        );
    }

    #[test]
    fn test_decimals_do_not_split() {
        assert_eq!(
            texts("Pi is roughly 3.14159 in value. It is irrational."),
            vec!["Pi is roughly 3.14159 in value.", "It is irrational."]
        );
    }

    #[test]
    fn test_initials_do_not_split() {
        assert_eq!(
            texts("The book was written by J. R. R. Tolkien. It sold well."),
            vec!["The book was written by J. R. R. Tolkien.", "It sold well."]
        );
    }

    #[test]
    fn test_quoted_punctuation() {
        assert_eq!(
            texts("\"Is it raining?\" she asked. \"Yes!\" He nodded."),
            vec!["\"Is it raining?\" she asked.", "\"Yes!\"", "He nodded."]
        );
    }

    #[test]
    fn test_ellipsis_and_mixed_runs() {
        assert_eq!(
            texts("Wait... What?! Fine."),
            vec!["Wait...", "What?!", "Fine."]
        );
    }

    #[test]
    fn test_paragraph_breaks_split() {
        assert_eq!(
            texts("Section heading\n\nBody text follows here.\nSame paragraph."),
            vec!["Section heading", "Body text follows here.", "Same paragraph."]
        );
    }

    #[test]
    fn test_spans_point_into_original() {
        let input = "First one.   Second  ONE here.";
        for segment in segment(input) {
            assert_eq!(&input[segment.span.start..segment.span.end], segment.text);
        }
        let segments = segment(input);
        assert_eq!(segments[1].normalized, "second one here.");
        assert_eq!(segments[1].index, 1);
    }

    #[test]
    fn test_multibyte_text() {
        let input = "Ça va très bien. Ünïcödé wörks… Oui.";
        let segments = segment(input);
        assert_eq!(segments.len(), 3);
        for segment in &segments {
            assert_eq!(&input[segment.span.start..segment.span.end], segment.text);
        }
    }

    #[test]
    fn test_fullwidth_punctuation() {
        assert_eq!(texts("今日は晴れ。明日は雨。"), vec!["今日は晴れ。", "明日は雨。"]);
    }

    #[test]
    fn test_deterministic() {
        let input = "One. Two? Three! Four";
        assert_eq!(segment(input), segment(input));
    }

    #[test]
    fn test_segment_bytes_lossy() {
        let bytes = b"Valid start. Broken \xff\xfe bytes. End.";
        let segments = segment_bytes(bytes);
        assert_eq!(segments.len(), 3);
        assert!(segments[1].text.contains('\u{FFFD}'));
    }

    #[test]
    fn test_abbreviations_sorted_for_binary_search() {
        let mut sorted = ABBREVIATIONS.to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, ABBREVIATIONS);
    }
}
