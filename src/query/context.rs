// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sentence-aware snippets around a match.
//!
//! Offsets going in are byte offsets into the document text. Offsets coming
//! out count chars, relative to the returned snippet.

use once_cell::sync::Lazy;
use regex::Regex;

static SENTENCE_END: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?]+\s+").expect("sentence regex is valid"));

/// Texts longer than this (in chars) skip sentence scanning entirely
pub const LARGE_TEXT_CHARS: usize = 50_000;
/// Radius of the character window used for large texts
pub const LARGE_TEXT_RADIUS: usize = 300;
/// Radius of the character window used when the span is unusable
pub const FALLBACK_RADIUS: usize = 200;
/// Sentence boundaries considered per document
pub const MAX_SENTENCE_BOUNDARIES: usize = 500;
/// Longest snippet returned, in chars
pub const MAX_SNIPPET_CHARS: usize = 2000;

/// Snippet plus the match position inside it, in chars
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snippet {
    pub text: String,
    pub match_start: usize,
    pub match_end: usize,
}

/// Builds snippets for many matches in one document.
///
/// Sentence boundaries are scanned once per document instead of once per match.
pub struct ContextBuilder<'t> {
    text: &'t str,
    sentences_before: usize,
    sentences_after: usize,
    /// `None` when the text is too large for sentence scanning
    boundaries: Option<Vec<(usize, usize)>>,
}

impl<'t> ContextBuilder<'t> {
    pub fn new(text: &'t str, sentences_before: usize, sentences_after: usize) -> Self {
        let is_large = text.len() > LARGE_TEXT_CHARS && text.chars().count() > LARGE_TEXT_CHARS;
        let boundaries = if is_large {
            None
        } else {
            Some(
                SENTENCE_END
                    .find_iter(text)
                    .take(MAX_SENTENCE_BOUNDARIES)
                    .map(|m| (m.start(), m.end()))
                    .collect(),
            )
        };
        Self {
            text,
            sentences_before,
            sentences_after,
            boundaries,
        }
    }

    /// Snippet for the match at byte span `start..end`
    pub fn snippet(&self, start: usize, end: usize) -> Snippet {
        let text = self.text;
        if start > end
            || end > text.len()
            || !text.is_char_boundary(start)
            || !text.is_char_boundary(end)
        {
            tracing::debug!(
                start,
                end,
                len = text.len(),
                "match span unusable, using fallback window"
            );
            let start = floor_char_boundary(text, start.min(text.len()));
            let end = floor_char_boundary(text, end.min(text.len())).max(start);
            return self.char_window(start, end, FALLBACK_RADIUS);
        }

        match &self.boundaries {
            None => self.char_window(start, end, LARGE_TEXT_RADIUS),
            Some(boundaries) => self.sentence_window(boundaries, start, end),
        }
    }

    fn sentence_window(&self, boundaries: &[(usize, usize)], start: usize, end: usize) -> Snippet {
        let text = self.text;
        let count = boundaries.len();

        let current = boundaries
            .iter()
            .position(|(b_start, _)| *b_start > start)
            .unwrap_or(count);
        // Sentence `i` ends at boundary `i`; the match sits in sentence `current`.
        // Text after the last boundary is one more sentence ending at the end
        // of the text, counted like any other.
        let first = current.saturating_sub(self.sentences_before);
        let last = current + self.sentences_after;

        let mut from = if first == 0 { 0 } else { boundaries[first - 1].1 };
        let mut to = if last < count {
            boundaries[last].1
        } else {
            text.len()
        };
        from = from.min(start);
        to = to.max(end);

        let slice = &text[from..to];
        let lead = slice.len() - slice.trim_start().len();
        let trail = slice.len() - slice.trim_end().len();
        from = (from + lead).min(start);
        to = to.saturating_sub(trail).max(end);

        if text[from..to].chars().count() > MAX_SNIPPET_CHARS {
            let half = MAX_SNIPPET_CHARS / 2;
            let mid = floor_char_boundary(text, start + (end - start) / 2);
            from = back_chars(text, mid, half).max(from).min(start);
            to = forward_chars(text, mid, half).min(to).max(end);
        }

        make_snippet(text, from, to, start, end)
    }

    fn char_window(&self, start: usize, end: usize, radius: usize) -> Snippet {
        let text = self.text;
        let from = back_chars(text, start, radius);
        let to = forward_chars(text, end, radius);
        make_snippet(text, from, to, start, end)
    }
}

/// One-shot helper for a single match
pub fn sentence_context(
    text: &str,
    start: usize,
    end: usize,
    sentences_before: usize,
    sentences_after: usize,
) -> Snippet {
    ContextBuilder::new(text, sentences_before, sentences_after).snippet(start, end)
}

/// Slice `text` by char offsets, as produced in [`Snippet`] and merged matches
pub fn char_slice(text: &str, start: usize, end: usize) -> &str {
    let from = char_to_byte(text, start);
    let to = char_to_byte(text, end.max(start));
    &text[from..to]
}

fn make_snippet(text: &str, from: usize, to: usize, start: usize, end: usize) -> Snippet {
    let snippet = &text[from..to];
    let length = snippet.chars().count();
    let start = start.clamp(from, to);
    let end = end.clamp(start, to);
    let match_start = text[from..start].chars().count();
    let match_end = (match_start + text[start..end].chars().count()).min(length);
    Snippet {
        text: snippet.to_string(),
        match_start,
        match_end,
    }
}

fn char_to_byte(text: &str, chars: usize) -> usize {
    text.char_indices()
        .nth(chars)
        .map(|(idx, _)| idx)
        .unwrap_or(text.len())
}

fn floor_char_boundary(text: &str, mut idx: usize) -> usize {
    idx = idx.min(text.len());
    while !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

/// Byte offset `n` chars before `idx` (clamped at 0)
fn back_chars(text: &str, idx: usize, n: usize) -> usize {
    if n == 0 {
        return idx;
    }
    text[..idx]
        .char_indices()
        .rev()
        .nth(n - 1)
        .map(|(pos, _)| pos)
        .unwrap_or(0)
}

/// Byte offset `n` chars after `idx` (clamped at the end)
fn forward_chars(text: &str, idx: usize, n: usize) -> usize {
    text[idx..]
        .char_indices()
        .nth(n)
        .map(|(pos, _)| idx + pos)
        .unwrap_or(text.len())
}

/// Converts ascending byte offsets to char offsets in one pass
pub(crate) struct CharCursor<'t> {
    text: &'t str,
    byte: usize,
    chars: usize,
}

impl<'t> CharCursor<'t> {
    pub(crate) fn new(text: &'t str) -> Self {
        Self {
            text,
            byte: 0,
            chars: 0,
        }
    }

    /// Char offset of `byte`. Calls must use non-decreasing offsets.
    pub(crate) fn advance_to(&mut self, byte: usize) -> usize {
        if byte > self.byte {
            self.chars += self.text[self.byte..byte].chars().count();
            self.byte = byte;
        }
        self.chars
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span_of(text: &str, needle: &str) -> (usize, usize) {
        let start = text.find(needle).expect("needle present");
        (start, start + needle.len())
    }

    fn highlighted(snippet: &Snippet) -> &str {
        char_slice(&snippet.text, snippet.match_start, snippet.match_end)
    }

    #[test]
    fn keeps_two_sentences_each_side() {
        let text = "One. Two. Three. Four has the needle. Five. Six. Seven.";
        let (start, end) = span_of(text, "needle");
        let snippet = sentence_context(text, start, end, 2, 2);
        assert_eq!(snippet.text, "Two. Three. Four has the needle. Five. Six.");
        assert_eq!(highlighted(&snippet), "needle");
    }

    #[test]
    fn unterminated_tail_counts_as_a_sentence() {
        let text = "One. Two. Three. Four. Five has the needle. Six. Seven";
        let (start, end) = span_of(text, "needle");
        let reaching = sentence_context(text, start, end, 0, 2);
        assert_eq!(reaching.text, "Five has the needle. Six. Seven");

        let short = sentence_context(text, start, end, 0, 1);
        assert_eq!(short.text, "Five has the needle. Six.");
    }

    #[test]
    fn zero_sentences_gives_containing_sentence() {
        let text = "Alpha beta. The needle sits here. Gamma delta.";
        let (start, end) = span_of(text, "needle");
        let snippet = sentence_context(text, start, end, 0, 0);
        assert_eq!(snippet.text, "The needle sits here.");
        assert_eq!(highlighted(&snippet), "needle");
    }

    #[test]
    fn match_in_first_and_last_sentence() {
        let text = "needle first. middle. last needle";
        let first = sentence_context(text, 0, 6, 2, 2);
        assert_eq!(highlighted(&first), "needle");
        assert_eq!(first.match_start, 0);

        let start = text.rfind("needle").expect("needle");
        let last = sentence_context(text, start, start + 6, 1, 1);
        assert_eq!(last.text, "middle. last needle");
        assert_eq!(highlighted(&last), "needle");
    }

    #[test]
    fn leading_whitespace_does_not_shift_offsets() {
        let text = "   \n  Indented needle here.";
        let (start, end) = span_of(text, "needle");
        let snippet = sentence_context(text, start, end, 2, 2);
        assert_eq!(snippet.text, "Indented needle here.");
        assert_eq!(highlighted(&snippet), "needle");
    }

    #[test]
    fn offsets_count_chars_not_bytes() {
        let text = "Größe und Maße. Das Ünïcödé needle steht hier. Ende.";
        let (start, end) = span_of(text, "needle");
        let snippet = sentence_context(text, start, end, 0, 0);
        assert_eq!(highlighted(&snippet), "needle");
        assert_eq!(snippet.match_start, "Das Ünïcödé ".chars().count());
    }

    #[test]
    fn large_text_uses_fixed_radius() {
        let filler = "x".repeat(LARGE_TEXT_CHARS);
        let text = format!("{filler} the needle {filler}");
        let (start, end) = span_of(&text, "needle");
        let snippet = sentence_context(&text, start, end, 2, 2);
        assert_eq!(snippet.text.chars().count(), 6 + 2 * LARGE_TEXT_RADIUS);
        assert_eq!(snippet.match_start, LARGE_TEXT_RADIUS);
        assert_eq!(highlighted(&snippet), "needle");
    }

    #[test]
    fn long_sentences_are_recentered_and_capped() {
        let words = "word ".repeat(1500);
        let text = format!("{words}needle {words}");
        let (start, end) = span_of(&text, "needle");
        let snippet = sentence_context(&text, start, end, 2, 2);
        assert!(snippet.text.chars().count() <= MAX_SNIPPET_CHARS + 6);
        assert_eq!(highlighted(&snippet), "needle");
        let before = snippet.match_start;
        let after = snippet.text.chars().count() - snippet.match_end;
        assert!(before.abs_diff(after) <= 10);
    }

    #[test]
    fn unusable_span_falls_back_without_panicking() {
        let text = "short text";
        let snippet = sentence_context(text, 8, 400, 2, 2);
        assert!(snippet.match_start <= snippet.match_end);
        assert!(snippet.match_end <= snippet.text.chars().count());

        let snippet = sentence_context(text, 6, 2, 2, 2);
        assert!(snippet.match_end <= snippet.text.chars().count());
    }

    #[test]
    fn every_match_round_trips_through_its_snippet() {
        let text = "The low-resource setting matters! Many LOW RESOURCES exist. \
                    Is low resource hard? Yes.\n\nNew paragraph on lowresources.";
        let pattern = crate::query::pattern::FuzzyPattern::build(
            "low resource",
            crate::query::pattern::PatternOptions::default(),
        );
        let builder = ContextBuilder::new(text, 1, 1);
        let mut count = 0;
        for (start, end) in pattern.find_spans(text) {
            let snippet = builder.snippet(start, end);
            assert_eq!(highlighted(&snippet), &text[start..end]);
            count += 1;
        }
        assert_eq!(count, 4);
    }

    #[test]
    fn char_cursor_tracks_multibyte_text() {
        let text = "äb€d";
        let mut cursor = CharCursor::new(text);
        assert_eq!(cursor.advance_to(0), 0);
        assert_eq!(cursor.advance_to(2), 1);
        assert_eq!(cursor.advance_to(3), 2);
        assert_eq!(cursor.advance_to(text.len()), 4);
    }
}
