// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fuzzy keyword matcher.
//!
//! A keyword like `low-resource` becomes a case-insensitive regex that also
//! accepts `low resource`, `lowresource` and `Low Resources`: tokens may be
//! joined by any run of hyphens or whitespace, and the last token may carry a
//! trailing `s` or `es`.

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

static SEPARATORS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[-_/\s]+").expect("separator regex is valid"));

const TOKEN_JOINER: &str = r"[-\s]*";
const PLURAL_SUFFIX: &str = r"(?:e?s)?";

/// Matching flags. Case sensitivity is always off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatternOptions {
    pub whole_word: bool,
}

/// Compiled matcher for one keyword
#[derive(Debug, Clone)]
pub struct FuzzyPattern {
    regex: Option<Regex>,
    tokens: Vec<String>,
}

/// Split a keyword into word tokens, treating `-`, `_` and `/` as spaces
pub fn normalize_keyword(keyword: &str) -> Vec<String> {
    SEPARATORS
        .split(keyword.trim())
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

impl FuzzyPattern {
    pub fn build(keyword: &str, options: PatternOptions) -> Self {
        let tokens = normalize_keyword(keyword);
        if tokens.is_empty() {
            return Self {
                regex: None,
                tokens,
            };
        }

        let last = tokens.len() - 1;
        let parts: Vec<String> = tokens
            .iter()
            .enumerate()
            .map(|(idx, token)| {
                let escaped = regex::escape(token);
                if idx == last {
                    format!("{escaped}{PLURAL_SUFFIX}")
                } else {
                    escaped
                }
            })
            .collect();

        let mut pattern = parts.join(TOKEN_JOINER);
        if options.whole_word {
            pattern = format!(r"\b{pattern}\b");
        }

        // Escaped tokens and fixed connectors always compile; a failure here
        // can only come from the size limit on absurd keywords.
        let regex = match RegexBuilder::new(&pattern).case_insensitive(true).build() {
            Ok(regex) => Some(regex),
            Err(err) => {
                tracing::warn!("keyword pattern rejected, matching nothing: {err}");
                None
            }
        };

        Self { regex, tokens }
    }

    /// Byte spans of every non-overlapping match, left to right
    pub fn find_spans<'t>(&'t self, text: &'t str) -> impl Iterator<Item = (usize, usize)> + 't {
        self.regex
            .iter()
            .flat_map(move |regex| regex.find_iter(text).map(|m| (m.start(), m.end())))
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.as_ref().is_some_and(|regex| regex.is_match(text))
    }

    /// Normalized tokens, used to build index phrase queries
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn is_empty(&self) -> bool {
        self.regex.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(keyword: &str, whole_word: bool, text: &str) -> Vec<String> {
        let pattern = FuzzyPattern::build(keyword, PatternOptions { whole_word });
        pattern
            .find_spans(text)
            .map(|(start, end)| text[start..end].to_string())
            .collect()
    }

    #[test]
    fn matches_literal_keyword_case_insensitively() {
        assert_eq!(matches("Resource", false, "a RESOURCE here"), vec!["RESOURCE"]);
    }

    #[test]
    fn tolerates_hyphen_space_and_joined_variants() {
        let text = "low-resource, low resource, lowresource and low - resource";
        assert_eq!(
            matches("low-resource", false, text),
            vec!["low-resource", "low resource", "lowresource", "low - resource"]
        );
        assert_eq!(matches("low resource", false, text).len(), 4);
    }

    #[test]
    fn last_token_accepts_plural_suffixes() {
        let text = "Low Resources; one box, two boxes";
        assert_eq!(matches("low resource", false, text), vec!["Low Resources"]);
        assert_eq!(matches("box", true, text), vec!["box", "boxes"]);
    }

    #[test]
    fn whole_word_rejects_embedded_keyword() {
        assert!(matches("cat", true, "category concatenate").is_empty());
        assert_eq!(matches("cat", false, "category").len(), 1);
        assert_eq!(matches("cat", true, "a cat, two cats"), vec!["cat", "cats"]);
    }

    #[test]
    fn empty_keyword_never_matches() {
        for keyword in ["", "   ", "-_/"] {
            let pattern = FuzzyPattern::build(keyword, PatternOptions::default());
            assert!(pattern.is_empty());
            assert!(!pattern.is_match("anything at all"));
            assert_eq!(pattern.find_spans("anything").count(), 0);
        }
    }

    #[test]
    fn token_order_is_preserved() {
        assert!(matches("resource low", false, "low resource").is_empty());
    }

    #[test]
    fn regex_metacharacters_are_literal() {
        assert_eq!(matches("c++", false, "we use C++ daily"), vec!["C++"]);
        assert!(matches("a.b", false, "axb").is_empty());
    }

    #[test]
    fn normalizes_separators() {
        assert_eq!(
            normalize_keyword(" data_set/low-resource  model "),
            vec!["data", "set", "low", "resource", "model"]
        );
    }
}
