//! Keyword-substring categorization of free-text queries.
//!
//! Only used when no FAQ matched, to pick suggestions for the fallback reply.

use campus_core::config::CategoryRule;

use crate::language::clean_text;

const STOP_WORDS: &[&str] = &[
    "is", "are", "was", "were", "the", "a", "an", "and", "or", "but", "in", "on", "at", "to",
    "for", "of", "with", "by", "what", "when", "where", "how", "why", "who",
];

/// Tokens shorter than or equal to this are ignored.
const MIN_TOKEN_CHARS: usize = 2;
const MAX_KEYWORDS: usize = 10;

/// Lower-cased content tokens of `text`, in order, capped at ten.
pub fn extract_keywords(text: &str) -> Vec<String> {
    clean_text(&text.to_lowercase())
        .split_whitespace()
        .map(|token| token.trim_matches(|c: char| c.is_ascii_punctuation()))
        .filter(|token| token.chars().count() > MIN_TOKEN_CHARS)
        .filter(|token| !STOP_WORDS.contains(token))
        .take(MAX_KEYWORDS)
        .map(str::to_string)
        .collect()
}

/// Scores queries against an ordered list of category rules.
#[derive(Debug, Clone)]
pub struct QueryCategorizer {
    rules: Vec<CategoryRule>,
}

impl QueryCategorizer {
    pub fn new(rules: Vec<CategoryRule>) -> Self {
        let rules = rules
            .into_iter()
            .map(|rule| CategoryRule {
                keywords: rule.keywords.iter().map(|k| k.to_lowercase()).collect(),
                name: rule.name,
            })
            .collect();
        Self { rules }
    }

    /// The best-scoring category for `text`, or `None` when nothing scores.
    ///
    /// A category scores one point per token containing any of its keywords.
    /// Equal scores go to the category declared first.
    pub fn categorize(&self, text: &str) -> Option<&str> {
        let tokens = extract_keywords(text);
        let mut best: Option<(&str, usize)> = None;

        for rule in &self.rules {
            let score = tokens
                .iter()
                .filter(|token| rule.keywords.iter().any(|k| token.contains(k.as_str())))
                .count();
            if score > best.map(|(_, s)| s).unwrap_or(0) {
                best = Some((rule.name.as_str(), score));
            }
        }

        best.map(|(name, _)| name)
    }
}
