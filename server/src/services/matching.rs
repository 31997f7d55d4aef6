//! Keyword overlap scoring used by equipment search and diagnosis.
//!
//! A text is reduced to a set of lower-case alphanumeric tokens of at least
//! three characters, minus common stop words. The score of a document
//! against a query is `|Q ∩ D| / |Q|`, so it answers "how much of what the
//! user said appears here" and is always in `0.0..=1.0`.

use std::collections::HashSet;

/// Minimum score for a stored problem or issue to count as a match.
pub const MATCH_THRESHOLD: f64 = 0.2;

const MIN_TOKEN_LEN: usize = 3;

const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "all", "any", "can", "had", "her", "was", "one", "our", "out",
    "has", "have", "with", "this", "that", "from", "they", "been", "were", "when", "what", "which", "there", "their",
    "will", "would", "could", "should", "into", "some", "than", "then", "them", "its", "also", "just", "very", "after",
    "before", "while", "about", "doesn", "don", "isn", "won", "keeps", "still", "getting", "seems",
];

/// Tokenise `text` into its distinct significant words.
#[must_use]
pub fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= MIN_TOKEN_LEN)
        .map(str::to_lowercase)
        .filter(|w| !STOP_WORDS.contains(&w.as_str()))
        .collect()
}

/// Fraction of `query` tokens present in `document`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn score_tokens(query: &HashSet<String>, document: &HashSet<String>) -> f64 {
    if query.is_empty() {
        return 0.0;
    }
    let hits = query.iter().filter(|t| document.contains(*t)).count();
    hits as f64 / query.len() as f64
}

/// Score free text against free text.
#[must_use]
pub fn score(query: &str, document: &str) -> f64 {
    score_tokens(&tokenize(query), &tokenize(document))
}

/// Score every candidate, keep those with `score >= threshold`, and return
/// them best first. Ties keep their input order.
pub fn rank<T>(
    query: &str,
    candidates: impl IntoIterator<Item = T>,
    text_of: impl Fn(&T) -> String,
    threshold: f64,
) -> Vec<(T, f64)> {
    let q = tokenize(query);
    let mut scored: Vec<(T, f64)> = candidates
        .into_iter()
        .map(|c| {
            let s = score_tokens(&q, &tokenize(&text_of(&c)));
            (c, s)
        })
        .filter(|(_, s)| *s >= threshold && *s > 0.0)
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored
}

#[cfg(test)]
#[path = "matching_test.rs"]
mod tests;
