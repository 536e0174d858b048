//! Candidate Term Extractor
//!
//! Splits recognized text into normalized fragments worth sending to the
//! terminology service. Combination products written as `a/b` or `a+b` yield
//! one term per component.

use std::collections::HashSet;

/// Minimum length for a fragment to be looked up
pub const MIN_TERM_LENGTH: usize = 4;

/// Dosage and administration words that never name a drug
pub const STOPWORDS: &[&str] = &[
    "rx", "take", "tablet", "tablets", "capsule", "capsules", "pharmacy", "qty", "refills",
    "once", "daily", "hours", "day", "pain", "mouth", "by", "for",
];

/// Lower-case a token and drop everything outside `[a-z0-9/+]`
///
/// `+` survives normalization only so that it can act as a component
/// separator; it never appears in an emitted term.
pub fn normalize_token(token: &str) -> String {
    token
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '/' || *c == '+')
        .collect()
}

/// Extract candidate terms from recognized text
///
/// Output is deduplicated and keeps first-occurrence order. Empty or
/// whitespace-only text yields an empty list.
pub fn extract_candidate_terms(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut terms = Vec::new();

    for token in text.split_whitespace() {
        let normalized = normalize_token(token);
        for part in normalized.split(['/', '+']) {
            if part.len() >= MIN_TERM_LENGTH
                && !STOPWORDS.contains(&part)
                && seen.insert(part.to_string())
            {
                terms.push(part.to_string());
            }
        }
    }

    terms
}
