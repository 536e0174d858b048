//! Token-set similarity
//!
//! Order-insensitive, subset-aware string similarity on a 0-100 scale. A term
//! whose tokens are a subset of a name's tokens scores 100, so `"hydrocodone"`
//! fully matches `"Hydrocodone/Acetaminophen Tablet"`.
//!
//! Strings are compared with the Indel ratio (insertions and deletions only):
//! `2 * LCS / (len_a + len_b)`. Unlike Levenshtein it does not punish a short
//! OCR term for being compared against a long terminology name.

use std::collections::BTreeSet;

/// Pluggable similarity function used by the candidate scorer
pub trait SimilarityScorer: Send + Sync {
    /// Similarity between a candidate term and a terminology name (0-100)
    fn score(&self, term: &str, name: &str) -> u8;
}

/// Default scorer backed by [`token_set_ratio`]
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenSetScorer;

impl SimilarityScorer for TokenSetScorer {
    fn score(&self, term: &str, name: &str) -> u8 {
        token_set_ratio(term, name)
    }
}

fn tokenize(s: &str) -> BTreeSet<String> {
    s.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Length of the longest common character subsequence
fn lcs_len(a: &[char], b: &[char]) -> usize {
    let mut row = vec![0usize; b.len() + 1];
    for &ca in a {
        let mut diagonal = 0;
        for (j, &cb) in b.iter().enumerate() {
            let above = row[j + 1];
            row[j + 1] = if ca == cb {
                diagonal + 1
            } else {
                above.max(row[j])
            };
            diagonal = above;
        }
    }
    row[b.len()]
}

/// Indel similarity on a 0-100 scale
fn ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 100.0;
    }
    (2 * lcs_len(&a, &b)) as f64 * 100.0 / total as f64
}

fn join(parts: &[&String]) -> String {
    parts.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(" ")
}

/// Token-set ratio between two strings
///
/// Both sides are tokenized into sorted sets. The shared tokens are compared
/// against each side's full token list and the best ratio wins. Either side
/// being empty scores 0. Fractions are truncated so `score >= threshold`
/// holds exactly when the unrounded ratio reaches the threshold.
pub fn token_set_ratio(a: &str, b: &str) -> u8 {
    let tokens_a = tokenize(a);
    let tokens_b = tokenize(b);
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0;
    }

    let shared: Vec<&String> = tokens_a.intersection(&tokens_b).collect();
    let only_a: Vec<&String> = tokens_a.difference(&tokens_b).collect();
    let only_b: Vec<&String> = tokens_b.difference(&tokens_a).collect();

    if !shared.is_empty() && (only_a.is_empty() || only_b.is_empty()) {
        return 100;
    }

    let sect = join(&shared);
    let combined_a = [sect.as_str(), join(&only_a).as_str()].join(" ").trim().to_string();
    let combined_b = [sect.as_str(), join(&only_b).as_str()].join(" ").trim().to_string();

    let mut best = ratio(&combined_a, &combined_b);
    if !sect.is_empty() {
        best = best
            .max(ratio(&sect, &combined_a))
            .max(ratio(&sect, &combined_b));
    }

    best.floor().clamp(0.0, 100.0) as u8
}
