//! Formulation compatibility filter
//!
//! A terminology name that implies a dosage form or release profile the
//! package text never mentions is a wrong match, however well it scores.

/// Keywords implying a specific formulation
pub const FORMULATION_KEYWORDS: &[&str] = &[
    "suspension",
    "solution",
    "polistirex",
    "extended release",
    "12 hr",
    "er",
    "mg/ml",
];

/// Lower-case and turn `-`/`_` into spaces so "Extended-Release" matches
fn normalize(s: &str) -> String {
    s.to_lowercase()
        .chars()
        .map(|c| if c == '-' || c == '_' { ' ' } else { c })
        .collect()
}

/// Whether `keyword` occurs in `haystack` bounded by non-letters on both sides
///
/// Both arguments must already be normalized. Boundaries keep `er` from
/// matching inside `powder` or `tablet`.
pub fn contains_term(haystack: &str, keyword: &str) -> bool {
    let bytes = haystack.as_bytes();
    haystack.match_indices(keyword).any(|(start, _)| {
        let end = start + keyword.len();
        let before_ok = start == 0 || !bytes[start - 1].is_ascii_alphabetic();
        let after_ok = end == bytes.len() || !bytes[end].is_ascii_alphabetic();
        before_ok && after_ok
    })
}

/// First formulation keyword present in `name` but absent from `text`
pub fn formulation_mismatch(name: &str, text: &str) -> Option<&'static str> {
    let name = normalize(name);
    let text = normalize(text);
    FORMULATION_KEYWORDS
        .iter()
        .copied()
        .find(|kw| contains_term(&name, kw) && !contains_term(&text, kw))
}
