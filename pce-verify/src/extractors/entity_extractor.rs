//! Entity Extractor
//!
//! Heuristic extraction of structured entities from recognized package text.
//! Each entity carries a fixed confidence reflecting how reliable its
//! heuristic is:
//!
//! | Entity       | Heuristic                                  | Confidence  |
//! |--------------|--------------------------------------------|-------------|
//! | dosage       | first strength pattern (`500 mg`, `5ml`)   | 0.9         |
//! | composition  | known active ingredients present in text   | 0.85        |
//! | drug_name    | first capitalized non-company token        | 0.7 / 0.5   |
//! | manufacturer | token with a company keyword (+ predecessor)| 0.75 / 0.65 |

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Source label attached to every entity produced here
pub const ENTITY_SOURCE: &str = "ocr";

static DOSAGE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b\d+(\.\d+)?\s?(mg|ml|mcg|g|iu)\b").expect("dosage pattern is valid")
});

static COMPOSITION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?i)(acetaminophen|ibuprofen|aspirin|naproxen|lisinopril|metformin|omeprazole|",
        r"hydrocodone|oxycodone|amoxicillin|azithromycin|cephalexin|ciprofloxacin|",
        r"metronidazole|prednisone|gabapentin|tramadol|losartan|atorvastatin|simvastatin|",
        r"levothyroxine|amlodipine|hydrochlorothiazide|furosemide|pantoprazole|cetirizine|",
        r"diphenhydramine|loratadine|famotidine|ranitidine)"
    ))
    .expect("composition pattern is valid")
});

/// Substrings marking a token as part of a company name
pub const COMPANY_KEYWORDS: &[&str] = &[
    "pharma",
    "labs",
    "laboratories",
    "inc",
    "corp",
    "ltd",
    "healthcare",
    "generics",
    "biotech",
    "therapeutics",
];

/// Entity payload: a single string or a list (composition)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityValue {
    Text(String),
    List(Vec<String>),
}

impl EntityValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            EntityValue::Text(s) => Some(s),
            EntityValue::List(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedEntity {
    pub value: EntityValue,
    pub confidence: f64,
    pub source: String,
}

impl ExtractedEntity {
    fn text(value: impl Into<String>, confidence: f64) -> Self {
        Self {
            value: EntityValue::Text(value.into()),
            confidence,
            source: ENTITY_SOURCE.to_string(),
        }
    }

    fn list(values: Vec<String>, confidence: f64) -> Self {
        Self {
            value: EntityValue::List(values),
            confidence,
            source: ENTITY_SOURCE.to_string(),
        }
    }
}

/// Entities found on a package; absent entities are `None`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedEntities {
    pub drug_name: Option<ExtractedEntity>,
    pub manufacturer: Option<ExtractedEntity>,
    pub dosage: Option<ExtractedEntity>,
    pub composition: Option<ExtractedEntity>,
}

impl ExtractedEntities {
    pub fn is_empty(&self) -> bool {
        self.drug_name.is_none()
            && self.manufacturer.is_none()
            && self.dosage.is_none()
            && self.composition.is_none()
    }
}

fn is_company_token(token: &str) -> bool {
    let lower = token.to_lowercase();
    COMPANY_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

fn find_dosage(text: &str) -> Option<String> {
    DOSAGE_PATTERN.find(text).map(|m| m.as_str().to_string())
}

/// Known ingredients in first-occurrence order, lower-cased and deduplicated
fn find_composition(text: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for m in COMPOSITION_PATTERN.find_iter(text) {
        let ingredient = m.as_str().to_lowercase();
        if !found.contains(&ingredient) {
            found.push(ingredient);
        }
    }
    found
}

fn find_drug_name(tokens: &[&str]) -> Option<(String, f64)> {
    let capitalized = tokens.iter().find(|token| {
        token.chars().count() >= 4
            && !token.chars().all(|c| c.is_ascii_digit())
            && !is_company_token(token)
            && token.chars().next().is_some_and(char::is_uppercase)
    });
    if let Some(token) = capitalized {
        return Some((token.to_string(), 0.7));
    }

    tokens
        .first()
        .filter(|token| token.chars().count() >= 3)
        .map(|token| (token.to_string(), 0.5))
}

fn find_manufacturer(tokens: &[&str]) -> Option<(String, f64)> {
    let idx = tokens.iter().position(|token| is_company_token(token))?;
    if idx > 0 {
        Some((format!("{} {}", tokens[idx - 1], tokens[idx]), 0.75))
    } else {
        Some((tokens[idx].to_string(), 0.65))
    }
}

/// Extract entities from recognized text
///
/// Empty or whitespace-only text yields `ExtractedEntities::default()`.
pub fn extract_entities(text: &str) -> ExtractedEntities {
    if text.trim().is_empty() {
        return ExtractedEntities::default();
    }

    let tokens: Vec<&str> = text.split_whitespace().collect();
    let composition = find_composition(text);

    ExtractedEntities {
        drug_name: find_drug_name(&tokens).map(|(v, c)| ExtractedEntity::text(v, c)),
        manufacturer: find_manufacturer(&tokens).map(|(v, c)| ExtractedEntity::text(v, c)),
        dosage: find_dosage(text).map(|v| ExtractedEntity::text(v, 0.9)),
        composition: (!composition.is_empty()).then(|| ExtractedEntity::list(composition, 0.85)),
    }
}
