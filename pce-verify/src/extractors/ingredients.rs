//! Ingredient and dosage-form inference from drug names
//!
//! Table-driven substring matching. Add rows to the tables to extend
//! coverage; the functions themselves carry no drug knowledge.

use serde::{Deserialize, Serialize};

/// Coarse dosage form presented to the arbiter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DosageForm {
    Tablet,
    Liquid,
    Unknown,
}

impl DosageForm {
    pub fn as_str(&self) -> &'static str {
        match self {
            DosageForm::Tablet => "tablet",
            DosageForm::Liquid => "liquid",
            DosageForm::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for DosageForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// (substring, form); first match wins
const FORM_TABLE: &[(&str, DosageForm)] = &[
    ("tablet", DosageForm::Tablet),
    ("suspension", DosageForm::Liquid),
    ("solution", DosageForm::Liquid),
];

/// (substring, canonical ingredient)
const INGREDIENT_TABLE: &[(&str, &str)] = &[
    ("hydrocodone", "hydrocodone"),
    ("acetaminophen", "acetaminophen"),
    ("apap", "acetaminophen"),
    ("paracetamol", "paracetamol"),
    ("pseudoephedrine", "pseudoephedrine"),
    ("chlorpheniramine", "chlorpheniramine"),
    ("ibuprofen", "ibuprofen"),
    ("amoxicillin", "amoxicillin"),
    ("clavulanate", "clavulanate"),
    ("metformin", "metformin"),
];

/// Ingredients evidenced by a candidate name, in table order
pub fn infer_ingredients(name: &str) -> Vec<String> {
    let lower = name.to_lowercase();
    let mut found: Vec<String> = Vec::new();
    for (needle, ingredient) in INGREDIENT_TABLE {
        if lower.contains(needle) && !found.iter().any(|f| f == ingredient) {
            found.push((*ingredient).to_string());
        }
    }
    found
}

/// Dosage form implied by a candidate name
pub fn infer_form(name: &str) -> DosageForm {
    let lower = name.to_lowercase();
    FORM_TABLE
        .iter()
        .find(|(needle, _)| lower.contains(needle))
        .map(|(_, form)| *form)
        .unwrap_or(DosageForm::Unknown)
}

/// Active ingredients of a verified drug name
///
/// Uses the ingredient table first. Names with no known ingredient are split
/// on `/`, `,` and `+`, keeping trimmed parts longer than four characters.
pub fn extract_ingredients_from_name(name: &str) -> Vec<String> {
    let known = infer_ingredients(name);
    if !known.is_empty() {
        return known;
    }

    let lower = name.to_lowercase();
    let mut parts: Vec<String> = Vec::new();
    for part in lower.split(['/', ',', '+']).map(str::trim) {
        if part.chars().count() > 4 && !parts.iter().any(|p| p == part) {
            parts.push(part.to_string());
        }
    }
    parts
}
