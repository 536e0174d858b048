//! Evaluation
//!
//! Scores pipeline output against hand-labelled ground truth.
//!
//! # Metrics
//! - **CER:** `(S + D + I) / N` over the recognized text, where N is the
//!   ground-truth length in characters
//! - **Entity match rate:** share of labelled entities (`drug_name`,
//!   `manufacturer`, `dosage`, `composition`) the prediction got right, by exact
//!   or fuzzy (≥ 0.85) comparison; composition by set overlap
//! - **Verification accuracy:** fuzzy comparison of `verification.matched_term`
//!
//! Documents are compared as loose JSON so ground truth can be written by hand
//! and older prediction layouts (`raw_ocr.full_text`) still score.

use crate::error::VerifyResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{debug, warn};

/// Minimum similarity for a fuzzy match
pub const FUZZY_THRESHOLD: f64 = 0.85;

/// Entity fields scored by the match rate
pub const ENTITY_FIELDS: [&str; 4] = ["drug_name", "manufacturer", "dosage", "composition"];

/// Suffix of prediction files in batch mode
pub const PREDICTION_SUFFIX: &str = "_prediction.json";

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

// ============================================================================
// Character error rate
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CerReport {
    pub value: f64,
    pub substitutions: usize,
    pub deletions: usize,
    pub insertions: usize,
    /// Ground-truth length (N)
    pub reference_len: usize,
    pub predicted_len: usize,
}

/// Character error rate of `predicted` against `ground_truth`
///
/// Deletions are predicted characters absent from the ground truth;
/// insertions are ground-truth characters the prediction missed. An empty
/// ground truth scores 0.0 for an empty prediction and 1.0 otherwise.
pub fn character_error_rate(predicted: &str, ground_truth: &str) -> CerReport {
    let pred: Vec<char> = predicted.chars().collect();
    let truth: Vec<char> = ground_truth.chars().collect();

    if truth.is_empty() {
        return CerReport {
            value: if pred.is_empty() { 0.0 } else { 1.0 },
            substitutions: 0,
            deletions: 0,
            insertions: pred.len(),
            reference_len: 0,
            predicted_len: pred.len(),
        };
    }

    let (n, m) = (pred.len(), truth.len());
    let mut dist = vec![vec![0usize; m + 1]; n + 1];
    for (i, row) in dist.iter_mut().enumerate() {
        row[0] = i;
    }
    for j in 0..=m {
        dist[0][j] = j;
    }
    for i in 1..=n {
        for j in 1..=m {
            let cost = usize::from(pred[i - 1] != truth[j - 1]);
            dist[i][j] = (dist[i - 1][j - 1] + cost)
                .min(dist[i - 1][j] + 1)
                .min(dist[i][j - 1] + 1);
        }
    }

    let (mut substitutions, mut deletions, mut insertions) = (0, 0, 0);
    let (mut i, mut j) = (n, m);
    while i > 0 || j > 0 {
        if i > 0 && j > 0 {
            let cost = usize::from(pred[i - 1] != truth[j - 1]);
            if dist[i][j] == dist[i - 1][j - 1] + cost {
                substitutions += cost;
                i -= 1;
                j -= 1;
                continue;
            }
        }
        if i > 0 && dist[i][j] == dist[i - 1][j] + 1 {
            deletions += 1;
            i -= 1;
        } else {
            insertions += 1;
            j -= 1;
        }
    }

    CerReport {
        value: round4((substitutions + deletions + insertions) as f64 / m as f64),
        substitutions,
        deletions,
        insertions,
        reference_len: m,
        predicted_len: n,
    }
}

// ============================================================================
// Entity match rate
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStatus {
    ExactMatch,
    FuzzyMatch,
    /// List field whose overlap cleared the threshold
    Match,
    Mismatch,
    Missed,
}

impl MatchStatus {
    pub fn is_match(&self) -> bool {
        matches!(
            self,
            MatchStatus::ExactMatch | MatchStatus::FuzzyMatch | MatchStatus::Match
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMatch {
    pub status: MatchStatus,
    pub ground_truth: Value,
    pub predicted: Option<Value>,
    /// String similarity or list overlap, when computed
    pub similarity: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMatchReport {
    pub value: f64,
    pub details: BTreeMap<String, FieldMatch>,
}

/// Unwrap `{"value": ...}` entity objects to their value; null means absent
fn entity_value(entity: Option<&Value>) -> Option<Value> {
    match entity? {
        Value::Null => None,
        Value::Object(obj) => obj.get("value").filter(|v| !v.is_null()).cloned(),
        other => Some(other.clone()),
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_lowercase(),
        other => other.to_string().trim().to_lowercase(),
    }
}

fn value_set(value: &Value) -> BTreeSet<String> {
    match value {
        Value::Array(items) => items.iter().map(value_text).collect(),
        other => std::iter::once(value_text(other)).collect(),
    }
}

fn compare_field(predicted: Option<Value>, ground_truth: Value) -> FieldMatch {
    let Some(predicted) = predicted else {
        return FieldMatch {
            status: MatchStatus::Missed,
            ground_truth,
            predicted: None,
            similarity: None,
        };
    };

    if ground_truth.is_array() {
        let truth = value_set(&ground_truth);
        let pred = value_set(&predicted);
        let overlap = if truth.is_empty() {
            0.0
        } else {
            truth.intersection(&pred).count() as f64 / truth.len() as f64
        };
        let status = if overlap >= FUZZY_THRESHOLD {
            MatchStatus::Match
        } else {
            MatchStatus::Mismatch
        };
        return FieldMatch {
            status,
            ground_truth,
            predicted: Some(predicted),
            similarity: Some(round4(overlap)),
        };
    }

    let truth = value_text(&ground_truth);
    let pred = value_text(&predicted);
    if truth == pred {
        return FieldMatch {
            status: MatchStatus::ExactMatch,
            ground_truth,
            predicted: Some(predicted),
            similarity: None,
        };
    }

    let similarity = strsim::normalized_levenshtein(&pred, &truth);
    let status = if similarity >= FUZZY_THRESHOLD {
        MatchStatus::FuzzyMatch
    } else {
        MatchStatus::Mismatch
    };
    FieldMatch {
        status,
        ground_truth,
        predicted: Some(predicted),
        similarity: Some(round4(similarity)),
    }
}

/// Entity match rate of predicted entities against labelled ones
///
/// Both arguments are `extracted_entities` objects. Fields absent from the
/// ground truth are skipped; no labelled fields scores 0.0.
pub fn entity_match_rate(predicted: &Value, ground_truth: &Value) -> EntityMatchReport {
    let mut details = BTreeMap::new();
    let mut matched = 0usize;

    for field in ENTITY_FIELDS {
        let Some(truth) = entity_value(ground_truth.get(field)) else {
            continue;
        };
        let result = compare_field(entity_value(predicted.get(field)), truth);
        if result.status.is_match() {
            matched += 1;
        }
        details.insert(field.to_string(), result);
    }

    let value = if details.is_empty() {
        0.0
    } else {
        round4(matched as f64 / details.len() as f64)
    };

    EntityMatchReport { value, details }
}

// ============================================================================
// Verification accuracy
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationAccuracy {
    pub matched: bool,
    pub similarity: f64,
    pub predicted: Option<String>,
    pub ground_truth: String,
}

/// Compare matched terms; `None` when the ground truth has no label
pub fn verification_accuracy(predicted: &Value, ground_truth: &Value) -> Option<VerificationAccuracy> {
    let term = |doc: &Value| {
        doc.get("verification")
            .and_then(|v| v.get("matched_term"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .filter(|s| !s.trim().is_empty())
    };

    let truth = term(ground_truth)?;
    let pred = term(predicted);

    let similarity = pred
        .as_deref()
        .map(|p| strsim::normalized_levenshtein(&p.to_lowercase(), &truth.to_lowercase()))
        .unwrap_or(0.0);

    Some(VerificationAccuracy {
        matched: pred.is_some() && similarity >= FUZZY_THRESHOLD,
        similarity: round4(similarity),
        predicted: pred,
        ground_truth: truth,
    })
}

// ============================================================================
// Document and batch evaluation
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleEvaluation {
    pub cer: CerReport,
    pub entity_match_rate: EntityMatchReport,
    pub verification_accuracy: Option<VerificationAccuracy>,
}

/// Recognized text of a document in either layout
fn document_text(doc: &Value) -> &str {
    doc.get("recognized_text")
        .and_then(Value::as_str)
        .or_else(|| {
            doc.get("raw_ocr")
                .and_then(|o| o.get("full_text"))
                .and_then(Value::as_str)
        })
        .unwrap_or_default()
}

/// Evaluate one prediction document against its ground truth
pub fn evaluate_single(prediction: &Value, ground_truth: &Value) -> SingleEvaluation {
    let empty = Value::Object(Default::default());
    let entities = |doc: &Value| doc.get("extracted_entities").cloned().unwrap_or_else(|| empty.clone());

    SingleEvaluation {
        cer: character_error_rate(document_text(prediction), document_text(ground_truth)),
        entity_match_rate: entity_match_rate(&entities(prediction), &entities(ground_truth)),
        verification_accuracy: verification_accuracy(prediction, ground_truth),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchEvaluation {
    pub total_samples: usize,
    pub average_cer: f64,
    pub average_entity_match_rate: f64,
    /// Share of labelled samples whose matched term was correct
    pub verification_accuracy: Option<f64>,
    /// Ground-truth entries with no prediction file
    pub missing_predictions: Vec<String>,
    pub individual_results: BTreeMap<String, SingleEvaluation>,
}

/// Evaluate every ground-truth entry that has a prediction file
///
/// `ground_truth_file` is a JSON object keyed by image name. The prediction
/// for `label_01.jpeg` is `<predictions_dir>/label_01_prediction.json`.
///
/// # Errors
/// Returns an error if the ground truth or a prediction file cannot be read
/// or parsed.
pub fn evaluate_batch(predictions_dir: &Path, ground_truth_file: &Path) -> VerifyResult<BatchEvaluation> {
    let raw = std::fs::read_to_string(ground_truth_file)?;
    let ground_truths: BTreeMap<String, Value> = serde_json::from_str(&raw)?;

    let mut individual_results = BTreeMap::new();
    let mut missing_predictions = Vec::new();

    for (name, truth) in &ground_truths {
        let stem = Path::new(name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.clone());
        let prediction_path = predictions_dir.join(format!("{}{}", stem, PREDICTION_SUFFIX));

        if !prediction_path.exists() {
            warn!(sample = %name, path = %prediction_path.display(), "Prediction not found");
            missing_predictions.push(name.clone());
            continue;
        }

        let prediction: Value = serde_json::from_str(&std::fs::read_to_string(&prediction_path)?)?;
        let result = evaluate_single(&prediction, truth);
        debug!(
            sample = %name,
            cer = result.cer.value,
            entity_match_rate = result.entity_match_rate.value,
            "Sample evaluated"
        );
        individual_results.insert(name.clone(), result);
    }

    let count = individual_results.len();
    let average = |f: fn(&SingleEvaluation) -> f64| {
        if count == 0 {
            0.0
        } else {
            round4(individual_results.values().map(f).sum::<f64>() / count as f64)
        }
    };

    let labelled: Vec<bool> = individual_results
        .values()
        .filter_map(|r| r.verification_accuracy.as_ref().map(|v| v.matched))
        .collect();
    let verification_accuracy = (!labelled.is_empty())
        .then(|| round4(labelled.iter().filter(|m| **m).count() as f64 / labelled.len() as f64));

    Ok(BatchEvaluation {
        total_samples: count,
        average_cer: average(|r| r.cer.value),
        average_entity_match_rate: average(|r| r.entity_match_rate.value),
        verification_accuracy,
        missing_predictions,
        individual_results,
    })
}
