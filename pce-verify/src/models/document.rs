//! Per-package verification record

use crate::extractors::entity_extractor::ExtractedEntities;
use crate::types::{Barcode, Outcome, Resolution, TerminologyCandidate, VerificationResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Everything known about one package after a verification run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PharmaDocument {
    /// Unique document identifier
    pub document_id: Uuid,

    /// Creation time
    pub timestamp_utc: DateTime<Utc>,

    /// Text recognized on the package (may be empty)
    pub recognized_text: String,

    pub barcode: Option<Barcode>,

    #[serde(default)]
    pub extracted_entities: ExtractedEntities,

    #[serde(default)]
    pub verification: VerificationResult,

    /// Terminal state of the resolution run; `None` until resolved
    #[serde(default)]
    pub outcome: Option<Outcome>,

    /// Ranked candidates considered on the text path
    #[serde(default)]
    pub candidates: Vec<TerminologyCandidate>,

    /// Active ingredients of the verified drug
    #[serde(default)]
    pub ingredients: Vec<String>,
}

impl PharmaDocument {
    /// Create an unresolved document for the given inputs
    pub fn new(recognized_text: impl Into<String>, barcode: Option<Barcode>) -> Self {
        Self {
            document_id: Uuid::new_v4(),
            timestamp_utc: Utc::now(),
            recognized_text: recognized_text.into(),
            barcode,
            extracted_entities: ExtractedEntities::default(),
            verification: VerificationResult::default(),
            outcome: None,
            candidates: Vec::new(),
            ingredients: Vec::new(),
        }
    }

    /// Record the outcome of a resolution run
    pub fn apply_resolution(&mut self, resolution: Resolution) {
        self.verification = resolution.result;
        self.outcome = Some(resolution.outcome);
        self.candidates = resolution.candidates;
    }

    pub fn is_verified(&self) -> bool {
        self.verification.is_resolved()
    }
}
