//! Core Types and Trait Definitions for pce-verify
//!
//! Defines the per-run data model and the capability traits for the three
//! external collaborators consumed by the resolution workflow:
//! - **TerminologyLookup:** candidate term → drug names, name → identifier
//! - **ProductCodeLookup:** product code → authoritative drug name
//! - **ArbiterDelegate:** ambiguous candidate set → one pick with a reason
//!
//! All values are created fresh per verification run; nothing here is shared
//! across runs.

use crate::error::{InvalidCodeError, LookupError};
use crate::extractors::ingredients::DosageForm;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// ============================================================================
// Inputs
// ============================================================================

/// Decoded barcode payload from the upstream detector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Barcode {
    /// Raw decoded value
    pub value: String,
    /// Symbology reported by the decoder (e.g. "EAN13", "CODE128")
    #[serde(default)]
    pub symbology: Option<String>,
}

impl Barcode {
    pub fn new(value: impl Into<String>, symbology: Option<String>) -> Self {
        Self {
            value: value.into(),
            symbology,
        }
    }
}

/// Digit-only national drug product code (10 or 11 digits)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProductCode(String);

impl ProductCode {
    /// Normalize a barcode value to digits and validate the length
    ///
    /// Anything other than 10 or 11 digits is almost certainly a
    /// non-pharmaceutical barcode and is rejected.
    pub fn parse(value: &str) -> Result<Self, InvalidCodeError> {
        let digits: String = value.chars().filter(|c| c.is_ascii_digit()).collect();
        match digits.len() {
            10 | 11 => Ok(Self(digits)),
            digit_count => Err(InvalidCodeError {
                value: value.to_string(),
                digit_count,
            }),
        }
    }

    pub fn digits(&self) -> &str {
        &self.0
    }

    /// Hyphenated package code spellings this code may correspond to
    ///
    /// A 10-digit code is one of the 4-4-2, 5-3-2 or 5-4-1 layouts. An 11-digit
    /// code is the zero-padded 5-4-2 layout; the padding zero tells which
    /// 10-digit layout it came from.
    pub fn package_variants(&self) -> Vec<String> {
        let d = self.0.as_str();
        let mut variants = Vec::new();
        if d.len() == 10 {
            variants.push(format!("{}-{}-{}", &d[..4], &d[4..8], &d[8..]));
            variants.push(format!("{}-{}-{}", &d[..5], &d[5..8], &d[8..]));
            variants.push(format!("{}-{}-{}", &d[..5], &d[5..9], &d[9..]));
        } else {
            let (labeler, product, package) = (&d[..5], &d[5..9], &d[9..]);
            variants.push(format!("{}-{}-{}", labeler, product, package));
            if let Some(short) = labeler.strip_prefix('0') {
                variants.push(format!("{}-{}-{}", short, product, package));
            }
            if let Some(short) = product.strip_prefix('0') {
                variants.push(format!("{}-{}-{}", labeler, short, package));
            }
            if let Some(short) = package.strip_prefix('0') {
                variants.push(format!("{}-{}-{}", labeler, product, short));
            }
        }
        variants
    }
}

impl std::fmt::Display for ProductCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Intermediate and final results
// ============================================================================

/// Terminology name with the best token-set score (0-100) seen for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminologyCandidate {
    pub name: String,
    pub score: u8,
}

impl TerminologyCandidate {
    pub fn new(name: impl Into<String>, score: u8) -> Self {
        Self {
            name: name.into(),
            score: score.min(100),
        }
    }

    /// Score on the 0.0-1.0 scale used by `VerificationResult`
    pub fn normalized_score(&self) -> f64 {
        (f64::from(self.score) / 100.0).clamp(0.0, 1.0)
    }
}

/// Final verification record for one run
///
/// `canonical_name` always mirrors `matched_term`. `justification` is only
/// set by the arbiter or barcode override paths.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    /// Stable terminology identifier for the canonical name (best-effort)
    pub identifier: Option<String>,
    pub matched_term: Option<String>,
    /// Confidence (0.0-1.0)
    pub match_score: f64,
    pub canonical_name: Option<String>,
    pub justification: Option<String>,
}

impl VerificationResult {
    /// Result for runs that end without a match
    pub(crate) fn unresolved() -> Self {
        Self::default()
    }

    pub(crate) fn resolved(
        name: String,
        match_score: f64,
        identifier: Option<String>,
        justification: Option<String>,
    ) -> Self {
        Self {
            identifier,
            canonical_name: Some(name.clone()),
            matched_term: Some(name),
            match_score: match_score.clamp(0.0, 1.0),
            justification,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.matched_term.is_some()
    }
}

/// Which path produced a resolved result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionPath {
    BarcodeOverride,
    Arbiter,
    Fallback,
}

/// Why a run ended without a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedReason {
    /// Recognized text missing or empty
    NoText,
    /// No terminology candidate cleared the acceptance threshold
    NoCandidates,
}

/// Terminal state of the resolution state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "via", rename_all = "snake_case")]
pub enum Outcome {
    Resolved(ResolutionPath),
    Unresolved(UnresolvedReason),
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Resolved(ResolutionPath::BarcodeOverride) => write!(f, "RESOLVED(override)"),
            Outcome::Resolved(ResolutionPath::Arbiter) => write!(f, "RESOLVED(arbiter)"),
            Outcome::Resolved(ResolutionPath::Fallback) => write!(f, "RESOLVED(fallback)"),
            Outcome::Unresolved(UnresolvedReason::NoText) => write!(f, "UNRESOLVED(no_text)"),
            Outcome::Unresolved(UnresolvedReason::NoCandidates) => {
                write!(f, "UNRESOLVED(no_candidates)")
            }
        }
    }
}

/// Everything one run produced: the result, its provenance, and the ranked
/// candidates considered on the text path (empty for override/no-text runs)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub result: VerificationResult,
    pub outcome: Outcome,
    pub candidates: Vec<TerminologyCandidate>,
}

// ============================================================================
// Collaborator contracts
// ============================================================================

/// External drug terminology service (e.g. RxNorm)
#[async_trait]
pub trait TerminologyLookup: Send + Sync {
    /// Collaborator name for logging
    fn name(&self) -> &'static str;

    /// Known drug names for a candidate term (may be empty)
    async fn lookup(&self, term: &str) -> Result<Vec<String>, LookupError>;

    /// Stable identifier for a canonical drug name
    async fn resolve_identifier(&self, name: &str) -> Result<Option<String>, LookupError>;
}

/// Product found by code lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeMatch {
    pub name: String,
    pub identifier: Option<String>,
}

/// External product-code registry (e.g. openFDA NDC directory)
#[async_trait]
pub trait ProductCodeLookup: Send + Sync {
    /// Collaborator name for logging
    fn name(&self) -> &'static str;

    async fn lookup_by_code(&self, code: &ProductCode) -> Result<Option<CodeMatch>, LookupError>;
}

/// Candidate as presented to the arbiter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArbiterCandidate {
    pub name: String,
    pub ingredients: Vec<String>,
    pub form: DosageForm,
}

/// Arbitration request: the recognized text plus the top-K candidates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArbitrationRequest {
    pub text: String,
    pub candidates: Vec<ArbiterCandidate>,
}

impl ArbitrationRequest {
    /// Offered candidate matching `name`, exactly or ignoring case/whitespace
    pub fn offered(&self, name: &str) -> Option<&ArbiterCandidate> {
        let wanted = name.trim();
        self.candidates
            .iter()
            .find(|c| c.name == wanted)
            .or_else(|| {
                self.candidates
                    .iter()
                    .find(|c| c.name.trim().eq_ignore_ascii_case(wanted))
            })
    }
}

/// Arbiter response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArbiterVerdict {
    /// Arbiter picked a candidate
    Accepted { name: String, reason: String },
    /// Arbiter answered but made no pick
    Declined,
    /// Transport, timeout, or parse failure
    Failed(String),
}

/// Non-deterministic decision service consulted only on ambiguity
#[async_trait]
pub trait ArbiterDelegate: Send + Sync {
    /// Collaborator name for logging
    fn name(&self) -> &'static str;

    async fn arbitrate(&self, request: &ArbitrationRequest) -> ArbiterVerdict;
}

// ============================================================================
// Tests
// ============================================================================
