//! Resolution Orchestrator
//!
//! Sequences barcode override, term extraction, candidate scoring, ambiguity
//! detection, arbitration and fallback into one `Resolution`.
//!
//! # State machine
//! ```text
//! BARCODE_CHECK ──match──▶ RESOLVED(override)
//!       │
//!       ▼
//!    EXTRACT ──no text──▶ UNRESOLVED(no_text)
//!       │
//!       ▼
//!     SCORE ──empty──▶ UNRESOLVED(no_candidates)
//!       │
//!       ▼
//! AMBIGUITY_CHECK ──ambiguous + arbiter──▶ ARBITRATE ──valid pick──▶ RESOLVED(arbiter)
//!       │                                      │
//!       └──────────────clear──────────▶ FALLBACK ◀──otherwise
//!                                          │
//!                                          ▼
//!                                   RESOLVED(fallback)
//! ```
//!
//! Every collaborator failure degrades to "no result" for that call; nothing
//! here returns an error except cancellation.

use crate::config::{
    DEFAULT_ACCEPTANCE_THRESHOLD, DEFAULT_AMBIGUITY_MARGIN, DEFAULT_ARBITER_TIMEOUT_MS,
    DEFAULT_ARBITER_TOP_K, DEFAULT_LOOKUP_TIMEOUT_MS, DEFAULT_MAX_CONCURRENT_LOOKUPS,
};
use crate::error::{bounded, LookupError, VerifyError, VerifyResult};
use crate::extractors::term_extractor::extract_candidate_terms;
use crate::fusion::ambiguity::AmbiguityDetector;
use crate::fusion::candidate_scorer::{CandidateScorer, ScorerSettings};
use crate::fusion::similarity::SimilarityScorer;
use crate::types::{
    ArbiterDelegate, Barcode, Outcome, ProductCodeLookup, Resolution, ResolutionPath,
    TerminologyCandidate, TerminologyLookup, UnresolvedReason, VerificationResult,
};
use crate::workflow::arbitration::{build_request, Arbitration};
use crate::workflow::barcode_override::{BarcodeOverride, OVERRIDE_JUSTIFICATION};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Tunables for one orchestrator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionSettings {
    pub acceptance_threshold: u8,
    pub ambiguity_margin: u8,
    pub arbiter_top_k: usize,
    pub max_concurrent_lookups: usize,
    /// Budget for each terminology, product-code and identifier call
    pub lookup_timeout: Duration,
    /// Budget for each arbiter attempt
    pub arbiter_timeout: Duration,
    pub arbiter_retries: u8,
}

impl Default for ResolutionSettings {
    fn default() -> Self {
        Self {
            acceptance_threshold: DEFAULT_ACCEPTANCE_THRESHOLD,
            ambiguity_margin: DEFAULT_AMBIGUITY_MARGIN,
            arbiter_top_k: DEFAULT_ARBITER_TOP_K,
            max_concurrent_lookups: DEFAULT_MAX_CONCURRENT_LOOKUPS,
            lookup_timeout: Duration::from_millis(DEFAULT_LOOKUP_TIMEOUT_MS),
            arbiter_timeout: Duration::from_millis(DEFAULT_ARBITER_TIMEOUT_MS),
            arbiter_retries: 0,
        }
    }
}

/// Chosen drug before identifier resolution
#[derive(Debug)]
struct Selection {
    name: String,
    score: f64,
    identifier: Option<String>,
    justification: Option<String>,
    path: ResolutionPath,
}

#[derive(Debug)]
enum State {
    BarcodeCheck,
    Extract,
    Score { terms: Vec<String> },
    AmbiguityCheck { candidates: Vec<TerminologyCandidate> },
    Arbitrate { candidates: Vec<TerminologyCandidate> },
    Fallback { candidates: Vec<TerminologyCandidate> },
    Resolved { selection: Selection, candidates: Vec<TerminologyCandidate> },
    Unresolved { reason: UnresolvedReason, candidates: Vec<TerminologyCandidate> },
}

impl State {
    fn label(&self) -> &'static str {
        match self {
            State::BarcodeCheck => "BARCODE_CHECK",
            State::Extract => "EXTRACT",
            State::Score { .. } => "SCORE",
            State::AmbiguityCheck { .. } => "AMBIGUITY_CHECK",
            State::Arbitrate { .. } => "ARBITRATE",
            State::Fallback { .. } => "FALLBACK",
            State::Resolved { .. } => "RESOLVED",
            State::Unresolved { .. } => "UNRESOLVED",
        }
    }
}

/// Resolution engine with injected collaborators
///
/// Construct once at startup and share behind `Arc`; each `resolve` call is
/// an independent run.
pub struct ResolutionOrchestrator {
    terminology: Arc<dyn TerminologyLookup>,
    barcode: BarcodeOverride,
    scorer: CandidateScorer,
    ambiguity: AmbiguityDetector,
    arbitration: Option<Arbitration>,
    settings: ResolutionSettings,
}

impl ResolutionOrchestrator {
    pub fn new(
        terminology: Arc<dyn TerminologyLookup>,
        product_codes: Option<Arc<dyn ProductCodeLookup>>,
        arbiter: Option<Arc<dyn ArbiterDelegate>>,
        settings: ResolutionSettings,
    ) -> Self {
        let scorer = CandidateScorer::new(
            Arc::clone(&terminology),
            ScorerSettings {
                acceptance_threshold: settings.acceptance_threshold,
                max_concurrent_lookups: settings.max_concurrent_lookups,
                lookup_timeout: settings.lookup_timeout,
            },
        );

        Self {
            barcode: BarcodeOverride::new(product_codes, settings.lookup_timeout),
            scorer,
            ambiguity: AmbiguityDetector::new(settings.ambiguity_margin),
            arbitration: arbiter.map(|delegate| {
                Arbitration::new(delegate, settings.arbiter_timeout, settings.arbiter_retries)
            }),
            terminology,
            settings,
        }
    }

    /// Replace the default token-set similarity
    pub fn with_similarity(mut self, similarity: Arc<dyn SimilarityScorer>) -> Self {
        self.scorer = self.scorer.with_similarity(similarity);
        self
    }

    pub fn settings(&self) -> &ResolutionSettings {
        &self.settings
    }

    /// Best-effort identifier for a chosen name
    async fn resolve_identifier(&self, name: &str) -> Option<String> {
        match bounded(
            self.settings.lookup_timeout,
            self.terminology.resolve_identifier(name),
        )
        .await
        {
            Ok(identifier) => identifier,
            Err(LookupError::Timeout(budget)) => {
                warn!(
                    collaborator = self.terminology.name(),
                    name = %name,
                    timeout_ms = budget.as_millis() as u64,
                    "Identifier lookup timed out"
                );
                None
            }
            Err(e) => {
                warn!(
                    collaborator = self.terminology.name(),
                    name = %name,
                    error = %e,
                    "Identifier lookup failed"
                );
                None
            }
        }
    }

    async fn step(&self, state: State, text: &str, barcode: Option<&Barcode>) -> State {
        match state {
            State::BarcodeCheck => match self.barcode.resolve(barcode).await {
                Some(found) => State::Resolved {
                    selection: Selection {
                        name: found.name,
                        score: 1.0,
                        identifier: found.identifier,
                        justification: Some(OVERRIDE_JUSTIFICATION.to_string()),
                        path: ResolutionPath::BarcodeOverride,
                    },
                    candidates: Vec::new(),
                },
                None => State::Extract,
            },

            State::Extract => {
                if text.trim().is_empty() {
                    return State::Unresolved {
                        reason: UnresolvedReason::NoText,
                        candidates: Vec::new(),
                    };
                }
                let terms = extract_candidate_terms(text);
                debug!(terms = ?terms, "Extracted candidate terms");
                State::Score { terms }
            }

            State::Score { terms } => {
                let candidates = self.scorer.score(text, &terms).await;
                if candidates.is_empty() {
                    State::Unresolved {
                        reason: UnresolvedReason::NoCandidates,
                        candidates,
                    }
                } else {
                    State::AmbiguityCheck { candidates }
                }
            }

            State::AmbiguityCheck { candidates } => {
                let assessment = self.ambiguity.assess(&candidates);
                debug!(assessment = ?assessment, "Ambiguity assessed");
                if !assessment.is_ambiguous() {
                    State::Fallback { candidates }
                } else if self.arbitration.is_some() {
                    State::Arbitrate { candidates }
                } else {
                    info!("Candidates ambiguous but no arbiter configured; using fallback");
                    State::Fallback { candidates }
                }
            }

            State::Arbitrate { candidates } => {
                let Some(arbitration) = &self.arbitration else {
                    return State::Fallback { candidates };
                };
                let request = build_request(text, &candidates, self.settings.arbiter_top_k);
                let Some(pick) = arbitration.arbitrate(&request).await else {
                    return State::Fallback { candidates };
                };

                let score = candidates
                    .iter()
                    .find(|c| c.name == pick.name)
                    .map(TerminologyCandidate::normalized_score)
                    .unwrap_or_default();
                let identifier = self.resolve_identifier(&pick.name).await;

                State::Resolved {
                    selection: Selection {
                        name: pick.name,
                        score,
                        identifier,
                        justification: Some(pick.reason),
                        path: ResolutionPath::Arbiter,
                    },
                    candidates,
                }
            }

            State::Fallback { candidates } => {
                let Some(top) = candidates.first().cloned() else {
                    return State::Unresolved {
                        reason: UnresolvedReason::NoCandidates,
                        candidates,
                    };
                };
                let identifier = self.resolve_identifier(&top.name).await;

                State::Resolved {
                    selection: Selection {
                        score: top.normalized_score(),
                        name: top.name,
                        identifier,
                        justification: None,
                        path: ResolutionPath::Fallback,
                    },
                    candidates,
                }
            }

            terminal @ (State::Resolved { .. } | State::Unresolved { .. }) => terminal,
        }
    }

    /// Run the state machine to a terminal state
    ///
    /// Never fails: collaborator problems end in a degraded but valid
    /// `Resolution`.
    pub async fn resolve(&self, text: &str, barcode: Option<&Barcode>) -> Resolution {
        let mut state = State::BarcodeCheck;

        loop {
            state = match state {
                State::Resolved {
                    selection,
                    candidates,
                } => {
                    let outcome = Outcome::Resolved(selection.path);
                    info!(
                        outcome = %outcome,
                        name = %selection.name,
                        score = selection.score,
                        identifier = ?selection.identifier,
                        "Resolution complete"
                    );
                    return Resolution {
                        result: VerificationResult::resolved(
                            selection.name,
                            selection.score,
                            selection.identifier,
                            selection.justification,
                        ),
                        outcome,
                        candidates,
                    };
                }
                State::Unresolved { reason, candidates } => {
                    let outcome = Outcome::Unresolved(reason);
                    info!(outcome = %outcome, "Resolution complete");
                    return Resolution {
                        result: VerificationResult::unresolved(),
                        outcome,
                        candidates,
                    };
                }
                other => {
                    debug!(state = other.label(), "Resolution step");
                    self.step(other, text, barcode).await
                }
            };
        }
    }

    /// `resolve` that stops as soon as `cancel` fires
    ///
    /// # Errors
    /// Returns `VerifyError::Cancelled` if the token fires before the run
    /// completes; in-flight collaborator calls are dropped.
    pub async fn resolve_cancellable(
        &self,
        text: &str,
        barcode: Option<&Barcode>,
        cancel: &CancellationToken,
    ) -> VerifyResult<Resolution> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("Resolution cancelled");
                Err(VerifyError::Cancelled)
            }
            resolution = self.resolve(text, barcode) => Ok(resolution),
        }
    }
}
