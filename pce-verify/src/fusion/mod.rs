//! Candidate Fusion
//!
//! Turns per-term terminology results into one ranked, deduplicated candidate
//! list and decides whether that list can be resolved deterministically.

pub mod ambiguity;
pub mod candidate_scorer;
pub mod formulation;
pub mod similarity;

pub use ambiguity::{Ambiguity, AmbiguityDetector};
pub use candidate_scorer::{CandidateScorer, ScorerSettings};
pub use formulation::{formulation_mismatch, FORMULATION_KEYWORDS};
pub use similarity::{token_set_ratio, SimilarityScorer, TokenSetScorer};
