//! Ambiguity detection over a ranked candidate list

use crate::types::TerminologyCandidate;

/// Assessment of the top two candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ambiguity {
    /// Fewer than two candidates
    Insufficient,
    /// Top candidate leads by at least the margin
    Clear { margin: u8 },
    /// Top two are closer than the margin
    Ambiguous { margin: u8 },
}

impl Ambiguity {
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, Ambiguity::Ambiguous { .. })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AmbiguityDetector {
    margin: u8,
}

impl AmbiguityDetector {
    pub fn new(margin: u8) -> Self {
        Self { margin }
    }

    /// Assess a list already sorted by descending score
    pub fn assess(&self, ranked: &[TerminologyCandidate]) -> Ambiguity {
        match ranked {
            [top, second, ..] => {
                let gap = top.score.saturating_sub(second.score);
                if gap < self.margin {
                    Ambiguity::Ambiguous { margin: gap }
                } else {
                    Ambiguity::Clear { margin: gap }
                }
            }
            _ => Ambiguity::Insufficient,
        }
    }
}
