//! Arbiter consultation
//!
//! Builds the top-K request, calls the delegate under a timeout and validates
//! the answer. Only an accepted name that was actually offered counts.

use crate::error::LookupError;
use crate::extractors::ingredients::{infer_form, infer_ingredients};
use crate::types::{
    ArbiterCandidate, ArbiterDelegate, ArbiterVerdict, ArbitrationRequest, TerminologyCandidate,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Justification used when the arbiter picks without giving a reason
pub const DEFAULT_ARBITER_REASON: &str = "selected by arbiter";

/// Request carrying the text and the first `top_k` ranked candidates
pub fn build_request(
    text: &str,
    candidates: &[TerminologyCandidate],
    top_k: usize,
) -> ArbitrationRequest {
    ArbitrationRequest {
        text: text.to_string(),
        candidates: candidates
            .iter()
            .take(top_k)
            .map(|c| ArbiterCandidate {
                name: c.name.clone(),
                ingredients: infer_ingredients(&c.name),
                form: infer_form(&c.name),
            })
            .collect(),
    }
}

/// Validated arbiter choice, spelled exactly as offered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArbiterPick {
    pub name: String,
    pub reason: String,
}

pub struct Arbitration {
    delegate: Arc<dyn ArbiterDelegate>,
    timeout: Duration,
    retries: u8,
}

impl Arbitration {
    pub fn new(delegate: Arc<dyn ArbiterDelegate>, timeout: Duration, retries: u8) -> Self {
        Self {
            delegate,
            timeout,
            retries,
        }
    }

    /// Ask the arbiter to pick; `None` sends the run to fallback
    ///
    /// Failures and timeouts are retried up to `retries` times. A decline or
    /// an answer naming an unoffered candidate is final.
    pub async fn arbitrate(&self, request: &ArbitrationRequest) -> Option<ArbiterPick> {
        let attempts = u32::from(self.retries) + 1;

        for attempt in 1..=attempts {
            let verdict = match tokio::time::timeout(self.timeout, self.delegate.arbitrate(request)).await {
                Ok(verdict) => verdict,
                Err(_) => ArbiterVerdict::Failed(LookupError::Timeout(self.timeout).to_string()),
            };

            match verdict {
                ArbiterVerdict::Accepted { name, reason } => {
                    let Some(offered) = request.offered(&name) else {
                        warn!(
                            collaborator = self.delegate.name(),
                            returned = %name,
                            "Arbiter returned a name that was not offered; using fallback"
                        );
                        return None;
                    };
                    let reason = if reason.trim().is_empty() {
                        DEFAULT_ARBITER_REASON.to_string()
                    } else {
                        reason
                    };
                    info!(
                        collaborator = self.delegate.name(),
                        name = %offered.name,
                        "Arbiter selected candidate"
                    );
                    return Some(ArbiterPick {
                        name: offered.name.clone(),
                        reason,
                    });
                }
                ArbiterVerdict::Declined => {
                    info!(collaborator = self.delegate.name(), "Arbiter declined to pick");
                    return None;
                }
                ArbiterVerdict::Failed(message) => {
                    warn!(
                        collaborator = self.delegate.name(),
                        attempt = attempt,
                        attempts = attempts,
                        error = %message,
                        "Arbiter unavailable"
                    );
                }
            }
        }

        None
    }
}
