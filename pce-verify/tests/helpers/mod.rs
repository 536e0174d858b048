//! Test Helper Utilities
//!
//! Hand-written fake collaborators with call counters, plus log capture.

#![allow(dead_code)]

pub mod log_capture;

pub use log_capture::{capture_logs, LogCapture};

use async_trait::async_trait;
use pce_verify::error::LookupError;
use pce_verify::fusion::SimilarityScorer;
use pce_verify::types::{
    ArbiterDelegate, ArbiterVerdict, ArbitrationRequest, CodeMatch, ProductCode, ProductCodeLookup,
    TerminologyLookup,
};
use pce_verify::{ResolutionOrchestrator, ResolutionSettings};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Terminology
// ============================================================================

#[derive(Default)]
pub struct FakeTerminology {
    names: HashMap<String, Vec<String>>,
    identifiers: HashMap<String, String>,
    failing_terms: HashSet<String>,
    delay: Option<Duration>,
    term_delays: HashMap<String, Duration>,
    completed: Mutex<Vec<String>>,
    pub lookup_calls: AtomicUsize,
    pub identifier_calls: AtomicUsize,
}

impl FakeTerminology {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_names(mut self, term: &str, names: &[&str]) -> Self {
        self.names
            .insert(term.to_string(), names.iter().map(|n| n.to_string()).collect());
        self
    }

    pub fn with_identifier(mut self, name: &str, id: &str) -> Self {
        self.identifiers.insert(name.to_string(), id.to_string());
        self
    }

    pub fn failing(mut self, term: &str) -> Self {
        self.failing_terms.insert(term.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Delay only lookups for `term`, on top of any global delay
    pub fn with_term_delay(mut self, term: &str, delay: Duration) -> Self {
        self.term_delays.insert(term.to_string(), delay);
        self
    }

    /// Terms in the order their lookups finished
    pub fn completion_order(&self) -> Vec<String> {
        self.completed.lock().unwrap().clone()
    }

    pub fn lookups(&self) -> usize {
        self.lookup_calls.load(Ordering::SeqCst)
    }

    pub fn identifier_lookups(&self) -> usize {
        self.identifier_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TerminologyLookup for FakeTerminology {
    fn name(&self) -> &'static str {
        "fake-terminology"
    }

    async fn lookup(&self, term: &str) -> Result<Vec<String>, LookupError> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(delay) = self.term_delays.get(term) {
            tokio::time::sleep(*delay).await;
        }
        self.completed.lock().unwrap().push(term.to_string());
        if self.failing_terms.contains(term) {
            return Err(LookupError::Network("connection reset".to_string()));
        }
        Ok(self.names.get(term).cloned().unwrap_or_default())
    }

    async fn resolve_identifier(&self, name: &str) -> Result<Option<String>, LookupError> {
        self.identifier_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.identifiers.get(name).cloned())
    }
}

// ============================================================================
// Product codes
// ============================================================================

pub struct FakeProductCodes {
    result: Result<Option<CodeMatch>, String>,
    delay: Option<Duration>,
    pub calls: AtomicUsize,
    pub last_code: Mutex<Option<ProductCode>>,
}

impl FakeProductCodes {
    pub fn found(name: &str, id: Option<&str>) -> Self {
        Self::with_result(Ok(Some(CodeMatch {
            name: name.to_string(),
            identifier: id.map(str::to_string),
        })))
    }

    pub fn not_found() -> Self {
        Self::with_result(Ok(None))
    }

    pub fn broken() -> Self {
        Self::with_result(Err("registry offline".to_string()))
    }

    fn with_result(result: Result<Option<CodeMatch>, String>) -> Self {
        Self {
            result,
            delay: None,
            calls: AtomicUsize::new(0),
            last_code: Mutex::new(None),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProductCodeLookup for FakeProductCodes {
    fn name(&self) -> &'static str {
        "fake-codes"
    }

    async fn lookup_by_code(&self, code: &ProductCode) -> Result<Option<CodeMatch>, LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_code.lock().unwrap() = Some(code.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.result.clone().map_err(LookupError::Network)
    }
}

// ============================================================================
// Arbiter
// ============================================================================

/// Replays scripted verdicts; answers `Failed` once the script runs out
#[derive(Default)]
pub struct FakeArbiter {
    script: Mutex<VecDeque<ArbiterVerdict>>,
    delay: Option<Duration>,
    pub calls: AtomicUsize,
    pub requests: Mutex<Vec<ArbitrationRequest>>,
}

impl FakeArbiter {
    pub fn scripted(verdicts: Vec<ArbiterVerdict>) -> Self {
        Self {
            script: Mutex::new(verdicts.into()),
            ..Self::default()
        }
    }

    pub fn accepting(name: &str, reason: &str) -> Self {
        Self::scripted(vec![ArbiterVerdict::Accepted {
            name: name.to_string(),
            reason: reason.to_string(),
        }])
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<ArbitrationRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl ArbiterDelegate for FakeArbiter {
    fn name(&self) -> &'static str {
        "fake-arbiter"
    }

    async fn arbitrate(&self, request: &ArbitrationRequest) -> ArbiterVerdict {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| ArbiterVerdict::Failed("script exhausted".to_string()))
    }
}

// ============================================================================
// Similarity and wiring
// ============================================================================

/// Scores by terminology name, ignoring the term
pub struct FixedSimilarity {
    scores: HashMap<String, u8>,
    default: u8,
}

impl FixedSimilarity {
    pub fn new(scores: &[(&str, u8)]) -> Self {
        Self {
            scores: scores.iter().map(|(n, s)| (n.to_string(), *s)).collect(),
            default: 0,
        }
    }
}

impl SimilarityScorer for FixedSimilarity {
    fn score(&self, _term: &str, name: &str) -> u8 {
        self.scores.get(name).copied().unwrap_or(self.default)
    }
}

pub fn fast_settings() -> ResolutionSettings {
    ResolutionSettings {
        lookup_timeout: Duration::from_millis(200),
        arbiter_timeout: Duration::from_millis(200),
        ..ResolutionSettings::default()
    }
}

pub fn orchestrator(
    terminology: &Arc<FakeTerminology>,
    codes: Option<&Arc<FakeProductCodes>>,
    arbiter: Option<&Arc<FakeArbiter>>,
    settings: ResolutionSettings,
) -> ResolutionOrchestrator {
    ResolutionOrchestrator::new(
        terminology.clone(),
        codes.map(|c| c.clone() as Arc<dyn ProductCodeLookup>),
        arbiter.map(|a| a.clone() as Arc<dyn ArbiterDelegate>),
        settings,
    )
}
