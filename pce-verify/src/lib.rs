//! pce-verify library interface
//!
//! Drug identity resolution for pharmaceutical package scans: recognized text
//! and an optional barcode in, one verified terminology entry out.
//!
//! The binary wires real HTTP collaborators through [`build_orchestrator`];
//! integration tests inject fakes through `ResolutionOrchestrator::new`.

pub mod config;
pub mod error;
pub mod extractors;
pub mod fusion;
pub mod models;
pub mod services;
pub mod types;
pub mod validators;
pub mod workflow;

pub use crate::config::VerifierConfig;
pub use crate::error::{LookupError, VerifyError, VerifyResult};
pub use crate::models::PharmaDocument;
pub use crate::types::{Barcode, Outcome, Resolution, VerificationResult};
pub use crate::workflow::{DocumentPipeline, ResolutionOrchestrator, ResolutionSettings};

use crate::services::{ArbiterClient, OpenFdaClient, RxNormClient};
use crate::types::{ArbiterDelegate, ProductCodeLookup, TerminologyLookup};
use std::sync::Arc;
use tracing::info;

/// Build an orchestrator backed by the configured HTTP services
///
/// The arbiter is only wired when enabled and a key is available; without it
/// ambiguous runs resolve deterministically.
///
/// # Errors
/// Returns `VerifyError::Setup` if an HTTP client cannot be constructed.
pub fn build_orchestrator(config: &VerifierConfig) -> VerifyResult<ResolutionOrchestrator> {
    let terminology: Arc<dyn TerminologyLookup> = Arc::new(RxNormClient::new(
        config.rxnorm_base_url.as_str(),
        config.lookup_timeout,
    )?);

    let product_codes: Arc<dyn ProductCodeLookup> = Arc::new(OpenFdaClient::new(
        config.openfda_base_url.as_str(),
        config.lookup_timeout,
    )?);

    let arbiter: Option<Arc<dyn ArbiterDelegate>> = if config.arbiter_active() {
        Some(Arc::new(ArbiterClient::new(
            config.arbiter_base_url.as_str(),
            config.arbiter_model.as_str(),
            config.arbiter_api_key.as_deref().unwrap_or_default(),
            config.arbiter_timeout,
        )?))
    } else {
        None
    };

    info!(
        terminology = terminology.name(),
        product_codes = product_codes.name(),
        arbiter = arbiter.as_ref().map(|a| a.name()).unwrap_or("disabled"),
        "Collaborators initialized"
    );

    Ok(ResolutionOrchestrator::new(
        terminology,
        Some(product_codes),
        arbiter,
        config.resolution_settings(),
    ))
}
