//! Error types for pce-verify
//!
//! Collaborator failures (`LookupError`) are absorbed by the resolution
//! workflow and never reach the caller. `VerifyError` covers the host-facing
//! operations: configuration, cancellation, and evaluation I/O.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single external collaborator call
#[derive(Debug, Error)]
pub enum LookupError {
    /// Network communication error
    #[error("Network error: {0}")]
    Network(String),

    /// Call exceeded its time budget
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// Upstream service returned a non-success status
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Failed to parse response
    #[error("Parse error: {0}")]
    Parse(String),

    /// Collaborator is missing required configuration (e.g. API key)
    #[error("Not configured: {0}")]
    NotConfigured(String),
}

impl From<reqwest::Error> for LookupError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            LookupError::Parse(err.to_string())
        } else {
            LookupError::Network(err.to_string())
        }
    }
}

/// Run one collaborator call under `budget`
///
/// An elapsed budget becomes `LookupError::Timeout`.
pub async fn bounded<T, F>(budget: Duration, call: F) -> Result<T, LookupError>
where
    F: Future<Output = Result<T, LookupError>>,
{
    tokio::time::timeout(budget, call)
        .await
        .map_err(|_| LookupError::Timeout(budget))?
}

/// Barcode payload is not a well-formed 10 or 11 digit product code
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid product code '{value}': {digit_count} digits (expected 10 or 11)")]
pub struct InvalidCodeError {
    pub value: String,
    pub digit_count: usize,
}

/// Host-facing error type
#[derive(Debug, Error)]
pub enum VerifyError {
    /// Run was cancelled by the caller; partial results are discarded
    #[error("Verification run cancelled")]
    Cancelled,

    /// Invalid or incomplete configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Collaborator construction failed
    #[error("Collaborator setup failed: {0}")]
    Setup(#[from] LookupError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// pce-common error
    #[error("Common error: {0}")]
    Common(#[from] pce_common::Error),
}

/// Result type for host-facing operations
pub type VerifyResult<T> = Result<T, VerifyError>;
