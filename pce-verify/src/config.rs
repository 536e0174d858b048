//! Configuration resolution for pce-verify
//!
//! Turns the optional TOML sections from `pce_common::config::TomlConfig` into
//! a fully populated `VerifierConfig`, applying compiled defaults and
//! resolving the arbiter API key with ENV → TOML priority.

use crate::services::{arbiter_client, openfda_client, rxnorm_client};
use crate::workflow::resolver::ResolutionSettings;
use pce_common::config::TomlConfig;
use pce_common::{Error, Result};
use std::time::Duration;
use tracing::{info, warn};

/// Default minimum token-set score for a terminology candidate
pub const DEFAULT_ACCEPTANCE_THRESHOLD: u8 = 50;
/// Default score gap below which the top two candidates are ambiguous
pub const DEFAULT_AMBIGUITY_MARGIN: u8 = 15;
/// Default number of candidates offered to the arbiter
pub const DEFAULT_ARBITER_TOP_K: usize = 5;
/// Default worker pool size for per-term lookups
pub const DEFAULT_MAX_CONCURRENT_LOOKUPS: usize = 4;
pub const DEFAULT_LOOKUP_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_ARBITER_TIMEOUT_MS: u64 = 15_000;

/// Environment variables checked for the arbiter key, in priority order
pub const ARBITER_KEY_ENV_VARS: [&str; 2] = ["PCE_ARBITER_API_KEY", "GOOGLE_API_KEY"];

/// Fully resolved runtime configuration
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    pub log_level: String,
    pub acceptance_threshold: u8,
    pub ambiguity_margin: u8,
    pub arbiter_top_k: usize,
    pub max_concurrent_lookups: usize,
    pub arbiter_enabled: bool,
    pub lookup_timeout: Duration,
    pub arbiter_timeout: Duration,
    pub arbiter_retries: u8,
    pub rxnorm_base_url: String,
    pub openfda_base_url: String,
    pub arbiter_base_url: String,
    pub arbiter_model: String,
    pub arbiter_api_key: Option<String>,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            acceptance_threshold: DEFAULT_ACCEPTANCE_THRESHOLD,
            ambiguity_margin: DEFAULT_AMBIGUITY_MARGIN,
            arbiter_top_k: DEFAULT_ARBITER_TOP_K,
            max_concurrent_lookups: DEFAULT_MAX_CONCURRENT_LOOKUPS,
            arbiter_enabled: true,
            lookup_timeout: Duration::from_millis(DEFAULT_LOOKUP_TIMEOUT_MS),
            arbiter_timeout: Duration::from_millis(DEFAULT_ARBITER_TIMEOUT_MS),
            arbiter_retries: 0,
            rxnorm_base_url: rxnorm_client::RXNORM_API_URL.to_string(),
            openfda_base_url: openfda_client::OPENFDA_API_URL.to_string(),
            arbiter_base_url: arbiter_client::GEMINI_API_URL.to_string(),
            arbiter_model: arbiter_client::DEFAULT_MODEL.to_string(),
            arbiter_api_key: None,
        }
    }
}

impl VerifierConfig {
    /// Build from TOML, filling unset fields with compiled defaults
    ///
    /// # Errors
    /// Returns `Error::Config` if any resolved value is out of range.
    pub fn from_toml(toml_config: &TomlConfig) -> Result<Self> {
        let defaults = Self::default();
        let resolution = &toml_config.resolution;
        let timeouts = &toml_config.timeouts;
        let endpoints = &toml_config.endpoints;

        let config = Self {
            log_level: toml_config.logging.level.clone(),
            acceptance_threshold: resolution
                .acceptance_threshold
                .unwrap_or(defaults.acceptance_threshold),
            ambiguity_margin: resolution
                .ambiguity_margin
                .unwrap_or(defaults.ambiguity_margin),
            arbiter_top_k: resolution.arbiter_top_k.unwrap_or(defaults.arbiter_top_k),
            max_concurrent_lookups: resolution
                .max_concurrent_lookups
                .unwrap_or(defaults.max_concurrent_lookups),
            arbiter_enabled: resolution.arbiter_enabled.unwrap_or(defaults.arbiter_enabled),
            lookup_timeout: timeouts
                .lookup_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.lookup_timeout),
            arbiter_timeout: timeouts
                .arbiter_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.arbiter_timeout),
            arbiter_retries: timeouts.arbiter_retries.unwrap_or(defaults.arbiter_retries),
            rxnorm_base_url: endpoints
                .rxnorm_base_url
                .clone()
                .unwrap_or(defaults.rxnorm_base_url),
            openfda_base_url: endpoints
                .openfda_base_url
                .clone()
                .unwrap_or(defaults.openfda_base_url),
            arbiter_base_url: endpoints
                .arbiter_base_url
                .clone()
                .unwrap_or(defaults.arbiter_base_url),
            arbiter_model: endpoints
                .arbiter_model
                .clone()
                .unwrap_or(defaults.arbiter_model),
            arbiter_api_key: resolve_arbiter_api_key(toml_config),
        };

        config.validate()?;
        Ok(config)
    }

    /// Range checks for tunables
    pub fn validate(&self) -> Result<()> {
        if self.acceptance_threshold > 100 {
            return Err(Error::Config(format!(
                "acceptance_threshold must be 0-100, got {}",
                self.acceptance_threshold
            )));
        }
        if self.ambiguity_margin > 100 {
            return Err(Error::Config(format!(
                "ambiguity_margin must be 0-100, got {}",
                self.ambiguity_margin
            )));
        }
        if self.arbiter_top_k < 2 {
            return Err(Error::Config(format!(
                "arbiter_top_k must be at least 2, got {}",
                self.arbiter_top_k
            )));
        }
        if self.max_concurrent_lookups == 0 {
            return Err(Error::Config(
                "max_concurrent_lookups must be at least 1".to_string(),
            ));
        }
        if self.arbiter_retries > 1 {
            return Err(Error::Config(format!(
                "arbiter_retries must be 0 or 1, got {}",
                self.arbiter_retries
            )));
        }
        if self.lookup_timeout.is_zero() || self.arbiter_timeout.is_zero() {
            return Err(Error::Config("timeouts must be non-zero".to_string()));
        }
        Ok(())
    }

    /// Whether an arbiter client should be constructed
    pub fn arbiter_active(&self) -> bool {
        self.arbiter_enabled && self.arbiter_api_key.is_some()
    }

    /// Tunables consumed by the resolution orchestrator
    pub fn resolution_settings(&self) -> ResolutionSettings {
        ResolutionSettings {
            acceptance_threshold: self.acceptance_threshold,
            ambiguity_margin: self.ambiguity_margin,
            arbiter_top_k: self.arbiter_top_k,
            max_concurrent_lookups: self.max_concurrent_lookups,
            lookup_timeout: self.lookup_timeout,
            arbiter_timeout: self.arbiter_timeout,
            arbiter_retries: self.arbiter_retries,
        }
    }
}

/// Resolve the arbiter API key
///
/// **Priority:** ENV (`PCE_ARBITER_API_KEY`, then `GOOGLE_API_KEY`) → TOML.
/// A missing key is not an error: the arbiter is simply not consulted.
pub fn resolve_arbiter_api_key(toml_config: &TomlConfig) -> Option<String> {
    let env_key = ARBITER_KEY_ENV_VARS
        .iter()
        .find_map(|var| std::env::var(var).ok().filter(|k| is_valid_key(k)).map(|k| (*var, k)));

    let toml_key = toml_config
        .arbiter_api_key
        .as_ref()
        .filter(|k| is_valid_key(k));

    if env_key.is_some() && toml_key.is_some() {
        warn!("Arbiter API key found in both environment and TOML. Using environment (highest priority).");
    }

    if let Some((var, key)) = env_key {
        info!("Arbiter API key loaded from environment variable {}", var);
        return Some(key.trim().to_string());
    }

    if let Some(key) = toml_key {
        info!("Arbiter API key loaded from TOML config");
        return Some(key.trim().to_string());
    }

    info!("No arbiter API key configured; ambiguous runs will use deterministic fallback");
    None
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_constants() {
        let config = VerifierConfig::default();
        assert_eq!(config.acceptance_threshold, 50);
        assert_eq!(config.ambiguity_margin, 15);
        assert_eq!(config.arbiter_top_k, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_is_valid_key() {
        assert!(is_valid_key("abc"));
        assert!(!is_valid_key(""));
        assert!(!is_valid_key("   "));
    }

    #[test]
    fn test_validate_rejects_out_of_range_values() {
        let mut config = VerifierConfig::default();
        config.acceptance_threshold = 101;
        assert!(config.validate().is_err());

        let mut config = VerifierConfig::default();
        config.arbiter_top_k = 1;
        assert!(config.validate().is_err());

        let mut config = VerifierConfig::default();
        config.max_concurrent_lookups = 0;
        assert!(config.validate().is_err());

        let mut config = VerifierConfig::default();
        config.arbiter_retries = 2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_arbiter_inactive_without_key() {
        let mut config = VerifierConfig::default();
        config.arbiter_api_key = None;
        assert!(!config.arbiter_active());

        config.arbiter_api_key = Some("key".into());
        assert!(config.arbiter_active());

        config.arbiter_enabled = false;
        assert!(!config.arbiter_active());
    }
}
