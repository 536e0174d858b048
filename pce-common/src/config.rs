//! Configuration loading and config file resolution
//!
//! Config file resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. `PCE_CONFIG` environment variable
//! 3. Platform config directory (`<config_dir>/pce/<app>.toml`)
//! 4. Compiled defaults (no file)
//!
//! A missing config file is never fatal: a warning is logged and compiled
//! defaults apply. A file that exists but cannot be parsed is an error.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "PCE_CONFIG";

/// Bootstrap configuration loaded from TOML
///
/// Every field is optional; consumers apply their own compiled defaults for
/// anything left unset.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TomlConfig {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Candidate acceptance and arbitration tuning
    #[serde(default)]
    pub resolution: ResolutionSection,

    /// Per-call timeouts for external collaborators
    #[serde(default)]
    pub timeouts: TimeoutSection,

    /// Collaborator base URLs
    #[serde(default)]
    pub endpoints: EndpointSection,

    /// API key for the LLM arbiter (environment variable takes priority)
    #[serde(default)]
    pub arbiter_api_key: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// `[resolution]` table
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ResolutionSection {
    /// Minimum token-set score (0-100) for a terminology candidate
    pub acceptance_threshold: Option<u8>,
    /// Score gap below which the top two candidates are ambiguous
    pub ambiguity_margin: Option<u8>,
    /// Number of candidates offered to the arbiter
    pub arbiter_top_k: Option<usize>,
    /// Upper bound on concurrent terminology lookups
    pub max_concurrent_lookups: Option<usize>,
    /// Set to false to never consult the arbiter
    pub arbiter_enabled: Option<bool>,
}

/// `[timeouts]` table
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TimeoutSection {
    /// Timeout for terminology and product-code lookups
    pub lookup_ms: Option<u64>,
    /// Timeout for a single arbiter call
    pub arbiter_ms: Option<u64>,
    /// Extra arbiter attempts after a failed call (0 or 1)
    pub arbiter_retries: Option<u8>,
}

/// `[endpoints]` table
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EndpointSection {
    pub rxnorm_base_url: Option<String>,
    pub openfda_base_url: Option<String>,
    pub arbiter_base_url: Option<String>,
    pub arbiter_model: Option<String>,
}

/// Resolves which config file (if any) to load for an application
pub struct ConfigFileResolver {
    app_name: String,
}

impl ConfigFileResolver {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
        }
    }

    /// Resolve the config file path following the documented priority order
    ///
    /// Returns `None` when neither an explicit path nor an existing platform
    /// default is available.
    pub fn resolve(&self, cli_arg: Option<&Path>) -> Option<PathBuf> {
        // Priority 1: Command-line argument
        if let Some(path) = cli_arg {
            debug!(path = %path.display(), "Config file from command line");
            return Some(path.to_path_buf());
        }

        // Priority 2: Environment variable
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.trim().is_empty() {
                debug!(path = %path, "Config file from {}", CONFIG_ENV_VAR);
                return Some(PathBuf::from(path));
            }
        }

        // Priority 3: Platform default, only if it exists
        default_config_path(&self.app_name).filter(|p| p.exists())
    }
}

/// Platform default config path: `<config_dir>/pce/<app_name>.toml`
pub fn default_config_path(app_name: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("pce").join(format!("{}.toml", app_name)))
}

/// Load and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Load config from an optional path, degrading to defaults when missing
pub fn load_or_default(path: Option<&Path>) -> Result<TomlConfig> {
    let Some(path) = path else {
        info!("No config file found, using compiled defaults");
        return Ok(TomlConfig::default());
    };

    if !path.exists() {
        warn!(
            path = %path.display(),
            "Config file not found, using compiled defaults"
        );
        return Ok(TomlConfig::default());
    }

    let config = load_toml_config(path)?;
    info!(path = %path.display(), "Loaded config file");
    Ok(config)
}

/// Write config to disk atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}
