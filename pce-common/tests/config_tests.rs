//! Unit tests for config file resolution and graceful degradation
//!
//! Tests that manipulate PCE_CONFIG are marked with #[serial] so they run
//! sequentially, not in parallel.

use pce_common::config::{
    load_or_default, load_toml_config, write_toml_config, ConfigFileResolver, TomlConfig,
    CONFIG_ENV_VAR,
};
use serial_test::serial;
use std::env;
use std::path::{Path, PathBuf};

#[test]
#[serial]
fn test_cli_argument_takes_precedence_over_env() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/pce-from-env.toml");

    let resolver = ConfigFileResolver::new("pce-verify");
    let resolved = resolver.resolve(Some(Path::new("/tmp/pce-from-cli.toml")));

    assert_eq!(resolved, Some(PathBuf::from("/tmp/pce-from-cli.toml")));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_env_var_used_without_cli_argument() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/pce-from-env.toml");

    let resolver = ConfigFileResolver::new("pce-verify");
    let resolved = resolver.resolve(None);

    assert_eq!(resolved, Some(PathBuf::from("/tmp/pce-from-env.toml")));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_blank_env_var_is_ignored() {
    env::set_var(CONFIG_ENV_VAR, "   ");

    let resolver = ConfigFileResolver::new("pce-test-module-without-config");
    let resolved = resolver.resolve(None);

    // No platform default exists for this made-up module name
    assert!(resolved.is_none());

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
fn test_missing_file_degrades_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("does-not-exist.toml");

    let config = load_or_default(Some(&missing)).unwrap();
    assert_eq!(config.logging.level, "info");
    assert!(config.endpoints.rxnorm_base_url.is_none());
}

#[test]
fn test_no_path_degrades_to_defaults() {
    let config = load_or_default(None).unwrap();
    assert_eq!(config.logging.level, "info");
}

#[test]
fn test_malformed_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "[resolution\nambiguity_margin = ").unwrap();

    let result = load_or_default(Some(&path));
    assert!(result.is_err(), "Malformed TOML should not silently default");
}

#[test]
fn test_write_then_load_preserves_sections() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("pce-verify.toml");

    let mut config = TomlConfig::default();
    config.logging.level = "debug".to_string();
    config.resolution.acceptance_threshold = Some(60);
    config.endpoints.arbiter_model = Some("test-model".to_string());

    write_toml_config(&config, &path).unwrap();
    assert!(path.exists());
    assert!(!path.with_extension("toml.tmp").exists());

    let loaded = load_toml_config(&path).unwrap();
    assert_eq!(loaded.logging.level, "debug");
    assert_eq!(loaded.resolution.acceptance_threshold, Some(60));
    assert_eq!(loaded.endpoints.arbiter_model.as_deref(), Some("test-model"));
}
