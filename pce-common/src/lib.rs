//! # PCE Common Library
//!
//! Shared code for the Pharma-Context Engine crates:
//! - Error types
//! - TOML configuration loading and config file resolution
//! - Logging initialization

pub mod config;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
