//! Data models for pce-verify
//!
//! - `document`: per-package verification record produced by the pipeline

pub mod document;

pub use document::PharmaDocument;
