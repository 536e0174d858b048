//! Resolution workflow
//!
//! - `barcode_override`: authoritative product-code short-circuit
//! - `arbitration`: bounded, validated arbiter consultation
//! - `resolver`: the resolution state machine
//! - `pipeline`: per-document assembly around the resolver

pub mod arbitration;
pub mod barcode_override;
pub mod pipeline;
pub mod resolver;

pub use pipeline::DocumentPipeline;
pub use resolver::{ResolutionOrchestrator, ResolutionSettings};
