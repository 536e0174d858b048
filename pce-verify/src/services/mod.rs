//! External service clients
//!
//! HTTP implementations of the collaborator traits in `crate::types`:
//! - `rxnorm_client`: RxNorm REST API (`TerminologyLookup`)
//! - `openfda_client`: openFDA NDC directory (`ProductCodeLookup`)
//! - `arbiter_client`: Gemini `generateContent` (`ArbiterDelegate`)

pub mod arbiter_client;
pub mod openfda_client;
pub mod rxnorm_client;

pub use arbiter_client::ArbiterClient;
pub use openfda_client::OpenFdaClient;
pub use rxnorm_client::RxNormClient;

/// User-Agent sent with every outbound request
pub const USER_AGENT: &str = concat!("pce-verify/", env!("CARGO_PKG_VERSION"));
