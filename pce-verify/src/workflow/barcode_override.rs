//! Barcode Override
//!
//! A decodable product code is the highest-trust evidence on a package. When
//! the code registry knows it, its name wins outright and text matching never
//! runs.

use crate::error::{bounded, LookupError};
use crate::types::{Barcode, ProductCode, ProductCodeLookup};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const OVERRIDE_JUSTIFICATION: &str = "code-derived authoritative identifier";

/// Product found through the code registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverrideMatch {
    pub code: ProductCode,
    pub name: String,
    pub identifier: Option<String>,
}

pub struct BarcodeOverride {
    lookup: Option<Arc<dyn ProductCodeLookup>>,
    timeout: Duration,
}

impl BarcodeOverride {
    pub fn new(lookup: Option<Arc<dyn ProductCodeLookup>>, timeout: Duration) -> Self {
        Self { lookup, timeout }
    }

    /// Resolve a barcode to an authoritative product
    ///
    /// `None` means "fall through to the text path": no barcode, malformed
    /// code, no registry configured, registry failure, or no product.
    pub async fn resolve(&self, barcode: Option<&Barcode>) -> Option<OverrideMatch> {
        let barcode = barcode?;

        let code = match ProductCode::parse(&barcode.value) {
            Ok(code) => code,
            Err(e) => {
                debug!(symbology = ?barcode.symbology, error = %e, "Barcode is not a product code");
                return None;
            }
        };

        let Some(lookup) = &self.lookup else {
            debug!(code = %code, "No product-code registry configured");
            return None;
        };

        let found = match bounded(self.timeout, lookup.lookup_by_code(&code)).await {
            Ok(found) => found,
            Err(LookupError::Timeout(budget)) => {
                warn!(
                    collaborator = lookup.name(),
                    code = %code,
                    timeout_ms = budget.as_millis() as u64,
                    "Product-code lookup timed out; falling through to text"
                );
                return None;
            }
            Err(e) => {
                warn!(
                    collaborator = lookup.name(),
                    code = %code,
                    error = %e,
                    "Product-code lookup failed; falling through to text"
                );
                return None;
            }
        };

        let found = found.filter(|m| !m.name.trim().is_empty())?;
        info!(code = %code, name = %found.name, "Barcode override matched");

        Some(OverrideMatch {
            code,
            name: found.name,
            identifier: found.identifier,
        })
    }
}
