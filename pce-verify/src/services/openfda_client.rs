//! openFDA NDC Client
//!
//! Product-code lookup against the openFDA NDC directory.
//!
//! # API Reference
//! - `GET {base}/drug/ndc.json?search=...&limit=1`
//! - openFDA answers 404 when the search matches nothing
//!
//! A scanned code carries no hyphens, so the search covers the raw digits and
//! every hyphenated package/product layout the digits could stand for.

use crate::error::LookupError;
use crate::services::USER_AGENT;
use crate::types::{CodeMatch, ProductCode, ProductCodeLookup};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// openFDA API base URL
pub const OPENFDA_API_URL: &str = "https://api.fda.gov";

#[derive(Debug, Deserialize)]
struct NdcResponse {
    #[serde(default)]
    results: Vec<NdcProduct>,
}

#[derive(Debug, Deserialize)]
struct NdcProduct {
    generic_name: Option<String>,
    brand_name: Option<String>,
    #[serde(default)]
    openfda: Option<OpenFdaSection>,
}

#[derive(Debug, Deserialize)]
struct OpenFdaSection {
    #[serde(default)]
    rxcui: Vec<String>,
}

impl NdcProduct {
    fn into_code_match(self) -> Option<CodeMatch> {
        let name = self
            .generic_name
            .filter(|n| !n.trim().is_empty())
            .or(self.brand_name.filter(|n| !n.trim().is_empty()))?;
        let identifier = self.openfda.and_then(|o| o.rxcui.into_iter().next());
        Some(CodeMatch { name, identifier })
    }
}

/// Build the openFDA search expression for a product code
pub fn search_expression(code: &ProductCode) -> String {
    let mut clauses = vec![format!("product_ndc:\"{}\"", code.digits())];
    for variant in code.package_variants() {
        let package = format!("packaging.package_ndc:\"{}\"", variant);
        if !clauses.contains(&package) {
            clauses.push(package);
        }
        if let Some((product, _)) = variant.rsplit_once('-') {
            let product = format!("product_ndc:\"{}\"", product);
            if !clauses.contains(&product) {
                clauses.push(product);
            }
        }
    }
    clauses.join(" OR ")
}

pub struct OpenFdaClient {
    client: Client,
    base_url: String,
}

impl OpenFdaClient {
    /// Create a client for `base_url` (no trailing slash)
    ///
    /// # Errors
    /// Returns `LookupError::Network` if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, LookupError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ProductCodeLookup for OpenFdaClient {
    fn name(&self) -> &'static str {
        "openfda"
    }

    async fn lookup_by_code(&self, code: &ProductCode) -> Result<Option<CodeMatch>, LookupError> {
        let search = search_expression(code);
        let url = Url::parse_with_params(
            &format!("{}/drug/ndc.json", self.base_url),
            &[("search", search.as_str()), ("limit", "1")],
        )
        .map_err(|e| LookupError::Network(format!("Invalid openFDA URL: {}", e)))?;

        debug!(code = %code, "Querying openFDA NDC directory");

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!(code = %code, "openFDA: no product for code");
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LookupError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let parsed: NdcResponse = response
            .json()
            .await
            .map_err(|e| LookupError::Parse(format!("Failed to parse openFDA response: {}", e)))?;

        let found = parsed
            .results
            .into_iter()
            .next()
            .and_then(NdcProduct::into_code_match);

        debug!(code = %code, name = ?found.as_ref().map(|m| &m.name), "openFDA lookup complete");
        Ok(found)
    }
}
