//! RxNorm Client
//!
//! Terminology lookup against the NLM RxNav REST API.
//!
//! # API Reference
//! - `GET {base}/drugs.json?name={term}`: concept groups with concept names
//! - `GET {base}/rxcui.json?name={name}`: RxCUI for an exact name
//! - Rate limit: 20 requests/second per client IP (NLM terms of service)

use crate::error::LookupError;
use crate::services::USER_AGENT;
use crate::types::TerminologyLookup;
use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use reqwest::{Client, Url};
use serde::Deserialize;
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::debug;

/// RxNav REST API base URL
pub const RXNORM_API_URL: &str = "https://rxnav.nlm.nih.gov/REST";

/// NLM allows 20 requests per second
const REQUESTS_PER_SECOND: u32 = 20;

#[derive(Debug, Deserialize)]
struct DrugsResponse {
    #[serde(rename = "drugGroup", default)]
    drug_group: Option<DrugGroup>,
}

#[derive(Debug, Deserialize)]
struct DrugGroup {
    #[serde(rename = "conceptGroup", default)]
    concept_group: Vec<ConceptGroup>,
}

#[derive(Debug, Deserialize)]
struct ConceptGroup {
    #[serde(rename = "conceptProperties", default)]
    concept_properties: Vec<ConceptProperty>,
}

#[derive(Debug, Deserialize)]
struct ConceptProperty {
    name: String,
}

#[derive(Debug, Deserialize)]
struct RxcuiResponse {
    #[serde(rename = "idGroup", default)]
    id_group: Option<IdGroup>,
}

#[derive(Debug, Deserialize)]
struct IdGroup {
    #[serde(rename = "rxnormId", default)]
    rxnorm_id: Vec<String>,
}

/// RxNorm terminology client
///
/// Timeouts are enforced per call by the orchestrator; the HTTP client timeout
/// here is only a backstop for calls made outside it.
pub struct RxNormClient {
    client: Client,
    base_url: String,
    rate_limiter: RateLimiter<
        governor::state::direct::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl RxNormClient {
    /// Create a client for `base_url` (no trailing slash)
    ///
    /// # Errors
    /// Returns `LookupError::Network` if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, LookupError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        let rate_limiter = RateLimiter::direct(Quota::per_second(
            NonZeroU32::new(REQUESTS_PER_SECOND).expect("20 is non-zero"),
        ));

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            rate_limiter,
        })
    }

    fn endpoint(&self, path: &str, name: &str) -> Result<Url, LookupError> {
        Url::parse_with_params(&format!("{}/{}", self.base_url, path), &[("name", name)])
            .map_err(|e| LookupError::Network(format!("Invalid RxNorm URL: {}", e)))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T, LookupError> {
        self.rate_limiter.until_ready().await;

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LookupError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| LookupError::Parse(format!("Failed to parse RxNorm response: {}", e)))
    }
}

#[async_trait]
impl TerminologyLookup for RxNormClient {
    fn name(&self) -> &'static str {
        "rxnorm"
    }

    async fn lookup(&self, term: &str) -> Result<Vec<String>, LookupError> {
        let url = self.endpoint("drugs.json", term)?;
        let parsed: DrugsResponse = self.get_json(url).await?;

        let names: Vec<String> = parsed
            .drug_group
            .map(|group| {
                group
                    .concept_group
                    .into_iter()
                    .flat_map(|g| g.concept_properties)
                    .map(|p| p.name)
                    .collect()
            })
            .unwrap_or_default();

        debug!(term = %term, results = names.len(), "RxNorm drugs lookup complete");
        Ok(names)
    }

    async fn resolve_identifier(&self, name: &str) -> Result<Option<String>, LookupError> {
        let url = self.endpoint("rxcui.json", name)?;
        let parsed: RxcuiResponse = self.get_json(url).await?;

        let rxcui = parsed
            .id_group
            .and_then(|group| group.rxnorm_id.into_iter().next());

        debug!(name = %name, rxcui = ?rxcui, "RxNorm identifier lookup complete");
        Ok(rxcui)
    }
}
