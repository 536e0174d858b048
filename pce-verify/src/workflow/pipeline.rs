//! Document Pipeline
//!
//! Entity extraction → resolution → ingredient extraction, assembled into one
//! `PharmaDocument` per package.

use crate::error::VerifyResult;
use crate::extractors::entity_extractor::extract_entities;
use crate::extractors::ingredients::extract_ingredients_from_name;
use crate::models::document::PharmaDocument;
use crate::types::Barcode;
use crate::workflow::resolver::ResolutionOrchestrator;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info_span, Instrument};

pub struct DocumentPipeline {
    orchestrator: Arc<ResolutionOrchestrator>,
}

impl DocumentPipeline {
    pub fn new(orchestrator: Arc<ResolutionOrchestrator>) -> Self {
        Self { orchestrator }
    }

    /// Build and resolve a document
    pub async fn process(&self, text: &str, barcode: Option<Barcode>) -> PharmaDocument {
        let mut doc = Self::prepare(text, barcode);
        let span = info_span!("document", id = %doc.document_id);

        let resolution = self
            .orchestrator
            .resolve(&doc.recognized_text, doc.barcode.as_ref())
            .instrument(span)
            .await;
        doc.apply_resolution(resolution);
        Self::finish(&mut doc);
        doc
    }

    /// `process` that stops when `cancel` fires
    ///
    /// # Errors
    /// Returns `VerifyError::Cancelled`; no partial document is returned.
    pub async fn process_cancellable(
        &self,
        text: &str,
        barcode: Option<Barcode>,
        cancel: &CancellationToken,
    ) -> VerifyResult<PharmaDocument> {
        let mut doc = Self::prepare(text, barcode);
        let span = info_span!("document", id = %doc.document_id);

        let resolution = self
            .orchestrator
            .resolve_cancellable(&doc.recognized_text, doc.barcode.as_ref(), cancel)
            .instrument(span)
            .await?;
        doc.apply_resolution(resolution);
        Self::finish(&mut doc);
        Ok(doc)
    }

    fn prepare(text: &str, barcode: Option<Barcode>) -> PharmaDocument {
        let mut doc = PharmaDocument::new(text, barcode);
        doc.extracted_entities = extract_entities(text);
        doc
    }

    fn finish(doc: &mut PharmaDocument) {
        doc.ingredients = doc
            .verification
            .matched_term
            .as_deref()
            .map(extract_ingredients_from_name)
            .unwrap_or_default();
    }
}
