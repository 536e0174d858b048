//! Text Extractors
//!
//! Pure, stateless functions over recognized package text:
//! - `term_extractor`: candidate drug-name fragments for terminology lookup
//! - `entity_extractor`: dosage, composition, drug name, manufacturer
//! - `ingredients`: table-driven ingredient and dosage-form inference

pub mod entity_extractor;
pub mod ingredients;
pub mod term_extractor;

pub use entity_extractor::{extract_entities, EntityValue, ExtractedEntities, ExtractedEntity};
pub use ingredients::{extract_ingredients_from_name, infer_form, infer_ingredients, DosageForm};
pub use term_extractor::extract_candidate_terms;
