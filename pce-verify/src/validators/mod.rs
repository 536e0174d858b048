//! Output validation against labelled ground truth
//!
//! - `evaluation`: character error rate, entity match rate and verification
//!   accuracy for single documents and prediction batches

pub mod evaluation;

pub use evaluation::{evaluate_batch, evaluate_single, BatchEvaluation, SingleEvaluation};
