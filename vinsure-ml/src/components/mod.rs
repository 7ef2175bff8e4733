//! The three pipeline stages.

pub mod ingestion;
pub mod transformation;
pub mod validation;

pub use ingestion::{DataIngestion, split_indices};
pub use transformation::{DataTransformation, apply_preprocessor};
pub use validation::{DataValidation, ValidationReport};
