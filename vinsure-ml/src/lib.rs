//! # vinsure-ml: training-data preparation for vehicle insurance response models
//!
//! Three sequential stages turn a raw document collection into model-ready
//! arrays:
//! 1. **Ingestion**: export the collection to a feature-store CSV and split it
//!    into train and test CSVs
//! 2. **Validation**: check both splits against the declared schema and write
//!    a pass/fail report
//! 3. **Transformation**: engineer features, scale them, rebalance classes and
//!    persist the fitted preprocessor plus the train/test arrays
//!
//! Each stage hands the next an immutable artifact of file locations.

// Foundation
pub mod artifact;
pub mod error;
pub mod schema;

// Data access
pub mod data;

// Modelling primitives
pub mod preprocessing;
pub mod resampling;

// Stages and driver
pub mod components;
pub mod pipeline;

// Re-exports
pub use artifact::{
    Artifact, DataIngestionArtifact, DataTransformationArtifact, DataValidationArtifact,
};
pub use components::{DataIngestion, DataTransformation, DataValidation};
pub use data::{DataBatch, DocumentStore, InMemoryStore, MongoStore};
pub use error::{PipelineError, ResultExt};
pub use pipeline::{MANIFEST_FILE_NAME, RunManifest, TrainingPipeline};
pub use preprocessing::ColumnTransformer;
pub use schema::SchemaDefinition;
