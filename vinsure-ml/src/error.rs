//! Error types for the vinsure-ml crate.
//!
//! Every failure in the pipeline surfaces as a [`PipelineError`]. Foreign errors
//! convert through `#[from]`; stage boundaries attach a message and the call
//! site with [`ResultExt::context`], producing a [`PipelineError::Context`]
//! whose `source()` is the original cause.

use std::panic::Location;
use thiserror::Error;
use vinsure_core::ConfigError;

/// Top-level error type for pipeline operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("Ingestion error: {0}")]
    Ingestion(String),

    #[error("Data validation failed: {0}")]
    ValidationFailed(String),

    #[error("Transformation error: {0}")]
    Transformation(String),

    #[error("Resampling error: {0}")]
    Resampling(String),

    #[error("Preprocessor has not been fitted")]
    NotFitted,

    #[error("Invalid artifact: {0}")]
    InvalidArtifact(String),

    #[error("Document store error: {0}")]
    Store(#[from] mongodb::error::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Object serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("Array write error: {0}")]
    NpyWrite(#[from] ndarray_npy::WriteNpyError),

    #[error("Array read error: {0}")]
    NpyRead(#[from] ndarray_npy::ReadNpyError),

    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("{context} (at {location})")]
    Context {
        context: String,
        location: &'static Location<'static>,
        #[source]
        source: Box<PipelineError>,
    },
}

impl PipelineError {
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema(msg.into())
    }

    pub fn dataset(msg: impl Into<String>) -> Self {
        Self::Dataset(msg.into())
    }

    pub fn ingestion(msg: impl Into<String>) -> Self {
        Self::Ingestion(msg.into())
    }

    pub fn transformation(msg: impl Into<String>) -> Self {
        Self::Transformation(msg.into())
    }

    pub fn resampling(msg: impl Into<String>) -> Self {
        Self::Resampling(msg.into())
    }

    pub fn invalid_artifact(msg: impl Into<String>) -> Self {
        Self::InvalidArtifact(msg.into())
    }

    /// The innermost error, skipping every context layer.
    pub fn root_cause(&self) -> &PipelineError {
        match self {
            Self::Context { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Call site of the outermost context layer, if any.
    pub fn location(&self) -> Option<&'static Location<'static>> {
        match self {
            Self::Context { location, .. } => Some(location),
            _ => None,
        }
    }
}

/// Attach context and the caller's location to a failing result.
pub trait ResultExt<T> {
    fn context(self, context: impl Into<String>) -> Result<T, PipelineError>;

    fn with_context<S, F>(self, f: F) -> Result<T, PipelineError>
    where
        S: Into<String>,
        F: FnOnce() -> S;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: Into<PipelineError>,
{
    #[track_caller]
    fn context(self, context: impl Into<String>) -> Result<T, PipelineError> {
        match self {
            Ok(value) => Ok(value),
            Err(err) => Err(PipelineError::Context {
                context: context.into(),
                location: Location::caller(),
                source: Box::new(err.into()),
            }),
        }
    }

    #[track_caller]
    fn with_context<S, F>(self, f: F) -> Result<T, PipelineError>
    where
        S: Into<String>,
        F: FnOnce() -> S,
    {
        match self {
            Ok(value) => Ok(value),
            Err(err) => Err(PipelineError::Context {
                context: f().into(),
                location: Location::caller(),
                source: Box::new(err.into()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    fn read_missing() -> Result<String, PipelineError> {
        std::fs::read_to_string("/nonexistent/vinsure/train.csv").context("reading train split")
    }

    #[test]
    fn test_context_records_call_site() {
        let err = read_missing().unwrap_err();
        let location = err.location().expect("context layer");
        assert!(location.file().ends_with("error.rs"));
        assert!(err.to_string().starts_with("reading train split (at "));
    }

    #[test]
    fn test_context_keeps_original_cause() {
        let err = read_missing().unwrap_err();
        assert!(matches!(err.root_cause(), PipelineError::Io(_)));
        let source = err.source().expect("source");
        assert!(source.to_string().starts_with("IO error:"));
    }

    #[test]
    fn test_nested_context() {
        let err = read_missing().context("data validation stage").unwrap_err();
        assert!(err.to_string().starts_with("data validation stage"));
        assert!(matches!(err.root_cause(), PipelineError::Io(_)));
    }

    #[test]
    fn test_with_context_is_lazy_on_success() {
        let ok: Result<u8, PipelineError> = Ok(1);
        let value = ok
            .with_context(|| -> String { panic!("must not be evaluated") })
            .unwrap();
        assert_eq!(value, 1);
    }
}
