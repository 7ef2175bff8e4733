//! Stage artifacts, the immutable records handed from one stage to the next.

use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Output locations of the ingestion stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataIngestionArtifact {
    pub trained_file_path: PathBuf,
    pub test_file_path: PathBuf,
}

/// Outcome of the validation stage. `message` is empty iff validation passed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataValidationArtifact {
    pub validation_status: bool,
    pub message: String,
    pub validation_report_file_path: PathBuf,
}

/// Output locations of the transformation stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataTransformationArtifact {
    pub transformed_object_file_path: PathBuf,
    pub transformed_train_file_path: PathBuf,
    pub transformed_test_file_path: PathBuf,
}

/// Common behaviour of stage artifacts.
pub trait Artifact {
    /// Stage that produced the artifact.
    fn stage(&self) -> &'static str;

    /// Every file the artifact references.
    fn paths(&self) -> Vec<&Path>;

    /// Check that every referenced file exists and is non-empty.
    fn verify(&self) -> Result<(), PipelineError> {
        for path in self.paths() {
            let meta = std::fs::metadata(path).map_err(|e| {
                PipelineError::invalid_artifact(format!(
                    "{} artifact references {}: {e}",
                    self.stage(),
                    path.display()
                ))
            })?;
            if !meta.is_file() || meta.len() == 0 {
                return Err(PipelineError::invalid_artifact(format!(
                    "{} artifact references empty or non-regular file {}",
                    self.stage(),
                    path.display()
                )));
            }
        }
        Ok(())
    }
}

impl Artifact for DataIngestionArtifact {
    fn stage(&self) -> &'static str {
        "data ingestion"
    }

    fn paths(&self) -> Vec<&Path> {
        vec![&self.trained_file_path, &self.test_file_path]
    }
}

impl Artifact for DataValidationArtifact {
    fn stage(&self) -> &'static str {
        "data validation"
    }

    fn paths(&self) -> Vec<&Path> {
        vec![&self.validation_report_file_path]
    }
}

impl Artifact for DataTransformationArtifact {
    fn stage(&self) -> &'static str {
        "data transformation"
    }

    fn paths(&self) -> Vec<&Path> {
        vec![
            &self.transformed_object_file_path,
            &self.transformed_train_file_path,
            &self.transformed_test_file_path,
        ]
    }
}
