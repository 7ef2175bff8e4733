//! Data validation: structural checks of the ingested splits against the schema.
//!
//! A failed check is reported as data in the artifact and the report file. Only
//! I/O failures abort the stage.

use crate::artifact::{DataIngestionArtifact, DataValidationArtifact};
use crate::data::{DataBatch, read_csv};
use crate::error::{PipelineError, ResultExt};
use crate::schema::SchemaDefinition;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use vinsure_core::DataValidationConfig;

/// Contents of the validation report file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    #[serde(rename = "Validation_status")]
    pub validation_status: bool,
    #[serde(rename = "Message")]
    pub message: String,
}

pub struct DataValidation {
    ingestion_artifact: DataIngestionArtifact,
    config: DataValidationConfig,
    schema: Arc<SchemaDefinition>,
}

impl DataValidation {
    pub fn new(
        ingestion_artifact: DataIngestionArtifact,
        config: DataValidationConfig,
        schema: Arc<SchemaDefinition>,
    ) -> Self {
        Self {
            ingestion_artifact,
            config,
            schema,
        }
    }

    /// True iff the table has exactly as many columns as the schema declares.
    pub fn validation_number_of_columns(&self, batch: &DataBatch) -> bool {
        let status = batch.column_count() == self.schema.expected_column_count();
        tracing::info!(
            found = batch.column_count(),
            expected = self.schema.expected_column_count(),
            status,
            "Column count check"
        );
        status
    }

    /// Declared numerical and categorical columns absent from `batch`, in
    /// schema order.
    pub fn missing_columns(&self, batch: &DataBatch) -> Vec<String> {
        self.schema
            .numerical_columns
            .iter()
            .chain(&self.schema.categorical_columns)
            .filter(|c| !batch.has_column(c))
            .cloned()
            .collect()
    }

    /// True iff every declared numerical and categorical column is present.
    pub fn is_columns_exist(&self, batch: &DataBatch) -> bool {
        let missing_numerical: Vec<&String> = self
            .schema
            .numerical_columns
            .iter()
            .filter(|c| !batch.has_column(c))
            .collect();
        let missing_categorical: Vec<&String> = self
            .schema
            .categorical_columns
            .iter()
            .filter(|c| !batch.has_column(c))
            .collect();

        if !missing_numerical.is_empty() {
            tracing::info!(columns = ?missing_numerical, "Missing numerical columns");
        }
        if !missing_categorical.is_empty() {
            tracing::info!(columns = ?missing_categorical, "Missing categorical columns");
        }
        missing_numerical.is_empty() && missing_categorical.is_empty()
    }

    pub fn read_data(path: &Path) -> Result<DataBatch, PipelineError> {
        read_csv(path).with_context(|| format!("reading {}", path.display()))
    }

    /// Run both checks on both splits and persist the report.
    ///
    /// Returns the artifact whether or not validation passed.
    pub fn initiate_data_validation(&self) -> Result<DataValidationArtifact, PipelineError> {
        tracing::info!("Data validation started");
        let train = Self::read_data(&self.ingestion_artifact.trained_file_path)?;
        let test = Self::read_data(&self.ingestion_artifact.test_file_path)?;

        let mut failures: Vec<&str> = Vec::new();
        if !self.validation_number_of_columns(&train) {
            failures.push("Columns are missing in training dataframe.");
        }
        if !self.validation_number_of_columns(&test) {
            failures.push("Columns are missing in testing dataframe.");
        }
        if !self.is_columns_exist(&train) {
            failures.push("Columns datatype mismatch in training dataframe.");
        }
        if !self.is_columns_exist(&test) {
            failures.push("Columns datatype mismatch in testing dataframe.");
        }

        let report = ValidationReport {
            validation_status: failures.is_empty(),
            message: failures.join(" "),
        };
        let path = &self.config.validation_report_file_path;
        write_report(path, &report)
            .with_context(|| format!("writing validation report {}", path.display()))?;

        let artifact = DataValidationArtifact {
            validation_status: report.validation_status,
            message: report.message,
            validation_report_file_path: path.clone(),
        };
        if artifact.validation_status {
            tracing::info!(?artifact, "Data validation passed");
        } else {
            tracing::warn!(message = %artifact.message, "Data validation failed");
        }
        Ok(artifact)
    }
}

/// Write the report as four-space-indented JSON.
fn write_report(path: &Path, report: &ValidationReport) -> Result<(), PipelineError> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    report.serialize(&mut serializer)?;
    vinsure_core::persistence::atomic_write(path, &buf)?;
    Ok(())
}
