//! Pipeline driver: runs ingestion, validation and transformation in order
//! under one run-scoped artifact directory.

use crate::artifact::{
    Artifact, DataIngestionArtifact, DataTransformationArtifact, DataValidationArtifact,
};
use crate::components::{DataIngestion, DataTransformation, DataValidation};
use crate::data::DocumentStore;
use crate::error::{PipelineError, ResultExt};
use crate::schema::SchemaDefinition;
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use vinsure_core::{PipelineConfig, StageConfigs};

/// File written at the root of every run directory.
pub const MANIFEST_FILE_NAME: &str = "manifest.json";

/// Record of one completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: String,
    pub run_dir: PathBuf,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub data_ingestion: DataIngestionArtifact,
    pub data_validation: DataValidationArtifact,
    pub data_transformation: DataTransformationArtifact,
    /// SHA-256 of every artifact file, keyed by path relative to `run_dir`.
    pub checksums: BTreeMap<String, String>,
}

impl RunManifest {
    pub fn load(path: &Path) -> Result<Option<Self>, PipelineError> {
        Ok(vinsure_core::persistence::load_json(path)?)
    }
}

pub struct TrainingPipeline {
    config: PipelineConfig,
    schema: Arc<SchemaDefinition>,
    store: Arc<dyn DocumentStore>,
}

impl TrainingPipeline {
    /// Build a pipeline. The configuration is validated here.
    pub fn new(
        config: PipelineConfig,
        schema: SchemaDefinition,
        store: Arc<dyn DocumentStore>,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self {
            config,
            schema: Arc::new(schema),
            store,
        })
    }

    /// Run every stage under a fresh timestamped directory.
    pub async fn run(&self) -> Result<RunManifest, PipelineError> {
        let run_dir = self.config.run_dir(Local::now());
        self.run_in(&run_dir).await
    }

    /// Run every stage under `run_dir`.
    pub async fn run_in(&self, run_dir: &Path) -> Result<RunManifest, PipelineError> {
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        let stages = self.config.resolve(run_dir);
        tracing::info!(run_id = %run_id, run_dir = %run_dir.display(), "Pipeline run started");

        let data_ingestion = self
            .start_data_ingestion(&stages)
            .await
            .context("data ingestion stage")?;
        let data_validation = self
            .start_data_validation(&stages, &data_ingestion)
            .context("data validation stage")?;
        let data_transformation = self
            .start_data_transformation(&stages, &data_ingestion, &data_validation)
            .context("data transformation stage")?;

        let mut checksums = BTreeMap::new();
        let artifacts: [&dyn Artifact; 3] =
            [&data_ingestion, &data_validation, &data_transformation];
        for path in artifacts.iter().flat_map(|a| a.paths()) {
            let key = path.strip_prefix(&stages.run_dir).unwrap_or(path);
            checksums.insert(
                key.display().to_string(),
                vinsure_core::persistence::sha256_file(path)?,
            );
        }

        let manifest = RunManifest {
            run_id,
            run_dir: stages.run_dir.clone(),
            started_at,
            finished_at: Utc::now(),
            data_ingestion,
            data_validation,
            data_transformation,
            checksums,
        };
        vinsure_core::persistence::atomic_write_json(
            &manifest.run_dir.join(MANIFEST_FILE_NAME),
            &manifest,
        )?;

        tracing::info!(
            run_id = %manifest.run_id,
            elapsed_ms = (manifest.finished_at - manifest.started_at).num_milliseconds(),
            "Pipeline run completed"
        );
        Ok(manifest)
    }

    pub async fn start_data_ingestion(
        &self,
        stages: &StageConfigs,
    ) -> Result<DataIngestionArtifact, PipelineError> {
        let stage = DataIngestion::new(stages.ingestion.clone(), Arc::clone(&self.store));
        let artifact = stage.initiate_data_ingestion().await?;
        artifact.verify()?;
        Ok(artifact)
    }

    pub fn start_data_validation(
        &self,
        stages: &StageConfigs,
        ingestion: &DataIngestionArtifact,
    ) -> Result<DataValidationArtifact, PipelineError> {
        let stage = DataValidation::new(
            ingestion.clone(),
            stages.validation.clone(),
            Arc::clone(&self.schema),
        );
        let artifact = stage.initiate_data_validation()?;
        artifact.verify()?;
        Ok(artifact)
    }

    pub fn start_data_transformation(
        &self,
        stages: &StageConfigs,
        ingestion: &DataIngestionArtifact,
        validation: &DataValidationArtifact,
    ) -> Result<DataTransformationArtifact, PipelineError> {
        let stage = DataTransformation::new(
            ingestion.clone(),
            validation.clone(),
            stages.transformation.clone(),
            Arc::clone(&self.schema),
        );
        let artifact = stage.initiate_data_transformation()?;
        artifact.verify()?;
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::InMemoryStore;
    use crate::schema::tests::vehicle_schema;

    #[test]
    fn test_new_rejects_invalid_config() {
        let mut config = PipelineConfig::default();
        config.ingestion.train_test_split_ratio = 1.5;
        let result =
            TrainingPipeline::new(config, vehicle_schema(), Arc::new(InMemoryStore::new()));
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    #[tokio::test]
    async fn test_empty_collection_aborts_run() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = TrainingPipeline::new(
            PipelineConfig::default().anchor(dir.path()),
            vehicle_schema(),
            Arc::new(InMemoryStore::new()),
        )
        .unwrap();

        let err = pipeline.run().await.unwrap_err();
        assert!(err.to_string().starts_with("data ingestion stage"));
        assert!(matches!(err.root_cause(), PipelineError::Ingestion(_)));
    }

    #[test]
    fn test_load_missing_manifest() {
        let dir = tempfile::tempdir().unwrap();
        assert!(
            RunManifest::load(&dir.path().join(MANIFEST_FILE_NAME))
                .unwrap()
                .is_none()
        );
    }
}
