//! Data transformation: feature engineering, scaling, rebalancing and
//! persistence of model-ready arrays.

use crate::artifact::{DataIngestionArtifact, DataTransformationArtifact, DataValidationArtifact};
use crate::data::{DataBatch, read_csv};
use crate::error::{PipelineError, ResultExt};
use crate::preprocessing::features::{FeatureStep, apply_step, gender_step};
use crate::preprocessing::{ColumnTransformer, FeaturePipeline, ScalerType};
use crate::resampling::{Sampler, SmoteEnn};
use crate::schema::SchemaDefinition;
use ndarray::{Array1, Array2, Axis};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use vinsure_core::DataTransformationConfig;

pub struct DataTransformation {
    ingestion_artifact: DataIngestionArtifact,
    validation_artifact: DataValidationArtifact,
    config: DataTransformationConfig,
    schema: Arc<SchemaDefinition>,
}

impl DataTransformation {
    pub fn new(
        ingestion_artifact: DataIngestionArtifact,
        validation_artifact: DataValidationArtifact,
        config: DataTransformationConfig,
        schema: Arc<SchemaDefinition>,
    ) -> Self {
        Self {
            ingestion_artifact,
            validation_artifact,
            config,
            schema,
        }
    }

    pub fn read_data(path: &Path) -> Result<DataBatch, PipelineError> {
        read_csv(path).with_context(|| format!("reading {}", path.display()))
    }

    /// Unfitted column transformer: standard scaling on `num_features`,
    /// min-max scaling on `nm_columns`, everything else passed through.
    pub fn get_data_transformer_object(&self) -> ColumnTransformer {
        ColumnTransformer::new()
            .with_scaler(ScalerType::Standard, &self.schema.num_features)
            .with_scaler(ScalerType::MinMax, &self.schema.nm_columns)
    }

    pub fn map_gender_column(&self, batch: DataBatch) -> Result<DataBatch, PipelineError> {
        apply_step(batch, &gender_step())
    }

    pub fn drop_id_column(&self, batch: DataBatch) -> Result<DataBatch, PipelineError> {
        apply_step(
            batch,
            &FeatureStep::DropColumn {
                column: self.schema.drop_columns.clone(),
            },
        )
    }

    pub fn create_dummy_columns(&self, batch: DataBatch) -> Result<DataBatch, PipelineError> {
        apply_step(batch, &FeatureStep::OneHot { drop_first: true })
    }

    /// Rename the awkward one-hot columns and store the indicators as integers.
    pub fn rename_columns(&self, batch: DataBatch) -> Result<DataBatch, PipelineError> {
        let pipeline = FeaturePipeline::vehicle_insurance(&self.schema.drop_columns);
        pipeline
            .steps
            .iter()
            .filter(|s| {
                matches!(
                    s,
                    FeatureStep::RenameColumns { .. } | FeatureStep::CastToInt { .. }
                )
            })
            .try_fold(batch, apply_step)
    }

    /// Gender map, identifier drop, one-hot, rename.
    pub fn engineer_features(&self, batch: DataBatch) -> Result<DataBatch, PipelineError> {
        FeaturePipeline::vehicle_insurance(&self.schema.drop_columns).apply(batch)
    }

    /// Run the stage. Fails before touching the filesystem if validation failed.
    pub fn initiate_data_transformation(
        &self,
    ) -> Result<DataTransformationArtifact, PipelineError> {
        if !self.validation_artifact.validation_status {
            return Err(PipelineError::ValidationFailed(
                self.validation_artifact.message.clone(),
            ));
        }
        tracing::info!("Data transformation started");

        let mut train = Self::read_data(&self.ingestion_artifact.trained_file_path)?;
        let mut test = Self::read_data(&self.ingestion_artifact.test_file_path)?;
        let target = &self.config.target_column;
        let train_y = take_labels(&mut train, target).context("train split")?;
        let test_y = take_labels(&mut test, target).context("test split")?;

        let train = self.engineer_features(train).context("engineering train features")?;
        let test = self.engineer_features(test).context("engineering test features")?;
        tracing::info!(
            columns = train.column_count(),
            "Feature engineering applied to train and test"
        );

        let mut preprocessor = self.get_data_transformer_object();
        let train_x = preprocessor
            .fit_transform(&train)
            .context("fitting preprocessor on train features")?;
        let test_x = preprocessor
            .transform(&test)
            .context("transforming test features")?;
        tracing::info!(outputs = train_x.ncols(), "Scaling done");

        // The test split is rebalanced with its own fit, so its class mix no
        // longer matches the raw data.
        let (train_x, train_y) = self.rebalance(&train_x, &train_y).context("train split")?;
        let (test_x, test_y) = self.rebalance(&test_x, &test_y).context("test split")?;

        let train_arr = append_target(&train_x, &train_y)?;
        let test_arr = append_target(&test_x, &test_y)?;

        preprocessor.save(&self.config.transformed_object_file_path)?;
        save_array(&self.config.transformed_train_file_path, &train_arr)?;
        save_array(&self.config.transformed_test_file_path, &test_arr)?;

        let artifact = DataTransformationArtifact {
            transformed_object_file_path: self.config.transformed_object_file_path.clone(),
            transformed_train_file_path: self.config.transformed_train_file_path.clone(),
            transformed_test_file_path: self.config.transformed_test_file_path.clone(),
        };
        tracing::info!(
            train_shape = ?train_arr.dim(),
            test_shape = ?test_arr.dim(),
            "Data transformation completed"
        );
        Ok(artifact)
    }

    fn rebalance(
        &self,
        x: &Array2<f64>,
        y: &Array1<i64>,
    ) -> Result<(Array2<f64>, Array1<i64>), PipelineError> {
        let mut sampler = SmoteEnn::minority(
            self.config.smote_k_neighbors,
            self.config.enn_n_neighbors,
            self.config.random_state,
        );
        let result = sampler.fit_resample(x, y)?;
        Ok((result.x, result.y))
    }
}

/// Engineer and transform a held-out table with an already fitted preprocessor.
///
/// When `target_column` is present it is split off first and appended as the
/// last output column, matching the layout of the stage's arrays.
pub fn apply_preprocessor(
    preprocessor: &ColumnTransformer,
    mut batch: DataBatch,
    drop_column: &str,
    target_column: &str,
) -> Result<Array2<f64>, PipelineError> {
    let labels = if batch.has_column(target_column) {
        Some(take_labels(&mut batch, target_column)?)
    } else {
        None
    };
    let features = FeaturePipeline::vehicle_insurance(drop_column).apply(batch)?;
    let x = preprocessor.transform(&features)?;
    match labels {
        Some(y) => append_target(&x, &y),
        None => Ok(x),
    }
}

fn take_labels(batch: &mut DataBatch, target: &str) -> Result<Array1<i64>, PipelineError> {
    let values = batch.take_column(target)?;
    values
        .iter()
        .enumerate()
        .map(|(row, value)| {
            label_value(value).ok_or_else(|| {
                PipelineError::transformation(format!(
                    "target '{target}' row {row}: {value} is not a class label"
                ))
            })
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Array1::from_vec)
}

fn label_value(value: &Value) -> Option<i64> {
    match value {
        Value::Bool(b) => Some(i64::from(*b)),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        _ => None,
    }
}

/// `[x | y]` with the labels as the last column.
fn append_target(x: &Array2<f64>, y: &Array1<i64>) -> Result<Array2<f64>, PipelineError> {
    let y = y.mapv(|l| l as f64).insert_axis(Axis(1));
    Ok(ndarray::concatenate(Axis(1), &[x.view(), y.view()])?)
}

fn save_array(path: &Path, array: &Array2<f64>) -> Result<(), PipelineError> {
    vinsure_core::persistence::ensure_parent_dir(path)?;
    ndarray_npy::write_npy(path, array)
        .with_context(|| format!("writing {}", path.display()))?;
    tracing::debug!(path = %path.display(), shape = ?array.dim(), "Saved array");
    Ok(())
}
