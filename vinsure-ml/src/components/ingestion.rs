//! Data ingestion: document store -> feature store CSV -> train/test CSVs.

use crate::artifact::DataIngestionArtifact;
use crate::data::{DataBatch, DocumentStore, documents_to_batch, write_csv};
use crate::error::{PipelineError, ResultExt};
use rand::prelude::*;
use std::sync::Arc;
use vinsure_core::DataIngestionConfig;

pub struct DataIngestion {
    config: DataIngestionConfig,
    store: Arc<dyn DocumentStore>,
}

impl DataIngestion {
    pub fn new(config: DataIngestionConfig, store: Arc<dyn DocumentStore>) -> Self {
        Self { config, store }
    }

    /// Read the whole configured collection and snapshot it to the feature store.
    pub async fn export_data_into_feature_store(&self) -> Result<DataBatch, PipelineError> {
        let collection = &self.config.collection_name;
        tracing::info!(store = self.store.kind(), collection = %collection, "Exporting collection");

        let documents = self
            .store
            .find_all(collection)
            .await
            .with_context(|| format!("reading collection '{collection}'"))?;
        if documents.is_empty() {
            return Err(PipelineError::ingestion(format!(
                "collection '{collection}' is empty"
            )));
        }

        let batch = documents_to_batch(&documents)?;
        let (rows, cols) = batch.shape();
        tracing::info!(rows, cols, "Fetched dataset");

        let path = &self.config.feature_store_file_path;
        write_csv(path, &batch)
            .with_context(|| format!("writing feature store {}", path.display()))?;
        tracing::info!(path = %path.display(), "Saved feature store snapshot");
        Ok(batch)
    }

    /// Randomly split `batch` and write both partitions.
    ///
    /// The test partition holds `ceil(rows * ratio)` rows. No stratification.
    pub fn split_data_as_train_test(
        &self,
        batch: &DataBatch,
    ) -> Result<(DataBatch, DataBatch), PipelineError> {
        let (train_idx, test_idx) = split_indices(
            batch.row_count(),
            self.config.train_test_split_ratio,
            self.config.random_state,
        )?;
        let train = batch.select_rows(&train_idx);
        let test = batch.select_rows(&test_idx);

        write_csv(&self.config.training_file_path, &train).context("writing train split")?;
        write_csv(&self.config.testing_file_path, &test).context("writing test split")?;

        tracing::info!(
            train_rows = train.row_count(),
            test_rows = test.row_count(),
            "Saved train and test splits"
        );
        Ok((train, test))
    }

    pub async fn initiate_data_ingestion(&self) -> Result<DataIngestionArtifact, PipelineError> {
        tracing::info!("Data ingestion started");
        let batch = self.export_data_into_feature_store().await?;
        self.split_data_as_train_test(&batch)?;

        let artifact = DataIngestionArtifact {
            trained_file_path: self.config.training_file_path.clone(),
            test_file_path: self.config.testing_file_path.clone(),
        };
        tracing::info!(?artifact, "Data ingestion completed");
        Ok(artifact)
    }
}

/// Permute `0..n_rows` and cut it into `(train, test)` index lists.
///
/// Test rows are the first `ceil(n_rows * ratio)` permuted indices. Seeded when
/// `seed` is set, otherwise drawn from entropy.
pub fn split_indices(
    n_rows: usize,
    ratio: f64,
    seed: Option<u64>,
) -> Result<(Vec<usize>, Vec<usize>), PipelineError> {
    if !(ratio > 0.0 && ratio < 1.0) {
        return Err(PipelineError::ingestion(format!(
            "train/test split ratio {ratio} is outside (0, 1)"
        )));
    }
    let n_test = (n_rows as f64 * ratio).ceil() as usize;
    let n_train = n_rows.saturating_sub(n_test);
    if n_test == 0 || n_train == 0 {
        return Err(PipelineError::ingestion(format!(
            "splitting {n_rows} rows at ratio {ratio} leaves {n_train} train and {n_test} test rows"
        )));
    }

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut order: Vec<usize> = (0..n_rows).collect();
    order.shuffle(&mut rng);

    let train = order.split_off(n_test);
    Ok((train, order))
}
