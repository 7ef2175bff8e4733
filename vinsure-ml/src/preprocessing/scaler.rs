//! Column-wise scaling of feature tables into numeric matrices.

use crate::data::DataBatch;
use crate::error::PipelineError;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;

/// Bumped whenever the serialized layout of [`ColumnTransformer`] changes.
pub const PREPROCESSOR_FORMAT_VERSION: u32 = 1;

/// Type of scaler applied to a block of columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalerType {
    /// Standard scaling (z-score normalization): (x - mean) / std
    Standard,
    /// Min-Max scaling: (x - min) / (max - min)
    MinMax,
}

impl ScalerType {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Standard => "StandardScaler",
            Self::MinMax => "MinMaxScaler",
        }
    }
}

/// Parameters for one fitted column: output is `(x - center) / scale`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct ScalerParams {
    center: f64, // mean or min
    scale: f64,  // population std or range
}

/// A scaler bound to a named list of columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerBlock {
    pub scaler_type: ScalerType,
    pub columns: Vec<String>,
    params: Vec<ScalerParams>,
}

/// Fitted column transformer.
///
/// Scaler blocks run in declaration order; every remaining input column passes
/// through unchanged in input order. Output columns are the block columns
/// followed by the passthrough columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnTransformer {
    blocks: Vec<ScalerBlock>,
    feature_names_in: Vec<String>,
    passthrough: Vec<String>,
    is_fitted: bool,
}

/// On-disk wrapper carrying the format version.
#[derive(Serialize, Deserialize)]
struct StoredTransformer {
    format_version: u32,
    transformer: ColumnTransformer,
}

impl Default for ColumnTransformer {
    fn default() -> Self {
        Self::new()
    }
}

impl ColumnTransformer {
    pub fn new() -> Self {
        Self {
            blocks: Vec::new(),
            feature_names_in: Vec::new(),
            passthrough: Vec::new(),
            is_fitted: false,
        }
    }

    /// Add a scaler over `columns`. Empty column lists are ignored.
    pub fn with_scaler(mut self, scaler_type: ScalerType, columns: &[String]) -> Self {
        if !columns.is_empty() {
            self.blocks.push(ScalerBlock {
                scaler_type,
                columns: columns.to_vec(),
                params: Vec::new(),
            });
        }
        self
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    pub fn blocks(&self) -> &[ScalerBlock] {
        &self.blocks
    }

    /// Output column names, prefixed with the producing block.
    pub fn feature_names_out(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .blocks
            .iter()
            .flat_map(|b| {
                b.columns
                    .iter()
                    .map(move |c| format!("{}__{c}", b.scaler_type.label()))
            })
            .collect();
        names.extend(self.passthrough.iter().map(|c| format!("remainder__{c}")));
        names
    }

    /// Fit every block on `batch` and record the input layout.
    pub fn fit(&mut self, batch: &DataBatch) -> Result<&mut Self, PipelineError> {
        if batch.row_count() == 0 {
            return Err(PipelineError::transformation(
                "cannot fit preprocessor on an empty table",
            ));
        }

        let mut claimed = HashSet::new();
        for block in &self.blocks {
            for column in &block.columns {
                batch.require_column(column)?;
                if !claimed.insert(column.as_str()) {
                    return Err(PipelineError::transformation(format!(
                        "column '{column}' is assigned to more than one scaler"
                    )));
                }
            }
        }

        let mut fitted_blocks = Vec::with_capacity(self.blocks.len());
        for block in &self.blocks {
            let mut params = Vec::with_capacity(block.columns.len());
            for column in &block.columns {
                let values = numeric_column(batch, column)?;
                params.push(compute_params(block.scaler_type, &values));
            }
            fitted_blocks.push(ScalerBlock {
                params,
                ..block.clone()
            });
        }

        self.passthrough = batch
            .columns
            .iter()
            .filter(|c| !claimed.contains(c.as_str()))
            .cloned()
            .collect();
        let n_scaled = claimed.len();
        self.blocks = fitted_blocks;
        self.feature_names_in = batch.columns.clone();
        self.is_fitted = true;

        tracing::debug!(
            inputs = self.feature_names_in.len(),
            scaled = n_scaled,
            passthrough = self.passthrough.len(),
            "Preprocessor fitted"
        );
        Ok(self)
    }

    /// Transform `batch` into a `(rows, outputs)` matrix.
    ///
    /// The batch must carry exactly the columns seen at fit time, in the same order.
    pub fn transform(&self, batch: &DataBatch) -> Result<Array2<f64>, PipelineError> {
        if !self.is_fitted {
            return Err(PipelineError::NotFitted);
        }
        if batch.columns != self.feature_names_in {
            return Err(PipelineError::transformation(format!(
                "input columns {:?} do not match fitted columns {:?}",
                batch.columns, self.feature_names_in
            )));
        }

        let n_rows = batch.row_count();
        let mut outputs: Vec<Vec<f64>> = Vec::new();
        for block in &self.blocks {
            for (column, params) in block.columns.iter().zip(&block.params) {
                let values = numeric_column(batch, column)?;
                outputs.push(
                    values
                        .into_iter()
                        .map(|x| (x - params.center) / params.scale)
                        .collect(),
                );
            }
        }
        for column in &self.passthrough {
            outputs.push(numeric_column(batch, column)?);
        }

        let n_cols = outputs.len();
        let mut data = Vec::with_capacity(n_rows * n_cols);
        for row in 0..n_rows {
            data.extend(outputs.iter().map(|col| col[row]));
        }
        Ok(Array2::from_shape_vec((n_rows, n_cols), data)?)
    }

    pub fn fit_transform(&mut self, batch: &DataBatch) -> Result<Array2<f64>, PipelineError> {
        self.fit(batch)?;
        self.transform(batch)
    }

    /// Serialize the fitted transformer with bincode, replacing any existing file.
    pub fn save(&self, path: &Path) -> Result<(), PipelineError> {
        if !self.is_fitted {
            return Err(PipelineError::NotFitted);
        }
        let stored = StoredTransformer {
            format_version: PREPROCESSOR_FORMAT_VERSION,
            transformer: self.clone(),
        };
        let bytes = bincode::serialize(&stored)?;
        vinsure_core::persistence::atomic_write(path, &bytes)?;
        tracing::debug!(path = %path.display(), bytes = bytes.len(), "Preprocessor saved");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let bytes = std::fs::read(path)?;
        let stored: StoredTransformer = bincode::deserialize(&bytes)?;
        if stored.format_version != PREPROCESSOR_FORMAT_VERSION {
            return Err(PipelineError::invalid_artifact(format!(
                "{} has preprocessor format {}, expected {}",
                path.display(),
                stored.format_version,
                PREPROCESSOR_FORMAT_VERSION
            )));
        }
        Ok(stored.transformer)
    }
}

fn compute_params(scaler_type: ScalerType, values: &[f64]) -> ScalerParams {
    let n = values.len() as f64;
    match scaler_type {
        ScalerType::Standard => {
            let mean = values.iter().sum::<f64>() / n;
            let var = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
            let std = var.sqrt();
            ScalerParams {
                center: mean,
                scale: if std == 0.0 { 1.0 } else { std },
            }
        }
        ScalerType::MinMax => {
            let min = values.iter().copied().fold(f64::INFINITY, f64::min);
            let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let range = max - min;
            ScalerParams {
                center: min,
                scale: if range == 0.0 { 1.0 } else { range },
            }
        }
    }
}

/// Read a column as `f64`. Booleans become 1/0; nulls and strings are rejected.
fn numeric_column(batch: &DataBatch, column: &str) -> Result<Vec<f64>, PipelineError> {
    let idx = batch.require_column(column)?;
    batch
        .column_values(idx)
        .enumerate()
        .map(|(row, value)| cell_to_f64(value).ok_or_else(|| non_numeric(column, row, value)))
        .collect()
}

pub(crate) fn cell_to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn non_numeric(column: &str, row: usize, value: &Value) -> PipelineError {
    PipelineError::transformation(format!(
        "column '{column}' row {row}: {value} is not numeric"
    ))
}
