//! SMOTE over-sampling followed by ENN cleaning.

use super::{EditedNearestNeighbours, ResampleResult, Sampler, Smote, class_counts};
use crate::error::PipelineError;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmoteEnn {
    smote: Smote,
    enn: EditedNearestNeighbours,
}

impl SmoteEnn {
    pub fn new(smote: Smote, enn: EditedNearestNeighbours) -> Self {
        Self { smote, enn }
    }

    /// Minority-only SMOTE with `k_neighbors`, then ENN over `enn_neighbors`.
    pub fn minority(k_neighbors: usize, enn_neighbors: usize, seed: Option<u64>) -> Self {
        Self::new(
            Smote::new().with_k_neighbors(k_neighbors).with_seed(seed),
            EditedNearestNeighbours::new().with_n_neighbors(enn_neighbors),
        )
    }
}

impl Sampler for SmoteEnn {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<i64>) -> Result<(), PipelineError> {
        self.smote.fit(x, y)
    }

    fn resample(&self, x: &Array2<f64>, y: &Array1<i64>) -> Result<ResampleResult, PipelineError> {
        let over = self.smote.resample(x, y)?;
        let cleaned = self.enn.resample(&over.x, &over.y)?;

        tracing::info!(
            before = ?class_counts(y),
            after = ?class_counts(&cleaned.y),
            synthetic = over.n_synthetic,
            removed = cleaned.n_removed,
            "SMOTE-ENN resampled"
        );

        Ok(ResampleResult {
            n_synthetic: over.n_synthetic,
            ..cleaned
        })
    }
}
