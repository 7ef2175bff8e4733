//! Edited Nearest Neighbours cleaning.

use super::neighbors::NeighborIndex;
use super::{ResampleResult, Sampler, check_shapes};
use crate::error::PipelineError;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Removes every row whose nearest neighbours do not all share its class.
///
/// All classes are cleaned. Neighbours are searched over the full table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditedNearestNeighbours {
    n_neighbors: usize,
}

impl EditedNearestNeighbours {
    pub fn new() -> Self {
        Self { n_neighbors: 3 }
    }

    pub fn with_n_neighbors(mut self, n: usize) -> Self {
        self.n_neighbors = n.max(1);
        self
    }
}

impl Default for EditedNearestNeighbours {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler for EditedNearestNeighbours {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<i64>) -> Result<(), PipelineError> {
        check_shapes(x, y)
    }

    fn resample(&self, x: &Array2<f64>, y: &Array1<i64>) -> Result<ResampleResult, PipelineError> {
        check_shapes(x, y)?;
        let n = x.nrows();
        if n < 2 {
            return Ok(ResampleResult {
                x: x.clone(),
                y: y.clone(),
                n_synthetic: 0,
                n_removed: 0,
            });
        }

        let k = self.n_neighbors.min(n - 1);
        let all: Vec<usize> = (0..n).collect();
        let index = NeighborIndex::build(x, &all)?;
        let mut keep = Vec::with_capacity(n);
        for i in 0..n {
            if index.query(x, i, k)?.into_iter().all(|j| y[j] == y[i]) {
                keep.push(i);
            }
        }

        let n_removed = n - keep.len();
        tracing::debug!(k, kept = keep.len(), removed = n_removed, "ENN cleaned");

        Ok(ResampleResult {
            x: x.select(Axis(0), &keep),
            y: y.select(Axis(0), &keep),
            n_synthetic: 0,
            n_removed,
        })
    }
}
