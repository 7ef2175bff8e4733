//! Class rebalancing for the transformed splits.
//!
//! - SMOTE over-sampling of the minority class
//! - Edited Nearest Neighbours cleaning
//! - SMOTE followed by ENN

mod enn;
mod neighbors;
mod smote;
mod smote_enn;

pub use enn::EditedNearestNeighbours;
pub use smote::Smote;
pub use smote_enn::SmoteEnn;

use crate::error::PipelineError;
use ndarray::{Array1, Array2};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Result of resampling
#[derive(Debug, Clone)]
pub struct ResampleResult {
    /// Resampled features
    pub x: Array2<f64>,
    /// Resampled labels
    pub y: Array1<i64>,
    /// Rows generated by over-sampling
    pub n_synthetic: usize,
    /// Rows dropped by cleaning
    pub n_removed: usize,
}

/// Trait for samplers
pub trait Sampler: Send + Sync {
    /// Fit the sampler on data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<i64>) -> Result<(), PipelineError>;

    /// Resample data
    fn resample(&self, x: &Array2<f64>, y: &Array1<i64>) -> Result<ResampleResult, PipelineError>;

    /// Fit and resample in one step
    fn fit_resample(
        &mut self,
        x: &Array2<f64>,
        y: &Array1<i64>,
    ) -> Result<ResampleResult, PipelineError> {
        self.fit(x, y)?;
        self.resample(x, y)
    }
}

/// Class distribution, ordered by label.
pub fn class_counts(y: &Array1<i64>) -> BTreeMap<i64, usize> {
    let mut counts = BTreeMap::new();
    for &label in y.iter() {
        *counts.entry(label).or_insert(0) += 1;
    }
    counts
}

/// Row indices for each class, ordered by label.
pub fn class_indices(y: &Array1<i64>) -> BTreeMap<i64, Vec<usize>> {
    let mut indices = BTreeMap::new();
    for (i, &label) in y.iter().enumerate() {
        indices.entry(label).or_insert_with(Vec::new).push(i);
    }
    indices
}

fn check_shapes(x: &Array2<f64>, y: &Array1<i64>) -> Result<(), PipelineError> {
    if x.nrows() != y.len() {
        return Err(PipelineError::resampling(format!(
            "{} feature rows but {} labels",
            x.nrows(),
            y.len()
        )));
    }
    Ok(())
}

/// Distance and row index, ordered by distance then index.
#[derive(Debug, Clone, Copy)]
struct DistIdx(f64, usize);

impl PartialEq for DistIdx {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for DistIdx {}
impl PartialOrd for DistIdx {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for DistIdx {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .partial_cmp(&other.0)
            .unwrap_or(Ordering::Equal)
            .then(self.1.cmp(&other.1))
    }
}
