//! SMOTE over-sampling of the minority class.

use super::neighbors::NeighborIndex;
use super::{ResampleResult, Sampler, check_shapes, class_counts, class_indices};
use crate::error::PipelineError;
use ndarray::{Array1, Array2};
use rand::prelude::*;
use serde::{Deserialize, Serialize};

/// Target fixed at fit time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct MinorityTarget {
    class: i64,
    n_to_generate: usize,
}

/// SMOTE (Synthetic Minority Over-sampling Technique)
///
/// Raises the least frequent class to the size of the most frequent one by
/// interpolating between each chosen minority row and one of its `k` nearest
/// minority neighbours.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Smote {
    /// Number of nearest neighbors
    k_neighbors: usize,
    /// Random seed
    seed: Option<u64>,
    target: Option<MinorityTarget>,
}

impl Smote {
    pub fn new() -> Self {
        Self {
            k_neighbors: 5,
            seed: None,
            target: None,
        }
    }

    pub fn with_k_neighbors(mut self, k: usize) -> Self {
        self.k_neighbors = k.max(1);
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Generate synthetic sample between two rows
    fn generate_sample(
        x: &Array2<f64>,
        point: usize,
        neighbor: usize,
        rng: &mut StdRng,
    ) -> Vec<f64> {
        let gap: f64 = rng.gen_range(0.0..1.0);
        x.row(point)
            .iter()
            .zip(x.row(neighbor).iter())
            .map(|(&p, &n)| p + gap * (n - p))
            .collect()
    }
}

impl Default for Smote {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler for Smote {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<i64>) -> Result<(), PipelineError> {
        check_shapes(x, y)?;
        let counts = class_counts(y);
        if counts.len() < 2 {
            return Err(PipelineError::resampling(format!(
                "SMOTE needs at least 2 classes, found {}",
                counts.len()
            )));
        }

        // Ties resolve to the lowest label.
        let mut minority = (i64::MAX, usize::MAX);
        let mut max_count = 0;
        for (&class, &count) in &counts {
            if count < minority.1 {
                minority = (class, count);
            }
            max_count = max_count.max(count);
        }

        if minority.1 < 2 {
            return Err(PipelineError::resampling(format!(
                "minority class {} has {} sample(s); SMOTE needs at least 2",
                minority.0, minority.1
            )));
        }

        self.target = Some(MinorityTarget {
            class: minority.0,
            n_to_generate: max_count - minority.1,
        });
        Ok(())
    }

    fn resample(&self, x: &Array2<f64>, y: &Array1<i64>) -> Result<ResampleResult, PipelineError> {
        check_shapes(x, y)?;
        let target = self
            .target
            .ok_or_else(|| PipelineError::resampling("SMOTE not fitted"))?;

        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let indices = class_indices(y);
        let class_idx = indices.get(&target.class).cloned().unwrap_or_default();
        if target.n_to_generate > 0 && class_idx.len() < 2 {
            return Err(PipelineError::resampling(format!(
                "class {} has {} sample(s) in the data being resampled",
                target.class,
                class_idx.len()
            )));
        }

        let k = self.k_neighbors.min(class_idx.len().saturating_sub(1));
        let n_features = x.ncols();
        let mut synthetic: Vec<f64> = Vec::with_capacity(target.n_to_generate * n_features);
        if target.n_to_generate > 0 {
            let index = NeighborIndex::build(x, &class_idx)?;
            let mut neighbor_cache: Vec<Option<Vec<usize>>> = vec![None; class_idx.len()];
            for _ in 0..target.n_to_generate {
                let pick = rng.gen_range(0..class_idx.len());
                let point = class_idx[pick];
                if neighbor_cache[pick].is_none() {
                    neighbor_cache[pick] = Some(index.query(x, point, k)?);
                }
                let neighbors = neighbor_cache[pick].as_deref().unwrap_or(&[]);
                let neighbor = neighbors[rng.gen_range(0..neighbors.len())];
                synthetic.extend(Self::generate_sample(x, point, neighbor, &mut rng));
            }
        }

        let n_original = x.nrows();
        let synthetic = Array2::from_shape_vec((target.n_to_generate, n_features), synthetic)?;
        let result_x = ndarray::concatenate(ndarray::Axis(0), &[x.view(), synthetic.view()])?;

        let mut all_y: Vec<i64> = y.iter().copied().collect();
        all_y.extend(std::iter::repeat_n(target.class, target.n_to_generate));

        tracing::debug!(
            minority = target.class,
            k,
            original = n_original,
            synthetic = target.n_to_generate,
            "SMOTE resampled"
        );

        Ok(ResampleResult {
            x: result_x,
            y: Array1::from_vec(all_y),
            n_synthetic: target.n_to_generate,
            n_removed: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn create_imbalanced_data() -> (Array2<f64>, Array1<i64>) {
        // 20 majority around (0, 0), 5 minority around (10, 10)
        let mut data = Vec::new();
        let mut labels = Vec::new();

        for i in 0..20 {
            data.push((i % 5) as f64);
            data.push((i / 5) as f64);
            labels.push(0i64);
        }
        for i in 0..5 {
            data.push(10.0 + (i % 3) as f64);
            data.push(10.0 + (i / 3) as f64);
            labels.push(1i64);
        }

        (
            Array2::from_shape_vec((25, 2), data).unwrap(),
            Array1::from_vec(labels),
        )
    }

    #[test]
    fn test_smote_balances_classes() {
        let (x, y) = create_imbalanced_data();
        let mut smote = Smote::new().with_k_neighbors(3).with_seed(Some(42));
        let result = smote.fit_resample(&x, &y).unwrap();

        assert_eq!(result.n_synthetic, 15);
        assert_eq!(result.x.nrows(), 40);
        let counts = class_counts(&result.y);
        assert_eq!(counts[&0], 20);
        assert_eq!(counts[&1], 20);
    }

    #[test]
    fn test_smote_preserves_original_then_appends() {
        let (x, y) = create_imbalanced_data();
        let mut smote = Smote::new().with_seed(Some(7));
        let result = smote.fit_resample(&x, &y).unwrap();

        assert_eq!(result.x.slice(ndarray::s![..25, ..]), x);
        for row in 25..result.x.nrows() {
            assert_eq!(result.y[row], 1);
            // Synthetic rows stay inside the minority bounding box.
            for &v in result.x.row(row) {
                assert!((10.0..=12.0).contains(&v), "{v} outside minority region");
            }
        }
    }

    #[test]
    fn test_smote_is_deterministic_with_seed() {
        let (x, y) = create_imbalanced_data();
        let a = Smote::new().with_seed(Some(3)).fit_resample(&x, &y).unwrap();
        let b = Smote::new().with_seed(Some(3)).fit_resample(&x, &y).unwrap();
        assert_eq!(a.x, b.x);
    }

    #[test]
    fn test_smote_two_minority_rows() {
        let x = Array2::from_shape_vec((5, 1), vec![0.0, 1.0, 2.0, 8.0, 9.0]).unwrap();
        let y = Array1::from_vec(vec![0, 0, 0, 1, 1]);
        let result = Smote::new().with_seed(Some(1)).fit_resample(&x, &y).unwrap();
        assert_eq!(result.x.nrows(), 6);
        assert!((8.0..=9.0).contains(&result.x[[5, 0]]));
    }

    #[test]
    fn test_smote_duplicate_minority_rows() {
        // Identical minority rows are still each other's neighbours.
        let x = Array2::from_shape_vec((5, 1), vec![0.0, 1.0, 2.0, 5.0, 5.0]).unwrap();
        let y = Array1::from_vec(vec![0, 0, 0, 1, 1]);
        let result = Smote::new().with_seed(Some(1)).fit_resample(&x, &y).unwrap();
        assert_eq!(result.n_synthetic, 1);
        assert_eq!(result.x[[5, 0]], 5.0);
    }

    #[test]
    fn test_smote_balanced_input_is_unchanged() {
        let x = Array2::from_shape_vec((4, 1), vec![0.0, 1.0, 5.0, 6.0]).unwrap();
        let y = Array1::from_vec(vec![0, 0, 1, 1]);
        let result = Smote::new().fit_resample(&x, &y).unwrap();
        assert_eq!(result.n_synthetic, 0);
        assert_eq!(result.x, x);
    }

    #[test]
    fn test_smote_errors() {
        let x = Array2::<f64>::zeros((3, 1));
        let single_class = Array1::from_vec(vec![1, 1, 1]);
        let err = Smote::new().fit(&x, &single_class).unwrap_err();
        assert!(err.to_string().contains("at least 2 classes"));

        let lone_minority = Array1::from_vec(vec![0, 0, 1]);
        let err = Smote::new().fit(&x, &lone_minority).unwrap_err();
        assert!(err.to_string().contains("needs at least 2"));

        assert!(Smote::new().resample(&x, &lone_minority).is_err());
    }
}
