//! k-d tree backed nearest-neighbour queries over matrix rows.

use super::DistIdx;
use crate::error::PipelineError;
use kdtree::KdTree;
use kdtree::distance::squared_euclidean;
use ndarray::Array2;

/// Spatial index over a subset of the rows of one matrix.
///
/// Results match an exhaustive scan: closest first, ties towards the lower
/// row index, the query row excluded by index.
pub(crate) struct NeighborIndex {
    tree: KdTree<f64, usize, Vec<f64>>,
    len: usize,
}

impl NeighborIndex {
    /// Index the rows of `x` listed in `rows`.
    pub(crate) fn build(x: &Array2<f64>, rows: &[usize]) -> Result<Self, PipelineError> {
        if x.ncols() == 0 {
            return Err(PipelineError::resampling(
                "cannot search neighbours in a table without feature columns",
            ));
        }
        let mut tree = KdTree::new(x.ncols());
        for &i in rows {
            tree.add(x.row(i).to_vec(), i).map_err(index_error)?;
        }
        Ok(Self {
            tree,
            len: rows.len(),
        })
    }

    /// The `k` indexed rows nearest to row `query` of `x`.
    pub(crate) fn query(
        &self,
        x: &Array2<f64>,
        query: usize,
        k: usize,
    ) -> Result<Vec<usize>, PipelineError> {
        if k == 0 || self.len == 0 {
            return Ok(Vec::new());
        }
        let point = x.row(query).to_vec();
        let nearest = self
            .tree
            .nearest(&point, k + 1, &squared_euclidean)
            .map_err(index_error)?;

        let kth = nearest
            .iter()
            .filter(|&&(_, &i)| i != query)
            .map(|&(d, _)| d)
            .nth(k - 1);
        let Some(radius) = kth else {
            // Fewer than k other rows are indexed.
            return Ok(closest(nearest, query, k));
        };

        // The tree orders equal distances arbitrarily; widen to every row
        // as close as the k-th so ties resolve by index.
        let mut candidates = self
            .tree
            .within(&point, radius, &squared_euclidean)
            .map_err(index_error)?;
        candidates.extend(nearest);
        Ok(closest(candidates, query, k))
    }
}

fn closest(found: Vec<(f64, &usize)>, query: usize, k: usize) -> Vec<usize> {
    let mut found: Vec<DistIdx> = found
        .into_iter()
        .filter(|&(_, &i)| i != query)
        .map(|(d, &i)| DistIdx(d, i))
        .collect();
    found.sort();
    found.dedup_by_key(|entry| entry.1);
    found.into_iter().take(k).map(|DistIdx(_, i)| i).collect()
}

fn index_error(err: kdtree::ErrorKind) -> PipelineError {
    PipelineError::resampling(format!("neighbour index: {err}"))
}
