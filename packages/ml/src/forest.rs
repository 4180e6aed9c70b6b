//! Bagged regression trees (random forest).

use rand::{Rng as _, SeedableRng as _};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use crate::tree::{RegressionTree, TreeParams, normalize};
use crate::{MlError, Result, matrix_width};

/// Random forest hyper-parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    /// Features per split; `None` uses `ceil(sqrt(n_features))`.
    pub max_features: Option<usize>,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 200,
            max_depth: 10,
            min_samples_split: 5,
            max_features: None,
            seed: 42,
        }
    }
}

/// A fitted random forest.
#[derive(Debug, Clone)]
pub struct RandomForest {
    trees: Vec<RegressionTree>,
    n_features: usize,
}

impl RandomForest {
    /// Fits `params.n_trees` trees on bootstrap resamples of `(x, y)`.
    ///
    /// Tree `i` draws from its own ChaCha stream seeded with
    /// `params.seed + i`, so the forest is identical whether trees are
    /// grown sequentially or in parallel.
    ///
    /// # Errors
    ///
    /// Returns an error if the inputs are empty, ragged or mismatched, or
    /// `n_trees` is zero.
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn fit(x: &[Vec<f64>], y: &[f64], params: &ForestParams) -> Result<Self> {
        let n_features = matrix_width(x)?;
        if y.len() != x.len() {
            return Err(MlError::DimensionMismatch {
                expected: x.len(),
                got: y.len(),
            });
        }
        if params.n_trees == 0 {
            return Err(MlError::InvalidParameter(
                "forest needs at least one tree".to_string(),
            ));
        }

        let max_features = params
            .max_features
            .unwrap_or_else(|| (n_features as f64).sqrt().ceil() as usize)
            .clamp(1, n_features.max(1));
        let tree_params = TreeParams {
            max_depth: params.max_depth,
            min_samples_split: params.min_samples_split,
            min_samples_leaf: 1,
            max_features: Some(max_features),
        };
        let n = x.len();

        let trees = (0..params.n_trees)
            .into_par_iter()
            .map(|i| {
                let mut rng = ChaCha8Rng::seed_from_u64(params.seed.wrapping_add(i as u64));
                let samples: Vec<usize> = (0..n).map(|_| rng.random_range(0..n)).collect();
                RegressionTree::fit(x, y, &samples, &tree_params, &mut rng)
            })
            .collect::<Result<Vec<_>>>()?;

        log::debug!(
            "random forest: {} trees, {n} rows, {max_features}/{n_features} features per split",
            trees.len()
        );

        Ok(Self { trees, n_features })
    }

    /// Mean prediction over all trees.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>() / self.trees.len() as f64
    }

    /// Predicts every row.
    #[must_use]
    pub fn predict(&self, rows: &[Vec<f64>]) -> Vec<f64> {
        rows.iter().map(|r| self.predict_row(r)).collect()
    }

    /// Mean of the per-tree normalized impurity importances, renormalized
    /// to sum to 1 (all zeros if no tree ever split).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn feature_importances(&self) -> Vec<f64> {
        let mut sum = vec![0.0; self.n_features];
        for tree in &self.trees {
            for (s, w) in sum.iter_mut().zip(tree.normalized_importances()) {
                *s += w;
            }
        }
        normalize(&sum)
    }
}
