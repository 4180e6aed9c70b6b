//! Gradient-boosted regression trees with squared-error loss.

use rand::SeedableRng as _;
use rand_chacha::ChaCha8Rng;

use crate::tree::{RegressionTree, TreeParams, normalize};
use crate::{MlError, Result, matrix_width};

/// Boosting hyper-parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoostingParams {
    pub n_stages: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_samples_split: usize,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            n_stages: 200,
            learning_rate: 0.05,
            max_depth: 5,
            min_samples_split: 2,
        }
    }
}

/// A fitted boosting ensemble.
#[derive(Debug, Clone)]
pub struct GradientBoosting {
    init: f64,
    learning_rate: f64,
    stages: Vec<RegressionTree>,
    n_features: usize,
}

impl GradientBoosting {
    /// Fits stages sequentially, each on the residuals of the ensemble so
    /// far. Starts from the target mean.
    ///
    /// # Errors
    ///
    /// Returns an error if the inputs are empty, ragged or mismatched, or
    /// the learning rate is not in `(0, 1]`.
    #[allow(clippy::cast_precision_loss)]
    pub fn fit(x: &[Vec<f64>], y: &[f64], params: &BoostingParams) -> Result<Self> {
        let n_features = matrix_width(x)?;
        if y.len() != x.len() {
            return Err(MlError::DimensionMismatch {
                expected: x.len(),
                got: y.len(),
            });
        }
        if !(params.learning_rate > 0.0 && params.learning_rate <= 1.0) {
            return Err(MlError::InvalidParameter(format!(
                "learning rate must be in (0, 1], got {}",
                params.learning_rate
            )));
        }

        let init = y.iter().sum::<f64>() / y.len() as f64;
        let mut current = vec![init; y.len()];
        let samples: Vec<usize> = (0..y.len()).collect();
        let tree_params = TreeParams {
            max_depth: params.max_depth,
            min_samples_split: params.min_samples_split,
            min_samples_leaf: 1,
            max_features: None,
        };
        // Never consulted: every split examines all features.
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let mut stages = Vec::with_capacity(params.n_stages);
        for _ in 0..params.n_stages {
            let residuals: Vec<f64> = y.iter().zip(&current).map(|(t, p)| t - p).collect();
            let tree = RegressionTree::fit(x, &residuals, &samples, &tree_params, &mut rng)?;
            if tree.node_count() == 1 {
                // Residuals are constant; nothing left to learn.
                break;
            }
            for (p, row) in current.iter_mut().zip(x) {
                *p += params.learning_rate * tree.predict_row(row);
            }
            stages.push(tree);
        }

        log::debug!("gradient boosting: {} stage(s) on {} rows", stages.len(), y.len());

        Ok(Self {
            init,
            learning_rate: params.learning_rate,
            stages,
            n_features,
        })
    }

    /// Predicts a single row.
    #[must_use]
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        self.init
            + self
                .stages
                .iter()
                .map(|t| self.learning_rate * t.predict_row(row))
                .sum::<f64>()
    }

    /// Predicts every row.
    #[must_use]
    pub fn predict(&self, rows: &[Vec<f64>]) -> Vec<f64> {
        rows.iter().map(|r| self.predict_row(r)).collect()
    }

    /// Mean of per-stage normalized importances, renormalized to sum to 1.
    #[must_use]
    pub fn feature_importances(&self) -> Vec<f64> {
        let mut sum = vec![0.0; self.n_features];
        for tree in &self.stages {
            for (s, w) in sum.iter_mut().zip(tree.normalized_importances()) {
                *s += w;
            }
        }
        normalize(&sum)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn fits_smooth_target() {
        let x: Vec<Vec<f64>> = (0..40).map(|i| vec![f64::from(i), f64::from(i % 4)]).collect();
        let y: Vec<f64> = x.iter().map(|r| 10.0 + 2.0 * r[0]).collect();
        let model = GradientBoosting::fit(&x, &y, &BoostingParams::default()).unwrap();
        for (row, target) in x.iter().zip(&y) {
            assert_relative_eq!(model.predict_row(row), *target, epsilon = 2.0);
        }
        let imp = model.feature_importances();
        assert_relative_eq!(imp.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
        assert!(imp[0] > imp[1]);
    }

    #[test]
    fn constant_target_has_no_stages() {
        let x: Vec<Vec<f64>> = (0..10).map(|i| vec![f64::from(i)]).collect();
        let model = GradientBoosting::fit(&x, &[3.0; 10], &BoostingParams::default()).unwrap();
        assert_relative_eq!(model.predict_row(&[100.0]), 3.0);
        assert_eq!(model.feature_importances(), vec![0.0]);
    }

    #[test]
    fn rejects_bad_learning_rate() {
        let params = BoostingParams {
            learning_rate: 0.0,
            ..BoostingParams::default()
        };
        assert!(GradientBoosting::fit(&[vec![1.0]], &[1.0], &params).is_err());
    }
}
