//! Principal component analysis via symmetric eigen-decomposition of the
//! sample covariance matrix.

use nalgebra::{DMatrix, SymmetricEigen};

use crate::{MlError, Result, matrix_width};

/// A fitted PCA with all components, sorted by explained variance.
#[derive(Debug, Clone)]
pub struct Pca {
    /// Unit-length principal axes, each of length `n_features`.
    pub components: Vec<Vec<f64>>,
    /// Eigenvalues (variance along each axis), descending.
    pub explained_variance: Vec<f64>,
    /// `explained_variance` normalized to sum to 1.
    pub explained_variance_ratio: Vec<f64>,
    /// Column means subtracted before projection.
    pub mean: Vec<f64>,
    /// Number of leading components retained by [`Pca::fit`].
    pub retained: usize,
}

impl Pca {
    /// Fits PCA and retains the leading components until their cumulative
    /// explained variance ratio reaches `threshold`, keeping at least
    /// `min_components` (capped at the number of features).
    ///
    /// Each axis is oriented so its largest-magnitude loading is positive,
    /// which makes projections reproducible across runs.
    ///
    /// # Errors
    ///
    /// * [`MlError::InsufficientData`] with fewer than two rows.
    /// * [`MlError::DegenerateInput`] if the data has no variance.
    /// * [`MlError::InvalidParameter`] if `threshold` is outside `(0, 1]`.
    #[allow(clippy::cast_precision_loss)]
    pub fn fit(rows: &[Vec<f64>], threshold: f64, min_components: usize) -> Result<Self> {
        let k = matrix_width(rows)?;
        let n = rows.len();
        if n < 2 {
            return Err(MlError::InsufficientData { needed: 2, got: n });
        }
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(MlError::InvalidParameter(format!(
                "variance threshold must be in (0, 1], got {threshold}"
            )));
        }

        let mean: Vec<f64> = (0..k)
            .map(|j| rows.iter().map(|r| r[j]).sum::<f64>() / n as f64)
            .collect();

        let mut centered = DMatrix::<f64>::zeros(n, k);
        for (i, row) in rows.iter().enumerate() {
            for (j, v) in row.iter().enumerate() {
                centered[(i, j)] = v - mean[j];
            }
        }
        let cov = centered.transpose() * &centered / (n as f64 - 1.0);

        let eigen = SymmetricEigen::new(cov);
        let mut order: Vec<usize> = (0..k).collect();
        order.sort_by(|&a, &b| {
            eigen.eigenvalues[b]
                .total_cmp(&eigen.eigenvalues[a])
                .then(a.cmp(&b))
        });

        let total: f64 = eigen.eigenvalues.iter().map(|v| v.max(0.0)).sum();
        if total <= 1e-12 {
            return Err(MlError::DegenerateInput(
                "feature matrix has zero variance".to_string(),
            ));
        }

        let mut components = Vec::with_capacity(k);
        let mut explained_variance = Vec::with_capacity(k);
        for &idx in &order {
            let mut axis: Vec<f64> = (0..k).map(|row| eigen.eigenvectors[(row, idx)]).collect();
            let pivot = axis
                .iter()
                .copied()
                .fold(0.0_f64, |best, v| if v.abs() > best.abs() + 1e-12 { v } else { best });
            if pivot < 0.0 {
                for v in &mut axis {
                    *v = -*v;
                }
            }
            components.push(axis);
            explained_variance.push(eigen.eigenvalues[idx].max(0.0));
        }
        let explained_variance_ratio: Vec<f64> =
            explained_variance.iter().map(|v| v / total).collect();

        let mut retained = 0;
        let mut cumulative = 0.0;
        for ratio in &explained_variance_ratio {
            if cumulative >= threshold - 1e-12 {
                break;
            }
            cumulative += ratio;
            retained += 1;
        }
        let retained = retained.max(min_components).min(k);

        log::debug!(
            "pca: {n} rows x {k} features, retaining {retained} component(s) \
             ({:.1}% variance)",
            explained_variance_ratio[..retained].iter().sum::<f64>() * 100.0
        );

        Ok(Self {
            components,
            explained_variance,
            explained_variance_ratio,
            mean,
            retained,
        })
    }

    /// Cumulative explained variance ratio after each component.
    #[must_use]
    pub fn cumulative_ratio(&self) -> Vec<f64> {
        self.explained_variance_ratio
            .iter()
            .scan(0.0, |acc, r| {
                *acc += r;
                Some(*acc)
            })
            .collect()
    }

    /// Projects `row` onto the first `n_components` axes.
    #[must_use]
    pub fn project(&self, row: &[f64], n_components: usize) -> Vec<f64> {
        self.components
            .iter()
            .take(n_components)
            .map(|axis| {
                axis.iter()
                    .zip(row.iter().zip(&self.mean))
                    .map(|(a, (v, m))| a * (v - m))
                    .sum()
            })
            .collect()
    }

    /// Projects every row onto the retained components.
    #[must_use]
    pub fn transform(&self, rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
        rows.iter().map(|r| self.project(r, self.retained)).collect()
    }
}
