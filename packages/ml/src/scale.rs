//! Column standardization.

use crate::{Result, matrix_width};

/// Per-column z-score transform fitted on a matrix.
///
/// Uses the population standard deviation. Columns without variance map to
/// zero instead of dividing by zero.
#[derive(Debug, Clone, PartialEq)]
pub struct Standardizer {
    means: Vec<f64>,
    stds: Vec<f64>,
}

impl Standardizer {
    /// Fits column means and deviations.
    ///
    /// # Errors
    ///
    /// Returns an error if `rows` is empty or ragged.
    #[allow(clippy::cast_precision_loss)]
    pub fn fit(rows: &[Vec<f64>]) -> Result<Self> {
        let width = matrix_width(rows)?;
        let n = rows.len() as f64;
        let means: Vec<f64> = (0..width)
            .map(|j| rows.iter().map(|r| r[j]).sum::<f64>() / n)
            .collect();
        let stds = (0..width)
            .map(|j| {
                (rows.iter().map(|r| (r[j] - means[j]).powi(2)).sum::<f64>() / n).sqrt()
            })
            .collect();
        Ok(Self { means, stds })
    }

    /// Applies the transform to `rows`.
    #[must_use]
    pub fn transform(&self, rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
        rows.iter()
            .map(|row| {
                row.iter()
                    .zip(self.means.iter().zip(&self.stds))
                    .map(|(v, (m, s))| if *s > 1e-12 { (v - m) / s } else { 0.0 })
                    .collect()
            })
            .collect()
    }

    /// Columns whose deviation is zero.
    #[must_use]
    pub fn constant_columns(&self) -> Vec<usize> {
        self.stds
            .iter()
            .enumerate()
            .filter(|(_, s)| **s <= 1e-12)
            .map(|(j, _)| j)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn standardizes_columns() {
        let rows = vec![vec![1.0, 5.0], vec![3.0, 5.0]];
        let scaler = Standardizer::fit(&rows).unwrap();
        let z = scaler.transform(&rows);
        assert_relative_eq!(z[0][0], -1.0);
        assert_relative_eq!(z[1][0], 1.0);
        assert_relative_eq!(z[0][1], 0.0);
        assert_eq!(scaler.constant_columns(), vec![1]);
    }

    #[test]
    fn rejects_ragged_matrix() {
        assert!(Standardizer::fit(&[vec![1.0], vec![1.0, 2.0]]).is_err());
        assert!(Standardizer::fit(&[]).is_err());
    }
}
