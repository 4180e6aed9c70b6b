//! Parametric two-sample comparison.

use crate::descriptive::{mean, variance};
use crate::distribution::student_t_two_sided_p;
use crate::{Result, StatsError};

/// Welch's unequal-variance t-test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WelchTest {
    pub t: f64,
    pub df: f64,
    pub p_value: f64,
}

fn require_two(a: &[f64], b: &[f64]) -> Result<()> {
    let got = a.len().min(b.len());
    if got < 2 {
        return Err(StatsError::InsufficientData { needed: 2, got });
    }
    Ok(())
}

/// Two-sided Welch t-test of `mean(a) == mean(b)`.
///
/// # Errors
///
/// * [`StatsError::InsufficientData`] if either sample has fewer than two
///   values.
/// * [`StatsError::DegenerateInput`] if both samples are constant.
#[allow(clippy::cast_precision_loss)]
pub fn welch_t_test(a: &[f64], b: &[f64]) -> Result<WelchTest> {
    require_two(a, b)?;
    let n1 = a.len() as f64;
    let n2 = b.len() as f64;
    let se1 = variance(a) / n1;
    let se2 = variance(b) / n2;
    let se = se1 + se2;
    if se <= 0.0 {
        return Err(StatsError::DegenerateInput(
            "both samples are constant".to_string(),
        ));
    }

    let t = (mean(a) - mean(b)) / se.sqrt();
    let df = se * se / (se1 * se1 / (n1 - 1.0) + se2 * se2 / (n2 - 1.0));

    Ok(WelchTest {
        t,
        df,
        p_value: student_t_two_sided_p(t, df),
    })
}

/// Cohen's d using the pooled standard deviation.
///
/// # Errors
///
/// * [`StatsError::InsufficientData`] if either sample has fewer than two
///   values.
/// * [`StatsError::DegenerateInput`] if the pooled deviation is zero.
#[allow(clippy::cast_precision_loss)]
pub fn cohens_d(a: &[f64], b: &[f64]) -> Result<f64> {
    require_two(a, b)?;
    let n1 = a.len() as f64;
    let n2 = b.len() as f64;
    let pooled =
        (((n1 - 1.0) * variance(a) + (n2 - 1.0) * variance(b)) / (n1 + n2 - 2.0)).sqrt();
    if pooled <= 0.0 {
        return Err(StatsError::DegenerateInput(
            "pooled standard deviation is zero".to_string(),
        ));
    }
    Ok((mean(a) - mean(b)) / pooled)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn welch_matches_reference() {
        let a = [27.5, 21.0, 19.0, 23.6, 17.0, 17.9, 16.9, 20.1, 21.9, 22.6, 23.1, 19.6, 19.0, 21.7, 21.4];
        let b = [27.1, 22.0, 20.8, 23.4, 23.4, 23.5, 25.8, 22.0, 24.8, 20.2, 21.9, 22.1, 22.9, 20.5, 24.4];
        let r = welch_t_test(&a, &b).unwrap();
        assert_relative_eq!(r.t, -2.455_356, epsilon = 1e-5);
        assert_relative_eq!(r.df, 24.988_53, epsilon = 1e-4);
        assert_relative_eq!(r.p_value, 0.021_378, epsilon = 1e-5);
    }

    #[test]
    fn cohens_d_of_shifted_samples() {
        let a = [1.0, 2.0, 3.0, 4.0, 5.0];
        let b = [2.0, 3.0, 4.0, 5.0, 6.0];
        // pooled sd = sqrt(2.5)
        assert_relative_eq!(cohens_d(&a, &b).unwrap(), -1.0 / 2.5_f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn constant_samples_are_degenerate() {
        assert!(matches!(
            welch_t_test(&[1.0, 1.0], &[1.0, 1.0]),
            Err(StatsError::DegenerateInput(_))
        ));
        assert!(matches!(
            cohens_d(&[1.0], &[1.0, 2.0]),
            Err(StatsError::InsufficientData { needed: 2, got: 1 })
        ));
    }
}
