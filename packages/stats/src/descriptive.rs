//! Moments, order statistics and five-number summaries.

/// Arithmetic mean. `NaN` for an empty slice.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample variance (n-1 denominator). `NaN` for fewer than two values.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64
}

/// Population variance (n denominator). `NaN` for an empty slice.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn population_variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64
}

/// Sample standard deviation.
#[must_use]
pub fn std_dev(values: &[f64]) -> f64 {
    variance(values).sqrt()
}

/// Population standard deviation.
#[must_use]
pub fn population_std(values: &[f64]) -> f64 {
    population_variance(values).sqrt()
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted
}

/// Quantile with linear interpolation between closest ranks.
///
/// `q` is clamped to `[0, 1]`. `NaN` for an empty slice.
#[must_use]
pub fn quantile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    quantile_sorted(&sorted(values), q)
}

/// Same as [`quantile`] for input that is already sorted ascending.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Median. `NaN` for an empty slice.
#[must_use]
pub fn median(values: &[f64]) -> f64 {
    quantile(values, 0.5)
}

/// Median absolute deviation from the median (unscaled).
#[must_use]
pub fn median_absolute_deviation(values: &[f64]) -> f64 {
    let m = median(values);
    let deviations: Vec<f64> = values.iter().map(|v| (v - m).abs()).collect();
    median(&deviations)
}

/// Sample skewness (Fisher-Pearson, bias adjusted). `NaN` below three
/// values or for a constant series.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn skewness(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    if values.len() < 3 {
        return f64::NAN;
    }
    let m = mean(values);
    let m2 = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / n;
    let m3 = values.iter().map(|v| (v - m).powi(3)).sum::<f64>() / n;
    if m2 <= 0.0 {
        return f64::NAN;
    }
    let g1 = m3 / m2.powf(1.5);
    g1 * (n * (n - 1.0)).sqrt() / (n - 2.0)
}

/// Sample excess kurtosis (bias adjusted). `NaN` below four values or for a
/// constant series.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn excess_kurtosis(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    if values.len() < 4 {
        return f64::NAN;
    }
    let m = mean(values);
    let m2 = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / n;
    let m4 = values.iter().map(|v| (v - m).powi(4)).sum::<f64>() / n;
    if m2 <= 0.0 {
        return f64::NAN;
    }
    let g2 = m4 / (m2 * m2) - 3.0;
    ((n + 1.0) * g2 + 6.0) * (n - 1.0) / ((n - 2.0) * (n - 3.0))
}

/// Distribution summary of a sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

/// Summarizes a sample, or `None` if it is empty.
///
/// `std` is the sample standard deviation and is 0 for a single value.
#[must_use]
pub fn summarize(values: &[f64]) -> Option<Summary> {
    if values.is_empty() {
        return None;
    }
    let sorted = sorted(values);
    let std = if values.len() > 1 { std_dev(values) } else { 0.0 };
    Some(Summary {
        count: values.len(),
        mean: mean(values),
        std,
        min: sorted[0],
        q1: quantile_sorted(&sorted, 0.25),
        median: quantile_sorted(&sorted, 0.5),
        q3: quantile_sorted(&sorted, 0.75),
        max: sorted[sorted.len() - 1],
    })
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn moments_match_known_values() {
        let data = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_relative_eq!(mean(&data), 3.0);
        assert_relative_eq!(variance(&data), 2.5);
        assert_relative_eq!(population_variance(&data), 2.0);
        assert!(mean(&[]).is_nan());
        assert!(variance(&[1.0]).is_nan());
    }

    #[test]
    fn quantile_interpolates_linearly() {
        let data = [4.0, 1.0, 3.0, 2.0];
        assert_relative_eq!(median(&data), 2.5);
        assert_relative_eq!(quantile(&data, 0.0), 1.0);
        assert_relative_eq!(quantile(&data, 1.0), 4.0);
        assert_relative_eq!(quantile(&data, 0.9), 3.7, epsilon = 1e-12);
    }

    #[test]
    fn symmetric_sample_has_zero_skew() {
        assert_relative_eq!(skewness(&[1.0, 2.0, 3.0, 4.0, 5.0]), 0.0, epsilon = 1e-12);
        assert!(skewness(&[2.0, 2.0, 2.0]).is_nan());
        assert!(skewness(&[1.0, 10.0, 1.0, 1.0]) > 0.0);
    }

    #[test]
    fn mad_ignores_outlier() {
        assert_relative_eq!(median_absolute_deviation(&[1.0, 2.0, 3.0, 4.0, 100.0]), 1.0);
    }

    #[test]
    fn summary_of_single_value() {
        let s = summarize(&[7.0]).unwrap();
        assert_eq!(s.count, 1);
        assert_relative_eq!(s.std, 0.0);
        assert_relative_eq!(s.q1, 7.0);
        assert!(summarize(&[]).is_none());
    }
}
