//! Forecast accuracy metrics.

use crate::descriptive::mean;

/// Mean absolute error. `NaN` for empty or mismatched input.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn mae(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() || actual.len() != predicted.len() {
        return f64::NAN;
    }
    actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).abs())
        .sum::<f64>()
        / actual.len() as f64
}

/// Root mean squared error. `NaN` for empty or mismatched input.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn rmse(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() || actual.len() != predicted.len() {
        return f64::NAN;
    }
    (actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum::<f64>()
        / actual.len() as f64)
        .sqrt()
}

/// Mean absolute percentage error, in percent.
///
/// `None` when any actual value is zero (the ratio is undefined) or the
/// input is empty or mismatched.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn mape(actual: &[f64], predicted: &[f64]) -> Option<f64> {
    if actual.is_empty() || actual.len() != predicted.len() || actual.contains(&0.0) {
        return None;
    }
    Some(
        actual
            .iter()
            .zip(predicted)
            .map(|(a, p)| ((a - p) / a).abs())
            .sum::<f64>()
            / actual.len() as f64
            * 100.0,
    )
}

/// Coefficient of determination `1 - SS_res / SS_tot`.
///
/// Can be negative for predictions worse than the mean. `NaN` when the
/// actuals are constant or the input is empty or mismatched.
#[must_use]
pub fn r_squared(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() || actual.len() != predicted.len() {
        return f64::NAN;
    }
    let m = mean(actual);
    let ss_tot: f64 = actual.iter().map(|a| (a - m).powi(2)).sum();
    if ss_tot <= 0.0 {
        return f64::NAN;
    }
    let ss_res: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum();
    1.0 - ss_res / ss_tot
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn perfect_forecast() {
        let a = [1.0, 2.0, 3.0];
        assert_relative_eq!(mae(&a, &a), 0.0);
        assert_relative_eq!(rmse(&a, &a), 0.0);
        assert_relative_eq!(mape(&a, &a).unwrap(), 0.0);
        assert_relative_eq!(r_squared(&a, &a), 1.0);
    }

    #[test]
    fn known_errors() {
        let a = [100.0, 200.0];
        let p = [110.0, 180.0];
        assert_relative_eq!(mae(&a, &p), 15.0);
        assert_relative_eq!(rmse(&a, &p), 250.0_f64.sqrt());
        assert_relative_eq!(mape(&a, &p).unwrap(), 10.0);
        assert_relative_eq!(r_squared(&a, &p), 1.0 - 500.0 / 5000.0);
    }

    #[test]
    fn mape_undefined_with_zero_actual() {
        assert!(mape(&[0.0, 1.0], &[1.0, 1.0]).is_none());
        assert!(mae(&[1.0], &[]).is_nan());
        assert!(r_squared(&[2.0, 2.0], &[1.0, 3.0]).is_nan());
    }
}
