//! Normal and Student-t distribution functions on top of `statrs`.
//!
//! Degenerate parameters (non-positive degrees of freedom, NaN input)
//! yield NaN instead of an error so callers can report `n/a`.

use statrs::distribution::{ContinuousCDF, Normal, StudentsT};

fn standard_normal() -> Option<Normal> {
    Normal::new(0.0, 1.0).ok()
}

fn students_t(df: f64) -> Option<StudentsT> {
    if df.is_nan() || df <= 0.0 {
        return None;
    }
    StudentsT::new(0.0, 1.0, df).ok()
}

/// Standard normal CDF.
#[must_use]
pub fn normal_cdf(x: f64) -> f64 {
    standard_normal().map_or(f64::NAN, |n| n.cdf(x))
}

/// Two-sided p-value of a standard normal statistic.
#[must_use]
pub fn normal_two_sided_p(z: f64) -> f64 {
    if z.is_nan() {
        return f64::NAN;
    }
    standard_normal().map_or(f64::NAN, |n| (2.0 * n.sf(z.abs())).min(1.0))
}

/// Standard normal quantile.
#[must_use]
pub fn normal_quantile(p: f64) -> f64 {
    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }
    standard_normal().map_or(f64::NAN, |n| n.inverse_cdf(p))
}

/// Two-sided p-value of a Student-t statistic with `df` degrees of freedom.
#[must_use]
pub fn student_t_two_sided_p(t: f64, df: f64) -> f64 {
    if t.is_nan() {
        return f64::NAN;
    }
    if t.is_infinite() {
        return 0.0;
    }
    students_t(df).map_or(f64::NAN, |d| (2.0 * d.sf(t.abs())).clamp(0.0, 1.0))
}

/// Student-t CDF.
#[must_use]
pub fn student_t_cdf(t: f64, df: f64) -> f64 {
    students_t(df).map_or(f64::NAN, |d| d.cdf(t))
}

/// Student-t quantile.
#[must_use]
pub fn student_t_quantile(p: f64, df: f64) -> f64 {
    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }
    students_t(df).map_or(f64::NAN, |d| d.inverse_cdf(p))
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn normal_known_values() {
        assert_relative_eq!(normal_cdf(0.0), 0.5, epsilon = 1e-12);
        assert_relative_eq!(normal_cdf(1.96), 0.975, epsilon = 1e-4);
        assert_relative_eq!(normal_quantile(0.975), 1.959_964, epsilon = 1e-5);
        assert_relative_eq!(normal_quantile(0.5), 0.0, epsilon = 1e-9);
        assert_relative_eq!(normal_quantile(0.01), -2.326_348, epsilon = 1e-5);
        assert_relative_eq!(normal_two_sided_p(1.96), 0.05, epsilon = 1e-3);
        assert_relative_eq!(normal_two_sided_p(0.0), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn student_t_known_values() {
        // t(0.975, 10) = 2.228139
        assert_relative_eq!(student_t_quantile(0.975, 10.0), 2.228_139, epsilon = 1e-4);
        assert_relative_eq!(student_t_two_sided_p(2.228_139, 10.0), 0.05, epsilon = 1e-5);
        assert_relative_eq!(student_t_cdf(0.0, 5.0), 0.5, epsilon = 1e-12);
        // Cauchy: P(T <= 1) = 0.75
        assert_relative_eq!(student_t_cdf(1.0, 1.0), 0.75, epsilon = 1e-9);
    }

    #[test]
    fn degenerate_parameters_are_nan() {
        assert!(student_t_two_sided_p(1.0, 0.0).is_nan());
        assert!(student_t_two_sided_p(f64::NAN, 5.0).is_nan());
        assert!(normal_two_sided_p(f64::NAN).is_nan());
        assert_relative_eq!(student_t_two_sided_p(f64::INFINITY, 5.0), 0.0);
        assert_eq!(normal_quantile(0.0), f64::NEG_INFINITY);
    }
}
