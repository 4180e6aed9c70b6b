//! Forward-chaining (expanding window) cross-validation folds.

use std::ops::Range;

use crate::{MlError, Result};

/// One fold: train on `train`, evaluate on the `test` window right after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: Range<usize>,
    pub test: Range<usize>,
}

/// Splits `n_samples` time-ordered rows into `n_folds` folds whose test
/// windows of `test_size` rows tile the end of the series. Fold `i` trains
/// on everything before its test window.
///
/// # Errors
///
/// * [`MlError::InvalidParameter`] if `n_folds` or `test_size` is zero.
/// * [`MlError::InsufficientData`] if the first fold would train on fewer
///   than `min_train` rows.
pub fn forward_chaining(
    n_samples: usize,
    n_folds: usize,
    test_size: usize,
    min_train: usize,
) -> Result<Vec<Fold>> {
    if n_folds == 0 || test_size == 0 {
        return Err(MlError::InvalidParameter(
            "folds and test size must be positive".to_string(),
        ));
    }
    let needed = min_train.max(1) + n_folds * test_size;
    if n_samples < needed {
        return Err(MlError::InsufficientData {
            needed,
            got: n_samples,
        });
    }

    let first_test = n_samples - n_folds * test_size;
    Ok((0..n_folds)
        .map(|i| {
            let start = first_test + i * test_size;
            Fold {
                train: 0..start,
                test: start..start + test_size,
            }
        })
        .collect())
}
