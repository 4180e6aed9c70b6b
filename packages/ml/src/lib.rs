#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Learning algorithms used by the spatial and forecasting stages.
//!
//! Feature matrices are passed as row slices (`&[Vec<f64>]`), one row per
//! sample. Every algorithm is deterministic for a given input: the only
//! randomness (random-forest bootstrap and feature sampling) is driven by
//! a caller-supplied seed.

pub mod boosting;
pub mod forest;
pub mod pca;
pub mod scale;
pub mod split;
pub mod tree;
pub mod ward;

mod error;

pub use error::{MlError, Result};

/// Checks that `rows` is a non-empty rectangular matrix and returns its
/// column count.
pub(crate) fn matrix_width(rows: &[Vec<f64>]) -> Result<usize> {
    let Some(first) = rows.first() else {
        return Err(MlError::InsufficientData { needed: 1, got: 0 });
    };
    let width = first.len();
    if let Some(bad) = rows.iter().find(|r| r.len() != width) {
        return Err(MlError::DimensionMismatch {
            expected: width,
            got: bad.len(),
        });
    }
    Ok(width)
}
