#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Statistical building blocks used by the analysis stages.
//!
//! Everything here works on plain `&[f64]` slices so the stages can feed
//! state time series, municipality aggregates or model residuals through
//! the same routines. Functions that cannot produce a stable estimate for
//! their input return [`StatsError`] instead of a sentinel value.

pub mod correlation;
pub mod decompose;
pub mod descriptive;
pub mod distribution;
pub mod holt_winters;
pub mod metrics;
pub mod pelt;
pub mod rank;
pub mod regression;
pub mod stl;
pub mod ttest;

mod error;

pub use error::{Result, StatsError};
