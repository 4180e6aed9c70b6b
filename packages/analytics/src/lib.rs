#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Analysis stages 2 through 7 of the crime statistics pipeline.
//!
//! Each stage module exposes one entry point that takes the canonical
//! observations (and, where needed, the quality flags) and returns the
//! rows of its artifacts. Stages never touch the filesystem; reading and
//! publishing artifacts is the pipeline's job.

pub mod compare;
pub mod config;
pub mod explore;
pub mod forecast;
pub mod quality;
pub mod seasonality;
pub mod series;
pub mod spatial;

mod error;

pub use config::AnalysisConfig;
pub use error::{AnalysisError, ErrorKind, Result};

#[cfg(test)]
pub(crate) mod fixtures;
