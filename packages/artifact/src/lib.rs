#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Artifact catalogue and stage graph for the crime statistics pipeline.
//!
//! Every stage reads the artifacts published by earlier stages and publishes
//! its own as flat CSV tables (plus the two report documents). Publication
//! is atomic per stage and fingerprinted in `manifest.json`, which lets a
//! downstream stage refuse to run against missing or stale inputs.

pub mod kind;
pub mod manifest;
pub mod paths;
pub mod stage;
pub mod store;
pub mod table;

mod error;

pub use error::ArtifactError;
pub use kind::ArtifactKind;
pub use stage::Stage;
pub use store::{ArtifactStore, StageWriter};
