#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Loading and unification of the state crime publications.
//!
//! Each state publishes monthly municipal counts with its own column
//! names, encoding and derived totals. A [`source_def::SourceDefinition`]
//! describes one publication; the generic [`loader`] resolves its headers
//! into a [`columns::ColumnPlan`] (failing fast on missing or ambiguous
//! columns), parses every record, and [`unify::unify`] merges all sources
//! into the zero-filled canonical table.

pub mod columns;
pub mod loader;
pub mod municipalities;
pub mod parsing;
pub mod progress;
pub mod registry;
pub mod source_def;
pub mod unify;

/// Errors that can occur while loading sources.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// I/O error (file read).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV decoding error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing failed.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A source definition is internally inconsistent.
    #[error("Invalid source definition {source_id}: {message}")]
    InvalidDefinition { source_id: String, message: String },

    /// A raw file listed by a source definition does not exist.
    #[error("Source {source_id}: file not found: {path}")]
    MissingFile { source_id: String, path: String },

    /// The raw input cannot be interpreted (e.g. missing or ambiguous
    /// columns). Aborts the load.
    #[error("Malformed input in source {source_id}: {message}")]
    MalformedInput { source_id: String, message: String },
}
