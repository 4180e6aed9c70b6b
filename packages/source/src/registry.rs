//! Source registry: embedded TOML definitions plus on-disk overrides.
//!
//! Each `.toml` file in `packages/source/sources/` is baked into the binary
//! at compile time via [`include_str!`]. A directory of TOML files can
//! replace (by `id`) or extend the embedded set at run time.

use std::path::Path;

use crate::SourceError;
use crate::source_def::SourceDefinition;

/// TOML configs embedded at compile time.
const SOURCE_TOMLS: &[(&str, &str)] = &[
    ("sp", include_str!("../sources/sp.toml")),
    ("rj", include_str!("../sources/rj.toml")),
];

/// Returns the embedded source definitions.
///
/// # Errors
///
/// Returns an error naming the offending file if an embedded config is
/// malformed.
pub fn all_sources() -> Result<Vec<SourceDefinition>, SourceError> {
    SOURCE_TOMLS
        .iter()
        .map(|(name, toml)| {
            SourceDefinition::from_toml(toml).map_err(|e| SourceError::InvalidDefinition {
                source_id: (*name).to_string(),
                message: e.to_string(),
            })
        })
        .collect()
}

/// Reads every `*.toml` file in `dir`, in file-name order.
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be listed, or the first
/// parse error.
pub fn load_sources(dir: &Path) -> Result<Vec<SourceDefinition>, SourceError> {
    let mut paths: Vec<_> = std::fs::read_dir(dir)?
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "toml"))
        .collect();
    paths.sort();

    paths
        .iter()
        .map(|p| {
            let text = std::fs::read_to_string(p)?;
            SourceDefinition::from_toml(&text)
        })
        .collect()
}

/// The embedded definitions with overrides from `override_dir` applied.
///
/// A missing override directory is not an error.
///
/// # Errors
///
/// Propagates parse and I/O errors from [`all_sources`] and
/// [`load_sources`].
pub fn resolve_sources(override_dir: &Path) -> Result<Vec<SourceDefinition>, SourceError> {
    let mut sources = all_sources()?;
    if !override_dir.is_dir() {
        return Ok(sources);
    }
    for def in load_sources(override_dir)? {
        log::info!("Using source definition {} from {}", def.id, override_dir.display());
        if let Some(existing) = sources.iter_mut().find(|s| s.id == def.id) {
            *existing = def;
        } else {
            sources.push(def);
        }
    }
    Ok(sources)
}
