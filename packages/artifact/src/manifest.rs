//! The artifact manifest stored at `<out_dir>/manifest.json`.
//!
//! Records, for every published artifact, the SHA-256 of its contents and
//! the fingerprints of everything its producing stage read. A consumer can
//! then detect artifacts that were edited by hand, deleted, or built from
//! an upstream artifact that has since been regenerated.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{ArtifactError, Stage};

/// Manifests with any other version are ignored and rebuilt.
pub const MANIFEST_VERSION: u32 = 1;

/// Manifest file name inside the artifact directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Key prefix for raw (non-artifact) inputs such as source CSV files.
pub const RAW_INPUT_PREFIX: &str = "raw/";

/// Publication record of a single artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRecord {
    pub sha256: String,
    pub stage: Stage,
    /// RFC 3339 timestamp of publication.
    pub generated_at: String,
    /// Fingerprints of the producing stage's inputs, keyed by artifact name
    /// or by `raw/<file name>` for raw inputs.
    pub inputs: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    /// Artifact name (`ArtifactKind` string form) to its record.
    pub outputs: BTreeMap<String, OutputRecord>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            version: MANIFEST_VERSION,
            outputs: BTreeMap::new(),
        }
    }
}

fn manifest_path(dir: &Path) -> PathBuf {
    dir.join(MANIFEST_FILE)
}

/// Loads the manifest from `dir/manifest.json`.
///
/// Returns `None` if the file does not exist, cannot be parsed, or was
/// written by an incompatible version.
#[must_use]
pub fn load_manifest(dir: &Path) -> Option<Manifest> {
    let path = manifest_path(dir);
    let Ok(contents) = std::fs::read_to_string(&path) else {
        log::info!("No manifest in {}, starting empty", dir.display());
        return None;
    };
    match serde_json::from_str::<Manifest>(&contents) {
        Ok(m) if m.version == MANIFEST_VERSION => {
            log::debug!("Loaded manifest from {}", path.display());
            Some(m)
        }
        Ok(m) => {
            log::warn!(
                "Ignoring manifest {} with version {} (expected {MANIFEST_VERSION})",
                path.display(),
                m.version
            );
            None
        }
        Err(e) => {
            log::warn!("Unreadable manifest {} ignored: {e}", path.display());
            None
        }
    }
}

/// Writes the manifest to `dir/manifest.json`.
///
/// The new contents go to a sibling `.tmp` file which is then renamed over
/// the old manifest, so readers see either the old or the new one.
///
/// # Errors
///
/// Fails if serialization, the write or the rename fails.
pub fn save_manifest(dir: &Path, manifest: &Manifest) -> Result<(), ArtifactError> {
    let path = manifest_path(dir);
    let tmp_path = dir.join(format!("{MANIFEST_FILE}.tmp"));
    let contents = serde_json::to_string_pretty(manifest)?;
    std::fs::write(&tmp_path, contents)?;
    std::fs::rename(&tmp_path, &path)?;
    log::debug!("Saved manifest to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Manifest {
        let mut m = Manifest::default();
        m.outputs.insert(
            "canonical".to_string(),
            OutputRecord {
                sha256: "ab".repeat(32),
                stage: Stage::Load,
                generated_at: "2024-01-01T00:00:00+00:00".to_string(),
                inputs: BTreeMap::from([("raw/sp.csv".to_string(), "cd".repeat(32))]),
            },
        );
        m
    }

    #[test]
    fn save_then_load() {
        let tmp = tempfile::tempdir().unwrap();
        save_manifest(tmp.path(), &sample()).unwrap();
        assert!(!tmp.path().join("manifest.json.tmp").exists());
        assert_eq!(load_manifest(tmp.path()), Some(sample()));
    }

    #[test]
    fn absent_or_corrupt_manifest_is_none() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(load_manifest(tmp.path()), None);
        std::fs::write(tmp.path().join(MANIFEST_FILE), "{not json").unwrap();
        assert_eq!(load_manifest(tmp.path()), None);
    }

    #[test]
    fn other_version_is_ignored() {
        let tmp = tempfile::tempdir().unwrap();
        let mut m = sample();
        m.version = MANIFEST_VERSION + 1;
        save_manifest(tmp.path(), &m).unwrap();
        assert_eq!(load_manifest(tmp.path()), None);
    }
}
