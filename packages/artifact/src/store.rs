//! Reading, verifying and atomically publishing artifacts.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr as _;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::manifest::{self, Manifest, OutputRecord, RAW_INPUT_PREFIX};
use crate::table::{read_csv, sha256_file, write_csv};
use crate::{ArtifactError, ArtifactKind, Stage, paths};

/// An artifact directory plus its manifest.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
    manifest: Manifest,
}

impl ArtifactStore {
    /// Opens (creating if needed) the artifact directory at `dir`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, ArtifactError> {
        let dir = dir.into();
        paths::ensure_dir(&dir)?;
        let manifest = match manifest::load_manifest(&dir) {
            Some(m) => m,
            None => {
                if dir.join(manifest::MANIFEST_FILE).exists() {
                    log::warn!(
                        "Discarded the manifest in {}; every artifact there is stale until regenerated",
                        dir.display()
                    );
                }
                Manifest::default()
            }
        };
        Ok(Self { dir, manifest })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of `kind` inside the artifact directory.
    #[must_use]
    pub fn path(&self, kind: ArtifactKind) -> PathBuf {
        self.dir.join(kind.file_name())
    }

    #[must_use]
    pub const fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// The manifest record of `kind`, if it was ever published.
    #[must_use]
    pub fn record(&self, kind: ArtifactKind) -> Option<&OutputRecord> {
        self.manifest.outputs.get(kind.as_ref())
    }

    /// Checks that `kind` exists, matches its recorded fingerprint, and was
    /// built from the current version of every upstream artifact.
    ///
    /// Returns the artifact's current SHA-256.
    ///
    /// # Errors
    ///
    /// * [`ArtifactError::Missing`] if the file does not exist.
    /// * [`ArtifactError::Stale`] if any of the freshness checks fails.
    pub fn verify(&self, kind: ArtifactKind) -> Result<String, ArtifactError> {
        self.verify_cached(kind, &mut BTreeMap::new())
    }

    fn verify_cached(
        &self,
        kind: ArtifactKind,
        cache: &mut BTreeMap<ArtifactKind, String>,
    ) -> Result<String, ArtifactError> {
        if let Some(sha) = cache.get(&kind) {
            return Ok(sha.clone());
        }

        let path = self.path(kind);
        if !path.exists() {
            return Err(ArtifactError::Missing {
                kind,
                producer: Stage::producer_of(kind),
                path: path.display().to_string(),
            });
        }
        let Some(record) = self.record(kind) else {
            return Err(ArtifactError::Stale {
                kind,
                reason: "not recorded in the manifest".to_string(),
            });
        };
        let current = sha256_file(&path)?;
        if current != record.sha256 {
            return Err(ArtifactError::Stale {
                kind,
                reason: "file contents changed after it was published".to_string(),
            });
        }

        for (name, recorded_sha) in &record.inputs {
            if name.starts_with(RAW_INPUT_PREFIX) {
                continue;
            }
            let upstream = ArtifactKind::from_str(name).map_err(|_| ArtifactError::Stale {
                kind,
                reason: format!("built from unknown artifact {name}"),
            })?;
            let upstream_sha = self.verify_cached(upstream, cache)?;
            if &upstream_sha != recorded_sha {
                return Err(ArtifactError::Stale {
                    kind,
                    reason: format!("upstream {upstream} was regenerated after it was produced"),
                });
            }
        }

        cache.insert(kind, current.clone());
        Ok(current)
    }

    /// Verifies every declared input of `stage` and returns their
    /// fingerprints keyed by artifact name.
    ///
    /// # Errors
    ///
    /// Returns the first [`ArtifactError::Missing`] or
    /// [`ArtifactError::Stale`] encountered.
    pub fn verify_inputs(&self, stage: Stage) -> Result<BTreeMap<String, String>, ArtifactError> {
        let mut cache = BTreeMap::new();
        stage
            .inputs()
            .iter()
            .map(|&kind| Ok((kind.to_string(), self.verify_cached(kind, &mut cache)?)))
            .collect()
    }

    /// Whether every output of `stage` is present and fresh.
    #[must_use]
    pub fn is_up_to_date(&self, stage: Stage) -> bool {
        let mut cache = BTreeMap::new();
        stage
            .outputs()
            .iter()
            .all(|&kind| self.verify_cached(kind, &mut cache).is_ok())
    }

    /// Reads a CSV artifact.
    ///
    /// # Errors
    ///
    /// * [`ArtifactError::Missing`] if the file does not exist.
    /// * [`ArtifactError::SchemaMismatch`] if a row does not decode.
    pub fn read_table<T: DeserializeOwned>(&self, kind: ArtifactKind) -> Result<Vec<T>, ArtifactError> {
        let path = self.existing_path(kind)?;
        read_csv(kind, &path)
    }

    /// Reads a text artifact.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError::Missing`] or an I/O error.
    pub fn read_text(&self, kind: ArtifactKind) -> Result<String, ArtifactError> {
        let path = self.existing_path(kind)?;
        Ok(std::fs::read_to_string(path)?)
    }

    fn existing_path(&self, kind: ArtifactKind) -> Result<PathBuf, ArtifactError> {
        let path = self.path(kind);
        if path.exists() {
            Ok(path)
        } else {
            Err(ArtifactError::Missing {
                kind,
                producer: Stage::producer_of(kind),
                path: path.display().to_string(),
            })
        }
    }

    /// Starts publishing the outputs of `stage` after verifying its inputs.
    ///
    /// # Errors
    ///
    /// Fails with [`ArtifactError::Missing`] or [`ArtifactError::Stale`]
    /// when an input is not usable.
    pub fn begin(&self, stage: Stage) -> Result<StageWriter, ArtifactError> {
        let inputs = self.verify_inputs(stage)?;
        Ok(StageWriter {
            dir: self.dir.clone(),
            stage,
            inputs,
            pending: Vec::new(),
        })
    }
}

#[derive(Debug)]
struct Pending {
    kind: ArtifactKind,
    tmp: PathBuf,
    sha256: String,
}

/// Outputs of one stage staged as temporary files.
///
/// Nothing becomes visible until [`StageWriter::commit`]; dropping the
/// writer without committing deletes the temporary files, so a failed stage
/// never leaves partial artifacts behind.
#[derive(Debug)]
pub struct StageWriter {
    dir: PathBuf,
    stage: Stage,
    inputs: BTreeMap<String, String>,
    pending: Vec<Pending>,
}

impl StageWriter {
    #[must_use]
    pub const fn stage(&self) -> Stage {
        self.stage
    }

    /// Records the fingerprint of a raw (non-artifact) input file.
    pub fn record_raw_input(&mut self, name: &str, sha256: String) {
        self.inputs
            .insert(format!("{RAW_INPUT_PREFIX}{name}"), sha256);
    }

    fn tmp_path(&self, kind: ArtifactKind) -> Result<PathBuf, ArtifactError> {
        if !self.stage.outputs().contains(&kind) {
            return Err(ArtifactError::Undeclared {
                stage: self.stage,
                kind,
            });
        }
        Ok(self.dir.join(format!("{}.tmp", kind.file_name())))
    }

    fn stage_file(&mut self, kind: ArtifactKind, tmp: PathBuf) -> Result<(), ArtifactError> {
        let sha256 = sha256_file(&tmp)?;
        self.pending.retain(|p| p.kind != kind);
        self.pending.push(Pending { kind, tmp, sha256 });
        Ok(())
    }

    /// Stages a CSV table.
    ///
    /// # Errors
    ///
    /// Returns an error if `kind` is not an output of this stage or the
    /// file cannot be written.
    pub fn write_table<T: Serialize>(&mut self, kind: ArtifactKind, rows: &[T]) -> Result<(), ArtifactError> {
        let tmp = self.tmp_path(kind)?;
        write_csv(&tmp, rows)?;
        log::debug!("staged {} rows for {kind}", rows.len());
        self.stage_file(kind, tmp)
    }

    /// Stages a text document.
    ///
    /// # Errors
    ///
    /// Returns an error if `kind` is not an output of this stage or the
    /// file cannot be written.
    pub fn write_text(&mut self, kind: ArtifactKind, contents: &str) -> Result<(), ArtifactError> {
        let tmp = self.tmp_path(kind)?;
        std::fs::write(&tmp, contents)?;
        self.stage_file(kind, tmp)
    }

    /// Publishes every staged output and records it in the manifest.
    ///
    /// # Errors
    ///
    /// * [`ArtifactError::Incomplete`] if a declared output was not staged.
    /// * I/O or JSON errors while renaming files or saving the manifest.
    pub fn commit(mut self, store: &mut ArtifactStore) -> Result<Vec<ArtifactKind>, ArtifactError> {
        for &kind in self.stage.outputs() {
            if !self.pending.iter().any(|p| p.kind == kind) {
                return Err(ArtifactError::Incomplete {
                    stage: self.stage,
                    kind,
                });
            }
        }

        let generated_at = chrono::Utc::now().to_rfc3339();
        let pending = std::mem::take(&mut self.pending);
        let mut published = Vec::with_capacity(pending.len());
        for p in pending {
            std::fs::rename(&p.tmp, self.dir.join(p.kind.file_name()))?;
            store.manifest.outputs.insert(
                p.kind.to_string(),
                OutputRecord {
                    sha256: p.sha256,
                    stage: self.stage,
                    generated_at: generated_at.clone(),
                    inputs: self.inputs.clone(),
                },
            );
            published.push(p.kind);
        }
        published.sort();

        store.manifest.version = manifest::MANIFEST_VERSION;
        manifest::save_manifest(&store.dir, &store.manifest)?;
        log::info!(
            "stage {} published {} artifact(s)",
            self.stage,
            published.len()
        );
        Ok(published)
    }
}

impl Drop for StageWriter {
    fn drop(&mut self) {
        for p in &self.pending {
            if let Err(e) = std::fs::remove_file(&p.tmp) {
                log::warn!("could not remove {}: {e}", p.tmp.display());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Row {
        v: u32,
    }

    fn publish_load(store: &mut ArtifactStore, rows: &[Row]) {
        let mut w = store.begin(Stage::Load).unwrap();
        w.record_raw_input("sp.csv", "00".repeat(32));
        w.write_table(ArtifactKind::Canonical, rows).unwrap();
        w.write_table::<Row>(ArtifactKind::RejectedRows, &[]).unwrap();
        w.commit(store).unwrap();
    }

    fn publish_quality(store: &mut ArtifactStore) {
        let mut w = store.begin(Stage::Quality).unwrap();
        w.write_table(ArtifactKind::QualityFlags, &[Row { v: 9 }]).unwrap();
        w.write_table(ArtifactKind::QualityCoverage, &[Row { v: 8 }]).unwrap();
        w.commit(store).unwrap();
    }

    #[test]
    fn downstream_refuses_missing_input() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(tmp.path()).unwrap();
        let err = store.begin(Stage::Explore).unwrap_err();
        assert!(matches!(
            err,
            ArtifactError::Missing { kind: ArtifactKind::Canonical, producer: Stage::Load, .. }
        ));
    }

    #[test]
    fn published_artifacts_verify_and_read_back() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = ArtifactStore::open(tmp.path()).unwrap();
        publish_load(&mut store, &[Row { v: 1 }, Row { v: 2 }]);

        assert!(store.is_up_to_date(Stage::Load));
        let rows: Vec<Row> = store.read_table(ArtifactKind::Canonical).unwrap();
        assert_eq!(rows, vec![Row { v: 1 }, Row { v: 2 }]);
        let inputs = store.verify_inputs(Stage::Quality).unwrap();
        assert_eq!(inputs.len(), 1);

        let reopened = ArtifactStore::open(tmp.path()).unwrap();
        assert_eq!(reopened.manifest(), store.manifest());
    }

    #[test]
    fn corrupt_manifest_leaves_every_artifact_stale() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = ArtifactStore::open(tmp.path()).unwrap();
        publish_load(&mut store, &[Row { v: 1 }]);
        std::fs::write(tmp.path().join(manifest::MANIFEST_FILE), "{ not json").unwrap();

        let reopened = ArtifactStore::open(tmp.path()).unwrap();
        assert!(reopened.record(ArtifactKind::Canonical).is_none());
        assert!(matches!(
            reopened.verify(ArtifactKind::Canonical),
            Err(ArtifactError::Stale { kind: ArtifactKind::Canonical, .. })
        ));
        assert!(reopened.begin(Stage::Explore).is_err());
    }

    #[test]
    fn hand_edited_artifact_is_stale() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = ArtifactStore::open(tmp.path()).unwrap();
        publish_load(&mut store, &[Row { v: 1 }]);
        std::fs::write(store.path(ArtifactKind::Canonical), "v\n5\n").unwrap();
        assert!(matches!(
            store.begin(Stage::Quality),
            Err(ArtifactError::Stale { kind: ArtifactKind::Canonical, .. })
        ));
    }

    #[test]
    fn regenerated_upstream_makes_consumer_stale() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = ArtifactStore::open(tmp.path()).unwrap();
        publish_load(&mut store, &[Row { v: 1 }]);
        publish_quality(&mut store);
        assert!(store.begin(Stage::Compare).is_ok());

        publish_load(&mut store, &[Row { v: 2 }]);
        assert!(matches!(
            store.begin(Stage::Compare),
            Err(ArtifactError::Stale { kind: ArtifactKind::QualityFlags, .. })
        ));

        publish_quality(&mut store);
        assert!(store.begin(Stage::Compare).is_ok());
    }

    #[test]
    fn dropped_writer_publishes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(tmp.path()).unwrap();
        {
            let mut w = store.begin(Stage::Load).unwrap();
            w.write_table(ArtifactKind::Canonical, &[Row { v: 1 }]).unwrap();
        }
        let leftovers: Vec<_> = std::fs::read_dir(tmp.path()).unwrap().collect();
        assert!(leftovers.is_empty());
        assert!(store.record(ArtifactKind::Canonical).is_none());
    }

    #[test]
    fn commit_requires_every_output() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = ArtifactStore::open(tmp.path()).unwrap();
        let mut w = store.begin(Stage::Load).unwrap();
        w.write_table(ArtifactKind::Canonical, &[Row { v: 1 }]).unwrap();
        assert!(matches!(
            w.commit(&mut store),
            Err(ArtifactError::Incomplete { kind: ArtifactKind::RejectedRows, .. })
        ));
        assert!(!store.path(ArtifactKind::Canonical).exists());
    }

    #[test]
    fn undeclared_output_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(tmp.path()).unwrap();
        let mut w = store.begin(Stage::Load).unwrap();
        assert!(matches!(
            w.write_text(ArtifactKind::ReportHtml, "x"),
            Err(ArtifactError::Undeclared { .. })
        ));
    }
}
