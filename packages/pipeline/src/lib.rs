#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Stage runner for the crime statistics pipeline.
//!
//! A [`Pipeline`] owns the artifact store and runs stages one at a time,
//! tracking each through [`StageStatus`]. Stages communicate only through
//! published artifacts, so any stage can be re-run on its own as long as
//! its inputs are present and fresh.

mod error;
mod stages;
mod status;

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use crime_stats_analytics::AnalysisConfig;
use crime_stats_artifact::{ArtifactKind, ArtifactStore, Stage, paths};
use crime_stats_source::progress::{ProgressCallback, null_progress};

pub use error::{PipelineError, StageError};
pub use status::{RunSummary, StageStatus};

const IDLE: StageStatus = StageStatus::Idle;

/// Where the pipeline reads and writes, and how it analyses.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Directory of raw per-state files (and optional `sources/` and
    /// `municipalities.csv`).
    pub raw_dir: PathBuf,
    /// Artifact directory.
    pub out_dir: PathBuf,
    pub config: AnalysisConfig,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            raw_dir: paths::raw_dir(),
            out_dir: paths::generated_dir(),
            config: AnalysisConfig::default(),
        }
    }
}

pub struct Pipeline {
    options: PipelineOptions,
    store: ArtifactStore,
    statuses: BTreeMap<Stage, StageStatus>,
    progress: Arc<dyn ProgressCallback>,
    stage_progress: Arc<dyn ProgressCallback>,
}

impl Pipeline {
    /// Opens the artifact directory named by `options`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Store`] if the directory cannot be created.
    pub fn open(options: PipelineOptions) -> Result<Self, PipelineError> {
        let store = ArtifactStore::open(&options.out_dir)?;
        Ok(Self {
            options,
            store,
            statuses: BTreeMap::new(),
            progress: null_progress(),
            stage_progress: null_progress(),
        })
    }

    /// Reports loader progress to `progress`.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    /// Advances `progress` once per stage in [`Self::run_stages`].
    #[must_use]
    pub fn with_stage_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.stage_progress = progress;
        self
    }

    #[must_use]
    pub const fn store(&self) -> &ArtifactStore {
        &self.store
    }

    #[must_use]
    pub const fn options(&self) -> &PipelineOptions {
        &self.options
    }

    #[must_use]
    pub fn status(&self, stage: Stage) -> &StageStatus {
        self.statuses.get(&stage).unwrap_or(&IDLE)
    }

    /// Runs one stage against the currently published artifacts.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Stage`] when an input is missing or stale,
    /// or the stage's own work fails. Nothing is published in that case
    /// and upstream artifacts are left untouched.
    pub fn run_stage(&mut self, stage: Stage) -> Result<Vec<ArtifactKind>, PipelineError> {
        log::info!(
            "Stage {}/{}: {}",
            stage.number(),
            Stage::all().len(),
            stage.label()
        );
        self.statuses.insert(stage, StageStatus::Running);
        let start = Instant::now();

        let store = &mut self.store;
        let options = &self.options;
        let result = match stage {
            Stage::Load => stages::load(store, options, &self.progress),
            Stage::Explore => stages::explore(store),
            Stage::Quality => stages::quality(store, options),
            Stage::Compare => stages::compare(store, options),
            Stage::Spatial => stages::spatial(store, options),
            Stage::Seasonality => stages::seasonality(store, options),
            Stage::Forecast => stages::forecast(store, options),
            Stage::Report => stages::report(store, options),
        };

        match result {
            Ok(artifacts) => {
                log::info!(
                    "{} finished in {:.1}s, published {}",
                    stage.label(),
                    start.elapsed().as_secs_f64(),
                    artifacts
                        .iter()
                        .map(|k| k.file_name())
                        .collect::<Vec<_>>()
                        .join(", ")
                );
                self.statuses.insert(
                    stage,
                    StageStatus::Succeeded {
                        artifacts: artifacts.clone(),
                    },
                );
                Ok(artifacts)
            }
            Err(source) => {
                let err = PipelineError::Stage { stage, source };
                log::error!("{err}");
                self.statuses.insert(
                    stage,
                    StageStatus::Failed {
                        kind: err.kind(),
                        reason: err.to_string(),
                    },
                );
                Err(err)
            }
        }
    }

    /// Runs `stages` in order.
    ///
    /// A failure does not stop the run, but every later stage that reads
    /// an artifact of a failed (or skipped) stage is skipped and stays
    /// [`StageStatus::Idle`].
    pub fn run_stages(&mut self, stages: &[Stage]) -> RunSummary {
        let mut blocked: BTreeSet<Stage> = BTreeSet::new();
        let mut errors = Vec::new();

        self.stage_progress.set_total(stages.len() as u64);
        for &stage in stages {
            self.stage_progress.set_message(stage.label().to_string());
            if let Some(upstream) = stage
                .inputs()
                .iter()
                .map(|&kind| Stage::producer_of(kind))
                .find(|producer| blocked.contains(producer))
            {
                log::warn!(
                    "Skipping {}: upstream stage {} did not complete",
                    stage.label(),
                    upstream.label()
                );
                self.statuses.insert(stage, StageStatus::Idle);
                blocked.insert(stage);
                self.stage_progress.inc(1);
                continue;
            }
            if let Err(e) = self.run_stage(stage) {
                errors.push(e);
                blocked.insert(stage);
            }
            self.stage_progress.inc(1);
        }
        self.stage_progress.finish(format!(
            "{} of {} stage(s) succeeded",
            stages.len().saturating_sub(blocked.len()),
            stages.len()
        ));

        RunSummary {
            statuses: stages
                .iter()
                .map(|&s| (s, self.status(s).clone()))
                .collect(),
            errors,
        }
    }

    /// Runs every stage in pipeline order.
    pub fn run_all(&mut self) -> RunSummary {
        self.run_stages(Stage::all())
    }
}

#[cfg(test)]
mod tests {
    use std::fmt::Write as _;
    use std::path::Path;

    use crime_stats_analytics::ErrorKind;

    use super::*;

    const SP_FILE: &str = "br_sp_gov_ssp_ocorrencias_registradas.csv";
    const RJ_FILE: &str = "br_rj_isp_estatisticas_seguranca_evolucao_mensal_municipio.csv";
    const SP_HEADER: &str =
        "ano,mes,id_municipio,homicidio_doloso,roubo_de_veiculo,furto_de_veiculo,roubo_outros,furto_outros";
    const RJ_HEADER: &str = "ano,mes,id_municipio,quantidade_homicidio_doloso,quantidade_roubo_veiculo,quantidade_furto_veiculos,quantidade_total_roubos,quantidade_total_furtos";

    /// Five varying counts per municipality-month, in file column order.
    fn counts(j: u64, i: u64) -> [u64; 5] {
        let winter = u64::from(matches!(i % 12, 0 | 11));
        [
            5 + 3 * j + (i * 7 + j) % 4 + 2 * winter,
            10 + 2 * j + (i * 3 + j) % 5,
            20 + 4 * j + (i * 5) % 7 + 3 * winter,
            30 + 5 * j + (i * 11) % 9,
            50 + 7 * j + (i % 12) * 2,
        ]
    }

    fn write_raw(dir: &Path, months: u64, municipalities: u64) {
        let mut sp = format!("{SP_HEADER}\n");
        let mut rj = format!("{RJ_HEADER}\n");
        for i in 0..months {
            let (year, month) = (2019 + i / 12, i % 12 + 1);
            for j in 0..municipalities {
                let c = counts(j, i);
                writeln!(
                    sp,
                    "{year},{month},{},{},{},{},{},{}",
                    3_500_105 + j * 100,
                    c[0] * 2,
                    c[1] * 3,
                    c[2] * 2,
                    c[3],
                    c[4]
                )
                .unwrap();
                // RJ publishes totals directly.
                writeln!(
                    rj,
                    "{year},{month},{},{},{},{},{},{}",
                    3_300_100 + j * 100,
                    c[0],
                    c[1],
                    c[2],
                    c[3] + c[1],
                    c[4] + c[2]
                )
                .unwrap();
            }
        }
        std::fs::write(dir.join(SP_FILE), sp).unwrap();
        std::fs::write(dir.join(RJ_FILE), rj).unwrap();
    }

    fn pipeline(raw: &Path, out: &Path) -> Pipeline {
        Pipeline::open(PipelineOptions {
            raw_dir: raw.to_path_buf(),
            out_dir: out.to_path_buf(),
            config: AnalysisConfig::default(),
        })
        .unwrap()
    }

    #[test]
    fn full_run_publishes_every_artifact() {
        let raw = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write_raw(raw.path(), 36, 6);

        let mut p = pipeline(raw.path(), out.path());
        let summary = p.run_all();
        assert!(summary.errors.is_empty(), "{:?}", summary.errors);
        assert!(summary.is_success());
        for &kind in ArtifactKind::all() {
            assert!(p.store().verify(kind).is_ok(), "{kind} not fresh");
        }

        let report = p.store().read_text(ArtifactKind::ReportMarkdown).unwrap();
        assert!(report.contains("## SP vs RJ comparison"));
        assert!(report.contains("## Forecast ensemble"));
        let html = p.store().read_text(ArtifactKind::ReportHtml).unwrap();
        assert!(html.starts_with("<!DOCTYPE html>"));
    }

    #[test]
    fn reloading_the_same_input_is_byte_identical() {
        let raw = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write_raw(raw.path(), 14, 3);

        let mut p = pipeline(raw.path(), out.path());
        p.run_stage(Stage::Load).unwrap();
        let first = std::fs::read(p.store().path(ArtifactKind::Canonical)).unwrap();
        p.run_stage(Stage::Load).unwrap();
        let second = std::fs::read(p.store().path(ArtifactKind::Canonical)).unwrap();
        assert_eq!(first, second);
        assert!(matches!(p.status(Stage::Load), StageStatus::Succeeded { .. }));
    }

    #[test]
    fn stage_without_upstream_is_stale_artifact() {
        let raw = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let mut p = pipeline(raw.path(), out.path());

        let err = p.run_stage(Stage::Compare).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StaleArtifact);
        assert_eq!(err.stage(), Some(Stage::Compare));
        assert!(err.to_string().contains("canonical"));
        assert!(matches!(
            p.status(Stage::Compare),
            StageStatus::Failed {
                kind: ErrorKind::StaleArtifact,
                ..
            }
        ));
    }

    #[test]
    fn missing_column_aborts_the_load() {
        let raw = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write_raw(raw.path(), 12, 2);
        std::fs::write(
            raw.path().join(SP_FILE),
            "ano,mes,id_municipio,roubo_de_veiculo,furto_de_veiculo,roubo_outros,furto_outros\n2020,1,3550308,1,1,1,1\n",
        )
        .unwrap();

        let mut p = pipeline(raw.path(), out.path());
        let err = p.run_stage(Stage::Load).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedInput);
        assert!(!p.store().path(ArtifactKind::Canonical).exists());
    }

    #[test]
    fn failed_load_skips_every_downstream_stage() {
        let raw = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let mut p = pipeline(raw.path(), out.path());

        let summary = p.run_all();
        assert_eq!(summary.errors.len(), 1);
        assert_eq!(summary.errors[0].stage(), Some(Stage::Load));
        assert!(summary.status(Stage::Load).unwrap().is_failed());
        assert_eq!(summary.skipped(), Stage::all()[1..].to_vec());
        assert!(!summary.is_success());
    }

    #[test]
    fn short_history_fails_only_the_forecast() {
        let raw = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write_raw(raw.path(), 18, 3);

        let mut p = pipeline(raw.path(), out.path());
        p.run_stage(Stage::Load).unwrap();
        p.run_stage(Stage::Quality).unwrap();
        let err = p.run_stage(Stage::Forecast).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientHistory);
        assert!(!p.store().path(ArtifactKind::ForecastRecords).exists());
        assert!(p.store().verify(ArtifactKind::QualityFlags).is_ok());
    }
}
