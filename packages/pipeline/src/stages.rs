//! One runner per stage: verify inputs, read artifacts, analyse, publish.
//!
//! Every runner opens a [`StageWriter`] first, so a stage with a missing
//! or stale input fails before doing any work, and publishes nothing
//! unless all of its outputs were written.

use std::sync::Arc;

use crime_stats_analytics::config::FlagPolicy;
use crime_stats_analytics::series::Exclusions;
use crime_stats_analytics::{AnalysisError, compare, explore, forecast, quality, seasonality, spatial};
use crime_stats_analytics_models::QualityFlag;
use crime_stats_artifact::table::sha256_file;
use crime_stats_artifact::{ArtifactKind, ArtifactStore, Stage, StageWriter, paths};
use crime_stats_crime_models::Observation;
use crime_stats_report::ReportInputs;
use crime_stats_source::loader::load_source;
use crime_stats_source::municipalities::MunicipalityDirectory;
use crime_stats_source::progress::ProgressCallback;
use crime_stats_source::registry::resolve_sources;
use crime_stats_source::unify::unify;

use crate::PipelineOptions;
use crate::error::StageError;

type StageResult = Result<Vec<ArtifactKind>, StageError>;

fn read_canonical(store: &ArtifactStore) -> Result<Vec<Observation>, StageError> {
    Ok(store.read_table(ArtifactKind::Canonical)?)
}

/// Canonical table plus the months to leave out under the configured policy.
fn analysis_inputs(
    store: &ArtifactStore,
    options: &PipelineOptions,
) -> Result<(Vec<Observation>, Exclusions), StageError> {
    let observations = read_canonical(store)?;
    let flags: Vec<QualityFlag> = store.read_table(ArtifactKind::QualityFlags)?;
    let exclusions = Exclusions::from_flags(&flags, options.config.flag_policy);
    Ok((observations, exclusions))
}

fn commit(writer: StageWriter, store: &mut ArtifactStore) -> StageResult {
    Ok(writer.commit(store)?)
}

pub fn load(
    store: &mut ArtifactStore,
    options: &PipelineOptions,
    progress: &Arc<dyn ProgressCallback>,
) -> StageResult {
    let mut writer = store.begin(Stage::Load)?;
    let sources = resolve_sources(&paths::sources_dir(&options.raw_dir))?;

    let mut outcomes = Vec::with_capacity(sources.len());
    for def in &sources {
        let outcome = load_source(def, &options.raw_dir, progress)?;
        for file in &def.files {
            let sha = sha256_file(&options.raw_dir.join(file))?;
            writer.record_raw_input(&format!("{}/{file}", def.id), sha);
        }
        log::info!(
            "{}: {} record(s), {} rejected",
            def.id,
            outcome.rows.len(),
            outcome.rejected.len()
        );
        outcomes.push(outcome);
    }

    let table = unify(outcomes);
    progress.finish(format!("Loaded {} source(s)", sources.len()));
    if table.observations.is_empty() {
        return Err(AnalysisError::InsufficientData {
            context: "canonical table".to_string(),
            needed: 1,
            got: 0,
        }
        .into());
    }
    log::info!(
        "Canonical table: {} observation(s), {} zero-filled, {} rejected row(s)",
        table.observations.len(),
        table.zero_filled,
        table.rejected.len()
    );

    writer.write_table(ArtifactKind::Canonical, &table.observations)?;
    writer.write_table(ArtifactKind::RejectedRows, &table.rejected)?;
    commit(writer, store)
}

pub fn explore(store: &mut ArtifactStore) -> StageResult {
    let mut writer = store.begin(Stage::Explore)?;
    let observations = read_canonical(store)?;
    let out = explore::explore(&observations);
    match out.common_period {
        Some((start, end)) => log::info!("States overlap from {start} to {end}"),
        None => log::warn!("The states share no common period"),
    }

    writer.write_table(ArtifactKind::MonthlyTotals, &out.monthly)?;
    writer.write_table(ArtifactKind::AnnualTotals, &out.annual)?;
    writer.write_table(ArtifactKind::DistributionSummary, &out.distribution)?;
    commit(writer, store)
}

pub fn quality(store: &mut ArtifactStore, options: &PipelineOptions) -> StageResult {
    let mut writer = store.begin(Stage::Quality)?;
    let observations = read_canonical(store)?;
    let out = quality::diagnose(&observations, &options.config.quality);

    writer.write_table(ArtifactKind::QualityFlags, &out.flags)?;
    writer.write_table(ArtifactKind::QualityCoverage, &out.coverage)?;
    commit(writer, store)
}

pub fn compare(store: &mut ArtifactStore, options: &PipelineOptions) -> StageResult {
    let mut writer = store.begin(Stage::Compare)?;
    let (observations, exclusions) = analysis_inputs(store, options)?;
    let out = compare::compare(&observations, &exclusions, &options.config.compare)?;

    writer.write_table(ArtifactKind::ComparisonByState, &out.by_state)?;
    writer.write_table(ArtifactKind::ComparisonPairwise, &out.pairwise)?;
    commit(writer, store)
}

pub fn spatial(store: &mut ArtifactStore, options: &PipelineOptions) -> StageResult {
    let mut writer = store.begin(Stage::Spatial)?;
    let (observations, exclusions) = analysis_inputs(store, options)?;

    let directory_path = paths::municipalities_path(&options.raw_dir);
    let directory = MunicipalityDirectory::load(&directory_path)?;
    if directory_path.is_file() {
        writer.record_raw_input("municipalities.csv", sha256_file(&directory_path)?);
    }

    let out = spatial::analyze(&observations, &exclusions, &directory, &options.config.spatial)?;
    log::info!(
        "Clustered {} municipalities, {} hotspot(s), {} excluded",
        out.municipalities.len(),
        out.hotspots.len(),
        out.excluded.len()
    );

    writer.write_table(ArtifactKind::SpatialMunicipalities, &out.municipalities)?;
    writer.write_table(ArtifactKind::SpatialExcluded, &out.excluded)?;
    writer.write_table(ArtifactKind::SpatialHotspots, &out.hotspots)?;
    writer.write_table(ArtifactKind::SpatialClusters, &out.clusters)?;
    writer.write_table(ArtifactKind::SpatialPca, &out.pca)?;
    commit(writer, store)
}

pub fn seasonality(store: &mut ArtifactStore, options: &PipelineOptions) -> StageResult {
    let mut writer = store.begin(Stage::Seasonality)?;
    let (observations, exclusions) = analysis_inputs(store, options)?;
    let out = seasonality::model(&observations, &exclusions, &options.config.seasonality)?;

    writer.write_table(ArtifactKind::SeasonalStrength, &out.strength)?;
    writer.write_table(ArtifactKind::MonthlyPatterns, &out.patterns)?;
    writer.write_table(ArtifactKind::SeasonalForecastMetrics, &out.forecasts)?;
    writer.write_table(ArtifactKind::CrossCorrelation, &out.cross_correlation)?;
    commit(writer, store)
}

pub fn forecast(store: &mut ArtifactStore, options: &PipelineOptions) -> StageResult {
    let mut writer = store.begin(Stage::Forecast)?;
    let (observations, exclusions) = analysis_inputs(store, options)?;
    let out = forecast::forecast(&observations, &exclusions, &options.config.forecast)?;
    for r in &out.records {
        log::info!(
            "{} {} forecast for {:04}-{:02}: {:.1} [{:.1}, {:.1}]",
            r.state,
            r.crime_type,
            r.target_year,
            r.target_month,
            r.predicted,
            r.lower,
            r.upper
        );
    }

    writer.write_table(ArtifactKind::ForecastPredictions, &out.predictions)?;
    writer.write_table(ArtifactKind::ForecastMetrics, &out.metrics)?;
    writer.write_table(ArtifactKind::ForecastImportance, &out.importance)?;
    writer.write_table(ArtifactKind::ForecastRecords, &out.records)?;
    commit(writer, store)
}

pub fn report(store: &mut ArtifactStore, options: &PipelineOptions) -> StageResult {
    use ArtifactKind as A;

    let mut writer = store.begin(Stage::Report)?;
    let inputs = ReportInputs {
        generated_at: chrono::Utc::now().format("%Y-%m-%d %H:%M UTC").to_string(),
        flagged_months_excluded: options.config.flag_policy == FlagPolicy::Exclude,
        observations: store.read_table(A::Canonical)?,
        rejected: store.read_table(A::RejectedRows)?,
        monthly: store.read_table(A::MonthlyTotals)?,
        annual: store.read_table(A::AnnualTotals)?,
        distribution: store.read_table(A::DistributionSummary)?,
        flags: store.read_table(A::QualityFlags)?,
        coverage: store.read_table(A::QualityCoverage)?,
        comparison_by_state: store.read_table(A::ComparisonByState)?,
        comparison_pairwise: store.read_table(A::ComparisonPairwise)?,
        spatial_municipalities: store.read_table(A::SpatialMunicipalities)?,
        spatial_excluded: store.read_table(A::SpatialExcluded)?,
        spatial_hotspots: store.read_table(A::SpatialHotspots)?,
        spatial_clusters: store.read_table(A::SpatialClusters)?,
        spatial_pca: store.read_table(A::SpatialPca)?,
        seasonal_strength: store.read_table(A::SeasonalStrength)?,
        monthly_patterns: store.read_table(A::MonthlyPatterns)?,
        seasonal_forecasts: store.read_table(A::SeasonalForecastMetrics)?,
        cross_correlation: store.read_table(A::CrossCorrelation)?,
        forecast_predictions: store.read_table(A::ForecastPredictions)?,
        forecast_metrics: store.read_table(A::ForecastMetrics)?,
        forecast_importance: store.read_table(A::ForecastImportance)?,
        forecast_records: store.read_table(A::ForecastRecords)?,
    };

    writer.write_text(A::ReportMarkdown, &crime_stats_report::render_markdown(&inputs))?;
    writer.write_text(A::ReportHtml, &crime_stats_report::render_html(&inputs))?;
    commit(writer, store)
}
