#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! `crime_stats`: runs the SP/RJ crime statistics pipeline.
//!
//! Each subcommand runs one stage against the artifacts already in the
//! output directory; `all` runs them in order. Without a subcommand an
//! interactive picker is shown.
//!
//! Log output goes through `indicatif-log-bridge` (via
//! [`crime_stats_cli_utils::init_logger`]) so it never tears the progress
//! bars.

mod interactive;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use crime_stats_analytics::AnalysisConfig;
use crime_stats_analytics::config::CONFIG_FILE;
use crime_stats_artifact::{ArtifactKind, ArtifactStore, Stage, paths};
use crime_stats_cli_utils::{IndicatifProgress, MultiProgress};
use crime_stats_pipeline::{Pipeline, PipelineOptions, RunSummary, StageStatus};

use crate::interactive::Selection;

#[derive(Parser)]
#[command(name = "crime_stats", about = "SP/RJ crime statistics pipeline")]
struct Cli {
    /// Directory of raw per-state files [default: data/raw]
    #[arg(long, global = true)]
    raw_dir: Option<PathBuf>,
    /// Artifact directory [default: data/generated]
    #[arg(long, global = true)]
    out_dir: Option<PathBuf>,
    /// Analysis config file [default: crime_stats.toml]
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Stage 1: load the raw files into the canonical table
    Load,
    /// Stage 2: monthly and annual aggregates
    Explore,
    /// Stage 3: flag anomalous state-months
    Quality,
    /// Stage 4: SP vs RJ tests, trends and change-points
    Compare,
    /// Stage 5: municipality PCA, clusters and hotspots
    Spatial,
    /// Stage 6: seasonal decomposition and Holt-Winters accuracy
    Seasonality,
    /// Stage 7: random forest and gradient boosting ensemble
    Forecast,
    /// Stage 8: Markdown and HTML report
    Report,
    /// Run every stage in order
    All,
    /// Show whether each artifact is present and fresh
    Status,
}

impl Commands {
    fn stages(&self) -> Vec<Stage> {
        match self {
            Self::Load => vec![Stage::Load],
            Self::Explore => vec![Stage::Explore],
            Self::Quality => vec![Stage::Quality],
            Self::Compare => vec![Stage::Compare],
            Self::Spatial => vec![Stage::Spatial],
            Self::Seasonality => vec![Stage::Seasonality],
            Self::Forecast => vec![Stage::Forecast],
            Self::Report => vec![Stage::Report],
            Self::All => Stage::all().to_vec(),
            Self::Status => Vec::new(),
        }
    }
}

fn options(cli: &Cli) -> Result<PipelineOptions, Box<dyn std::error::Error>> {
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE));
    Ok(PipelineOptions {
        raw_dir: cli.raw_dir.clone().unwrap_or_else(paths::raw_dir),
        out_dir: cli.out_dir.clone().unwrap_or_else(paths::generated_dir),
        config: AnalysisConfig::load(&config_path)?,
    })
}

fn print_status(options: &PipelineOptions) -> Result<(), Box<dyn std::error::Error>> {
    let store = ArtifactStore::open(&options.out_dir)?;
    println!("{:<28} {:<10} DETAIL", "ARTIFACT", "STATE");
    println!("{}", "-".repeat(72));
    for &kind in ArtifactKind::all() {
        match store.verify(kind) {
            Ok(sha) => {
                let generated = store
                    .record(kind)
                    .map_or("", |r| r.generated_at.as_str());
                let short = &sha[..12.min(sha.len())];
                println!("{:<28} {:<10} {short} {generated}", kind.file_name(), "fresh");
            }
            Err(e) => println!("{:<28} {:<10} {e}", kind.file_name(), "unusable"),
        }
    }
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!();
    println!("{:<3} {:<28} {:<10} DETAIL", "#", "STAGE", "STATUS");
    println!("{}", "-".repeat(72));
    for (stage, status) in &summary.statuses {
        let (state, detail) = match status {
            StageStatus::Succeeded { artifacts } => {
                ("ok", format!("{} artifact(s)", artifacts.len()))
            }
            StageStatus::Failed { kind, .. } => ("failed", kind.to_string()),
            StageStatus::Idle => ("skipped", "upstream stage failed".to_string()),
            StageStatus::Running => ("running", String::new()),
        };
        println!("{:<3} {:<28} {state:<10} {detail}", stage.number(), stage.label());
    }
    for err in &summary.errors {
        eprintln!("error: {err}");
    }
}

fn run(
    options: PipelineOptions,
    stages: &[Stage],
    multi: &MultiProgress,
) -> Result<RunSummary, Box<dyn std::error::Error>> {
    let mut pipeline = Pipeline::open(options)?;
    if stages.len() > 1 {
        pipeline =
            pipeline.with_stage_progress(IndicatifProgress::stages_bar(multi, stages.len() as u64));
    }
    if stages.contains(&Stage::Load) {
        pipeline = pipeline.with_progress(IndicatifProgress::records_bar(multi, "Loading sources"));
    }
    Ok(pipeline.run_stages(stages))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = crime_stats_cli_utils::init_logger();
    let cli = Cli::parse();
    let options = options(&cli)?;
    log::debug!(
        "Raw data in {}, artifacts in {}",
        options.raw_dir.display(),
        options.out_dir.display()
    );

    let stages = match &cli.command {
        Some(Commands::Status) => return print_status(&options),
        Some(command) => command.stages(),
        None => match interactive::select()? {
            Selection::Status => return print_status(&options),
            Selection::Run(stages) => stages,
        },
    };
    if stages.is_empty() {
        println!("No stages selected.");
        return Ok(());
    }

    let summary = run(options, &stages, &multi)?;
    print_summary(&summary);
    if summary.errors.is_empty() {
        Ok(())
    } else {
        Err(format!(
            "{} of {} stage(s) failed",
            summary.errors.len(),
            stages.len()
        )
        .into())
    }
}
