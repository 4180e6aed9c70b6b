#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Terminal plumbing for the `crime_stats` binary: the logger and the
//! progress bars it draws above.

use std::sync::Arc;
use std::time::Duration;

use crime_stats_source::progress::ProgressCallback;
use indicatif::{ProgressBar, ProgressStyle};
use log::LevelFilter;

pub use indicatif::MultiProgress;

const RECORDS_TEMPLATE: &str = "{spinner:.cyan} {msg} ({human_pos} records, {per_sec})";
const STAGES_TEMPLATE: &str = "{prefix:>6} {msg:<28} {bar:30.green/dim} {pos}/{len} [{elapsed}]";

fn style(template: &str, fallback: fn() -> ProgressStyle) -> ProgressStyle {
    ProgressStyle::with_template(template).map_or_else(|_| fallback(), |s| s.progress_chars("=> "))
}

/// Renders [`ProgressCallback`] events on an `indicatif` bar.
pub struct IndicatifProgress {
    bar: ProgressBar,
}

impl IndicatifProgress {
    /// Spinner that counts records while the loader parses the raw files.
    #[must_use]
    pub fn records_bar(multi: &MultiProgress, message: &str) -> Arc<dyn ProgressCallback> {
        let bar = multi.add(ProgressBar::new_spinner());
        bar.set_style(style(RECORDS_TEMPLATE, ProgressStyle::default_spinner));
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(120));
        Arc::new(Self { bar })
    }

    /// One tick per pipeline stage.
    #[must_use]
    pub fn stages_bar(multi: &MultiProgress, total: u64) -> Arc<dyn ProgressCallback> {
        let bar = multi.add(ProgressBar::new(total));
        bar.set_style(style(STAGES_TEMPLATE, ProgressStyle::default_bar));
        bar.set_prefix("stages");
        Arc::new(Self { bar })
    }
}

impl ProgressCallback for IndicatifProgress {
    fn set_total(&self, total: u64) {
        self.bar.set_length(total);
    }

    fn inc(&self, delta: u64) {
        self.bar.inc(delta);
    }

    fn set_message(&self, msg: String) {
        self.bar.set_message(msg);
    }

    fn finish(&self, msg: String) {
        self.bar.finish_with_message(msg);
    }
}

/// Installs `pretty_env_logger` behind `indicatif-log-bridge` and returns
/// the [`MultiProgress`] that every bar must be attached to.
///
/// The filter comes from `RUST_LOG`; without it the pipeline logs at
/// `info`.
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    let mut builder = pretty_env_logger::formatted_builder();
    match std::env::var("RUST_LOG") {
        Ok(filter) => builder.parse_filters(&filter),
        Err(_) => builder.filter_level(LevelFilter::Info),
    };
    let logger = builder.build();
    let level = logger.filter();

    if indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .is_ok()
    {
        log::set_max_level(level);
    }

    multi
}
