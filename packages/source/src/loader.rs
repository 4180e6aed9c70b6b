//! Generic loader: decodes a raw file and parses each record with the
//! [`ColumnPlan`] resolved from its headers.

use std::path::Path;
use std::sync::Arc;

use crime_stats_crime_models::{CrimeType, MunicipalityId, State, YearMonth};
use serde::{Deserialize, Serialize};

use crate::SourceError;
use crate::columns::{ColumnPlan, CountSource, resolve_columns};
use crate::parsing::{decode_latin1, parse_count, parse_month, parse_municipality_id, parse_year, strip_bom};
use crate::progress::ProgressCallback;
use crate::source_def::{Encoding, SourceDefinition};

/// Records between progress updates.
const PROGRESS_INTERVAL: u64 = 10_000;

/// One valid raw record: all crime counts of one municipality-month.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRow {
    pub municipality_id: MunicipalityId,
    pub period: YearMonth,
    /// Counts in canonical crime type order.
    pub counts: Vec<(CrimeType, u64)>,
    pub file: String,
    pub line: u64,
}

/// A raw record that was dropped, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedRow {
    pub source_id: String,
    pub file: String,
    pub line: u64,
    pub reason: String,
    /// The raw record, fields joined by the source delimiter.
    pub record: String,
}

/// Everything loaded from one source.
#[derive(Debug, Clone, Default)]
pub struct LoadOutcome {
    pub source_id: String,
    pub state: Option<State>,
    pub rows: Vec<ParsedRow>,
    pub rejected: Vec<RejectedRow>,
}

impl LoadOutcome {
    fn new(def: &SourceDefinition) -> Self {
        Self {
            source_id: def.id.clone(),
            state: Some(def.state),
            ..Self::default()
        }
    }
}

/// Decodes a raw file according to `encoding`.
///
/// # Errors
///
/// Returns [`SourceError::MalformedInput`] if a UTF-8 file is not valid
/// UTF-8.
pub fn decode(bytes: Vec<u8>, encoding: Encoding, source_id: &str) -> Result<String, SourceError> {
    let text = match encoding {
        Encoding::Latin1 => decode_latin1(&bytes),
        Encoding::Utf8 => String::from_utf8(bytes).map_err(|e| SourceError::MalformedInput {
            source_id: source_id.to_string(),
            message: format!("file is not valid UTF-8: {e}"),
        })?,
    };
    Ok(strip_bom(&text).to_string())
}

fn parse_record(
    record: &csv::StringRecord,
    plan: &ColumnPlan,
    fill: u64,
) -> Result<(MunicipalityId, YearMonth, Vec<(CrimeType, u64)>), String> {
    if record.len() != plan.width {
        return Err(format!(
            "expected {} fields, found {}",
            plan.width,
            record.len()
        ));
    }
    let field = |i: usize| record.get(i).unwrap_or("");

    let year = parse_year(field(plan.year))?;
    let month = parse_month(field(plan.month))?;
    let period = YearMonth::new(year, month).map_err(|e| e.to_string())?;
    let municipality_id = parse_municipality_id(field(plan.municipality_id))?;

    let mut counts = Vec::with_capacity(plan.crimes.len());
    for (crime, source) in &plan.crimes {
        let count = match source {
            CountSource::Column(i) => {
                parse_count(field(*i), fill).map_err(|e| format!("{crime} {e}"))?
            }
            CountSource::Sum(parts) => {
                let mut total = 0u64;
                for &i in parts {
                    let part =
                        parse_count(field(i), fill).map_err(|e| format!("{crime} {e}"))?;
                    total = total
                        .checked_add(part)
                        .ok_or_else(|| format!("{crime} count overflows"))?;
                }
                total
            }
        };
        counts.push((*crime, count));
    }
    Ok((municipality_id, period, counts))
}

/// Parses already-decoded CSV text belonging to `def`.
///
/// # Errors
///
/// Fails with [`SourceError::MalformedInput`] when the header set cannot
/// be resolved. Bad records do not fail the load; they are returned in
/// [`LoadOutcome::rejected`].
pub fn parse_text(
    text: &str,
    file: &str,
    def: &SourceDefinition,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<LoadOutcome, SourceError> {
    let delimiter = def.delimiter_byte()?;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(ToString::to_string).collect();
    let plan = resolve_columns(&headers, def)?;
    let separator = char::from(delimiter).to_string();

    let mut outcome = LoadOutcome::new(def);
    let mut seen = 0u64;
    for result in reader.records() {
        seen += 1;
        if seen % PROGRESS_INTERVAL == 0 {
            progress.inc(PROGRESS_INTERVAL);
        }

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                let line = e.position().map_or(0, csv::Position::line);
                log::warn!("{}: {file}:{line}: unreadable record: {e}", def.id);
                outcome.rejected.push(RejectedRow {
                    source_id: def.id.clone(),
                    file: file.to_string(),
                    line,
                    reason: format!("unreadable record: {e}"),
                    record: String::new(),
                });
                continue;
            }
        };
        let line = record.position().map_or(0, csv::Position::line);

        match parse_record(&record, &plan, def.fill_missing_with) {
            Ok((municipality_id, period, counts)) => outcome.rows.push(ParsedRow {
                municipality_id,
                period,
                counts,
                file: file.to_string(),
                line,
            }),
            Err(reason) => {
                log::warn!("{}: {file}:{line}: rejected record: {reason}", def.id);
                outcome.rejected.push(RejectedRow {
                    source_id: def.id.clone(),
                    file: file.to_string(),
                    line,
                    reason,
                    record: record.iter().collect::<Vec<_>>().join(&separator),
                });
            }
        }
    }
    progress.inc(seen % PROGRESS_INTERVAL);

    log::info!(
        "{}: {file}: {} record(s) accepted, {} rejected",
        def.id,
        outcome.rows.len(),
        outcome.rejected.len()
    );
    Ok(outcome)
}

/// Loads a single raw file.
///
/// # Errors
///
/// Returns [`SourceError::MissingFile`] if the file does not exist, and
/// propagates decoding and header resolution failures.
pub fn load_file(
    path: &Path,
    def: &SourceDefinition,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<LoadOutcome, SourceError> {
    if !path.is_file() {
        return Err(SourceError::MissingFile {
            source_id: def.id.clone(),
            path: path.display().to_string(),
        });
    }
    let file = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
    progress.set_message(format!("{}: {file}", def.id));

    let text = decode(std::fs::read(path)?, def.encoding, &def.id)?;
    parse_text(&text, &file, def, progress)
}

/// Loads every file of `def` from `raw_dir`.
///
/// # Errors
///
/// Fails on the first missing file or unresolvable header set.
pub fn load_source(
    def: &SourceDefinition,
    raw_dir: &Path,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<LoadOutcome, SourceError> {
    let mut outcome = LoadOutcome::new(def);
    for file in &def.files {
        let part = load_file(&raw_dir.join(file), def, progress)?;
        outcome.rows.extend(part.rows);
        outcome.rejected.extend(part.rejected);
    }
    Ok(outcome)
}
