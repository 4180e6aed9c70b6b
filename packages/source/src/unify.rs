//! Merges loaded sources into the canonical table.

use std::collections::{BTreeMap, BTreeSet};

use crime_stats_crime_models::{CrimeType, MunicipalityId, Observation, State, YearMonth};

use crate::loader::{LoadOutcome, RejectedRow};

/// The unified, zero-filled canonical table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalTable {
    /// Sorted by `(state, municipality_id, year, month, crime_type)`.
    pub observations: Vec<Observation>,
    /// Every record dropped while loading or unifying.
    pub rejected: Vec<RejectedRow>,
    /// Observations added with count 0 by the zero-fill.
    pub zero_filled: usize,
}

type RowKey = (State, MunicipalityId, YearMonth);

/// Merges every outcome into one table.
///
/// Duplicate (state, municipality, month) records are rejected, keeping
/// the first one seen in load order. Each state is then completed to the
/// full grid of its municipalities × every month between its first and
/// last observation × every crime type, with absent cells set to zero.
#[must_use]
pub fn unify(outcomes: Vec<LoadOutcome>) -> CanonicalTable {
    let mut rejected = Vec::new();
    let mut first_seen: BTreeMap<RowKey, (String, u64)> = BTreeMap::new();
    let mut counts: BTreeMap<(State, MunicipalityId, YearMonth, CrimeType), u64> = BTreeMap::new();

    for outcome in outcomes {
        rejected.extend(outcome.rejected);
        let Some(state) = outcome.state else {
            continue;
        };
        for row in outcome.rows {
            let key = (state, row.municipality_id, row.period);
            if let Some((file, line)) = first_seen.get(&key) {
                let reason = format!(
                    "duplicate key {state}/{}/{} (first seen at {file}:{line})",
                    row.municipality_id, row.period
                );
                log::warn!("{}: {}:{}: {reason}", outcome.source_id, row.file, row.line);
                rejected.push(RejectedRow {
                    source_id: outcome.source_id.clone(),
                    file: row.file,
                    line: row.line,
                    reason,
                    record: String::new(),
                });
                continue;
            }
            first_seen.insert(key, (row.file.clone(), row.line));
            for (crime, count) in row.counts {
                counts.insert((state, row.municipality_id, row.period, crime), count);
            }
        }
    }

    let mut municipalities: BTreeMap<State, BTreeSet<MunicipalityId>> = BTreeMap::new();
    let mut span: BTreeMap<State, (YearMonth, YearMonth)> = BTreeMap::new();
    for &(state, municipality_id, period) in first_seen.keys() {
        municipalities.entry(state).or_default().insert(municipality_id);
        span.entry(state)
            .and_modify(|(lo, hi)| {
                *lo = (*lo).min(period);
                *hi = (*hi).max(period);
            })
            .or_insert((period, period));
    }

    let mut observations = Vec::with_capacity(counts.len());
    let mut zero_filled = 0;
    for (state, ids) in &municipalities {
        let Some(&(start, end)) = span.get(state) else {
            continue;
        };
        let months = YearMonth::range_inclusive(start, end);
        for &municipality_id in ids {
            for &period in &months {
                for &crime_type in CrimeType::all() {
                    let count = counts
                        .get(&(*state, municipality_id, period, crime_type))
                        .copied()
                        .unwrap_or_else(|| {
                            zero_filled += 1;
                            0
                        });
                    observations.push(Observation {
                        state: *state,
                        municipality_id,
                        year: period.year,
                        month: period.month,
                        crime_type,
                        count,
                    });
                }
            }
        }
    }

    log::info!(
        "Unified {} observation(s) ({zero_filled} zero-filled), {} rejected record(s)",
        observations.len(),
        rejected.len()
    );

    CanonicalTable {
        observations,
        rejected,
        zero_filled,
    }
}
