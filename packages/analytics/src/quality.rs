//! Data-quality diagnostic.
//!
//! Flags state-months showing the known reporting failures of the public
//! sources: homicide totals that drop to zero in a state that normally
//! reports them, runs of months with no records at all, and months where
//! most municipalities stopped reporting.

use std::collections::{BTreeMap, BTreeSet};

use crime_stats_analytics_models::{FlagReason, QualityCoverage, QualityFlag};
use crime_stats_crime_models::{CrimeType, MunicipalityId, Observation, State, YearMonth};
use crime_stats_stats::descriptive::median;

use crate::config::QualityConfig;
use crate::series::state_spans;

/// Tables produced by the diagnostic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QualityOutput {
    /// Sorted by (state, year, month, reason).
    pub flags: Vec<QualityFlag>,
    pub coverage: Vec<QualityCoverage>,
}

#[derive(Default)]
struct StateMonths {
    homicide: BTreeMap<YearMonth, u64>,
    all_crimes: BTreeMap<YearMonth, u64>,
    reporting: BTreeMap<YearMonth, BTreeSet<MunicipalityId>>,
    municipalities: BTreeSet<MunicipalityId>,
}

fn collect(observations: &[Observation]) -> BTreeMap<State, StateMonths> {
    let mut by_state: BTreeMap<State, StateMonths> = BTreeMap::new();
    for o in observations {
        let s = by_state.entry(o.state).or_default();
        let p = o.period();
        s.municipalities.insert(o.municipality_id);
        let all = s.all_crimes.entry(p).or_insert(0);
        *all = all.saturating_add(o.count);
        if o.crime_type == CrimeType::Homicide {
            let homicides = s.homicide.entry(p).or_insert(0);
            *homicides = homicides.saturating_add(o.count);
        }
        if o.count > 0 {
            s.reporting.entry(p).or_default().insert(o.municipality_id);
        }
    }
    by_state
}

fn flag(state: State, period: YearMonth, reason: FlagReason, detail: String) -> QualityFlag {
    QualityFlag {
        state,
        year: period.year,
        month: period.month,
        reason,
        detail,
    }
}

/// Scans the canonical table for anomalous state-months.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn diagnose(observations: &[Observation], config: &QualityConfig) -> QualityOutput {
    let spans = state_spans(observations);
    let mut flags = Vec::new();
    let mut coverage = Vec::new();

    for (state, data) in collect(observations) {
        let Some(&(start, end)) = spans.get(&state) else {
            continue;
        };
        let months = YearMonth::range_inclusive(start, end);
        let homicide: Vec<f64> = months
            .iter()
            .map(|m| data.homicide.get(m).copied().unwrap_or(0) as f64)
            .collect();
        let typical_homicides = median(&homicide);

        let mut run: Vec<YearMonth> = Vec::new();
        let close_run = |run: &mut Vec<YearMonth>, flags: &mut Vec<QualityFlag>| {
            if run.len() >= config.min_zero_run.max(1) {
                let detail = format!("{} consecutive month(s) with no records", run.len());
                for &p in run.iter() {
                    flags.push(flag(state, p, FlagReason::ZeroRun, detail.clone()));
                }
            }
            run.clear();
        };

        let total_municipalities = data.municipalities.len();
        for (i, &period) in months.iter().enumerate() {
            if homicide[i] < 0.5 && typical_homicides > 0.0 {
                flags.push(flag(
                    state,
                    period,
                    FlagReason::ZeroTotal,
                    format!("no homicides recorded; median month has {typical_homicides}"),
                ));
            }

            if data.all_crimes.get(&period).copied().unwrap_or(0) == 0 {
                run.push(period);
            } else {
                close_run(&mut run, &mut flags);
            }

            let reporting = data.reporting.get(&period).map_or(0, BTreeSet::len);
            if total_municipalities > 0 {
                let ratio = reporting as f64 / total_municipalities as f64;
                if ratio < config.min_coverage_ratio {
                    flags.push(flag(
                        state,
                        period,
                        FlagReason::LowCoverage,
                        format!("{reporting} of {total_municipalities} municipalities reported"),
                    ));
                }
            }
        }
        close_run(&mut run, &mut flags);

        let flagged: BTreeSet<YearMonth> = flags
            .iter()
            .filter(|f| f.state == state)
            .filter_map(|f| YearMonth::new(f.year, f.month).ok())
            .collect();
        let years: BTreeSet<i32> = months.iter().map(|m| m.year).collect();
        for year in years {
            let in_year = months.iter().filter(|m| m.year == year);
            let months_with_data = in_year
                .clone()
                .filter(|m| data.all_crimes.get(m).copied().unwrap_or(0) > 0)
                .count();
            let reporting: BTreeSet<MunicipalityId> = in_year
                .clone()
                .filter_map(|m| data.reporting.get(m))
                .flatten()
                .copied()
                .collect();
            let flagged_months = in_year.filter(|m| flagged.contains(m)).count();
            coverage.push(QualityCoverage {
                state,
                year,
                months_with_data: to_u32(months_with_data),
                reporting_municipalities: to_u32(reporting.len()),
                total_municipalities: to_u32(total_municipalities),
                flagged_months: to_u32(flagged_months),
            });
        }
    }

    flags.sort_by(|a, b| {
        (a.state, a.year, a.month, a.reason).cmp(&(b.state, b.year, b.month, b.reason))
    });
    for f in &flags {
        log::warn!("{} {:04}-{:02}: {} ({})", f.state, f.year, f.month, f.reason, f.detail);
    }
    log::info!("Quality diagnostic raised {} flag(s)", flags.len());

    QualityOutput { flags, coverage }
}

fn to_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{grid, municipality_ids, observations, ym};

    #[test]
    fn clean_table_raises_no_flags() {
        let obs = observations(State::Sp, ym(2020, 1), &[30.0; 24], 3);
        let out = diagnose(&obs, &QualityConfig::default());
        assert!(out.flags.is_empty());
        assert_eq!(out.coverage.len(), 2);
        assert_eq!(out.coverage[0].months_with_data, 12);
        assert_eq!(out.coverage[0].reporting_municipalities, 3);
    }

    #[test]
    fn huge_counts_do_not_overflow_state_totals() {
        let mut obs = observations(State::Sp, ym(2020, 1), &[30.0; 24], 2);
        for o in obs.iter_mut().filter(|o| o.crime_type == CrimeType::Homicide) {
            o.count = u64::MAX;
        }
        let out = diagnose(&obs, &QualityConfig::default());
        assert!(out.flags.is_empty());
    }

    #[test]
    fn homicide_gap_is_a_zero_total() {
        // Sep-Dec 2021 without homicides, other crimes still reported.
        let mut homicides = vec![50.0; 36];
        for h in &mut homicides[20..24] {
            *h = 0.0;
        }
        let obs = observations(State::Sp, ym(2020, 1), &homicides, 2);
        let out = diagnose(&obs, &QualityConfig::default());
        let zero_totals: Vec<_> = out
            .flags
            .iter()
            .filter(|f| f.reason == FlagReason::ZeroTotal)
            .map(|f| (f.year, f.month))
            .collect();
        assert_eq!(zero_totals, vec![(2021, 9), (2021, 10), (2021, 11), (2021, 12)]);
        assert!(out.flags.iter().all(|f| f.reason != FlagReason::ZeroRun));
        assert_eq!(out.coverage[1].flagged_months, 4);
    }

    #[test]
    fn empty_months_form_a_zero_run() {
        let ids = municipality_ids(State::Rj, 4);
        let obs = grid(State::Rj, ym(2020, 1), 12, &ids, |_, _, i| {
            if (5..8).contains(&i) { 0 } else { 3 }
        });
        let out = diagnose(&obs, &QualityConfig::default());
        let runs: Vec<_> = out
            .flags
            .iter()
            .filter(|f| f.reason == FlagReason::ZeroRun)
            .map(|f| f.month)
            .collect();
        assert_eq!(runs, vec![6, 7, 8]);
        let run = out
            .flags
            .iter()
            .find(|f| f.reason == FlagReason::ZeroRun)
            .unwrap();
        assert!(run.detail.contains("3 consecutive"));
    }

    #[test]
    fn single_empty_month_is_not_a_run() {
        let ids = municipality_ids(State::Rj, 1);
        let obs = grid(State::Rj, ym(2020, 1), 6, &ids, |_, _, i| u64::from(i != 2));
        let out = diagnose(&obs, &QualityConfig::default());
        assert!(out.flags.iter().all(|f| f.reason != FlagReason::ZeroRun));
    }

    #[test]
    fn collapsed_reporting_is_low_coverage() {
        let ids = municipality_ids(State::Sp, 4);
        let first = ids[0];
        let obs = grid(State::Sp, ym(2022, 1), 6, &ids, |id, _, i| {
            if i == 4 && id != first { 0 } else { 7 }
        });
        let out = diagnose(&obs, &QualityConfig::default());
        assert_eq!(out.flags.len(), 1);
        assert_eq!(out.flags[0].reason, FlagReason::LowCoverage);
        assert_eq!(out.flags[0].month, 5);
        assert_eq!(out.flags[0].detail, "1 of 4 municipalities reported");
    }
}
