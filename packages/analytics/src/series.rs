//! State time series and the exclusion of flagged months.

use std::collections::{BTreeMap, BTreeSet};

use crime_stats_analytics_models::QualityFlag;
use crime_stats_crime_models::{CrimeType, Observation, State, YearMonth};

use crate::config::FlagPolicy;

/// Gap-free monthly state totals of one crime type.
#[derive(Debug, Clone, PartialEq)]
pub struct StateSeries {
    pub state: State,
    pub crime_type: CrimeType,
    /// Month of `values[0]`.
    pub start: YearMonth,
    pub values: Vec<f64>,
}

impl StateSeries {
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Month of `values[i]`.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn period(&self, i: usize) -> YearMonth {
        YearMonth::from_index(self.start.index() + i as i64)
    }

    /// Month of the last value.
    #[must_use]
    pub fn end(&self) -> Option<YearMonth> {
        self.values.len().checked_sub(1).map(|i| self.period(i))
    }

    /// `(month, value)` pairs in order.
    pub fn points(&self) -> impl Iterator<Item = (YearMonth, f64)> + '_ {
        self.values
            .iter()
            .enumerate()
            .map(|(i, &v)| (self.period(i), v))
    }

    /// Points whose month is not in `excluded`.
    #[must_use]
    pub fn clean_points(&self, excluded: &BTreeSet<YearMonth>) -> Vec<(YearMonth, f64)> {
        self.points().filter(|(p, _)| !excluded.contains(p)).collect()
    }

    /// Values of [`Self::clean_points`].
    #[must_use]
    pub fn clean_values(&self, excluded: &BTreeSet<YearMonth>) -> Vec<f64> {
        self.clean_points(excluded).into_iter().map(|(_, v)| v).collect()
    }

    /// Longest contiguous stretch containing no month from `excluded`.
    /// Ties go to the later stretch, which holds the most recent data.
    #[must_use]
    pub fn longest_clean_run(&self, excluded: &BTreeSet<YearMonth>) -> Self {
        let mut best = (0, 0);
        let mut start = 0;
        for i in 0..=self.values.len() {
            let broken = i == self.values.len() || excluded.contains(&self.period(i));
            if broken {
                if i - start >= best.1 - best.0 && i > start {
                    best = (start, i);
                }
                start = i + 1;
            }
        }
        Self {
            state: self.state,
            crime_type: self.crime_type,
            start: self.period(best.0),
            values: self.values[best.0..best.1].to_vec(),
        }
    }

    /// `"SP homicide"`, used to give errors context.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} {}", self.state, self.crime_type)
    }
}

/// Monthly state totals keyed by (state, crime type, month).
///
/// Totals saturate at `u64::MAX` instead of wrapping.
#[must_use]
pub fn monthly_totals(observations: &[Observation]) -> BTreeMap<(State, CrimeType, YearMonth), u64> {
    let mut totals = BTreeMap::new();
    let mut saturated = false;
    for o in observations {
        let total = totals.entry((o.state, o.crime_type, o.period())).or_insert(0u64);
        saturated |= total.checked_add(o.count).is_none();
        *total = total.saturating_add(o.count);
    }
    if saturated {
        log::warn!("Some monthly state totals exceed u64::MAX and were capped");
    }
    totals
}

/// First and last month present for each state.
#[must_use]
pub fn state_spans(observations: &[Observation]) -> BTreeMap<State, (YearMonth, YearMonth)> {
    let mut spans: BTreeMap<State, (YearMonth, YearMonth)> = BTreeMap::new();
    for o in observations {
        let p = o.period();
        spans
            .entry(o.state)
            .and_modify(|(lo, hi)| {
                *lo = (*lo).min(p);
                *hi = (*hi).max(p);
            })
            .or_insert((p, p));
    }
    spans
}

/// Builds one zero-filled series per (state, crime type), spanning each
/// state's first to last month.
#[must_use]
pub fn build_state_series(observations: &[Observation]) -> BTreeMap<(State, CrimeType), StateSeries> {
    let totals = monthly_totals(observations);
    let mut out = BTreeMap::new();
    for (state, (start, end)) in state_spans(observations) {
        let months = YearMonth::range_inclusive(start, end);
        for &crime_type in CrimeType::all() {
            #[allow(clippy::cast_precision_loss)]
            let values = months
                .iter()
                .map(|&m| totals.get(&(state, crime_type, m)).copied().unwrap_or(0) as f64)
                .collect();
            out.insert(
                (state, crime_type),
                StateSeries {
                    state,
                    crime_type,
                    start,
                    values,
                },
            );
        }
    }
    out
}

/// Months excluded from analysis, per state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Exclusions {
    by_state: BTreeMap<State, BTreeSet<YearMonth>>,
    none: BTreeSet<YearMonth>,
}

impl Exclusions {
    /// Collects the flagged months. Under [`FlagPolicy::FlagOnly`] nothing
    /// is excluded.
    #[must_use]
    pub fn from_flags(flags: &[QualityFlag], policy: FlagPolicy) -> Self {
        let mut by_state: BTreeMap<State, BTreeSet<YearMonth>> = BTreeMap::new();
        if policy == FlagPolicy::Exclude {
            for f in flags {
                if let Ok(period) = YearMonth::new(f.year, f.month) {
                    by_state.entry(f.state).or_default().insert(period);
                }
            }
        }
        let excluded: usize = by_state.values().map(BTreeSet::len).sum();
        if excluded > 0 {
            log::info!("Excluding {excluded} flagged state-month(s) from analysis");
        }
        Self {
            by_state,
            none: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn for_state(&self, state: State) -> &BTreeSet<YearMonth> {
        self.by_state.get(&state).unwrap_or(&self.none)
    }

    #[must_use]
    pub fn is_excluded(&self, state: State, period: YearMonth) -> bool {
        self.for_state(state).contains(&period)
    }
}

#[cfg(test)]
mod tests {
    use crime_stats_analytics_models::FlagReason;

    use super::*;
    use crate::fixtures::{observations, ym};

    fn series(values: &[f64]) -> StateSeries {
        StateSeries {
            state: State::Sp,
            crime_type: CrimeType::Homicide,
            start: ym(2020, 1),
            values: values.to_vec(),
        }
    }

    #[test]
    fn monthly_totals_saturate_instead_of_overflowing() {
        let obs: Vec<Observation> = [3_550_308, 3_509_502]
            .into_iter()
            .map(|municipality_id| Observation {
                state: State::Sp,
                municipality_id,
                year: 2021,
                month: 9,
                crime_type: CrimeType::RobberyTotal,
                count: u64::MAX,
            })
            .collect();
        let totals = monthly_totals(&obs);
        assert_eq!(
            totals[&(State::Sp, CrimeType::RobberyTotal, ym(2021, 9))],
            u64::MAX
        );
        let all = build_state_series(&obs);
        assert!(all[&(State::Sp, CrimeType::RobberyTotal)].values[0] > 0.0);
    }

    #[test]
    fn builds_zero_filled_series() {
        let obs = observations(State::Rj, ym(2020, 11), &[3.0, 4.0, 5.0], 2);
        let all = build_state_series(&obs);
        let s = &all[&(State::Rj, CrimeType::Homicide)];
        assert_eq!(s.start, ym(2020, 11));
        assert_eq!(s.end(), Some(ym(2021, 1)));
        // Two municipalities share the state total.
        assert_eq!(s.values, vec![3.0, 4.0, 5.0]);
        assert_eq!(all.len(), CrimeType::all().len());
    }

    #[test]
    fn longest_clean_run_skips_flagged_months() {
        let s = series(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
        let excluded: BTreeSet<_> = [ym(2020, 3)].into_iter().collect();
        let run = s.longest_clean_run(&excluded);
        assert_eq!(run.start, ym(2020, 4));
        assert_eq!(run.values, vec![4.0, 5.0, 6.0, 7.0]);

        let whole = s.longest_clean_run(&BTreeSet::new());
        assert_eq!(whole, s);
    }

    #[test]
    fn equal_runs_prefer_the_later_one() {
        let s = series(&[1.0, 2.0, 0.0, 3.0, 4.0]);
        let excluded: BTreeSet<_> = [ym(2020, 3)].into_iter().collect();
        assert_eq!(s.longest_clean_run(&excluded).values, vec![3.0, 4.0]);
    }

    #[test]
    fn flag_only_excludes_nothing() {
        let flags = vec![QualityFlag {
            state: State::Sp,
            year: 2021,
            month: 9,
            reason: FlagReason::ZeroTotal,
            detail: String::new(),
        }];
        let excluding = Exclusions::from_flags(&flags, FlagPolicy::Exclude);
        assert!(excluding.is_excluded(State::Sp, ym(2021, 9)));
        assert!(!excluding.is_excluded(State::Rj, ym(2021, 9)));
        let keeping = Exclusions::from_flags(&flags, FlagPolicy::FlagOnly);
        assert!(keeping.for_state(State::Sp).is_empty());
    }
}
