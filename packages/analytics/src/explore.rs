//! Descriptive explorer: monthly and annual aggregates and distribution
//! summaries of the state totals.

use std::collections::{BTreeMap, BTreeSet};

use crime_stats_analytics_models::{AnnualTotal, DistributionSummary, MonthlyTotal};
use crime_stats_crime_models::{CrimeType, Observation, State, YearMonth};
use crime_stats_stats::descriptive::summarize;

use crate::series::{build_state_series, monthly_totals, state_spans};

/// Tables produced by the explorer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExploreOutput {
    pub monthly: Vec<MonthlyTotal>,
    pub annual: Vec<AnnualTotal>,
    pub distribution: Vec<DistributionSummary>,
    /// Month range covered by every state, if they overlap.
    pub common_period: Option<(YearMonth, YearMonth)>,
}

/// Overlap of the month ranges of all states present.
#[must_use]
pub fn common_period(observations: &[Observation]) -> Option<(YearMonth, YearMonth)> {
    let spans = state_spans(observations);
    let start = spans.values().map(|(lo, _)| *lo).max()?;
    let end = spans.values().map(|(_, hi)| *hi).min()?;
    (start <= end).then_some((start, end))
}

#[must_use]
pub fn explore(observations: &[Observation]) -> ExploreOutput {
    let totals = monthly_totals(observations);

    let monthly: Vec<MonthlyTotal> = totals
        .iter()
        .map(|(&(state, crime_type, period), &total)| MonthlyTotal {
            state,
            crime_type,
            year: period.year,
            month: period.month,
            total,
        })
        .collect();

    let mut annual_acc: BTreeMap<(State, CrimeType, i32), (u64, BTreeSet<u8>)> = BTreeMap::new();
    for (&(state, crime_type, period), &total) in &totals {
        let entry = annual_acc
            .entry((state, crime_type, period.year))
            .or_default();
        entry.0 += total;
        entry.1.insert(period.month);
    }
    let annual = annual_acc
        .into_iter()
        .map(|((state, crime_type, year), (total, months))| AnnualTotal {
            state,
            crime_type,
            year,
            total,
            months_with_data: u32::try_from(months.len()).unwrap_or(u32::MAX),
        })
        .collect();

    let distribution = build_state_series(observations)
        .into_values()
        .filter_map(|s| {
            let summary = summarize(&s.values)?;
            Some(DistributionSummary {
                state: s.state,
                crime_type: s.crime_type,
                count: summary.count,
                mean: summary.mean,
                std: summary.std,
                min: summary.min,
                q1: summary.q1,
                median: summary.median,
                q3: summary.q3,
                max: summary.max,
            })
        })
        .collect();

    let common_period = common_period(observations);
    match common_period {
        Some((start, end)) => log::info!("Common period across states: {start} to {end}"),
        None => log::warn!("States share no common month range"),
    }

    ExploreOutput {
        monthly,
        annual,
        distribution,
        common_period,
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::fixtures::{observations, ym};

    #[test]
    fn aggregates_months_and_years() {
        let homicides: Vec<f64> = (1..=14).map(f64::from).collect();
        let obs = observations(State::Sp, ym(2020, 1), &homicides, 3);
        let out = explore(&obs);

        let homicide_monthly: Vec<_> = out
            .monthly
            .iter()
            .filter(|m| m.crime_type == CrimeType::Homicide)
            .collect();
        assert_eq!(homicide_monthly.len(), 14);
        assert_eq!(homicide_monthly[13].total, 14);

        let annual: Vec<_> = out
            .annual
            .iter()
            .filter(|a| a.crime_type == CrimeType::Homicide)
            .collect();
        assert_eq!(annual.len(), 2);
        assert_eq!(annual[0].total, 78);
        assert_eq!(annual[0].months_with_data, 12);
        assert_eq!(annual[1].total, 27);
        assert_eq!(annual[1].months_with_data, 2);
    }

    #[test]
    fn distribution_summarizes_state_totals() {
        let obs = observations(State::Rj, ym(2021, 1), &[2.0, 4.0, 6.0, 8.0], 1);
        let out = explore(&obs);
        let d = out
            .distribution
            .iter()
            .find(|d| d.crime_type == CrimeType::Homicide)
            .unwrap();
        assert_eq!(d.count, 4);
        assert_relative_eq!(d.mean, 5.0);
        assert_relative_eq!(d.median, 5.0);
        assert_relative_eq!(d.min, 2.0);
        assert_relative_eq!(d.max, 8.0);
    }

    #[test]
    fn common_period_is_the_overlap() {
        let mut obs = observations(State::Sp, ym(2020, 1), &[1.0; 24], 1);
        obs.extend(observations(State::Rj, ym(2020, 7), &[1.0; 24], 1));
        assert_eq!(common_period(&obs), Some((ym(2020, 7), ym(2021, 12))));

        let disjoint = [
            observations(State::Sp, ym(2019, 1), &[1.0; 3], 1),
            observations(State::Rj, ym(2022, 1), &[1.0; 3], 1),
        ]
        .concat();
        assert_eq!(common_period(&disjoint), None);
        assert_eq!(common_period(&[]), None);
    }
}
