//! Builds each report section from the upstream tables.

use std::collections::{BTreeMap, BTreeSet};

use crime_stats_analytics_models::{
    ComparisonPairwise, FlagReason, ForecastMetric, ModelKind, SpatialMunicipality, split_list,
};
use crime_stats_crime_models::{CrimeType, MunicipalityId, State, YearMonth};

use crate::ReportInputs;
use crate::document::{Section, Table};
use crate::format::{month_list, num, opt, p_value, plain_list, signed_pct, yes_no};

/// Rows shown in long tables before truncation.
const MAX_ROWS: usize = 40;
const MAX_REJECTED_SHOWN: usize = 10;
const MAX_HOTSPOTS_SHOWN: usize = 15;
const TOP_FEATURES: usize = 5;

#[allow(clippy::cast_precision_loss)]
fn mean_of(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

pub fn coverage(inputs: &ReportInputs) -> Section {
    let mut section = Section::new("Data coverage");

    let mut municipalities: BTreeMap<State, BTreeSet<MunicipalityId>> = BTreeMap::new();
    let mut spans: BTreeMap<State, (YearMonth, YearMonth)> = BTreeMap::new();
    let mut rows: BTreeMap<State, usize> = BTreeMap::new();
    for o in &inputs.observations {
        municipalities.entry(o.state).or_default().insert(o.municipality_id);
        *rows.entry(o.state).or_insert(0) += 1;
        let p = o.period();
        spans
            .entry(o.state)
            .and_modify(|(lo, hi)| {
                *lo = (*lo).min(p);
                *hi = (*hi).max(p);
            })
            .or_insert((p, p));
    }

    section.paragraph(format!(
        "The canonical table holds {} observation(s) across {} state(s).",
        inputs.observations.len(),
        spans.len()
    ));
    let mut table = Table::new(&[
        "State",
        "Municipalities",
        "First month",
        "Last month",
        "Months",
        "Observations",
        "Homicides in last month",
    ]);
    for (state, (start, end)) in &spans {
        let latest = inputs
            .monthly
            .iter()
            .find(|m| {
                m.state == *state
                    && m.crime_type == CrimeType::Homicide
                    && (m.year, m.month) == (end.year, end.month)
            })
            .map_or_else(|| "n/a".to_string(), |m| m.total.to_string());
        table.row(vec![
            format!("{} ({state})", state.name()),
            municipalities.get(state).map_or(0, BTreeSet::len).to_string(),
            start.to_string(),
            end.to_string(),
            (start.months_until(*end) + 1).to_string(),
            rows.get(state).copied().unwrap_or(0).to_string(),
            latest,
        ]);
    }
    section.table_or(table, "No observations were loaded.");

    if inputs.rejected.is_empty() {
        section.paragraph("No raw records were rejected while loading.");
    } else {
        section.paragraph(format!(
            "{} raw record(s) were rejected while loading and are listed in rejected_rows.csv.",
            inputs.rejected.len()
        ));
        section.list(
            inputs
                .rejected
                .iter()
                .take(MAX_REJECTED_SHOWN)
                .map(|r| format!("{} {}:{}: {}", r.source_id, r.file, r.line, r.reason))
                .collect(),
        );
    }

    section.heading("Annual totals");
    let mut headers = vec!["State", "Year"];
    headers.extend(CrimeType::all().iter().map(|c| c.label()));
    headers.push("Months");
    let mut annual: BTreeMap<(State, i32), (BTreeMap<CrimeType, u64>, u32)> = BTreeMap::new();
    for row in &inputs.annual {
        let entry = annual.entry((row.state, row.year)).or_default();
        entry.0.insert(row.crime_type, row.total);
        entry.1 = entry.1.max(row.months_with_data);
    }
    let mut table = Table::new(&headers);
    for ((state, year), (totals, months)) in &annual {
        let mut cells = vec![state.to_string(), year.to_string()];
        cells.extend(
            CrimeType::all()
                .iter()
                .map(|c| totals.get(c).map_or_else(|| "n/a".to_string(), ToString::to_string)),
        );
        cells.push(months.to_string());
        table.row(cells);
    }
    section.table_or(table, "No annual totals are available.");

    section.heading("Monthly distribution");
    let mut table = Table::new(&["State", "Crime", "Months", "Mean", "Std", "Min", "Median", "Max"]);
    for d in &inputs.distribution {
        table.row(vec![
            d.state.to_string(),
            d.crime_type.label().to_string(),
            d.count.to_string(),
            num(d.mean, 1),
            num(d.std, 1),
            num(d.min, 0),
            num(d.median, 1),
            num(d.max, 0),
        ]);
    }
    section.table_or(table, "No distribution summary is available.");
    section
}

pub fn quality(inputs: &ReportInputs) -> Section {
    let mut section = Section::new("Data quality");
    section.paragraph(if inputs.flagged_months_excluded {
        "Flagged state-months are excluded from the comparison, spatial, seasonality and forecast stages."
    } else {
        "Flagged state-months are reported only; downstream stages analyse every month."
    });

    let mut counts: BTreeMap<(State, FlagReason), usize> = BTreeMap::new();
    for f in &inputs.flags {
        *counts.entry((f.state, f.reason)).or_insert(0) += 1;
    }
    if counts.is_empty() {
        section.paragraph("No anomalous months were found.");
    } else {
        section.list(
            counts
                .iter()
                .map(|((state, reason), n)| format!("{state}: {n} month(s) flagged as {reason}"))
                .collect(),
        );
    }

    section.heading("Reporting coverage");
    let mut table = Table::new(&[
        "State",
        "Year",
        "Months with data",
        "Reporting municipalities",
        "Municipalities",
        "Flagged months",
    ]);
    for c in &inputs.coverage {
        table.row(vec![
            c.state.to_string(),
            c.year.to_string(),
            c.months_with_data.to_string(),
            c.reporting_municipalities.to_string(),
            c.total_municipalities.to_string(),
            c.flagged_months.to_string(),
        ]);
    }
    section.table_or(table, "No coverage data is available.");

    if !inputs.flags.is_empty() {
        section.heading("Flagged months");
        let mut table = Table::new(&["State", "Month", "Reason", "Detail"]);
        for f in &inputs.flags {
            table.row(vec![
                f.state.to_string(),
                format!("{:04}-{:02}", f.year, f.month),
                f.reason.to_string(),
                f.detail.clone(),
            ]);
        }
        section.table_or(table.truncated(MAX_ROWS), "");
    }
    section
}

fn pair_sentence(p: &ComparisonPairwise) -> String {
    let (higher, lower, hi, lo) = if p.mean_b_above_a {
        (p.state_b, p.state_a, p.mean_b, p.mean_a)
    } else {
        (p.state_a, p.state_b, p.mean_a, p.mean_b)
    };
    let gap = if lo > 0.0 {
        format!(" ({:.1}% higher)", (hi / lo - 1.0) * 100.0)
    } else {
        String::new()
    };
    let verdict = if p.significant {
        "statistically significant"
    } else {
        "not statistically significant"
    };
    let mut sentence = format!(
        "{}: {higher} averages {} per month against {} in {lower}{gap}; the difference is {verdict} (Mann-Whitney p = {}, r = {}).",
        p.crime_type.label(),
        num(hi, 1),
        num(lo, 1),
        p_value(p.p_value),
        num(p.effect_size_r, 2),
    );
    if p.annual_change_a.is_some() || p.annual_change_b.is_some() {
        sentence.push_str(&format!(
            " Trend: {} {}/year, {} {}/year.",
            p.state_a,
            signed_pct(p.annual_change_a),
            p.state_b,
            signed_pct(p.annual_change_b)
        ));
    }
    sentence
}

pub fn comparison(inputs: &ReportInputs) -> Section {
    let mut section = Section::new("SP vs RJ comparison");
    section.list(inputs.comparison_pairwise.iter().map(pair_sentence).collect());

    section.heading("Per-state statistics");
    let mut table = Table::new(&[
        "State",
        "Crime",
        "Window",
        "Months",
        "Mean",
        "Std",
        "Trend/year",
        "Trend p",
        "Change-points",
        "Seasonal strength",
    ]);
    for r in &inputs.comparison_by_state {
        table.row(vec![
            r.state.to_string(),
            r.crime_type.label().to_string(),
            format!("{} to {}", r.window_start, r.window_end),
            r.months.to_string(),
            num(r.mean, 1),
            num(r.std, 1),
            signed_pct(r.annual_change_pct),
            p_value(r.trend_p_value),
            plain_list(&r.changepoints),
            num(r.seasonal_strength, 2),
        ]);
    }
    section.table_or(table, "No per-state statistics are available.");

    section.heading("Hypothesis tests");
    let mut table = Table::new(&[
        "Crime",
        "Mean A",
        "Mean B",
        "U",
        "p (U)",
        "r",
        "Welch t",
        "p (t)",
        "Cohen's d",
        "Trend gap",
        "Significant",
    ]);
    for p in &inputs.comparison_pairwise {
        table.row(vec![
            format!("{} ({} vs {})", p.crime_type.label(), p.state_a, p.state_b),
            num(p.mean_a, 1),
            num(p.mean_b, 1),
            num(p.u_statistic, 1),
            p_value(p.p_value),
            num(p.effect_size_r, 2),
            num(p.welch_t, 2),
            p_value(p.welch_p_value),
            num(p.cohens_d, 2),
            opt(p.trend_gap_pct, 1),
            yes_no(p.significant),
        ]);
    }
    section.table_or(table, "No cross-state comparison is available.");
    section
}

fn capital_vs_interior(state: State, rows: &[&SpatialMunicipality]) -> String {
    let interior: Vec<f64> = rows
        .iter()
        .filter(|m| !m.capital)
        .map(|m| m.criminality_index)
        .collect();
    let Some(interior_mean) = mean_of(&interior) else {
        return format!("{state}: no interior municipalities were clustered.");
    };
    let Some(capital) = rows.iter().find(|m| m.capital) else {
        return format!(
            "{state}: the capital was not clustered; interior mean index {}.",
            num(interior_mean, 3)
        );
    };
    let ratio = if interior_mean > 0.0 {
        format!(" ({:.1}x the interior)", capital.criminality_index / interior_mean)
    } else {
        String::new()
    };
    format!(
        "{state}: {} has criminality index {}{ratio} against an interior mean of {} over {} municipalities.",
        capital.name,
        num(capital.criminality_index, 3),
        num(interior_mean, 3),
        interior.len()
    )
}

pub fn spatial(inputs: &ReportInputs) -> Section {
    let mut section = Section::new("Spatial profiles");
    let hotspots = inputs.spatial_municipalities.iter().filter(|m| m.hotspot).count();
    section.paragraph(format!(
        "{} municipalities were clustered into {} profile(s); {hotspots} are hotspots and {} were excluded.",
        inputs.spatial_municipalities.len(),
        inputs
            .spatial_municipalities
            .iter()
            .map(|m| m.cluster)
            .collect::<BTreeSet<_>>()
            .len(),
        inputs.spatial_excluded.len()
    ));

    section.heading("Principal components");
    let mut table = Table::new(&["Component", "Explained variance", "Cumulative", "Retained"]);
    for c in &inputs.spatial_pca {
        table.row(vec![
            format!("PC{}", c.component),
            num(c.explained_variance_ratio, 3),
            num(c.cumulative_ratio, 3),
            yes_no(c.retained),
        ]);
    }
    section.table_or(table, "No principal components are available.");

    section.heading("Cluster profiles");
    let mut table = Table::new(&[
        "Cluster",
        "State",
        "Municipalities",
        "Hotspots",
        "Homicide",
        "Vehicle robbery",
        "Vehicle theft",
        "Violent",
        "Volatility",
        "Index",
    ]);
    for c in &inputs.spatial_clusters {
        table.row(vec![
            c.cluster.to_string(),
            c.state.to_string(),
            c.municipalities.to_string(),
            c.hotspots.to_string(),
            num(c.homicide_mean, 2),
            num(c.vehicle_robbery_mean, 2),
            num(c.vehicle_theft_mean, 2),
            num(c.violent_mean, 2),
            num(c.volatility, 3),
            num(c.criminality_index, 3),
        ]);
    }
    section.table_or(table, "No cluster profiles are available.");

    section.heading("Hotspots");
    let mut table = Table::new(&["Rank", "Municipality", "State", "Region", "Capital", "Index", "Cluster"]);
    for h in &inputs.spatial_hotspots {
        table.row(vec![
            h.rank.to_string(),
            h.name.clone(),
            h.state.to_string(),
            h.region.clone(),
            yes_no(h.capital),
            num(h.criminality_index, 3),
            h.cluster.to_string(),
        ]);
    }
    section.table_or(table.truncated(MAX_HOTSPOTS_SHOWN), "No hotspots were identified.");

    section.heading("Capital vs interior");
    let mut by_state: BTreeMap<State, Vec<&SpatialMunicipality>> = BTreeMap::new();
    for m in &inputs.spatial_municipalities {
        by_state.entry(m.state).or_default().push(m);
    }
    if by_state.is_empty() {
        section.paragraph("No municipalities were clustered.");
    } else {
        section.list(
            by_state
                .iter()
                .map(|(state, rows)| capital_vs_interior(*state, rows))
                .collect(),
        );
    }

    if !inputs.spatial_excluded.is_empty() {
        section.heading("Excluded municipalities");
        let mut table = Table::new(&["Municipality", "State", "Reason"]);
        for e in &inputs.spatial_excluded {
            table.row(vec![e.name.clone(), e.state.to_string(), e.reason.clone()]);
        }
        section.table_or(table.truncated(MAX_ROWS), "");
    }
    section
}

pub fn seasonality(inputs: &ReportInputs) -> Section {
    let mut section = Section::new("Seasonality");
    let strongest = inputs
        .seasonal_strength
        .iter()
        .filter(|s| s.seasonal_strength.is_finite())
        .max_by(|a, b| a.seasonal_strength.total_cmp(&b.seasonal_strength));
    if let Some(s) = strongest {
        section.paragraph(format!(
            "The most seasonal series is {} in {} (strength {}), peaking in {}.",
            s.crime_type.label().to_lowercase(),
            s.state,
            num(s.seasonal_strength, 2),
            month_list(&s.peak_months)
        ));
    }

    let mut table = Table::new(&[
        "State",
        "Crime",
        "Months",
        "Seasonal strength",
        "Trend strength",
        "Peaks",
        "Peak mean (95% CI)",
        "Troughs",
        "Swing",
    ]);
    for s in &inputs.seasonal_strength {
        let peak = split_list(&s.peak_months)
            .first()
            .and_then(|m| m.parse::<u8>().ok())
            .and_then(|month| {
                inputs.monthly_patterns.iter().find(|p| {
                    p.state == s.state && p.crime_type == s.crime_type && p.month == month
                })
            })
            .map_or_else(
                || "n/a".to_string(),
                |p| format!("{} ({} to {})", num(p.mean, 1), num(p.ci_lower, 1), num(p.ci_upper, 1)),
            );
        table.row(vec![
            s.state.to_string(),
            s.crime_type.label().to_string(),
            s.months.to_string(),
            num(s.seasonal_strength, 2),
            num(s.trend_strength, 2),
            month_list(&s.peak_months),
            peak,
            month_list(&s.trough_months),
            opt(s.swing_pct, 1),
        ]);
    }
    section.table_or(table, "No seasonal decomposition is available.");

    section.heading("Holt-Winters held-out accuracy");
    let mut table = Table::new(&["State", "Crime", "Train", "Test", "MAE", "RMSE", "MAPE %", "Next months"]);
    for f in &inputs.seasonal_forecasts {
        table.row(vec![
            f.state.to_string(),
            f.crime_type.label().to_string(),
            f.train_months.to_string(),
            f.test_months.to_string(),
            num(f.mae, 1),
            num(f.rmse, 1),
            opt(f.mape, 1),
            plain_list(&f.next_forecast),
        ]);
    }
    section.table_or(table, "No seasonal forecasts are available.");

    section.heading("Robbery and theft");
    section.list(
        inputs
            .cross_correlation
            .iter()
            .filter(|c| c.best)
            .map(|c| {
                format!(
                    "{}: strongest robbery/theft correlation {} at lag {} month(s).",
                    c.state,
                    num(c.correlation, 2),
                    c.lag
                )
            })
            .collect(),
    );
    section
}

fn best_model(metrics: &[&ForecastMetric]) -> Option<ModelKind> {
    metrics
        .iter()
        .filter(|m| m.mean_r_squared.is_finite())
        .max_by(|a, b| a.mean_r_squared.total_cmp(&b.mean_r_squared))
        .map(|m| m.model)
}

pub fn forecast(inputs: &ReportInputs) -> Section {
    let mut section = Section::new("Forecast ensemble");

    let mut by_state: BTreeMap<State, Vec<&ForecastMetric>> = BTreeMap::new();
    for m in &inputs.forecast_metrics {
        by_state.entry(m.state).or_default().push(m);
    }
    section.list(
        by_state
            .iter()
            .filter_map(|(state, metrics)| {
                best_model(metrics).map(|model| {
                    format!(
                        "{state}: best cross-validated model is {model} over {} prediction(s).",
                        inputs
                            .forecast_predictions
                            .iter()
                            .filter(|p| p.state == *state)
                            .count()
                    )
                })
            })
            .collect(),
    );

    let mut table = Table::new(&["State", "Model", "Mean R²", "Mean MAE", "Folds"]);
    for m in &inputs.forecast_metrics {
        table.row(vec![
            m.state.to_string(),
            m.model.to_string(),
            num(m.mean_r_squared, 3),
            num(m.mean_mae, 2),
            m.folds.to_string(),
        ]);
    }
    section.table_or(table, "No forecast metrics are available.");

    section.heading("Top features");
    let mut table = Table::new(&["State", "Rank", "Feature", "Weight"]);
    for f in inputs.forecast_importance.iter().filter(|f| f.rank <= TOP_FEATURES) {
        table.row(vec![
            f.state.to_string(),
            f.rank.to_string(),
            f.feature.clone(),
            num(f.weight, 3),
        ]);
    }
    section.table_or(table, "No feature importance is available.");

    section.heading("Next-month forecasts");
    let mut table = Table::new(&["State", "Crime", "Month", "Predicted", "Lower", "Upper", "Model version"]);
    for r in &inputs.forecast_records {
        table.row(vec![
            r.state.to_string(),
            r.crime_type.label().to_string(),
            format!("{:04}-{:02}", r.target_year, r.target_month),
            num(r.predicted, 1),
            num(r.lower, 1),
            num(r.upper, 1),
            r.model_version.clone(),
        ]);
    }
    section.table_or(table, "No forecasts were produced.");
    section
}
