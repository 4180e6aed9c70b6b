//! Spatial analyzer: municipality indicators, PCA, Ward clustering and
//! hotspot ranking.

use std::collections::BTreeMap;

use crime_stats_analytics_models::{
    SpatialCluster, SpatialExcluded, SpatialHotspot, SpatialMunicipality, SpatialPca,
};
use crime_stats_crime_models::{CrimeType, MunicipalityId, Observation, State, YearMonth};
use crime_stats_ml::pca::Pca;
use crime_stats_ml::scale::Standardizer;
use crime_stats_ml::ward::ward_clusters;
use crime_stats_source::municipalities::MunicipalityDirectory;
use crime_stats_stats::descriptive::{mean, quantile, std_dev};
use crime_stats_stats::regression::trend;

use crate::config::{IndexWeights, SpatialConfig};
use crate::series::Exclusions;
use crate::{AnalysisError, Result};

/// Column names of the indicator vector, in order.
pub const INDICATORS: [&str; 8] = [
    "homicide_mean",
    "homicide_cv",
    "vehicle_robbery_mean",
    "vehicle_theft_mean",
    "violent_mean",
    "robbery_theft_ratio",
    "homicide_trend",
    "volatility",
];

const EPSILON: f64 = 1e-6;

/// Crime-rate indicators of one municipality.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Indicators {
    pub homicide_mean: f64,
    pub homicide_cv: f64,
    pub vehicle_robbery_mean: f64,
    pub vehicle_theft_mean: f64,
    pub violent_mean: f64,
    pub robbery_theft_ratio: f64,
    pub homicide_trend: f64,
    pub volatility: f64,
}

impl Indicators {
    /// Computes the indicators from monthly counts, one `[f64; 5]` per
    /// month in [`CrimeType::all`] order. `None` without any month.
    #[must_use]
    pub fn from_months(months: &[[f64; 5]]) -> Option<Self> {
        if months.is_empty() {
            return None;
        }
        let column = |j: usize| months.iter().map(|m| m[j]).collect::<Vec<f64>>();
        let homicide = column(0);
        let robbery = column(3);
        let theft = column(4);

        let homicide_mean = mean(&homicide);
        let homicide_std = if homicide.len() > 1 { std_dev(&homicide) } else { 0.0 };
        let violent: Vec<f64> = homicide.iter().zip(&robbery).map(|(h, r)| h + r).collect();

        let homicide_trend = if homicide.len() < 3 {
            0.0
        } else {
            trend(&homicide).map_or(0.0, |fit| fit.slope / (homicide_mean + EPSILON))
        };
        let volatility = mean(
            &months
                .iter()
                .map(|m| std_dev(&m[..3]))
                .collect::<Vec<f64>>(),
        );

        Some(Self {
            homicide_mean,
            homicide_cv: homicide_std / (homicide_mean + EPSILON),
            vehicle_robbery_mean: mean(&column(1)),
            vehicle_theft_mean: mean(&column(2)),
            violent_mean: mean(&violent),
            robbery_theft_ratio: robbery.iter().sum::<f64>() / (theft.iter().sum::<f64>() + 1.0),
            homicide_trend,
            volatility,
        })
    }

    #[must_use]
    pub fn to_vec(&self) -> Vec<f64> {
        vec![
            self.homicide_mean,
            self.homicide_cv,
            self.vehicle_robbery_mean,
            self.vehicle_theft_mean,
            self.violent_mean,
            self.robbery_theft_ratio,
            self.homicide_trend,
            self.volatility,
        ]
    }

    /// Reason the vector cannot be clustered, if any.
    #[must_use]
    pub fn exclusion_reason(&self) -> Option<&'static str> {
        let values = self.to_vec();
        if values.iter().any(|v| !v.is_finite()) {
            Some("non-finite indicator")
        } else if values.iter().all(|v| v.abs() < f64::EPSILON) {
            Some("all indicators are zero")
        } else {
            None
        }
    }
}

/// Tables produced by the spatial analyzer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpatialOutput {
    pub municipalities: Vec<SpatialMunicipality>,
    pub excluded: Vec<SpatialExcluded>,
    pub hotspots: Vec<SpatialHotspot>,
    pub clusters: Vec<SpatialCluster>,
    pub pca: Vec<SpatialPca>,
}

type MunicipalityKey = (State, MunicipalityId);

/// Monthly counts per municipality over the trailing window, skipping
/// excluded months.
fn window_counts(
    observations: &[Observation],
    exclusions: &Exclusions,
    window_months: usize,
) -> BTreeMap<MunicipalityKey, BTreeMap<YearMonth, [f64; 5]>> {
    let mut out: BTreeMap<MunicipalityKey, BTreeMap<YearMonth, [f64; 5]>> = BTreeMap::new();
    let Some(last) = observations.iter().map(Observation::period).max() else {
        return out;
    };
    let span = i64::try_from(window_months.max(1)).unwrap_or(i64::MAX);
    let first = YearMonth::from_index(last.index().saturating_sub(span - 1));

    for o in observations {
        let key = (o.state, o.municipality_id);
        let p = o.period();
        if p < first {
            // Keep municipalities that only report before the window so
            // they are listed as excluded rather than silently dropped.
            out.entry(key).or_default();
            continue;
        }
        if exclusions.is_excluded(o.state, p) {
            out.entry(key).or_default();
            continue;
        }
        let Some(j) = CrimeType::all().iter().position(|&c| c == o.crime_type) else {
            continue;
        };
        #[allow(clippy::cast_precision_loss)]
        let count = o.count as f64;
        out.entry(key).or_default().entry(p).or_insert([0.0; 5])[j] += count;
    }
    out
}

fn criminality_index(rows: &[Indicators], weights: &IndexWeights) -> Vec<f64> {
    let max = |f: fn(&Indicators) -> f64| rows.iter().map(f).fold(0.0_f64, f64::max);
    let scaled = |v: f64, m: f64| if m > 0.0 { v / m } else { 0.0 };
    let max_homicide = max(|r| r.homicide_mean);
    let max_violent = max(|r| r.violent_mean);
    let max_volatility = max(|r| r.volatility);
    rows.iter()
        .map(|r| {
            weights.homicide * scaled(r.homicide_mean, max_homicide)
                + weights.violent * scaled(r.violent_mean, max_violent)
                + weights.volatility * scaled(r.volatility, max_volatility)
        })
        .collect()
}

/// Indices of `index` in descending order, ties broken by `ids`.
fn ranking(index: &[f64], ids: &[MunicipalityId]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..index.len()).collect();
    order.sort_by(|&a, &b| index[b].total_cmp(&index[a]).then(ids[a].cmp(&ids[b])));
    order
}

fn hotspot_flags(index: &[f64], order: &[usize], config: &SpatialConfig) -> Vec<bool> {
    let mut flags = vec![false; index.len()];
    if let Some(n) = config.hotspot_count {
        for &i in order.iter().take(n) {
            flags[i] = true;
        }
    } else {
        let threshold = quantile(index, config.hotspot_percentile);
        for (flag, &v) in flags.iter_mut().zip(index) {
            *flag = v >= threshold - 1e-12;
        }
    }
    flags
}

/// Runs the spatial analysis.
///
/// Identical inputs give identical labels and ordering: municipalities
/// are processed in (id, state) order, clusters are numbered by their
/// smallest member id and hotspot ties are broken by id.
///
/// # Errors
///
/// Returns [`AnalysisError::DegenerateInput`] with fewer than two eligible
/// municipalities, fewer eligible municipalities than clusters, or an
/// indicator matrix without variance.
#[allow(clippy::too_many_lines)]
pub fn analyze(
    observations: &[Observation],
    exclusions: &Exclusions,
    directory: &MunicipalityDirectory,
    config: &SpatialConfig,
) -> Result<SpatialOutput> {
    let mut eligible: Vec<(MunicipalityKey, Indicators)> = Vec::new();
    let mut excluded = Vec::new();
    for ((state, id), months) in window_counts(observations, exclusions, config.window_months) {
        let rows: Vec<[f64; 5]> = months.into_values().collect();
        let reason = match Indicators::from_months(&rows) {
            None => Some("no unflagged months in the analysis window"),
            Some(ind) => match ind.exclusion_reason() {
                None => {
                    eligible.push(((state, id), ind));
                    None
                }
                reason => reason,
            },
        };
        if let Some(reason) = reason {
            log::debug!("{state} {id}: excluded from clustering: {reason}");
            excluded.push(SpatialExcluded {
                state,
                municipality_id: id,
                name: directory.name(id),
                reason: reason.to_string(),
            });
        }
    }
    eligible.sort_by_key(|((state, id), _)| (*id, *state));

    let k = config.clusters;
    if eligible.len() < 2 || eligible.len() < k {
        return Err(AnalysisError::DegenerateInput {
            context: "spatial clustering".to_string(),
            message: format!(
                "{} eligible municipalities for {k} clusters ({} excluded)",
                eligible.len(),
                excluded.len()
            ),
        });
    }

    let indicators: Vec<Indicators> = eligible.iter().map(|(_, ind)| *ind).collect();
    let ids: Vec<MunicipalityId> = eligible.iter().map(|((_, id), _)| *id).collect();
    let raw: Vec<Vec<f64>> = indicators.iter().map(Indicators::to_vec).collect();

    let context = "spatial indicators";
    let scaler = Standardizer::fit(&raw).map_err(|e| AnalysisError::ml(context, e))?;
    let scaled = scaler.transform(&raw);
    let pca = Pca::fit(&scaled, config.variance_threshold, config.min_components)
        .map_err(|e| AnalysisError::ml(context, e))?;
    let labels = ward_clusters(&scaled, k).map_err(|e| AnalysisError::ml(context, e))?;
    let index = criminality_index(&indicators, &config.weights);
    let order = ranking(&index, &ids);
    let hotspot = hotspot_flags(&index, &order, config);

    log::info!(
        "Clustered {} municipalities into {k} clusters; {} PCA component(s) retained ({:.1}% variance); {} excluded",
        eligible.len(),
        pca.retained,
        pca.cumulative_ratio()
            .get(pca.retained.saturating_sub(1))
            .copied()
            .unwrap_or(0.0)
            * 100.0,
        excluded.len()
    );

    let municipalities: Vec<SpatialMunicipality> = eligible
        .iter()
        .enumerate()
        .map(|(i, ((state, id), ind))| {
            let pcs = pca.project(&scaled[i], 2);
            SpatialMunicipality {
                state: *state,
                municipality_id: *id,
                name: directory.name(*id),
                region: directory.region(*id),
                capital: directory.is_capital(*id),
                homicide_mean: ind.homicide_mean,
                homicide_cv: ind.homicide_cv,
                vehicle_robbery_mean: ind.vehicle_robbery_mean,
                vehicle_theft_mean: ind.vehicle_theft_mean,
                violent_mean: ind.violent_mean,
                robbery_theft_ratio: ind.robbery_theft_ratio,
                homicide_trend: ind.homicide_trend,
                volatility: ind.volatility,
                pc1: pcs.first().copied().unwrap_or(0.0),
                pc2: pcs.get(1).copied().unwrap_or(0.0),
                cluster: labels[i],
                criminality_index: index[i],
                hotspot: hotspot[i],
            }
        })
        .collect();

    let hotspots: Vec<SpatialHotspot> = order
        .iter()
        .filter(|&&i| hotspot[i])
        .enumerate()
        .map(|(rank, &i)| {
            let m = &municipalities[i];
            SpatialHotspot {
                rank: rank + 1,
                state: m.state,
                municipality_id: m.municipality_id,
                name: m.name.clone(),
                region: m.region.clone(),
                capital: m.capital,
                criminality_index: m.criminality_index,
                cluster: m.cluster,
            }
        })
        .collect();

    let clusters = cluster_profiles(&municipalities);
    let pca_rows = pca_table(&pca);

    Ok(SpatialOutput {
        municipalities,
        excluded,
        hotspots,
        clusters,
        pca: pca_rows,
    })
}

fn cluster_profiles(municipalities: &[SpatialMunicipality]) -> Vec<SpatialCluster> {
    let mut groups: BTreeMap<(usize, State), Vec<&SpatialMunicipality>> = BTreeMap::new();
    for m in municipalities {
        groups.entry((m.cluster, m.state)).or_default().push(m);
    }
    groups
        .into_iter()
        .map(|((cluster, state), members)| {
            let avg = |f: fn(&SpatialMunicipality) -> f64| {
                mean(&members.iter().map(|m| f(m)).collect::<Vec<f64>>())
            };
            SpatialCluster {
                cluster,
                state,
                municipalities: members.len(),
                hotspots: members.iter().filter(|m| m.hotspot).count(),
                homicide_mean: avg(|m| m.homicide_mean),
                vehicle_robbery_mean: avg(|m| m.vehicle_robbery_mean),
                vehicle_theft_mean: avg(|m| m.vehicle_theft_mean),
                violent_mean: avg(|m| m.violent_mean),
                volatility: avg(|m| m.volatility),
                criminality_index: avg(|m| m.criminality_index),
            }
        })
        .collect()
}

fn pca_table(pca: &Pca) -> Vec<SpatialPca> {
    let cumulative = pca.cumulative_ratio();
    pca.components
        .iter()
        .enumerate()
        .map(|(i, axis)| {
            let loading = |j: usize| axis.get(j).copied().unwrap_or(0.0);
            SpatialPca {
                component: i + 1,
                explained_variance_ratio: pca.explained_variance_ratio[i],
                cumulative_ratio: cumulative[i],
                retained: i < pca.retained,
                homicide_mean: loading(0),
                homicide_cv: loading(1),
                vehicle_robbery_mean: loading(2),
                vehicle_theft_mean: loading(3),
                violent_mean: loading(4),
                robbery_theft_ratio: loading(5),
                homicide_trend: loading(6),
                volatility: loading(7),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use crime_stats_source::municipalities::Municipality;

    use super::*;
    use crate::fixtures::{grid, municipality_ids, ym};

    fn counts(rank: u64, crime: CrimeType, i: usize) -> u64 {
        let i = i as u64;
        match crime {
            CrimeType::Homicide => rank * (1 + i % 3),
            CrimeType::VehicleRobbery => (rank * rank) % 7 + i % 5,
            CrimeType::VehicleTheft => 10 + rank * (i % 4),
            CrimeType::RobberyTotal => 3 * rank + i % 6,
            CrimeType::TheftTotal => 30 + i % 2 - rank,
        }
    }

    /// 8 SP and 4 RJ municipalities with distinct profiles, plus one SP
    /// municipality that never reports anything.
    fn table() -> (Vec<Observation>, MunicipalityId) {
        let sp = municipality_ids(State::Sp, 9);
        let silent = sp[8];
        let mut obs = grid(State::Sp, ym(2020, 1), 24, &sp, |id, crime, i| {
            if id == silent {
                0
            } else {
                counts(u64::from((id % 1000) / 10), crime, i)
            }
        });
        let rj = municipality_ids(State::Rj, 4);
        obs.extend(grid(State::Rj, ym(2020, 1), 24, &rj, |id, crime, i| {
            counts(u64::from((id % 1000) / 10) + 8, crime, i)
        }));
        (obs, silent)
    }

    fn run(config: &SpatialConfig) -> Result<SpatialOutput> {
        let (obs, _) = table();
        analyze(&obs, &Exclusions::default(), &MunicipalityDirectory::default(), config)
    }

    #[test]
    fn indicators_follow_their_definitions() {
        let months = [
            [1.0, 0.0, 0.0, 2.0, 4.0],
            [2.0, 0.0, 0.0, 2.0, 4.0],
            [3.0, 0.0, 0.0, 2.0, 4.0],
        ];
        let ind = Indicators::from_months(&months).unwrap();
        assert_relative_eq!(ind.homicide_mean, 2.0);
        assert_relative_eq!(ind.homicide_cv, 1.0 / (2.0 + EPSILON), epsilon = 1e-12);
        assert_relative_eq!(ind.violent_mean, 4.0);
        assert_relative_eq!(ind.robbery_theft_ratio, 6.0 / 13.0);
        assert_relative_eq!(ind.homicide_trend, 1.0 / (2.0 + EPSILON), epsilon = 1e-9);
        // std of (1,0,0), (2,0,0), (3,0,0)
        let expected = (f64::sqrt(1.0 / 3.0) + f64::sqrt(4.0 / 3.0) + f64::sqrt(3.0)) / 3.0;
        assert_relative_eq!(ind.volatility, expected, epsilon = 1e-12);
        assert!(ind.exclusion_reason().is_none());
        assert!(Indicators::from_months(&[]).is_none());
    }

    #[test]
    fn short_history_has_no_trend() {
        let ind = Indicators::from_months(&[[1.0, 0.0, 0.0, 0.0, 0.0], [5.0, 0.0, 0.0, 0.0, 0.0]])
            .unwrap();
        assert_relative_eq!(ind.homicide_trend, 0.0);
    }

    #[test]
    fn all_zero_municipality_is_excluded_not_labeled() {
        let (obs, silent) = table();
        let out = analyze(
            &obs,
            &Exclusions::default(),
            &MunicipalityDirectory::default(),
            &SpatialConfig::default(),
        )
        .unwrap();
        assert_eq!(out.excluded.len(), 1);
        assert_eq!(out.excluded[0].municipality_id, silent);
        assert_eq!(out.excluded[0].reason, "all indicators are zero");
        assert!(out.municipalities.iter().all(|m| m.municipality_id != silent));
        assert_eq!(out.municipalities.len(), 12);
    }

    #[test]
    fn clustering_is_deterministic() {
        let config = SpatialConfig::default();
        let first = run(&config).unwrap();
        let second = run(&config).unwrap();
        assert_eq!(first, second);

        let labels: Vec<usize> = first.municipalities.iter().map(|m| m.cluster).collect();
        assert_eq!(labels[0], 1);
        for k in 1..=config.clusters {
            assert!(labels.contains(&k));
        }
        assert!(labels.iter().all(|&l| (1..=config.clusters).contains(&l)));
    }

    #[test]
    fn fixed_hotspot_count_takes_the_top_of_the_index() {
        let config = SpatialConfig {
            hotspot_count: Some(3),
            ..SpatialConfig::default()
        };
        let out = run(&config).unwrap();
        assert_eq!(out.hotspots.len(), 3);
        assert_eq!(
            out.hotspots.iter().map(|h| h.rank).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        let weakest = out.hotspots[2].criminality_index;
        for m in out.municipalities.iter().filter(|m| !m.hotspot) {
            assert!(m.criminality_index <= weakest);
        }
        let counted: usize = out.clusters.iter().map(|c| c.hotspots).sum();
        assert_eq!(counted, 3);
    }

    #[test]
    fn percentile_hotspots_sit_above_the_quantile() {
        let out = run(&SpatialConfig::default()).unwrap();
        assert!(!out.hotspots.is_empty());
        let index: Vec<f64> = out.municipalities.iter().map(|m| m.criminality_index).collect();
        let threshold = quantile(&index, 0.9);
        assert!(out.hotspots.iter().all(|h| h.criminality_index >= threshold - 1e-12));
        assert!(index.iter().all(|&v| v <= 1.0 + 1e-12));
    }

    #[test]
    fn pca_reports_every_component() {
        let out = run(&SpatialConfig::default()).unwrap();
        assert_eq!(out.pca.len(), INDICATORS.len());
        let retained = out.pca.iter().filter(|c| c.retained).count();
        assert!(retained >= 2);
        assert_relative_eq!(out.pca[7].cumulative_ratio, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn too_few_municipalities_is_degenerate() {
        let config = SpatialConfig {
            clusters: 20,
            ..SpatialConfig::default()
        };
        let err = run(&config).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::DegenerateInput);
    }

    #[test]
    fn directory_names_and_capitals_are_attached() {
        let ids = municipality_ids(State::Rj, 3);
        let capital = State::Rj.capital();
        let all_ids = [ids.clone(), vec![capital]].concat();
        let obs = grid(State::Rj, ym(2021, 1), 12, &all_ids, |id, crime, i| {
            counts(u64::from(id % 7) + 1, crime, i)
        });
        let directory = MunicipalityDirectory::new(vec![Municipality {
            municipality_id: capital,
            name: "Rio de Janeiro".to_string(),
            state: State::Rj,
            region: "Metropolitana".to_string(),
        }]);
        let config = SpatialConfig {
            clusters: 2,
            ..SpatialConfig::default()
        };
        let out = analyze(&obs, &Exclusions::default(), &directory, &config).unwrap();
        let rio = out
            .municipalities
            .iter()
            .find(|m| m.municipality_id == capital)
            .unwrap();
        assert!(rio.capital);
        assert_eq!(rio.name, "Rio de Janeiro");
        assert_eq!(rio.region, "Metropolitana");
        assert_eq!(out.municipalities.iter().filter(|m| m.capital).count(), 1);
    }
}
