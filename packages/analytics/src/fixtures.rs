//! Canonical tables for the stage tests.

use crime_stats_crime_models::{CrimeType, MunicipalityId, Observation, State, YearMonth};

pub fn ym(year: i32, month: u8) -> YearMonth {
    YearMonth::new(year, month).unwrap()
}

/// Municipality codes used for `state`: `n` distinct 7-digit codes.
pub fn municipality_ids(state: State, n: u32) -> Vec<MunicipalityId> {
    let base = match state {
        State::Sp => 3_500_000,
        State::Rj => 3_300_000,
    };
    (1..=n).map(|i| base + i * 10).collect()
}

/// A full grid of `months` months for `ids`, with counts from `count`.
pub fn grid(
    state: State,
    start: YearMonth,
    months: usize,
    ids: &[MunicipalityId],
    count: impl Fn(MunicipalityId, CrimeType, usize) -> u64,
) -> Vec<Observation> {
    let mut out = Vec::new();
    for &municipality_id in ids {
        for i in 0..months {
            let period = YearMonth::from_index(start.index() + i64::try_from(i).unwrap());
            for &crime_type in CrimeType::all() {
                out.push(Observation {
                    state,
                    municipality_id,
                    year: period.year,
                    month: period.month,
                    crime_type,
                    count: count(municipality_id, crime_type, i),
                });
            }
        }
    }
    out.sort_unstable_by_key(Observation::key);
    out
}

/// Observations whose state homicide totals follow `homicides`, split
/// across `municipalities` municipalities. Other crime types are fixed
/// multiples of the homicide count plus a month-dependent offset.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn observations(
    state: State,
    start: YearMonth,
    homicides: &[f64],
    municipalities: u32,
) -> Vec<Observation> {
    let ids = municipality_ids(state, municipalities);
    let n = u64::from(municipalities);
    grid(state, start, homicides.len(), &ids, |id, crime, i| {
        let total = homicides[i].round() as u64;
        let share = total / n;
        let own = if id == ids[0] { total - share * (n - 1) } else { share };
        let offset = (i % 12) as u64;
        match crime {
            CrimeType::Homicide => own,
            CrimeType::VehicleRobbery => own * 2 + offset,
            CrimeType::VehicleTheft => own * 3 + 2 * offset,
            CrimeType::RobberyTotal => own * 5 + 3 * offset,
            CrimeType::TheftTotal => own * 8 + offset * offset,
        }
    })
}
