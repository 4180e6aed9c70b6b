#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Canonical crime statistics types shared by every stage of the pipeline.
//!
//! All raw sources normalize their state-specific column layouts into the
//! [`Observation`] row defined here: one count per (state, municipality,
//! year, month, crime type).

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// IBGE municipality code as published by the state sources.
pub type MunicipalityId = u32;

/// Brazilian state covered by the pipeline.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum State {
    /// São Paulo
    Sp,
    /// Rio de Janeiro
    Rj,
}

impl State {
    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Sp, Self::Rj]
    }

    /// Human-readable state name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sp => "São Paulo",
            Self::Rj => "Rio de Janeiro",
        }
    }

    /// IBGE code of the state capital, in the 7-digit form.
    #[must_use]
    pub const fn capital(self) -> MunicipalityId {
        match self {
            Self::Sp => 3_550_308,
            Self::Rj => 3_304_557,
        }
    }
}

/// Returns `true` if `id` is a state capital, in either the 7-digit IBGE
/// form or the 6-digit form without the check digit.
#[must_use]
pub fn is_capital(id: MunicipalityId) -> bool {
    State::all()
        .iter()
        .any(|s| s.capital() == id || s.capital() / 10 == id)
}

/// Crime types tracked by both state sources.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CrimeType {
    /// Intentional homicide (`homicidio doloso`)
    Homicide,
    /// Vehicle robbery (`roubo de veiculo`)
    VehicleRobbery,
    /// Vehicle theft (`furto de veiculo`)
    VehicleTheft,
    /// All robberies
    RobberyTotal,
    /// All thefts
    TheftTotal,
}

impl CrimeType {
    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Homicide,
            Self::VehicleRobbery,
            Self::VehicleTheft,
            Self::RobberyTotal,
            Self::TheftTotal,
        ]
    }

    /// Crimes against property, the subject of the seasonality stage.
    #[must_use]
    pub const fn property() -> &'static [Self] {
        &[
            Self::VehicleRobbery,
            Self::VehicleTheft,
            Self::RobberyTotal,
            Self::TheftTotal,
        ]
    }

    /// Whether this type counts towards the violent-crime indicator.
    #[must_use]
    pub const fn is_violent(self) -> bool {
        matches!(self, Self::Homicide | Self::RobberyTotal)
    }

    /// Short English label used in reports.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Homicide => "Homicide",
            Self::VehicleRobbery => "Vehicle robbery",
            Self::VehicleTheft => "Vehicle theft",
            Self::RobberyTotal => "Robbery (total)",
            Self::TheftTotal => "Theft (total)",
        }
    }
}

/// A calendar month.
///
/// Ordering is chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct YearMonth {
    /// Calendar year
    pub year: i32,
    /// Month of year, 1-12
    pub month: u8,
}

impl YearMonth {
    /// Creates a month value.
    ///
    /// # Errors
    ///
    /// Returns an error if `month` is not in the range 1-12.
    pub const fn new(year: i32, month: u8) -> Result<Self, InvalidMonthError> {
        if month >= 1 && month <= 12 {
            Ok(Self { year, month })
        } else {
            Err(InvalidMonthError { month })
        }
    }

    /// Number of months since January of year 0.
    #[must_use]
    pub const fn index(self) -> i64 {
        self.year as i64 * 12 + (self.month as i64 - 1)
    }

    /// Inverse of [`Self::index`].
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub const fn from_index(index: i64) -> Self {
        Self {
            year: index.div_euclid(12) as i32,
            month: (index.rem_euclid(12) + 1) as u8,
        }
    }

    /// The following month.
    #[must_use]
    pub const fn succ(self) -> Self {
        Self::from_index(self.index() + 1)
    }

    /// Months from `self` to `other` (negative if `other` is earlier).
    #[must_use]
    pub const fn months_until(self, other: Self) -> i64 {
        other.index() - self.index()
    }

    /// Quarter of the year, 1-4.
    #[must_use]
    pub const fn quarter(self) -> u8 {
        (self.month - 1) / 3 + 1
    }

    /// Every month from `start` to `end`, inclusive. Empty if `end < start`.
    #[must_use]
    pub fn range_inclusive(start: Self, end: Self) -> Vec<Self> {
        (start.index()..=end.index()).map(Self::from_index).collect()
    }
}

impl std::fmt::Display for YearMonth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Error returned when attempting to create a [`YearMonth`] with a month
/// outside 1-12.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidMonthError {
    /// The invalid month value that was provided.
    pub month: u8,
}

impl std::fmt::Display for InvalidMonthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid month {}: expected 1-12", self.month)
    }
}

impl std::error::Error for InvalidMonthError {}

/// One row of the canonical table.
///
/// The key `(state, municipality_id, year, month, crime_type)` is unique
/// within a table and `count` is never negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Observation {
    pub state: State,
    pub municipality_id: MunicipalityId,
    pub year: i32,
    pub month: u8,
    pub crime_type: CrimeType,
    pub count: u64,
}

impl Observation {
    /// The observation's calendar month.
    #[must_use]
    pub const fn period(&self) -> YearMonth {
        YearMonth {
            year: self.year,
            month: self.month,
        }
    }

    /// The unique key of this row, in canonical sort order.
    #[must_use]
    pub const fn key(&self) -> ObservationKey {
        (
            self.state,
            self.municipality_id,
            self.year,
            self.month,
            self.crime_type,
        )
    }
}

/// Unique key of an [`Observation`].
pub type ObservationKey = (State, MunicipalityId, i32, u8, CrimeType);

#[cfg(test)]
mod tests {
    use std::str::FromStr as _;

    use super::*;

    #[test]
    fn state_parses_case_insensitively() {
        assert_eq!(State::from_str("sp").unwrap(), State::Sp);
        assert_eq!(State::from_str("RJ").unwrap(), State::Rj);
        assert_eq!(State::Sp.to_string(), "SP");
    }

    #[test]
    fn crime_type_string_forms() {
        assert_eq!(CrimeType::VehicleRobbery.as_ref(), "vehicle_robbery");
        assert_eq!(
            CrimeType::from_str("theft_total").unwrap(),
            CrimeType::TheftTotal
        );
        assert_eq!(CrimeType::all().len(), 5);
        assert!(!CrimeType::property().contains(&CrimeType::Homicide));
    }

    #[test]
    fn capitals_match_both_code_forms() {
        assert!(is_capital(3_550_308));
        assert!(is_capital(355_030));
        assert!(is_capital(3_304_557));
        assert!(!is_capital(3_509_502));
    }

    #[test]
    fn year_month_rejects_invalid_month() {
        assert_eq!(YearMonth::new(2020, 13), Err(InvalidMonthError { month: 13 }));
        assert!(YearMonth::new(2020, 0).is_err());
    }

    #[test]
    fn year_month_arithmetic() {
        let dec = YearMonth::new(2020, 12).unwrap();
        let jan = dec.succ();
        assert_eq!(jan, YearMonth::new(2021, 1).unwrap());
        assert_eq!(dec.months_until(jan), 1);
        assert_eq!(YearMonth::from_index(dec.index()), dec);
        assert_eq!(jan.quarter(), 1);
        assert_eq!(dec.quarter(), 4);
        assert_eq!(dec.to_string(), "2020-12");
        assert_eq!(YearMonth::range_inclusive(dec, jan).len(), 2);
        assert!(YearMonth::range_inclusive(jan, dec).is_empty());
    }
}
