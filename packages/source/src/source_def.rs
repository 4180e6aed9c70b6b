//! Config-driven source definition.
//!
//! A [`SourceDefinition`] captures everything that differs between the
//! state publications: file names, text encoding, delimiter, and how raw
//! column headers map onto the canonical columns. A single generic loader
//! handles every source.

use std::collections::BTreeMap;
use std::str::FromStr as _;

use crime_stats_crime_models::{CrimeType, State};
use serde::Deserialize;

use crate::SourceError;

/// A complete source definition, deserialized from TOML.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SourceDefinition {
    /// Unique identifier (e.g., `"sp"`).
    pub id: String,
    /// Human-readable name (e.g., `"São Paulo SSP"`).
    pub name: String,
    /// State every row of this source belongs to.
    pub state: State,
    /// Raw file names, relative to the raw data directory.
    pub files: Vec<String>,
    #[serde(default)]
    pub encoding: Encoding,
    /// Single-byte field delimiter.
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    /// Count used for empty cells.
    #[serde(default)]
    pub fill_missing_with: u64,
    /// Raw headers holding the year and month; each must be present.
    #[serde(default)]
    pub date_columns: Vec<String>,
    /// Reject files that carry headers not mentioned anywhere in this
    /// definition.
    #[serde(default)]
    pub strict_columns: bool,
    /// Raw header (lowercase) to canonical column name.
    #[serde(default)]
    pub column_aliases: BTreeMap<String, String>,
    /// Crime columns computed as the sum of raw columns.
    #[serde(default)]
    pub derived: Vec<DerivedColumn>,
}

/// Text encoding of a raw file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    #[default]
    Utf8,
    /// ISO-8859-1; every byte maps to the code point of the same value.
    Latin1,
}

/// A crime column that the source does not publish directly.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DerivedColumn {
    /// Canonical crime type name.
    pub target: String,
    /// Raw headers whose counts are added together.
    pub sum_of: Vec<String>,
}

fn default_delimiter() -> String {
    ",".to_string()
}

/// A canonical column a raw header can resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CanonicalColumn {
    Year,
    Month,
    MunicipalityId,
    Crime(CrimeType),
}

impl CanonicalColumn {
    /// Every column the loader requires, in canonical order.
    #[must_use]
    pub fn required() -> Vec<Self> {
        let mut cols = vec![Self::Year, Self::Month, Self::MunicipalityId];
        cols.extend(CrimeType::all().iter().copied().map(Self::Crime));
        cols
    }

    /// Parses a canonical column name such as `"year"` or `"vehicle_theft"`.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "year" => Some(Self::Year),
            "month" => Some(Self::Month),
            "municipality_id" => Some(Self::MunicipalityId),
            other => CrimeType::from_str(other).ok().map(Self::Crime),
        }
    }

    #[must_use]
    pub fn name(self) -> String {
        match self {
            Self::Year => "year".to_string(),
            Self::Month => "month".to_string(),
            Self::MunicipalityId => "municipality_id".to_string(),
            Self::Crime(c) => c.to_string(),
        }
    }
}

impl SourceDefinition {
    /// Parses and validates a TOML source definition.
    ///
    /// Alias keys and derived column references are lowercased so they
    /// compare equal to normalized headers.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Toml`] if the text is not a valid definition
    /// and [`SourceError::InvalidDefinition`] if it is internally
    /// inconsistent.
    pub fn from_toml(toml_str: &str) -> Result<Self, SourceError> {
        let mut def: Self = toml::from_str(toml_str)?;
        def.column_aliases = def
            .column_aliases
            .into_iter()
            .map(|(k, v)| (k.trim().to_lowercase(), v.trim().to_lowercase()))
            .collect();
        for d in &mut def.derived {
            d.target = d.target.trim().to_lowercase();
            for c in &mut d.sum_of {
                *c = c.trim().to_lowercase();
            }
        }
        for c in &mut def.date_columns {
            *c = c.trim().to_lowercase();
        }
        def.validate()?;
        Ok(def)
    }

    fn invalid(&self, message: impl Into<String>) -> SourceError {
        SourceError::InvalidDefinition {
            source_id: self.id.clone(),
            message: message.into(),
        }
    }

    fn validate(&self) -> Result<(), SourceError> {
        if self.id.is_empty() {
            return Err(self.invalid("empty id"));
        }
        if self.files.is_empty() {
            return Err(self.invalid("no files listed"));
        }
        self.delimiter_byte()?;
        for (raw, canonical) in &self.column_aliases {
            if CanonicalColumn::parse(canonical).is_none() {
                return Err(self.invalid(format!(
                    "alias {raw} points at unknown column {canonical}"
                )));
            }
        }
        for d in &self.derived {
            if !matches!(CanonicalColumn::parse(&d.target), Some(CanonicalColumn::Crime(_))) {
                return Err(self.invalid(format!("derived target {} is not a crime type", d.target)));
            }
            if d.sum_of.is_empty() {
                return Err(self.invalid(format!("derived {} sums no columns", d.target)));
            }
        }
        Ok(())
    }

    /// The delimiter as a single byte.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::InvalidDefinition`] unless the delimiter is
    /// exactly one ASCII character.
    pub fn delimiter_byte(&self) -> Result<u8, SourceError> {
        match self.delimiter.as_bytes() {
            [b] if b.is_ascii() => Ok(*b),
            _ => Err(self.invalid(format!(
                "delimiter {:?} is not a single ASCII character",
                self.delimiter
            ))),
        }
    }
}
